mod cache;
mod client;
mod config;
mod constants;
mod error;
mod middleware;
mod target;


pub use cache::ResultCache;
pub use client::{HttpResolutionClient, MockResolveHost, ResolutionResult, ResolveHost};
pub use config::{HostQueryConfig, HostQueryConfigBuilder, HostQueryConfigBuilderError, PublishMode, RetryConfig};
pub use constants::{UPSTREAM_HEADER, UPSTREAM_IS_PORT_443_VAR_KEY, UPSTREAM_SECURE_HEADER, UPSTREAM_VAR_KEY};
pub use error::{HostQueryBuildError, HostQueryError};
pub use middleware::{HostQueryHandler, NextHandler, ProxyRequest, RoutingVar};
pub use target::{UpstreamTarget, normalize};
