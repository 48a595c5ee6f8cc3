/// Query parameter overwritten on the lookup URL with the request's host
pub const DOMAIN_QUERY_PARAM: &str = "domain";

/// Default timeout for a single lookup request in milliseconds
/// The external service sits in the request path of the proxy, so the call must never be unbounded.
pub const DEFAULT_QUERY_TIMEOUT_MSEC: u64 = 5_000;

/// Default upstream port when neither an explicit port nor a TLS scheme applies
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Upstream port assumed for TLS
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Routing-state key holding the published upstream address.
/// This name is the stable contract consumed by the downstream proxy stage.
pub const UPSTREAM_VAR_KEY: &str = "shard.upstream";

/// Routing-state key holding the "effective port is 443" flag
pub const UPSTREAM_IS_PORT_443_VAR_KEY: &str = "shard.upstream.is_port_443";

/// Request header carrying the published upstream address in header publish mode
pub const UPSTREAM_HEADER: &str = "x-shard-upstream";

/// Request header carrying the "is secure port" flag in header publish mode
pub const UPSTREAM_SECURE_HEADER: &str = "x-shard-upstream-secure";

/// Default maximum attempts when retry is enabled, including the initial call
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Default initial backoff between retry attempts in milliseconds
pub const DEFAULT_RETRY_BASE_DELAY_MSEC: u64 = 100;

/// Default cap on the backoff between retry attempts in milliseconds
pub const DEFAULT_RETRY_MAX_DELAY_MSEC: u64 = 5_000;
