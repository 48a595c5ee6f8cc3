use crate::{
  cache::ResultCache,
  client::{HttpResolutionClient, ResolutionResult, ResolveHost},
  config::{HostQueryConfig, PublishMode},
  constants::{UPSTREAM_HEADER, UPSTREAM_IS_PORT_443_VAR_KEY, UPSTREAM_SECURE_HEADER, UPSTREAM_VAR_KEY},
  error::{HostQueryBuildError, HostQueryError},
  target::{UpstreamTarget, normalize},
};
use std::{collections::HashMap, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/* ---------------------------------------------------------- */
/// Value stored in a request-scoped routing variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingVar {
  /// String-valued variable
  Text(String),
  /// Boolean-valued variable
  Flag(bool),
}

/// Request-scoped view of an inbound request, constructed by the hosting proxy
/// for each request and discarded when the request completes. Routing variables
/// set here are the channel to later stages of the same proxy pipeline.
#[derive(Debug, Default)]
pub struct ProxyRequest {
  /// Verbatim `Host` value of the inbound request
  host: String,
  /// Request-scoped routing variables
  vars: HashMap<String, RoutingVar>,
  /// Request headers, names kept lowercase
  headers: HashMap<String, String>,
  /// Cancelled by the host when the inbound client goes away
  cancel: Option<CancellationToken>,
}

impl ProxyRequest {
  /// Create a new instance for the inbound host
  pub fn new(host: impl Into<String>) -> Self {
    Self {
      host: host.into(),
      ..Default::default()
    }
  }

  /// Attach the cancellation token the host trips when the inbound client disconnects
  pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
    self.cancel = Some(token);
    self
  }

  /// Verbatim `Host` value of the inbound request
  pub fn host(&self) -> &str {
    &self.host
  }

  /// Set a routing variable
  pub fn set_var(&mut self, key: &str, value: RoutingVar) {
    self.vars.insert(key.to_string(), value);
  }

  /// Get a routing variable
  pub fn var(&self, key: &str) -> Option<&RoutingVar> {
    self.vars.get(key)
  }

  /// Set a request header, name lowercased
  pub fn set_header(&mut self, name: &str, value: &str) {
    self.headers.insert(name.to_ascii_lowercase(), value.to_string());
  }

  /// Get a request header by case-insensitive name
  pub fn header(&self, name: &str) -> Option<&str> {
    self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
  }

  pub(crate) fn cancellation(&self) -> Option<CancellationToken> {
    self.cancel.clone()
  }
}

/// Next stage in the hosting proxy's middleware chain
#[async_trait::async_trait]
pub trait NextHandler: Send + Sync {
  /// Serve the request after the upstream target has been published
  async fn serve(&self, req: &mut ProxyRequest) -> Result<(), anyhow::Error>;
}

/* ---------------------------------------------------------- */
/// Request-path orchestrator of the upstream-resolution layer.
///
/// Per request: consult the result cache, fall back to the resolution client on
/// miss, normalize the resolved host into a canonical target, publish it into
/// routing state and delegate to the next stage. On any failure the next stage
/// is never invoked and the error propagates to the hosting proxy.
pub struct HostQueryHandler {
  /// Validated configuration, immutable for the handler's lifetime
  config: HostQueryConfig,
  /// External resolution strategy
  client: Arc<dyn ResolveHost>,
  /// Shared result cache, inert unless a TTL is configured
  cache: ResultCache,
}

impl HostQueryHandler {
  /// Create a new instance with the HTTP resolution client built from the configuration.
  /// This is the factory the host's module registry calls; configuration errors
  /// are fatal and prevent the handler from serving any request.
  pub fn try_new(config: HostQueryConfig) -> Result<Self, HostQueryBuildError> {
    config.validate()?;
    let client = Arc::new(HttpResolutionClient::try_new(&config)?);
    Ok(Self::assemble(config, client))
  }

  /// Create a new instance with a custom resolution client
  pub fn with_client(config: HostQueryConfig, client: Arc<dyn ResolveHost>) -> Result<Self, HostQueryBuildError> {
    config.validate()?;
    Ok(Self::assemble(config, client))
  }

  fn assemble(config: HostQueryConfig, client: Arc<dyn ResolveHost>) -> Self {
    let cache = ResultCache::new(config.cache_ttl);
    Self { config, client, cache }
  }

  /// Shared result cache, e.g. for host-driven invalidation
  pub fn cache(&self) -> &ResultCache {
    &self.cache
  }

  /// Handle one inbound request and delegate to the next stage on success
  pub async fn handle<N: NextHandler + ?Sized>(&self, req: &mut ProxyRequest, next: &N) -> Result<(), HostQueryError> {
    let domain = req.host().to_string();

    let result = match self.cache.get(&domain) {
      Some(result) => {
        debug!(%domain, "Resolution cache hit");
        result
      }
      None => {
        let result = self.resolve_bounded(&domain, req.cancellation()).await?;
        self.cache.put(&domain, result.clone());
        result
      }
    };

    let target = normalize(&result.resolved_host, &self.config)?;
    self.publish(req, &target);
    debug!(
      %domain,
      upstream = %target.published_address(),
      is_tls = target.is_tls(),
      "Published upstream target"
    );

    next.serve(req).await.map_err(HostQueryError::NextHandler)
  }

  /// External resolution raced against request cancellation
  async fn resolve_bounded(
    &self,
    domain: &str,
    cancel: Option<CancellationToken>,
  ) -> Result<ResolutionResult, HostQueryError> {
    match cancel {
      Some(token) => {
        tokio::select! {
          biased;
          _ = token.cancelled() => Err(HostQueryError::RequestCancelled),
          res = self.resolve_retrying(domain) => res,
        }
      }
      None => self.resolve_retrying(domain).await,
    }
  }

  /// Single call unless a retry policy is configured; attempts and backoff are always capped
  async fn resolve_retrying(&self, domain: &str) -> Result<ResolutionResult, HostQueryError> {
    let Some(retry) = self.config.retry else {
      return self.client.resolve(domain).await;
    };

    let mut attempt = 1u32;
    loop {
      match self.client.resolve(domain).await {
        Ok(result) => return Ok(result),
        Err(e) if attempt < retry.max_attempts && is_transient(&e) => {
          warn!(domain, attempt, error = %e, "Transient resolution failure, retrying");
          tokio::time::sleep(retry.backoff_delay(attempt)).await;
          attempt += 1;
        }
        Err(e) => return Err(e),
      }
    }
  }

  /// Publish the canonical target into the routing state the downstream stage reads
  fn publish(&self, req: &mut ProxyRequest, target: &UpstreamTarget) {
    match self.config.publish_mode {
      PublishMode::RoutingVariable => {
        req.set_var(UPSTREAM_VAR_KEY, RoutingVar::Text(target.published_address().to_string()));
        req.set_var(UPSTREAM_IS_PORT_443_VAR_KEY, RoutingVar::Flag(target.is_tls()));
      }
      PublishMode::Header => {
        req.set_header(UPSTREAM_HEADER, target.published_address());
        req.set_header(UPSTREAM_SECURE_HEADER, if target.is_tls() { "true" } else { "false" });
      }
    }
  }
}

/// Failures worth another attempt: the service may answer on a later call
fn is_transient(e: &HostQueryError) -> bool {
  match e {
    HostQueryError::ApiRequestFailed(_) | HostQueryError::ApiTimeout(_) => true,
    HostQueryError::UnexpectedStatus(status) => *status >= 500,
    _ => false,
  }
}

/* ---------------------------------------------------------- */
