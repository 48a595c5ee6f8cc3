use crate::{
  config::HostQueryConfig,
  constants::DOMAIN_QUERY_PARAM,
  error::{HostQueryBuildError, HostQueryError},
};
use std::time::{Duration, SystemTime};
use tracing::debug;
use url::Url;

/* ---------------------------------------------------------- */
/// Outcome of one external lookup, immutable once constructed.
/// An empty `resolved_host` means "no override; use the configured default upstream".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
  /// Host string returned by the resolution service, possibly empty
  pub resolved_host: String,
  /// When the lookup completed
  pub obtained_at: SystemTime,
}

impl ResolutionResult {
  /// Create a new instance stamped with the current time
  pub fn new(resolved_host: impl Into<String>) -> Self {
    Self {
      resolved_host: resolved_host.into(),
      obtained_at: SystemTime::now(),
    }
  }
}

/// Expected shape of the resolution service response.
/// Fields other than `host` are ignored; a missing `host` is a malformed response.
#[derive(serde::Deserialize)]
struct LookupResponse {
  host: String,
}

/* ---------------------------------------------------------- */
/// Trait for external domain-to-host resolution strategies
#[async_trait::async_trait]
pub trait ResolveHost: Send + Sync {
  /// Resolve the inbound domain to its current upstream host
  async fn resolve(&self, domain: &str) -> Result<ResolutionResult, HostQueryError>;
}

/* ---------------------------------------------------------- */
/// HTTP implementation of [ResolveHost] querying the configured resolution service.
/// Issues a single GET per call with a bounded timeout; retry policy belongs to the orchestrator.
pub struct HttpResolutionClient {
  /// Lookup endpoint, query parameters from the configuration preserved
  endpoint: Url,
  /// Underlying HTTP client, carries the request timeout
  client: reqwest::Client,
  /// Bound on a single lookup, kept for error reporting
  query_timeout: Duration,
}

impl HttpResolutionClient {
  /// Create a new instance from a validated configuration
  pub fn try_new(config: &HostQueryConfig) -> Result<Self, HostQueryBuildError> {
    let endpoint =
      Url::parse(&config.api_url).map_err(|e| HostQueryBuildError::InvalidApiUrl(format!("{}: {e}", config.api_url)))?;
    if config.query_timeout.is_zero() {
      return Err(HostQueryBuildError::InvalidQueryTimeout(
        "query timeout must be positive".to_string(),
      ));
    }
    let client = reqwest::Client::builder()
      .timeout(config.query_timeout)
      .build()
      .map_err(|e| HostQueryBuildError::HttpClientBuildError(e.to_string()))?;
    Ok(Self {
      endpoint,
      client,
      query_timeout: config.query_timeout,
    })
  }

  /// Build the lookup URL for the given domain: the `domain` query parameter is
  /// set or overwritten while every other parameter of the endpoint is preserved.
  fn lookup_url(&self, domain: &str) -> Url {
    let mut url = self.endpoint.clone();
    let retained: Vec<(String, String)> = url
      .query_pairs()
      .filter(|(k, _)| k != DOMAIN_QUERY_PARAM)
      .map(|(k, v)| (k.into_owned(), v.into_owned()))
      .collect();
    {
      let mut pairs = url.query_pairs_mut();
      pairs.clear();
      for (k, v) in &retained {
        pairs.append_pair(k, v);
      }
      pairs.append_pair(DOMAIN_QUERY_PARAM, domain);
    }
    url
  }

  /// Map a transport failure onto the request-path error taxonomy
  fn classify(&self, e: reqwest::Error) -> HostQueryError {
    if e.is_timeout() {
      HostQueryError::ApiTimeout(self.query_timeout)
    } else {
      HostQueryError::ApiRequestFailed(e.to_string())
    }
  }
}

#[async_trait::async_trait]
impl ResolveHost for HttpResolutionClient {
  async fn resolve(&self, domain: &str) -> Result<ResolutionResult, HostQueryError> {
    let url = self.lookup_url(domain);
    let response = self.client.get(url).send().await.map_err(|e| self.classify(e))?;

    let status = response.status();
    if status.as_u16() != 200 {
      return Err(HostQueryError::UnexpectedStatus(status.as_u16()));
    }

    let body = response.bytes().await.map_err(|e| self.classify(e))?;
    let parsed: LookupResponse =
      serde_json::from_slice(&body).map_err(|e| HostQueryError::MalformedResponse(e.to_string()))?;

    debug!(domain, resolved_host = %parsed.host, "Resolution service answered");
    Ok(ResolutionResult::new(parsed.host))
  }
}

/* ---------------------------------------------------------- */
/// Mock resolver for testing
pub struct MockResolveHost {
  /// Canned host answers keyed by domain
  responses: std::collections::HashMap<String, String>,
  /// Number of resolve calls served so far
  calls: std::sync::atomic::AtomicUsize,
}

impl MockResolveHost {
  /// Create a new mock resolver with no canned answers
  pub fn new() -> Self {
    Self {
      responses: std::collections::HashMap::new(),
      calls: std::sync::atomic::AtomicUsize::new(0),
    }
  }

  /// Add a canned answer for a domain
  pub fn with_response(mut self, domain: &str, host: &str) -> Self {
    self.responses.insert(domain.to_string(), host.to_string());
    self
  }

  /// Number of resolve calls served so far
  pub fn call_count(&self) -> usize {
    self.calls.load(std::sync::atomic::Ordering::Relaxed)
  }
}

impl Default for MockResolveHost {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait::async_trait]
impl ResolveHost for MockResolveHost {
  async fn resolve(&self, domain: &str) -> Result<ResolutionResult, HostQueryError> {
    self.calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    match self.responses.get(domain) {
      Some(host) => Ok(ResolutionResult::new(host.clone())),
      None => Err(HostQueryError::ApiRequestFailed(format!(
        "no mock response configured for {domain}"
      ))),
    }
  }
}

/* ---------------------------------------------------------- */
