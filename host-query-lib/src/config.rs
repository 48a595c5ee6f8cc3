use crate::{
  constants::{
    DEFAULT_QUERY_TIMEOUT_MSEC, DEFAULT_RETRY_BASE_DELAY_MSEC, DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_RETRY_MAX_DELAY_MSEC,
  },
  error::HostQueryBuildError,
};
use std::time::Duration;

/* ---------------------------------------------------------- */
/// How the resolved upstream target is handed to the downstream proxy stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishMode {
  /// Set request-scoped routing variables [default]
  #[default]
  RoutingVariable,

  /// Inject request headers instead of routing variables
  Header,
}

impl TryFrom<&str> for PublishMode {
  type Error = HostQueryBuildError;
  fn try_from(value: &str) -> Result<Self, Self::Error> {
    match value {
      "variable" => Ok(PublishMode::RoutingVariable),
      "header" => Ok(PublishMode::Header),
      _ => Err(HostQueryBuildError::InvalidPublishMode(value.to_string())),
    }
  }
}

/* ---------------------------------------------------------- */
/// Bounded retry policy for transient lookup failures.
/// Disabled unless explicitly configured; attempts and added latency are always capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
  /// Maximum number of attempts including the initial call
  pub max_attempts: u32,
  /// Initial backoff between attempts, doubled on each subsequent attempt
  pub base_delay: Duration,
  /// Cap on the backoff between attempts
  pub max_delay: Duration,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
      base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MSEC),
      max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MSEC),
    }
  }
}

impl RetryConfig {
  /// Backoff before the attempt following `attempt` (1-based): exponential, capped, with up to 10% jitter
  pub(crate) fn backoff_delay(&self, attempt: u32) -> Duration {
    use rand::Rng;
    let exp = self.base_delay.saturating_mul(1u32 << (attempt - 1).min(16));
    let capped = exp.min(self.max_delay);
    let jitter_msec = (capped.as_millis() as u64 / 10).max(1);
    capped + Duration::from_millis(rand::rng().random_range(0..=jitter_msec))
  }
}

/* ---------------------------------------------------------- */
/// Configuration of the upstream-resolution layer.
/// Immutable after load; validated once before the layer serves any request.
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct HostQueryConfig {
  /// Base URL of the external resolution service; may already carry query parameters
  #[builder(setter(into))]
  pub api_url: String,

  /// Assume TLS (port 443) when the resolved host has neither scheme nor explicit port
  #[builder(default = "true")]
  pub default_https_scheme: bool,

  /// Fallback host substituted when the service resolves to an empty string
  #[builder(default, setter(into))]
  pub default_upstream: String,

  /// Bound on a single lookup request
  #[builder(default = "Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MSEC)")]
  pub query_timeout: Duration,

  /// Lifetime of cached resolution results.
  /// `None` disables caching entirely and every request hits the resolution service.
  #[builder(default)]
  pub cache_ttl: Option<Duration>,

  /// How the resolved target is handed to the downstream stage
  #[builder(default)]
  pub publish_mode: PublishMode,

  /// Opt-in bounded retry of transient lookup failures
  #[builder(default)]
  pub retry: Option<RetryConfig>,
}

impl HostQueryConfigBuilder {
  fn validate(&self) -> Result<(), String> {
    let Some(api_url) = self.api_url.as_ref() else {
      return Err("api_url is required".to_string());
    };
    if api_url.is_empty() {
      return Err("api_url is empty".to_string());
    }
    Ok(())
  }
}

impl HostQueryConfig {
  /// Full startup validation. Build errors here are fatal: the layer must not serve requests.
  pub fn validate(&self) -> Result<(), HostQueryBuildError> {
    if self.api_url.is_empty() {
      return Err(HostQueryBuildError::MissingApiUrl);
    }
    let parsed = url::Url::parse(&self.api_url)
      .map_err(|e| HostQueryBuildError::InvalidApiUrl(format!("{}: {e}", self.api_url)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
      return Err(HostQueryBuildError::InvalidApiUrl(format!(
        "unsupported scheme `{}`",
        parsed.scheme()
      )));
    }
    if self.query_timeout.is_zero() {
      return Err(HostQueryBuildError::InvalidQueryTimeout(
        "query timeout must be positive".to_string(),
      ));
    }
    if let Some(retry) = &self.retry {
      if retry.max_attempts == 0 {
        return Err(HostQueryBuildError::InvalidRetryConfig(
          "max_attempts must be at least 1".to_string(),
        ));
      }
      if retry.base_delay > retry.max_delay {
        return Err(HostQueryBuildError::InvalidRetryConfig(format!(
          "base_delay ({:?}) cannot be greater than max_delay ({:?})",
          retry.base_delay, retry.max_delay
        )));
      }
    }
    Ok(())
  }
}

/* ---------------------------------------------------------- */
#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_builder_defaults() {
    let config = HostQueryConfigBuilder::default()
      .api_url("http://127.0.0.1:5214/get-actual-host")
      .build()
      .unwrap();

    assert!(config.default_https_scheme);
    assert!(config.default_upstream.is_empty());
    assert_eq!(config.query_timeout, Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MSEC));
    assert!(config.cache_ttl.is_none());
    assert_eq!(config.publish_mode, PublishMode::RoutingVariable);
    assert!(config.retry.is_none());
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_api_url_is_required() {
    let res = HostQueryConfigBuilder::default().build();
    assert!(res.is_err());

    let res = HostQueryConfigBuilder::default().api_url("").build();
    assert!(res.is_err());
  }

  #[test]
  fn test_api_url_must_be_absolute_http() {
    let config = HostQueryConfigBuilder::default().api_url("not a url").build().unwrap();
    assert!(matches!(config.validate(), Err(HostQueryBuildError::InvalidApiUrl(_))));

    let config = HostQueryConfigBuilder::default()
      .api_url("ftp://lookup.example/query")
      .build()
      .unwrap();
    assert!(matches!(config.validate(), Err(HostQueryBuildError::InvalidApiUrl(_))));
  }

  #[test]
  fn test_zero_timeout_rejected() {
    let config = HostQueryConfigBuilder::default()
      .api_url("http://lookup.example/query")
      .query_timeout(Duration::ZERO)
      .build()
      .unwrap();
    assert!(matches!(config.validate(), Err(HostQueryBuildError::InvalidQueryTimeout(_))));
  }

  #[test]
  fn test_retry_config_validation() {
    let config = HostQueryConfigBuilder::default()
      .api_url("http://lookup.example/query")
      .retry(Some(RetryConfig {
        max_attempts: 0,
        ..Default::default()
      }))
      .build()
      .unwrap();
    assert!(matches!(config.validate(), Err(HostQueryBuildError::InvalidRetryConfig(_))));

    let config = HostQueryConfigBuilder::default()
      .api_url("http://lookup.example/query")
      .retry(Some(RetryConfig {
        max_attempts: 2,
        base_delay: Duration::from_secs(10),
        max_delay: Duration::from_secs(1),
      }))
      .build()
      .unwrap();
    assert!(matches!(config.validate(), Err(HostQueryBuildError::InvalidRetryConfig(_))));
  }

  #[test]
  fn test_publish_mode_from_str() {
    assert_eq!(PublishMode::try_from("variable").unwrap(), PublishMode::RoutingVariable);
    assert_eq!(PublishMode::try_from("header").unwrap(), PublishMode::Header);
    assert!(PublishMode::try_from("both").is_err());
  }

  #[test]
  fn test_backoff_is_capped() {
    let retry = RetryConfig {
      max_attempts: 10,
      base_delay: Duration::from_millis(100),
      max_delay: Duration::from_millis(500),
    };
    for attempt in 1..10 {
      let delay = retry.backoff_delay(attempt);
      // cap plus at most 10% jitter
      assert!(delay <= Duration::from_millis(550));
    }
  }
}
