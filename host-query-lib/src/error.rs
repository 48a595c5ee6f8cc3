/// Errors that happen on the request path while resolving an upstream
#[derive(thiserror::Error, Debug)]
pub enum HostQueryError {
  /* --------------------------------------- */
  /// Resolution service unreachable or the transport failed mid-request
  #[error("Failed to reach resolution service: {0}")]
  ApiRequestFailed(String),

  /// Resolution service did not answer within the configured bound
  #[error("Resolution service timed out after {0:?}")]
  ApiTimeout(std::time::Duration),

  /// Resolution service answered with a status other than 200
  #[error("Resolution service returned status {0}")]
  UnexpectedStatus(u16),

  /// Response body was not a JSON object carrying a string `host` field
  #[error("Malformed resolution response: {0}")]
  MalformedResponse(String),

  /* --------------------------------------- */
  /// Resolved or default host string cannot be normalized into an upstream target
  #[error("Invalid host URL: {0}")]
  InvalidHostUrl(String),

  /// Inbound request was cancelled while the lookup was in flight
  #[error("Request cancelled during upstream resolution")]
  RequestCancelled,

  /* --------------------------------------- */
  /// Downstream handler failed after the upstream target was published
  #[error("Next handler error: {0}")]
  NextHandler(#[source] anyhow::Error),
}

/// Errors that happen while building the resolution layer from configuration.
/// These are fatal at startup and prevent the layer from serving any request.
#[derive(thiserror::Error, Debug)]
pub enum HostQueryBuildError {
  /* --------------------------------------- */
  /// Configuration error: required `api_url` is absent or empty
  #[error("Missing `api_url` in configuration")]
  MissingApiUrl,

  /// Configuration error: `api_url` is not a usable absolute URL
  #[error("Invalid `api_url`: {0}")]
  InvalidApiUrl(String),

  /// Configuration error: query timeout out of range
  #[error("Invalid query timeout: {0}")]
  InvalidQueryTimeout(String),

  /// Configuration error: retry policy out of range
  #[error("Invalid retry configuration: {0}")]
  InvalidRetryConfig(String),

  /// Configuration error: unknown publish mode name
  #[error("Invalid publish mode: {0}")]
  InvalidPublishMode(String),

  /* --------------------------------------- */
  /// Config builder error
  #[error("Config builder error: {0}")]
  ConfigBuilderError(#[from] crate::config::HostQueryConfigBuilderError),

  /// Underlying HTTP client could not be constructed
  #[error("Failed to build HTTP resolution client: {0}")]
  HttpClientBuildError(String),
}
