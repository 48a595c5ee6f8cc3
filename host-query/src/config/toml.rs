use crate::log::warn;
use anyhow::anyhow;
use host_query_lib::{HostQueryBuildError, HostQueryConfig, HostQueryConfigBuilder, PublishMode, RetryConfig};
use serde::Deserialize;
use std::{collections::HashSet, fs, time::Duration};

#[derive(Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct ConfigToml {
  /// Base URL of the resolution service, may already contain query parameters
  pub api_url: Option<String>,
  /// Fallback host when resolution yields an empty value
  pub default_upstream: Option<String>,
  /// Assume TLS when the resolved host carries neither scheme nor port
  pub default_https_scheme: Option<bool>,
  /// Bound on a single lookup request in milliseconds
  pub query_timeout_msec: Option<u64>,
  /// Lifetime of cached resolutions in seconds; absent disables caching
  pub cache_ttl_secs: Option<u64>,
  /// "variable" or "header"
  pub publish_mode: Option<String>,
  /// Opt-in bounded retry of transient lookup failures
  pub retry: Option<RetryToml>,
}

#[derive(Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct RetryToml {
  pub max_attempts: Option<u32>,
  pub base_delay_msec: Option<u64>,
  pub max_delay_msec: Option<u64>,
}

impl ConfigToml {
  pub fn new(config_file: &str) -> Result<Self, anyhow::Error> {
    let config_str = fs::read_to_string(config_file)?;
    Self::from_str(&config_str)
  }

  fn from_str(config_str: &str) -> Result<Self, anyhow::Error> {
    // Check unused fields during deserialization
    let t = toml::de::Deserializer::new(config_str);
    let mut unused = HashSet::new();

    let res = serde_ignored::deserialize(t, |path| {
      unused.insert(path.to_string());
    })
    .map_err(|e| anyhow!(e));

    if !unused.is_empty() {
      let str = unused.iter().fold(String::new(), |acc, x| acc + x + "\n");
      warn!("Configuration file contains unsupported fields. Check typos:\n{}", str);
    }

    res
  }
}

impl TryFrom<ConfigToml> for HostQueryConfig {
  type Error = anyhow::Error;

  fn try_from(config_toml: ConfigToml) -> Result<Self, Self::Error> {
    let Some(api_url) = config_toml.api_url else {
      return Err(anyhow!("api_url is required"));
    };

    let mut builder = HostQueryConfigBuilder::default();
    builder.api_url(api_url);

    if let Some(v) = config_toml.default_upstream {
      builder.default_upstream(v);
    }
    if let Some(v) = config_toml.default_https_scheme {
      builder.default_https_scheme(v);
    }
    if let Some(v) = config_toml.query_timeout_msec {
      builder.query_timeout(Duration::from_millis(v));
    }
    if let Some(v) = config_toml.cache_ttl_secs {
      builder.cache_ttl(Some(Duration::from_secs(v)));
    }
    if let Some(v) = config_toml.publish_mode {
      let mode: PublishMode = v.as_str().try_into()?;
      builder.publish_mode(mode);
    }
    if let Some(retry_toml) = config_toml.retry {
      let defaults = RetryConfig::default();
      builder.retry(Some(RetryConfig {
        max_attempts: retry_toml.max_attempts.unwrap_or(defaults.max_attempts),
        base_delay: retry_toml
          .base_delay_msec
          .map(Duration::from_millis)
          .unwrap_or(defaults.base_delay),
        max_delay: retry_toml
          .max_delay_msec
          .map(Duration::from_millis)
          .unwrap_or(defaults.max_delay),
      }));
    }

    let config = builder.build().map_err(HostQueryBuildError::from)?;
    config.validate()?;
    Ok(config)
  }
}

/* ---------------------------------------------------------- */
