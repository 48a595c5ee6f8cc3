use crate::{
  config::HostQueryConfig,
  constants::{DEFAULT_HTTP_PORT, DEFAULT_HTTPS_PORT},
  error::HostQueryError,
};
use std::fmt;

/* ---------------------------------------------------------- */
/// Canonical upstream published into routing state for the downstream proxy stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
  /// Bare host when an authority was parsed, otherwise the full normalized string
  address: String,
  /// Effective upstream port
  port: u16,
  /// True iff the effective port is 443
  is_tls: bool,
  /// Exact string written into routing state
  published: String,
}

impl UpstreamTarget {
  /// Bare host, or the full normalized string when no authority was parsed
  pub fn address(&self) -> &str {
    &self.address
  }

  /// Effective upstream port
  pub fn port(&self) -> u16 {
    self.port
  }

  /// True iff the effective port is 443
  pub fn is_tls(&self) -> bool {
    self.is_tls
  }

  /// The exact address string published to the downstream proxy stage
  pub fn published_address(&self) -> &str {
    &self.published
  }
}

impl fmt::Display for UpstreamTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.published)
  }
}

/* ---------------------------------------------------------- */
/// Host string parsed as a URL-like value
struct ParsedHost {
  /// Lowercased scheme when a `scheme://` prefix was present
  scheme: Option<String>,
  /// Authority host component, brackets kept for IPv6 literals
  host: Option<String>,
  /// Explicit port from the authority
  port: Option<u16>,
  /// The input string, verbatim
  raw: String,
}

/// Turn a raw resolved host string into a canonical upstream target.
///
/// Tie-break order: an explicit port is authoritative; otherwise an `https` scheme
/// selects 443; otherwise a scheme-less host falls back to `default_https_scheme`.
/// The published address keeps the reference dual form: `host:port` when an
/// authority was parsed, the raw string (suffixed with `:443` when the port was
/// defaulted to 443) when not.
pub fn normalize(resolved_host: &str, config: &HostQueryConfig) -> Result<UpstreamTarget, HostQueryError> {
  // Empty resolution means "no override": substitute the configured default upstream.
  let effective = if resolved_host.is_empty() {
    config.default_upstream.as_str()
  } else {
    resolved_host
  };

  let parsed = parse_host_url(effective)?;

  let (port, defaulted_to_tls) = match parsed.port {
    Some(port) => (port, false),
    None => {
      let tls = matches!(parsed.scheme.as_deref(), Some("https"))
        || (parsed.scheme.is_none() && config.default_https_scheme);
      if tls { (DEFAULT_HTTPS_PORT, true) } else { (DEFAULT_HTTP_PORT, false) }
    }
  };
  let is_tls = port == DEFAULT_HTTPS_PORT;

  let (address, published) = match &parsed.host {
    Some(host) => (host.clone(), format!("{host}:{port}")),
    None => {
      let published = if defaulted_to_tls {
        format!("{}:{}", parsed.raw, DEFAULT_HTTPS_PORT)
      } else {
        parsed.raw.clone()
      };
      (parsed.raw.clone(), published)
    }
  };

  Ok(UpstreamTarget {
    address,
    port,
    is_tls,
    published,
  })
}

/// Parse a host string as a URL-like value, extracting scheme, host and port when
/// syntactically present. A scheme-less string containing a path, or one with an
/// empty authority, carries no host component and falls back to the raw string.
fn parse_host_url(input: &str) -> Result<ParsedHost, HostQueryError> {
  let (scheme, rest) = match input.split_once("://") {
    Some((scheme, rest)) => {
      if !is_valid_scheme(scheme) {
        return Err(HostQueryError::InvalidHostUrl(format!("invalid scheme in `{input}`")));
      }
      (Some(scheme.to_ascii_lowercase()), rest)
    }
    None => (None, input),
  };

  let authority = match rest.find('/') {
    // A scheme-less value with a path is a path-like value without authority
    Some(_) if scheme.is_none() => {
      return Ok(ParsedHost {
        scheme,
        host: None,
        port: None,
        raw: input.to_string(),
      });
    }
    Some(idx) => &rest[..idx],
    None => rest,
  };

  if authority.is_empty() {
    return Ok(ParsedHost {
      scheme,
      host: None,
      port: None,
      raw: input.to_string(),
    });
  }

  let (host, port) = split_host_port(authority)?;
  Ok(ParsedHost {
    scheme,
    host: Some(host),
    port,
    raw: input.to_string(),
  })
}

/// Scheme = ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
fn is_valid_scheme(scheme: &str) -> bool {
  let mut chars = scheme.chars();
  chars
    .next()
    .map(|c| c.is_ascii_alphabetic())
    .unwrap_or(false)
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
}

/// Split an authority into host and optional explicit port.
/// Accepts bare domains, IPv4/IPv6 literals and bracketed IPv6 with port.
fn split_host_port(authority: &str) -> Result<(String, Option<u16>), HostQueryError> {
  // Bracketed IPv6 literal, optionally followed by a port
  if let Some(rest) = authority.strip_prefix('[') {
    let Some((ip, after)) = rest.split_once(']') else {
      return Err(HostQueryError::InvalidHostUrl(format!("unclosed bracket in `{authority}`")));
    };
    ip.parse::<std::net::Ipv6Addr>()
      .map_err(|_| HostQueryError::InvalidHostUrl(format!("invalid IPv6 literal in `{authority}`")))?;
    let port = match after {
      "" => None,
      p => {
        let p = p
          .strip_prefix(':')
          .ok_or_else(|| HostQueryError::InvalidHostUrl(format!("garbage after bracket in `{authority}`")))?;
        Some(parse_port(p, authority)?)
      }
    };
    return Ok((format!("[{ip}]"), port));
  }

  // Bare IP literal without port; unbracketed IPv6 gets bracketed for the published form
  if authority.parse::<std::net::IpAddr>().is_ok() {
    let host = if authority.contains(':') {
      format!("[{authority}]")
    } else {
      authority.to_string()
    };
    return Ok((host, None));
  }

  match authority.rsplit_once(':') {
    Some((host, port)) => {
      if host.is_empty() || host.contains(':') {
        return Err(HostQueryError::InvalidHostUrl(format!("invalid authority `{authority}`")));
      }
      validate_host(host)?;
      Ok((host.to_string(), Some(parse_port(port, authority)?)))
    }
    None => {
      validate_host(authority)?;
      Ok((authority.to_string(), None))
    }
  }
}

fn parse_port(port: &str, authority: &str) -> Result<u16, HostQueryError> {
  port
    .parse::<u16>()
    .map_err(|_| HostQueryError::InvalidHostUrl(format!("invalid port in `{authority}`")))
}

/// Basic DNS naming rules: alphanumeric characters, dots and hyphens, at most
/// 253 characters, no leading/trailing/consecutive dots
fn validate_host(host: &str) -> Result<(), HostQueryError> {
  let valid = !host.is_empty()
    && host.len() <= 253
    && host.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    && !host.starts_with('.')
    && !host.ends_with('.')
    && !host.contains("..");
  if valid {
    Ok(())
  } else {
    Err(HostQueryError::InvalidHostUrl(format!("invalid host name `{host}`")))
  }
}

/* ---------------------------------------------------------- */
#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::HostQueryConfigBuilder;

  fn config(default_https_scheme: bool, default_upstream: &str) -> HostQueryConfig {
    HostQueryConfigBuilder::default()
      .api_url("http://lookup.example/get-actual-host")
      .default_https_scheme(default_https_scheme)
      .default_upstream(default_upstream)
      .build()
      .unwrap()
  }

  #[test]
  fn test_bare_host_default_https() {
    let target = normalize("upstream.internal", &config(true, "")).unwrap();
    assert_eq!(target.address(), "upstream.internal");
    assert_eq!(target.port(), 443);
    assert!(target.is_tls());
    assert_eq!(target.published_address(), "upstream.internal:443");
  }

  #[test]
  fn test_bare_host_without_default_https() {
    let target = normalize("a.b", &config(false, "")).unwrap();
    assert_eq!(target.port(), 80);
    assert!(!target.is_tls());
    assert_eq!(target.published_address(), "a.b:80");
  }

  #[test]
  fn test_https_scheme_wins_over_flag() {
    for flag in [true, false] {
      let target = normalize("https://a.b", &config(flag, "")).unwrap();
      assert_eq!(target.port(), 443);
      assert!(target.is_tls());
      assert_eq!(target.published_address(), "a.b:443");
    }
  }

  #[test]
  fn test_http_scheme_suppresses_default() {
    let target = normalize("http://a.b", &config(true, "")).unwrap();
    assert_eq!(target.port(), 80);
    assert!(!target.is_tls());
    assert_eq!(target.published_address(), "a.b:80");
  }

  #[test]
  fn test_explicit_port_is_authoritative() {
    let target = normalize("a.b:9000", &config(true, "")).unwrap();
    assert_eq!(target.address(), "a.b");
    assert_eq!(target.port(), 9000);
    assert!(!target.is_tls());
    assert_eq!(target.published_address(), "a.b:9000");

    // explicit 443 implies TLS even under plain http scheme
    let target = normalize("http://a.b:443", &config(false, "")).unwrap();
    assert_eq!(target.port(), 443);
    assert!(target.is_tls());
  }

  #[test]
  fn test_normalize_is_idempotent_with_explicit_port() {
    let cfg = config(true, "");
    for input in ["a.b:9000", "upstream.internal", "https://a.b"] {
      let first = normalize(input, &cfg).unwrap();
      let again = normalize(&format!("{}:{}", first.address(), first.port()), &cfg).unwrap();
      assert_eq!(again.port(), first.port());
      assert_eq!(again.is_tls(), first.is_tls());
    }
  }

  #[test]
  fn test_empty_host_falls_back_to_default_upstream() {
    let target = normalize("", &config(true, "fallback.example")).unwrap();
    assert_eq!(target.address(), "fallback.example");
    assert_eq!(target.published_address(), "fallback.example:443");
  }

  #[test]
  fn test_empty_host_without_default_upstream() {
    // Reference behavior: the empty string normalizes like any other raw value
    let target = normalize("", &config(true, "")).unwrap();
    assert_eq!(target.published_address(), ":443");
    assert!(target.is_tls());

    let target = normalize("", &config(false, "")).unwrap();
    assert_eq!(target.published_address(), "");
    assert_eq!(target.port(), 80);
  }

  #[test]
  fn test_path_like_value_without_authority() {
    let target = normalize("a.b/menu/v2", &config(true, "")).unwrap();
    assert_eq!(target.address(), "a.b/menu/v2");
    assert_eq!(target.published_address(), "a.b/menu/v2:443");

    let target = normalize("a.b/menu/v2", &config(false, "")).unwrap();
    assert_eq!(target.published_address(), "a.b/menu/v2");
    assert_eq!(target.port(), 80);
  }

  #[test]
  fn test_scheme_with_path_keeps_host() {
    let target = normalize("https://a.b/menu/v2", &config(false, "")).unwrap();
    assert_eq!(target.address(), "a.b");
    assert_eq!(target.published_address(), "a.b:443");
  }

  #[test]
  fn test_ipv6_literals() {
    let target = normalize("[2001:db8::1]:8443", &config(true, "")).unwrap();
    assert_eq!(target.address(), "[2001:db8::1]");
    assert_eq!(target.port(), 8443);
    assert_eq!(target.published_address(), "[2001:db8::1]:8443");

    let target = normalize("2001:db8::1", &config(true, "")).unwrap();
    assert_eq!(target.address(), "[2001:db8::1]");
    assert_eq!(target.published_address(), "[2001:db8::1]:443");
  }

  #[test]
  fn test_invalid_values() {
    let cfg = config(true, "");
    assert!(normalize("a.b:port", &cfg).is_err());
    assert!(normalize("a.b:99999", &cfg).is_err());
    assert!(normalize("://a.b", &cfg).is_err());
    assert!(normalize("1http://a.b", &cfg).is_err());
    assert!(normalize("[2001:db8::1", &cfg).is_err());
    assert!(normalize("..a.b", &cfg).is_err());
    assert!(normalize("a..b:80", &cfg).is_err());
  }

  #[test]
  fn test_uppercase_scheme_is_lowercased() {
    let target = normalize("HTTPS://a.b", &config(false, "")).unwrap();
    assert_eq!(target.port(), 443);
    assert!(target.is_tls());
  }
}
