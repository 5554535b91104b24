//! Runtime configuration
//!
//! Validated view of the CLI flags. Configuration failures are fatal and
//! reported before the listener starts.

use http::Uri;

use crate::error::{ProxyError, Result};

/// Runtime configuration for one proxy instance.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// TCP port the front server binds.
    pub port: u16,
    /// Upstream base URL.
    pub target: String,
    /// Size of the backend's young generation in bytes; derives the
    /// shedding-threshold band.
    pub ygen: i64,
    /// Emit one CSV diagnostic line per cycle on stdout.
    pub print_gc: bool,
    /// Control endpoint address; the upstream target doubles as the control
    /// endpoint when absent.
    pub gci_target: Option<String>,
    /// URL path appended to the control endpoint for protocol requests.
    pub gci_path: String,
    /// Run as a pure pass-through proxy, with sampling, shedding and
    /// control calls disabled.
    pub disable_gci: bool,
    /// Read/write timeout for the upstream and control clients, in seconds.
    pub client_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            target: "http://127.0.0.1:8080".to_string(),
            ygen: 0,
            print_gc: true,
            gci_target: None,
            gci_path: String::new(),
            disable_gci: false,
            client_timeout_secs: 120,
        }
    }
}

impl ProxyConfig {
    /// Check the flags the engine cannot tolerate being wrong.
    ///
    /// # Errors
    /// Returns [`ProxyError::InvalidConfig`] when `ygen` is not positive,
    /// the timeout is zero, or either URL does not parse as plain HTTP.
    pub fn validate(&self) -> Result<()> {
        if self.ygen <= 0 {
            return Err(ProxyError::InvalidConfig {
                reason: format!("ygen must be a positive number of bytes, got {}", self.ygen),
            });
        }
        if self.client_timeout_secs == 0 {
            return Err(ProxyError::InvalidConfig {
                reason: "client_timeout_secs must be positive".to_string(),
            });
        }
        parse_http_url(&self.target)?;
        parse_http_url(&self.control_endpoint())?;
        Ok(())
    }

    /// Address the front listener binds.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    /// Full URL for control requests: the control address with `gci_path`
    /// appended.
    #[must_use]
    pub fn control_endpoint(&self) -> String {
        let base = self.gci_target.as_deref().unwrap_or(&self.target);
        let base = base.trim_end_matches('/');
        let path = self.gci_path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }
}

fn parse_http_url(raw: &str) -> Result<()> {
    let uri: Uri = raw.parse().map_err(|e| ProxyError::InvalidConfig {
        reason: format!("invalid URL {raw:?}: {e}"),
    })?;
    match uri.scheme_str() {
        Some("http") => Ok(()),
        other => Err(ProxyError::InvalidConfig {
            reason: format!("unsupported scheme {other:?} in {raw:?}; only http is proxied"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ProxyConfig {
        ProxyConfig {
            ygen: 64 * 1024 * 1024,
            ..ProxyConfig::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        valid_config().validate().expect("valid config rejected");
    }

    #[test]
    fn test_zero_ygen_is_fatal() {
        let config = ProxyConfig::default();
        let err = config.validate().err().expect("ygen 0 accepted");
        assert!(matches!(err, ProxyError::InvalidConfig { .. }));
        assert!(err.to_string().contains("ygen"));
    }

    #[test]
    fn test_negative_ygen_is_fatal() {
        let config = ProxyConfig {
            ygen: -1,
            ..ProxyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_target_url_is_fatal() {
        let config = ProxyConfig {
            target: "127.0.0.1:8080".to_string(),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_https_target_is_rejected() {
        let config = ProxyConfig {
            target: "https://127.0.0.1:8080".to_string(),
            ..valid_config()
        };
        let err = config.validate().err().expect("https accepted");
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn test_control_endpoint_defaults_to_target() {
        let config = valid_config();
        assert_eq!(config.control_endpoint(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_control_endpoint_appends_path() {
        let config = ProxyConfig {
            gci_path: "__gci".to_string(),
            ..valid_config()
        };
        assert_eq!(config.control_endpoint(), "http://127.0.0.1:8080/__gci");
    }

    #[test]
    fn test_control_endpoint_prefers_sidecar() {
        let config = ProxyConfig {
            gci_target: Some("http://127.0.0.1:9090/".to_string()),
            gci_path: "/gci".to_string(),
            ..valid_config()
        };
        assert_eq!(config.control_endpoint(), "http://127.0.0.1:9090/gci");
    }
}
