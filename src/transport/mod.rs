//! HTTP transport layer.
//!
//! Translates inbound requests into Encounter Store and Presence Cache
//! operations and serializes the results. The router lives in [`http`];
//! this module holds listener settings and address parsing.

pub mod http;

pub use http::{build_router, serve};

use std::net::SocketAddr;

use crate::config::HttpSection;
use crate::error::TransportError;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Default maximum request body size (64 KB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Name of the cookie carrying the chat session identity.
pub const SESSION_COOKIE: &str = "ChatUserAuth";

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Address to bind to, e.g. `"0.0.0.0:8080"`.
    pub bind_addr: String,
    /// Maximum allowed request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl HttpConfig {
    /// Builds listener settings from the `http:` section, normalizing the
    /// bind address.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidAddress`] if `bind` is not a socket
    /// address or port.
    pub fn from_section(section: &HttpSection) -> Result<Self> {
        Ok(Self {
            bind_addr: parse_bind_addr(&section.bind)?,
            max_body_bytes: section.max_body_bytes,
        })
    }
}

/// Parses a bind address string into a full `host:port` form.
///
/// Accepts:
/// - `:8080` → `0.0.0.0:8080`
/// - `8080` → `0.0.0.0:8080`
/// - `1.2.3.4:8080` → as-is
///
/// # Errors
///
/// Returns [`TransportError::InvalidAddress`] if the result cannot be
/// parsed as a valid socket address.
pub fn parse_bind_addr(input: &str) -> Result<String> {
    let addr = if input.starts_with(':') {
        format!("0.0.0.0{input}")
    } else if input.parse::<u16>().is_ok() {
        format!("0.0.0.0:{input}")
    } else {
        input.to_string()
    };
    addr.parse::<SocketAddr>()
        .map_err(|e| TransportError::InvalidAddress {
            input: input.to_string(),
            message: e.to_string(),
        })?;
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bind_addr_colon_port() {
        assert_eq!(parse_bind_addr(":8080").unwrap(), "0.0.0.0:8080");
    }

    #[test]
    fn parse_bind_addr_port_only() {
        assert_eq!(parse_bind_addr("8080").unwrap(), "0.0.0.0:8080");
    }

    #[test]
    fn parse_bind_addr_full() {
        assert_eq!(parse_bind_addr("127.0.0.1:3000").unwrap(), "127.0.0.1:3000");
    }

    #[test]
    fn parse_bind_addr_invalid() {
        assert!(matches!(
            parse_bind_addr("not-an-address"),
            Err(TransportError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn from_section_normalizes_bind() {
        let section = HttpSection {
            bind: ":9090".to_string(),
            max_body_bytes: 1024,
        };
        let config = HttpConfig::from_section(&section).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9090");
        assert_eq!(config.max_body_bytes, 1024);
    }
}
