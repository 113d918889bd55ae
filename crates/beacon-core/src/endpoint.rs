//! Report endpoint URL
//!
//! Only the pieces the transports need are kept: scheme, host, port and the
//! URL they put on the wire, normalized without its fragment. Userinfo is
//! rejected since credentials in URLs would end up in the console log.

use alloc::string::{String, ToString};
use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointError {
    #[error("scheme must be http or https")]
    UnsupportedScheme,
    #[error("host is missing")]
    MissingHost,
    #[error("port is not a number between 1 and 65535")]
    InvalidPort,
    #[error("credentials in the URL are not supported")]
    UserInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    Http,
    Https,
}

impl Scheme {
    const fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// A validated `http`/`https` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    /// `scheme://authority/path?query`, fragment dropped.
    url: String,
    scheme: Scheme,
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn parse(url: &str) -> Result<Self, EndpointError> {
        let url = url.trim();
        let (scheme, rest) = split_scheme(url)?;

        // Fragments never go on the wire.
        let rest = rest.split('#').next().unwrap_or_default();

        let (authority, target) = match rest.find(['/', '?']) {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };
        // The request target always starts with `/`.
        let root = if target.starts_with('/') { "" } else { "/" };

        if authority.contains('@') {
            return Err(EndpointError::UserInfo);
        }

        let (host, port) = split_authority(authority)?;
        if host.is_empty() {
            return Err(EndpointError::MissingHost);
        }

        Ok(Self {
            url: alloc::format!("{}://{}{}{}", scheme.as_str(), authority, root, target),
            scheme,
            host: host.to_string(),
            port: port.unwrap_or(scheme.default_port()),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == Scheme::Https
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl TryFrom<String> for Endpoint {
    type Error = EndpointError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Endpoint> for String {
    fn from(value: Endpoint) -> Self {
        value.url
    }
}

fn split_scheme(url: &str) -> Result<(Scheme, &str), EndpointError> {
    for (prefix, scheme) in [("https://", Scheme::Https), ("http://", Scheme::Http)] {
        if let Some(head) = url.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                return Ok((scheme, &url[prefix.len()..]));
            }
        }
    }
    Err(EndpointError::UnsupportedScheme)
}

fn split_authority(authority: &str) -> Result<(&str, Option<u16>), EndpointError> {
    // Bracketed IPv6 literal: `[::1]:8443`
    if let Some(stripped) = authority.strip_prefix('[') {
        let end = stripped.find(']').ok_or(EndpointError::MissingHost)?;
        let host = &stripped[..end];
        let tail = &stripped[end + 1..];
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host, Some(parse_port(port)?))),
            None if tail.is_empty() => Ok((host, None)),
            None => Err(EndpointError::InvalidPort),
        };
    }

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (host, Some(parse_port(port)?)),
        None => (authority, None),
    };
    // IPv6 literals must be bracketed.
    if host.contains(':') {
        return Err(EndpointError::MissingHost);
    }
    Ok((host, port))
}

fn parse_port(port: &str) -> Result<u16, EndpointError> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(EndpointError::InvalidPort),
        Ok(port) => Ok(port),
    }
}
