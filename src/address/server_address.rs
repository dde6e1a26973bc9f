use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;

use thiserror::Error;

/// Port assumed when an address does not name one.
pub const DEFAULT_PORT: u16 = 25565;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to parse server address {input:?}: {reason}")]
pub struct ParseError {
    pub input: String,
    pub reason: &'static str,
}

impl ParseError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// A host and port as typed by a user or advertised by an SRV record.
///
/// Equality and hashing use the IDN-normalized host, so `müller.de` and
/// `xn--mller-kva.de` name the same server.
#[derive(Debug, Clone)]
pub struct ServerAddress {
    host: String,
    ascii_host: String,
    port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let ascii_host = to_ascii(&host);
        Self {
            host,
            ascii_host,
            port,
        }
    }

    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ParseError::new(text, "address is empty"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(ParseError::new(text, "address contains blank"));
        }

        let (host, port) = split_host_port(trimmed).map_err(|reason| ParseError::new(text, reason))?;
        if host.is_empty() {
            return Err(ParseError::new(text, "host is empty"));
        }

        Ok(Self::new(host, port.unwrap_or(DEFAULT_PORT)))
    }

    /// Host as it was supplied.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Host used for lookups. Empty when IDN normalization failed, which
    /// makes the address resolve to nothing.
    pub fn ascii_host(&self) -> &str {
        &self.ascii_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_default_port(&self) -> bool {
        self.port == DEFAULT_PORT
    }
}

impl PartialEq for ServerAddress {
    fn eq(&self, other: &Self) -> bool {
        self.ascii_host == other.ascii_host && self.port == other.port
    }
}

impl Eq for ServerAddress {}

impl Hash for ServerAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ascii_host.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Parses an SRV port field, falling back to the default port so a broken
/// record never aborts a ping.
pub fn port_or_default(port: &str) -> u16 {
    port.trim().parse().unwrap_or(DEFAULT_PORT)
}

fn to_ascii(host: &str) -> String {
    if host.parse::<IpAddr>().is_ok() {
        return host.to_string();
    }
    idna::domain_to_ascii(host)
        .ok()
        .filter(|ascii| fits_dns(ascii))
        .unwrap_or_default()
}

const MAX_LABEL_LENGTH: usize = 63;
const MAX_NAME_LENGTH: usize = 253;

fn fits_dns(name: &str) -> bool {
    let name = name.strip_suffix('.').unwrap_or(name);
    name.len() <= MAX_NAME_LENGTH && name.split('.').all(|label| label.len() <= MAX_LABEL_LENGTH)
}

fn split_host_port(text: &str) -> Result<(&str, Option<u16>), &'static str> {
    if let Some(rest) = text.strip_prefix('[') {
        let close = rest.find(']').ok_or("missing closing bracket")?;
        let host = &rest[..close];
        let after = &rest[close + 1..];
        if after.is_empty() {
            return Ok((host, None));
        }
        let port = after
            .strip_prefix(':')
            .ok_or("only a port may follow a bracketed host")?;
        return Ok((host, parse_port(port)?));
    }

    match text.split_once(':') {
        // more than one colon: a bare IPv6 literal without a port
        Some((_, port)) if port.contains(':') => Ok((text, None)),
        Some((host, port)) => Ok((host, parse_port(port)?)),
        None => Ok((text, None)),
    }
}

fn parse_port(port: &str) -> Result<Option<u16>, &'static str> {
    if port.is_empty() {
        return Ok(None);
    }
    if !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err("port is not an integer");
    }
    port.parse().map(Some).map_err(|_| "port is out of range")
}
