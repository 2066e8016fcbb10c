//! Forward rule types and parsing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The only scheme a listen endpoint may use.
pub const TCP_SCHEME: &str = "tcp";

/// Host literal meaning "all interfaces".
pub const WILDCARD_HOST: &str = "*";

/// Errors produced while parsing rule endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleParseError {
    /// Listen endpoint is not of the form `scheme://host:port`.
    #[error("listen endpoint '{0}' is not of the form tcp://host:port")]
    MalformedListen(String),

    /// Destination is not of the form `host:port`.
    #[error("destination '{0}' is not of the form host:port")]
    MalformedDestination(String),

    /// Scheme other than `tcp`.
    #[error("unsupported scheme '{0}', only tcp is supported")]
    UnsupportedScheme(String),

    /// Port is not a number in `[1, 65535]`.
    #[error("invalid port '{0}', expected a number between 1 and 65535")]
    InvalidPort(String),

    /// Host part is empty.
    #[error("empty host in '{0}'")]
    EmptyHost(String),
}

/// Host part of a listen endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenHost {
    /// Wildcard: bind every interface.
    Any,
    /// A literal address or a resolvable host name.
    Named(String),
}

impl ListenHost {
    /// Whether this host binds every interface.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Host string handed to the resolver when binding. The wildcard maps to
    /// the IPv4 unspecified address, used when no dual-stack socket is available.
    #[must_use]
    pub fn bind_host(&self) -> &str {
        match self {
            Self::Any => "0.0.0.0",
            Self::Named(host) => host,
        }
    }
}

/// Local endpoint a listener binds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenAddr {
    /// Host to bind.
    pub host: ListenHost,
    /// Port to bind.
    pub port: u16,
}

impl ListenAddr {
    /// Create a listen address on every interface.
    #[must_use]
    pub fn any(port: u16) -> Self {
        Self {
            host: ListenHost::Any,
            port,
        }
    }

    /// Create a listen address on a specific host.
    #[must_use]
    pub fn named(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: ListenHost::Named(host.into()),
            port,
        }
    }

    /// Whether two listen addresses would compete for the same socket.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.port == other.port
            && (self.host == other.host || self.host.is_wildcard() || other.host.is_wildcard())
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            ListenHost::Any => write!(f, "{WILDCARD_HOST}:{}", self.port),
            ListenHost::Named(host) => fmt_host_port(f, host, self.port),
        }
    }
}

impl FromStr for ListenAddr {
    type Err = RuleParseError;

    /// Parse `tcp://host:port`. The scheme is matched case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| RuleParseError::MalformedListen(s.to_string()))?;

        if !scheme.eq_ignore_ascii_case(TCP_SCHEME) {
            return Err(RuleParseError::UnsupportedScheme(scheme.to_lowercase()));
        }

        let (host, port) =
            split_host_port(rest).ok_or_else(|| RuleParseError::MalformedListen(s.to_string()))?;
        let port = parse_port(port)?;

        let host = if host == WILDCARD_HOST {
            ListenHost::Any
        } else if host.is_empty() {
            return Err(RuleParseError::EmptyHost(s.to_string()));
        } else {
            ListenHost::Named(host.to_string())
        };

        Ok(Self { host, port })
    }
}

/// Remote endpoint every session of a rule connects to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    /// Host name or literal address.
    pub host: String,
    /// Port.
    pub port: u16,
}

impl Destination {
    /// Create a destination.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Borrowed `(host, port)` pair usable with `TcpStream::connect`.
    #[must_use]
    pub fn connect_target(&self) -> (&str, u16) {
        (&self.host, self.port)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_host_port(f, &self.host, self.port)
    }
}

impl FromStr for Destination {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) =
            split_host_port(s).ok_or_else(|| RuleParseError::MalformedDestination(s.to_string()))?;
        let port = parse_port(port)?;

        if host.is_empty() {
            return Err(RuleParseError::EmptyHost(s.to_string()));
        }

        Ok(Self::new(host, port))
    }
}

/// One listen endpoint paired with the destination it relays to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForwardRule {
    /// Where to accept clients.
    pub listen: ListenAddr,
    /// Where to relay them.
    pub destination: Destination,
}

impl ForwardRule {
    /// Create a rule from already-parsed parts.
    #[must_use]
    pub fn new(listen: ListenAddr, destination: Destination) -> Self {
        Self {
            listen,
            destination,
        }
    }

    /// Parse a rule from its configuration strings.
    ///
    /// # Errors
    ///
    /// Returns an error if either endpoint is malformed, the scheme is not
    /// `tcp`, or a port is outside `[1, 65535]`.
    pub fn parse(listen: &str, destination: &str) -> Result<Self, RuleParseError> {
        Ok(Self::new(listen.parse()?, destination.parse()?))
    }
}

impl fmt::Display for ForwardRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp://{} => {}", self.listen, self.destination)
    }
}

/// Split `host:port` on the last colon, unwrapping a bracketed IPv6 host.
fn split_host_port(s: &str) -> Option<(&str, &str)> {
    let (host, port) = s.rsplit_once(':')?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    Some((host, port))
}

fn parse_port(port: &str) -> Result<u16, RuleParseError> {
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RuleParseError::InvalidPort(port.to_string()));
    }

    match port.parse::<u16>() {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(RuleParseError::InvalidPort(port.to_string())),
    }
}

fn fmt_host_port(f: &mut fmt::Formatter<'_>, host: &str, port: u16) -> fmt::Result {
    if host.contains(':') {
        write!(f, "[{host}]:{port}")
    } else {
        write!(f, "{host}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wildcard_rule() {
        let rule = ForwardRule::parse("tcp://*:9000", "127.0.0.1:80").unwrap();
        assert_eq!(rule.listen, ListenAddr::any(9000));
        assert_eq!(rule.destination, Destination::new("127.0.0.1", 80));
        assert!(rule.listen.host.is_wildcard());
        assert_eq!(rule.listen.host.bind_host(), "0.0.0.0");
    }

    #[test]
    fn test_parse_named_listen() {
        let listen: ListenAddr = "TCP://localhost:2222".parse().unwrap();
        assert_eq!(listen, ListenAddr::named("localhost", 2222));
        assert_eq!(listen.to_string(), "localhost:2222");
    }

    #[test]
    fn test_parse_ipv6() {
        let listen: ListenAddr = "tcp://[::1]:8080".parse().unwrap();
        assert_eq!(listen.host, ListenHost::Named("::1".to_string()));
        assert_eq!(listen.to_string(), "[::1]:8080");

        let dest: Destination = "[fe80::1]:22".parse().unwrap();
        assert_eq!(dest.host, "fe80::1");
        assert_eq!(dest.port, 22);
    }

    #[test]
    fn test_reject_unsupported_scheme() {
        let err = "udp://*:53".parse::<ListenAddr>().unwrap_err();
        assert_eq!(err, RuleParseError::UnsupportedScheme("udp".to_string()));
    }

    #[test]
    fn test_reject_malformed_listen() {
        assert!(matches!(
            "*:9000".parse::<ListenAddr>(),
            Err(RuleParseError::MalformedListen(_))
        ));
        assert!(matches!(
            "tcp://localhost".parse::<ListenAddr>(),
            Err(RuleParseError::MalformedListen(_))
        ));
        assert!(matches!(
            "tcp://:9000".parse::<ListenAddr>(),
            Err(RuleParseError::EmptyHost(_))
        ));
    }

    #[test]
    fn test_reject_bad_ports() {
        for bad in ["host:0", "host:65536", "host:-1", "host:http", "host:"] {
            assert!(
                matches!(
                    bad.parse::<Destination>(),
                    Err(RuleParseError::InvalidPort(_))
                ),
                "{bad} should be rejected"
            );
        }
        assert_eq!("host:65535".parse::<Destination>().unwrap().port, 65535);
    }

    #[test]
    fn test_reject_malformed_destination() {
        assert!(matches!(
            "example.com".parse::<Destination>(),
            Err(RuleParseError::MalformedDestination(_))
        ));
        assert!(matches!(
            ":80".parse::<Destination>(),
            Err(RuleParseError::EmptyHost(_))
        ));
    }

    #[test]
    fn test_overlaps() {
        let any = ListenAddr::any(9000);
        let local = ListenAddr::named("127.0.0.1", 9000);
        let other_port = ListenAddr::named("127.0.0.1", 9001);

        assert!(any.overlaps(&local));
        assert!(local.overlaps(&local.clone()));
        assert!(!local.overlaps(&other_port));
        assert!(!local.overlaps(&ListenAddr::named("10.0.0.1", 9000)));
    }

    #[test]
    fn test_rule_display() {
        let rule = ForwardRule::parse("tcp://*:9000", "db.internal:5432").unwrap();
        assert_eq!(rule.to_string(), "tcp://*:9000 => db.internal:5432");
    }
}
