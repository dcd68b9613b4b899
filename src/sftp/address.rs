//! Remote address strings
//!
//! `//user@host[:port]/absolute/path` names a path on a specific host;
//! anything else is a bare path on whichever host is current.

use serde::{Deserialize, Serialize};

use crate::ssh::RemoteIdentity;

/// Identity part of an address; the port stays optional until the
/// registry fills it from host configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressIdentity {
    pub username: String,
    pub hostname: String,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    pub identity: Option<AddressIdentity>,
    /// Absolute remainder, `"."` for the login directory, or the whole
    /// input for bare paths
    pub path: String,
}

/// Split an address into identity and path. Never fails: anything that is
/// not a well-formed remote address is returned as a bare path.
pub fn parse(address: &str) -> ParsedAddress {
    parse_remote(address).unwrap_or_else(|| ParsedAddress {
        identity: None,
        path: address.to_string(),
    })
}

fn parse_remote(address: &str) -> Option<ParsedAddress> {
    let rest = address.strip_prefix("//")?;
    let (authority, path) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };

    let (username, host_port) = authority.rsplit_once('@')?;
    let (hostname, port) = match host_port.rsplit_once(':') {
        Some((host, port)) => (host, Some(port.parse::<u16>().ok().filter(|p| *p != 0)?)),
        None => (host_port, None),
    };

    if username.is_empty() || hostname.is_empty() {
        return None;
    }

    Some(ParsedAddress {
        identity: Some(AddressIdentity {
            username: username.to_string(),
            hostname: hostname.to_string(),
            port,
        }),
        path: if path.is_empty() {
            ".".to_string()
        } else {
            path.to_string()
        },
    })
}

/// Build `//user@host[:port]/path`; port 22 is left out
pub fn format(identity: &RemoteIdentity, path: &str) -> String {
    let mut address = format!("//{}@{}", identity.username(), identity.hostname());
    if !identity.has_default_port() {
        address.push_str(&format!(":{}", identity.port()));
    }
    if !path.starts_with('/') {
        address.push('/');
    }
    address.push_str(path);
    address
}

/// [`format`] with a trailing `/`, for directory labels
pub fn format_root_label(identity: &RemoteIdentity, path: &str) -> String {
    let mut label = format(identity, path);
    if !label.ends_with('/') {
        label.push('/');
    }
    label
}
