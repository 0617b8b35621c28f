// # Input Validation
//
// Pure checks applied to every caller-supplied value before it reaches the
// binding store or the transaction generator.
//
// - Hostnames are single DNS labels, case-folded to lowercase
// - IP addresses must match the version the caller expects
// - Tokens must be exactly 32 hex characters, so a token can never address
//   anything outside the `tokens` namespace of the store

use std::fmt;
use std::net::IpAddr;

use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{Error, Result};

/// Minimum hostname length
pub const HOSTNAME_MIN_LEN: usize = 2;

/// Maximum hostname length (one DNS label)
pub const HOSTNAME_MAX_LEN: usize = 63;

/// Token length in hex characters (128 bits)
pub const TOKEN_HEX_LEN: usize = 32;

/// A validated, lowercase DNS label
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hostname(String);

impl Hostname {
    /// The hostname as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Hostname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A binding credential: 128 random bits as 32 lowercase hex characters
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Generate a new token from the operating system's CSPRNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_HEX_LEN / 2];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// The token as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix safe to put in logs
    pub fn redacted(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Keep full tokens out of debug output.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({}…)", self.redacted())
    }
}

/// IP protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    /// IPv4
    V4,
    /// IPv6
    V6,
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => f.write_str("4"),
            IpVersion::V6 => f.write_str("6"),
        }
    }
}

/// Validate and normalise a hostname
///
/// The input is lowercased, then must be 2 to 63 characters of `[a-z0-9-]`
/// with an alphanumeric first and last character.
pub fn validate_hostname(raw: &str) -> Result<Hostname> {
    let name = raw.to_ascii_lowercase();

    if name.len() < HOSTNAME_MIN_LEN || name.len() > HOSTNAME_MAX_LEN {
        return Err(Error::invalid_hostname(format!(
            "'{raw}' must be between {HOSTNAME_MIN_LEN} and {HOSTNAME_MAX_LEN} characters"
        )));
    }

    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(Error::invalid_hostname(format!(
            "'{raw}' may only contain letters, digits and hyphens"
        )));
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(Error::invalid_hostname(format!(
            "'{raw}' cannot start or end with a hyphen"
        )));
    }

    Ok(Hostname(name))
}

/// Classify a string as an IPv4 or IPv6 address
pub fn classify_ip(raw: &str) -> Result<(IpAddr, IpVersion)> {
    match raw.parse::<IpAddr>() {
        Ok(ip @ IpAddr::V4(_)) => Ok((ip, IpVersion::V4)),
        Ok(ip @ IpAddr::V6(_)) => Ok((ip, IpVersion::V6)),
        Err(_) => Err(Error::invalid_ip(format!(
            "'{raw}' is neither an IPv4 nor an IPv6 address"
        ))),
    }
}

/// Validate an IP address of an exact version
pub fn validate_ip(raw: &str, expected: IpVersion) -> Result<IpAddr> {
    let (ip, version) = classify_ip(raw)?;
    if version != expected {
        return Err(Error::invalid_ip(format!(
            "'{raw}' is IPv{version}, expected IPv{expected}"
        )));
    }
    Ok(ip)
}

/// Validate a token string
///
/// Accepts either case and returns the lowercase form.
pub fn validate_token_format(raw: &str) -> Result<Token> {
    if raw.len() != TOKEN_HEX_LEN || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidToken);
    }
    Ok(Token(raw.to_ascii_lowercase()))
}
