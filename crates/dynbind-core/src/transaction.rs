//! Record update transactions
//!
//! Renders a validated hostname and address into the line-oriented directive
//! script understood by `nsupdate`-style agents:
//!
//! ```text
//! server ns1.example.net
//! zone dyn.example.net
//! update delete myhost.dyn.example.net IN A
//! update add myhost.dyn.example.net 60 IN A 203.0.113.5
//! send
//! ```
//!
//! Inputs are trusted. Validation happens in [`crate::validate`] before a
//! transaction is ever built.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::validate::Hostname;

/// Default TTL for added records, in seconds
pub const DEFAULT_RECORD_TTL: u32 = 60;

/// DNS record type managed by dynbind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
}

impl RecordType {
    /// Record type mnemonic as written in zone files
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a transaction does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOperation {
    /// Replace the A record
    CreateA(Ipv4Addr),
    /// Replace the AAAA record
    CreateAaaa(Ipv6Addr),
    /// Remove both A and AAAA records
    DeleteAll,
}

/// Where transactions are sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTarget {
    /// Authoritative server
    pub server: String,
    /// Zone all hostnames live under
    pub zone: String,
    /// TTL for added records
    pub ttl: u32,
}

impl UpdateTarget {
    /// Create a target with the default TTL
    pub fn new(server: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            zone: zone.into(),
            ttl: DEFAULT_RECORD_TTL,
        }
    }

    /// Set the record TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Fully qualified name for a hostname in this zone
    pub fn fqdn(&self, hostname: &Hostname) -> String {
        format!("{}.{}", hostname, self.zone.trim_end_matches('.'))
    }
}

/// A rendered, single-use update transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionScript {
    lines: Vec<String>,
}

impl TransactionScript {
    /// Directive lines, without terminators
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Script text as fed to the agent, newline terminated
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

impl fmt::Display for TransactionScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Build the transaction for `operation` on `hostname`
pub fn build_transaction(
    operation: RecordOperation,
    hostname: &Hostname,
    target: &UpdateTarget,
) -> TransactionScript {
    let fqdn = target.fqdn(hostname);
    let mut lines = vec![
        format!("server {}", target.server),
        format!("zone {}", target.zone),
    ];

    match operation {
        RecordOperation::CreateA(ip) => {
            push_replace(&mut lines, &fqdn, target.ttl, RecordType::A, &ip.to_string());
        }
        RecordOperation::CreateAaaa(ip) => {
            push_replace(&mut lines, &fqdn, target.ttl, RecordType::Aaaa, &ip.to_string());
        }
        RecordOperation::DeleteAll => {
            for rtype in [RecordType::A, RecordType::Aaaa] {
                lines.push(format!("update delete {fqdn} IN {rtype}"));
            }
        }
    }

    lines.push("send".to_string());
    TransactionScript { lines }
}

fn push_replace(lines: &mut Vec<String>, fqdn: &str, ttl: u32, rtype: RecordType, value: &str) {
    lines.push(format!("update delete {fqdn} IN {rtype}"));
    lines.push(format!("update add {fqdn} {ttl} IN {rtype} {value}"));
}
