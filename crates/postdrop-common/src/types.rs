//! Common types for Postdrop

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Email address split into local part and domain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress {
    pub local: String,
    pub domain: String,
}

impl EmailAddress {
    /// Create a new email address
    pub fn new(local: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            domain: domain.into(),
        }
    }

    /// Parse an email address from a string
    ///
    /// Accepts an optional surrounding angle-bracket pair. The domain is
    /// lowercased; the local part is kept as written.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('<').trim_end_matches('>');
        let at_pos = s.rfind('@')?;
        let (local, domain) = (&s[..at_pos], &s[at_pos + 1..]);
        if local.is_empty() || domain.is_empty() {
            return None;
        }
        Some(Self::new(local, domain.to_lowercase()))
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

/// Completed mail transaction emitted by the SMTP session on end-of-data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedMessage {
    /// Envelope sender as captured from MAIL FROM
    pub sender: String,

    /// Envelope recipients in RCPT TO order
    pub recipients: Vec<String>,

    /// Raw message data, dot-unstuffed, one line per `\n`
    pub raw_data: String,

    /// Address of the connecting client
    pub remote_ip: IpAddr,
}

impl ReceivedMessage {
    /// Domain of the envelope sender, used for SPF and DMARC evaluation
    pub fn sender_domain(&self) -> Option<String> {
        EmailAddress::parse(&self.sender).map(|addr| addr.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_email_address() {
        let addr = EmailAddress::parse("user@example.com").unwrap();
        assert_eq!(addr.local, "user");
        assert_eq!(addr.domain, "example.com");

        let addr = EmailAddress::parse("<User@Example.COM>").unwrap();
        assert_eq!(addr.local, "User");
        assert_eq!(addr.domain, "example.com");

        assert_eq!(EmailAddress::parse("nodomain"), None);
        assert_eq!(EmailAddress::parse("@example.com"), None);
        assert_eq!(EmailAddress::parse("user@"), None);
    }

    #[test]
    fn test_sender_domain() {
        let message = ReceivedMessage {
            sender: "alice@Example.ORG".to_string(),
            recipients: vec!["bob@example.com".to_string()],
            raw_data: String::new(),
            remote_ip: "192.0.2.1".parse().unwrap(),
        };
        assert_eq!(message.sender_domain(), Some("example.org".to_string()));
    }
}
