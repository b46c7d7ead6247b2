//! Email authentication: SPF, DKIM and DMARC evaluation
//!
//! Each evaluator is a short pipeline over the DNS lookup port that always
//! produces a structured [`Verdict`] instead of an error; absence of a
//! record, malformed input and transient DNS trouble are all expected
//! conditions with their own statuses.

pub mod dkim;
pub mod dmarc;
pub mod dns;
pub mod pipeline;
pub mod spf;

pub use dkim::{DkimChecker, DkimStatus};
pub use dmarc::{DmarcChecker, DmarcStatus};
pub use dns::{DnsClient, DnsError, TxtLookup};
pub use pipeline::{AuthPipeline, MessageVerdicts};
pub use spf::{SpfChecker, SpfStatus};

use serde::{Deserialize, Serialize};

/// Outcome of a single authentication check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict<S> {
    /// Check status, specific to the evaluator
    pub status: S,

    /// Human-readable explanation of how the status was reached
    pub message: String,

    /// Domain the verdict applies to, used for DMARC alignment
    pub domain: Option<String>,
}

impl<S> Verdict<S> {
    /// Create a verdict without an associated domain
    pub fn new(status: S, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            domain: None,
        }
    }

    /// Create a verdict tied to a domain
    pub fn for_domain(
        status: S,
        message: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            domain: Some(domain.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::dns::{DnsError, TxtLookup};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Static TXT record set standing in for the system resolver
    #[derive(Default)]
    pub struct StaticDns {
        records: HashMap<String, Vec<String>>,
        failures: Vec<String>,
    }

    impl StaticDns {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_txt(mut self, name: &str, values: &[&str]) -> Self {
            self.records.insert(
                name.to_string(),
                values.iter().map(|v| v.to_string()).collect(),
            );
            self
        }

        pub fn failing(mut self, name: &str) -> Self {
            self.failures.push(name.to_string());
            self
        }
    }

    #[async_trait]
    impl TxtLookup for StaticDns {
        async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, DnsError> {
            if self.failures.iter().any(|f| f == name) {
                return Err(DnsError(format!("simulated failure for {}", name)));
            }
            Ok(self.records.get(name).cloned().unwrap_or_default())
        }
    }
}
