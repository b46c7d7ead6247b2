//! DNS lookup port consumed by the SPF, DKIM and DMARC evaluators

use async_trait::async_trait;
use postdrop_common::config::DnsConfig;
use std::time::Duration;
use tracing::debug;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::TokioAsyncResolver;

/// Failed TXT lookup, surfaced by the evaluators as a temperror-class verdict
#[derive(Debug, thiserror::Error)]
#[error("DNS lookup failed: {0}")]
pub struct DnsError(pub String);

/// TXT record lookup capability
///
/// An `Ok` with an empty list means the name resolved but carries no TXT
/// records; `Err` means the lookup itself could not be completed.
#[async_trait]
pub trait TxtLookup: Send + Sync {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, DnsError>;
}

/// System resolver backed by trust-dns
///
/// Every lookup is bounded by the configured timeout so a slow or
/// unreachable nameserver degrades into a transient verdict instead of
/// stalling a background authentication task.
pub struct DnsClient {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl DnsClient {
    /// Create a resolver using the system default configuration
    pub fn new(config: &DnsConfig) -> Self {
        let resolver =
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        Self {
            resolver,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Create a client around an existing resolver
    pub fn with_resolver(resolver: TokioAsyncResolver, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }
}

#[async_trait]
impl TxtLookup for DnsClient {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, DnsError> {
        let lookup = tokio::time::timeout(self.timeout, self.resolver.txt_lookup(name))
            .await
            .map_err(|_| DnsError(format!("TXT lookup for {} timed out", name)))?;

        match lookup {
            Ok(records) => {
                let texts: Vec<String> = records
                    .iter()
                    .map(|record| {
                        record
                            .txt_data()
                            .iter()
                            .map(|d| String::from_utf8_lossy(d))
                            .collect::<String>()
                    })
                    .collect();
                debug!("TXT lookup for {} returned {} records", name, texts.len());
                Ok(texts)
            }
            Err(e) => {
                if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) {
                    Ok(Vec::new())
                } else {
                    Err(DnsError(e.to_string()))
                }
            }
        }
    }
}
