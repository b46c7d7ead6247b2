//! SPF (Sender Policy Framework) evaluation
//!
//! Implements the subset of RFC 7208 used for inbound trust decisions:
//! `ip4`/`ip6` CIDR matching, recursive `include`, and the `all` mechanism
//! with its qualifiers. Evaluation runs as an ordered list of matcher
//! stages; the first decisive stage wins.

use super::dns::TxtLookup;
use super::Verdict;
use ipnet::{Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

/// SPF verdict status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpfStatus {
    /// The sending IP is authorized
    Pass,
    /// The sending IP is explicitly not authorized
    Fail,
    /// The sending IP is probably not authorized (soft fail)
    SoftFail,
    /// The domain owner has no opinion
    Neutral,
    /// No SPF record found
    None,
    /// Temporary error (DNS failure, timeout)
    TempError,
    /// Permanent error (invalid SPF record)
    PermError,
}

impl SpfStatus {
    /// Convert to header value for Authentication-Results
    pub fn as_header_value(&self) -> &'static str {
        match self {
            SpfStatus::Pass => "pass",
            SpfStatus::Fail => "fail",
            SpfStatus::SoftFail => "softfail",
            SpfStatus::Neutral => "neutral",
            SpfStatus::None => "none",
            SpfStatus::TempError => "temperror",
            SpfStatus::PermError => "permerror",
        }
    }
}

/// Maximum `include` recursion depth, per RFC 7208. This cap is also the
/// cycle breaker for mutually-including domains.
const MAX_INCLUDE_DEPTH: usize = 10;

/// SPF evaluator
pub struct SpfChecker<R: TxtLookup> {
    resolver: Arc<R>,
}

impl<R: TxtLookup> SpfChecker<R> {
    pub fn new(resolver: Arc<R>) -> Self {
        Self { resolver }
    }

    /// Evaluate SPF for a connecting IP claiming to send for `domain`
    pub async fn check(&self, ip: IpAddr, domain: &str) -> Verdict<SpfStatus> {
        self.evaluate(ip, domain, 0).await
    }

    fn evaluate<'a>(
        &'a self,
        ip: IpAddr,
        domain: &'a str,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = Verdict<SpfStatus>> + Send + 'a>> {
        Box::pin(async move {
            if depth > MAX_INCLUDE_DEPTH {
                return Verdict::for_domain(SpfStatus::PermError, "Too many DNS lookups", domain);
            }

            let records = match self.resolver.lookup_txt(domain).await {
                Ok(records) => records,
                Err(e) => {
                    warn!("SPF DNS lookup failed for {}: {}", domain, e);
                    return Verdict::for_domain(
                        SpfStatus::TempError,
                        format!("DNS lookup failed for {}", domain),
                        domain,
                    );
                }
            };

            let spf_records: Vec<&String> = records
                .iter()
                .filter(|r| r.starts_with("v=spf1"))
                .collect();

            let record = match spf_records.as_slice() {
                [] => {
                    // A record that opens with bare "spf1" is a malformed
                    // attempt at publishing a policy, not absence of one.
                    if records.iter().any(|r| r.starts_with("spf1")) {
                        return Verdict::for_domain(
                            SpfStatus::PermError,
                            format!("Invalid SPF record for {}", domain),
                            domain,
                        );
                    }
                    return Verdict::for_domain(
                        SpfStatus::None,
                        format!("No SPF record found for {}", domain),
                        domain,
                    );
                }
                [record] => record.as_str(),
                _ => {
                    return Verdict::for_domain(
                        SpfStatus::PermError,
                        format!("Multiple SPF records found for {}", domain),
                        domain,
                    );
                }
            };

            debug!("Found SPF record for {}: {}", domain, record);

            let tokens: Vec<&str> = record.split_whitespace().skip(1).collect();

            if let Some(verdict) = match_ip_mechanisms(ip, domain, &tokens) {
                return verdict;
            }
            if let Some(verdict) = self.match_includes(ip, &tokens, depth).await {
                return verdict;
            }
            if let Some(verdict) = match_all_mechanism(domain, &tokens) {
                return verdict;
            }

            Verdict::for_domain(
                SpfStatus::Neutral,
                format!("No matching rule found for IP {} in {}", ip, domain),
                domain,
            )
        })
    }

    /// Evaluate `include:` mechanisms in textual order
    ///
    /// A permerror from the included domain propagates; a pass authorizes
    /// the IP on behalf of the included domain; anything else falls through
    /// to the next mechanism.
    async fn match_includes(
        &self,
        ip: IpAddr,
        tokens: &[&str],
        depth: usize,
    ) -> Option<Verdict<SpfStatus>> {
        for token in tokens {
            let Some(included) = token.strip_prefix("include:") else {
                continue;
            };
            let result = self.evaluate(ip, included, depth + 1).await;
            match result.status {
                SpfStatus::PermError => return Some(result),
                SpfStatus::Pass => {
                    return Some(Verdict::for_domain(
                        SpfStatus::Pass,
                        format!("IP {} authorized via include:{}", ip, included),
                        included,
                    ));
                }
                _ => continue,
            }
        }
        None
    }
}

/// Evaluate `ip4:`/`ip6:` mechanisms in textual order
fn match_ip_mechanisms(ip: IpAddr, domain: &str, tokens: &[&str]) -> Option<Verdict<SpfStatus>> {
    for token in tokens {
        if let Some(cidr) = token.strip_prefix("ip4:") {
            if ip4_contains(ip, cidr) {
                return Some(Verdict::for_domain(
                    SpfStatus::Pass,
                    format!("IP {} matches ip4:{} in SPF record", ip, cidr),
                    domain,
                ));
            }
        } else if let Some(cidr) = token.strip_prefix("ip6:") {
            if ip6_contains(ip, cidr) {
                return Some(Verdict::for_domain(
                    SpfStatus::Pass,
                    format!("IP {} matches ip6:{} in SPF record", ip, cidr),
                    domain,
                ));
            }
        }
    }
    None
}

/// Evaluate the `all` mechanism with its optional qualifier
fn match_all_mechanism(domain: &str, tokens: &[&str]) -> Option<Verdict<SpfStatus>> {
    for token in tokens {
        let (qualifier, mechanism) = match token.chars().next() {
            Some(c @ ('+' | '-' | '~' | '?')) => (c, &token[1..]),
            _ => ('+', *token),
        };
        if mechanism != "all" {
            continue;
        }
        return Some(match qualifier {
            '-' => Verdict::for_domain(
                SpfStatus::Fail,
                format!("SPF record forbids this IP (-all) for {}", domain),
                domain,
            ),
            '~' => Verdict::for_domain(
                SpfStatus::SoftFail,
                format!("SPF record soft-fails (~all) for {}", domain),
                domain,
            ),
            '?' => Verdict::for_domain(
                SpfStatus::Neutral,
                format!("SPF record is neutral (?all) for {}", domain),
                domain,
            ),
            _ => Verdict::for_domain(
                SpfStatus::Pass,
                format!("SPF record allows all (+all) for {}", domain),
                domain,
            ),
        });
    }
    None
}

/// Bare addresses require an exact textual match; CIDR ranges are parsed
/// and checked by containment. Unparsable input is a non-match, not an
/// error.
fn ip4_contains(ip: IpAddr, cidr: &str) -> bool {
    let IpAddr::V4(ip) = ip else {
        return false;
    };
    if !cidr.contains('/') {
        return ip.to_string() == cidr;
    }
    cidr.parse::<Ipv4Net>()
        .map(|net| net.contains(&ip))
        .unwrap_or(false)
}

fn ip6_contains(ip: IpAddr, cidr: &str) -> bool {
    let IpAddr::V6(ip) = ip else {
        return false;
    };
    if !cidr.contains('/') {
        return ip.to_string().eq_ignore_ascii_case(cidr);
    }
    cidr.parse::<Ipv6Net>()
        .map(|net| net.contains(&ip))
        .unwrap_or(false)
}
