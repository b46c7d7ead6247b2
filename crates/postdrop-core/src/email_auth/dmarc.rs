//! DMARC (RFC 7489) policy evaluation
//!
//! Combines the SPF and DKIM verdicts with the domain's published policy.
//! A missing, unreadable or malformed policy record uniformly produces a
//! `none` verdict; only the message text distinguishes the cases.

use super::dns::TxtLookup;
use super::{DkimStatus, SpfStatus, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// DMARC verdict status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DmarcStatus {
    /// At least one authentication method is aligned
    Pass,
    /// Alignment failed and the policy demands rejection
    Reject,
    /// Alignment failed and the policy demands quarantine
    Quarantine,
    /// No usable policy, or alignment failed under a `none` policy
    None,
}

impl DmarcStatus {
    /// Convert to header value for Authentication-Results
    pub fn as_header_value(&self) -> &'static str {
        match self {
            DmarcStatus::Pass => "pass",
            DmarcStatus::Reject => "reject",
            DmarcStatus::Quarantine => "quarantine",
            DmarcStatus::None => "none",
        }
    }
}

/// DMARC evaluator
pub struct DmarcChecker<R: TxtLookup> {
    resolver: Arc<R>,
}

impl<R: TxtLookup> DmarcChecker<R> {
    pub fn new(resolver: Arc<R>) -> Self {
        Self { resolver }
    }

    /// Evaluate the domain's DMARC policy against completed SPF and DKIM
    /// verdicts
    pub async fn check(
        &self,
        domain: &str,
        spf: &Verdict<SpfStatus>,
        dkim: &Verdict<DkimStatus>,
    ) -> Verdict<DmarcStatus> {
        let dmarc_name = format!("_dmarc.{}", domain);
        let records = match self.resolver.lookup_txt(&dmarc_name).await {
            Ok(records) => records,
            Err(e) => {
                warn!("DMARC DNS lookup failed for {}: {}", dmarc_name, e);
                return Verdict::for_domain(DmarcStatus::None, "No DMARC record found", domain);
            }
        };

        let Some(record) = records
            .iter()
            .find(|r| r.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("v=DMARC")))
        else {
            return Verdict::for_domain(DmarcStatus::None, "No DMARC record found", domain);
        };

        debug!("Found DMARC record for {}: {}", domain, record);

        let tags = parse_policy_tags(record);
        if !tags
            .get("v")
            .is_some_and(|v| v.eq_ignore_ascii_case("DMARC1"))
        {
            return Verdict::for_domain(DmarcStatus::None, "Invalid DMARC version", domain);
        }
        let Some(policy) = tags.get("p") else {
            return Verdict::for_domain(
                DmarcStatus::None,
                "Missing required policy parameter",
                domain,
            );
        };

        let adkim = tags.get("adkim").map(String::as_str).unwrap_or("r");
        let aspf = tags.get("aspf").map(String::as_str).unwrap_or("r");

        let dkim_aligned = dkim.status == DkimStatus::Pass
            && dkim
                .domain
                .as_deref()
                .is_some_and(|d| is_aligned(d, domain, adkim));
        let spf_aligned = spf.status == SpfStatus::Pass
            && spf
                .domain
                .as_deref()
                .is_some_and(|d| is_aligned(d, domain, aspf));

        if dkim_aligned || spf_aligned {
            return Verdict::for_domain(DmarcStatus::Pass, "DMARC passed", domain);
        }

        match policy.to_lowercase().as_str() {
            "reject" => Verdict::for_domain(
                DmarcStatus::Reject,
                "DMARC failed, message rejected",
                domain,
            ),
            "quarantine" => Verdict::for_domain(
                DmarcStatus::Quarantine,
                "DMARC failed, message quarantined",
                domain,
            ),
            _ => Verdict::for_domain(DmarcStatus::None, "DMARC failed, but policy is none", domain),
        }
    }
}

/// Parse `;`-separated `tag=value` pairs; pairs with an empty tag or an
/// empty value are dropped, so `p=` reads as a missing policy.
fn parse_policy_tags(record: &str) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    for part in record.split(';') {
        let part = part.trim();
        let Some(eq_pos) = part.find('=') else {
            continue;
        };
        let name = part[..eq_pos].trim().to_lowercase();
        let value = part[eq_pos + 1..].trim().to_string();
        if name.is_empty() || value.is_empty() {
            continue;
        }
        tags.insert(name, value);
    }
    tags
}

/// Alignment of an authenticated domain with the policy domain
///
/// Strict mode (`s`) demands equality; relaxed mode (anything else) also
/// accepts the authenticated domain being a subdomain of the policy domain.
fn is_aligned(authenticated: &str, policy_domain: &str, mode: &str) -> bool {
    if authenticated.eq_ignore_ascii_case(policy_domain) {
        return true;
    }
    if mode.eq_ignore_ascii_case("s") {
        return false;
    }
    authenticated
        .to_lowercase()
        .ends_with(&format!(".{}", policy_domain.to_lowercase()))
}
