//! Authentication pipeline run for each accepted message
//!
//! SPF and DKIM have no data dependency and run concurrently; DMARC is
//! scheduled only once both verdicts exist. Each step is idempotent: a
//! verdict already present on the message is never recomputed.

use super::dkim::{DkimChecker, DkimStatus};
use super::dmarc::{DmarcChecker, DmarcStatus};
use super::dns::TxtLookup;
use super::spf::{SpfChecker, SpfStatus};
use super::Verdict;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// Authentication verdicts accumulated for one message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageVerdicts {
    pub spf: Option<Verdict<SpfStatus>>,
    pub dkim: Option<Verdict<DkimStatus>>,
    pub dmarc: Option<Verdict<DmarcStatus>>,
}

/// Runs the SPF, DKIM and DMARC evaluators over a completed message
pub struct AuthPipeline<R: TxtLookup> {
    spf: SpfChecker<R>,
    dkim: DkimChecker<R>,
    dmarc: DmarcChecker<R>,
}

impl<R: TxtLookup> AuthPipeline<R> {
    pub fn new(resolver: Arc<R>) -> Self {
        Self {
            spf: SpfChecker::new(resolver.clone()),
            dkim: DkimChecker::new(resolver.clone()),
            dmarc: DmarcChecker::new(resolver),
        }
    }

    /// Fill in any verdict still missing from `verdicts`
    pub async fn authenticate(
        &self,
        ip: IpAddr,
        domain: &str,
        raw_message: &str,
        verdicts: &mut MessageVerdicts,
    ) {
        let spf_task = async {
            if verdicts.spf.is_some() {
                debug!("SPF verdict already present, skipping");
                return None;
            }
            Some(self.spf.check(ip, domain).await)
        };
        let dkim_task = async {
            if verdicts.dkim.is_some() {
                debug!("DKIM verdict already present, skipping");
                return None;
            }
            Some(self.dkim.check(raw_message).await)
        };

        let (spf, dkim) = tokio::join!(spf_task, dkim_task);
        if let Some(verdict) = spf {
            info!(
                status = verdict.status.as_header_value(),
                "SPF: {}", verdict.message
            );
            verdicts.spf = Some(verdict);
        }
        if let Some(verdict) = dkim {
            info!(
                status = verdict.status.as_header_value(),
                "DKIM: {}", verdict.message
            );
            verdicts.dkim = Some(verdict);
        }

        if verdicts.dmarc.is_none() {
            if let (Some(spf), Some(dkim)) = (&verdicts.spf, &verdicts.dkim) {
                let verdict = self.dmarc.check(domain, spf, dkim).await;
                info!(
                    status = verdict.status.as_header_value(),
                    "DMARC: {}", verdict.message
                );
                verdicts.dmarc = Some(verdict);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email_auth::testing::StaticDns;
    use pretty_assertions::assert_eq;

    fn pipeline() -> AuthPipeline<StaticDns> {
        let dns = StaticDns::new()
            .with_txt("example.com", &["v=spf1 ip4:192.0.2.1 -all"])
            .with_txt("_dmarc.example.com", &["v=DMARC1; p=reject"]);
        AuthPipeline::new(Arc::new(dns))
    }

    #[tokio::test]
    async fn test_all_three_verdicts_produced() {
        let pipeline = pipeline();
        let mut verdicts = MessageVerdicts::default();
        pipeline
            .authenticate(
                "192.0.2.1".parse().unwrap(),
                "example.com",
                "From: a@example.com\r\n\r\nbody\r\n",
                &mut verdicts,
            )
            .await;

        assert_eq!(verdicts.spf.as_ref().unwrap().status, SpfStatus::Pass);
        assert_eq!(verdicts.dkim.as_ref().unwrap().status, DkimStatus::None);
        // SPF passed and is aligned, so DMARC passes despite the missing
        // signature.
        assert_eq!(verdicts.dmarc.as_ref().unwrap().status, DmarcStatus::Pass);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let pipeline = pipeline();
        let mut verdicts = MessageVerdicts::default();
        let ip = "192.0.2.1".parse().unwrap();
        let raw = "From: a@example.com\r\n\r\nbody\r\n";

        pipeline
            .authenticate(ip, "example.com", raw, &mut verdicts)
            .await;
        let first = verdicts.clone();
        pipeline
            .authenticate(ip, "example.com", raw, &mut verdicts)
            .await;

        assert_eq!(first, verdicts);
    }

    #[tokio::test]
    async fn test_existing_verdict_not_recomputed() {
        let pipeline = pipeline();
        let mut verdicts = MessageVerdicts {
            spf: Some(Verdict::for_domain(SpfStatus::Fail, "cached", "example.com")),
            ..Default::default()
        };
        pipeline
            .authenticate(
                "192.0.2.1".parse().unwrap(),
                "example.com",
                "From: a@example.com\r\n\r\nbody\r\n",
                &mut verdicts,
            )
            .await;

        // The cached SPF fail is kept even though a fresh check would pass.
        assert_eq!(verdicts.spf.as_ref().unwrap().status, SpfStatus::Fail);
        assert_eq!(verdicts.spf.as_ref().unwrap().message, "cached");
        assert_eq!(verdicts.dmarc.as_ref().unwrap().status, DmarcStatus::Reject);
    }
}
