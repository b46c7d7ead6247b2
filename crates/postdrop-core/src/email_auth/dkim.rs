//! DKIM (DomainKeys Identified Mail) signature verification
//!
//! Implements the verification side of RFC 6376 with simple header
//! canonicalization: locate the first DKIM-Signature header, fetch the
//! signer's public key from DNS, rebuild the signed header block and check
//! the signature (rsa-sha256, rsa-sha1 or ed25519-sha256).

use super::dns::TxtLookup;
use super::Verdict;
use anyhow::{anyhow, Context};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::{Signature as RsaSignature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// DKIM verdict status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DkimStatus {
    /// Signature is valid
    Pass,
    /// Signature verification failed
    Fail,
    /// No signature present
    None,
    /// Temporary error (DNS failure, timeout)
    TempError,
    /// Permanent error (malformed signature or key record)
    PermError,
    /// Policy decision (algorithm not accepted)
    Policy,
    /// Signature present but not interpretable
    Neutral,
}

impl DkimStatus {
    /// Convert to header value for Authentication-Results
    pub fn as_header_value(&self) -> &'static str {
        match self {
            DkimStatus::Pass => "pass",
            DkimStatus::Fail => "fail",
            DkimStatus::None => "none",
            DkimStatus::TempError => "temperror",
            DkimStatus::PermError => "permerror",
            DkimStatus::Policy => "policy",
            DkimStatus::Neutral => "neutral",
        }
    }
}

/// Signature algorithms accepted from the `a=` tag
#[derive(Debug, Clone, Copy, PartialEq)]
enum DkimAlgorithm {
    RsaSha256,
    RsaSha1,
    Ed25519Sha256,
}

const REQUIRED_TAGS: [&str; 6] = ["v", "a", "d", "s", "bh", "b"];

/// DKIM evaluator
pub struct DkimChecker<R: TxtLookup> {
    resolver: Arc<R>,
}

impl<R: TxtLookup> DkimChecker<R> {
    pub fn new(resolver: Arc<R>) -> Self {
        Self { resolver }
    }

    /// Verify the first DKIM signature of a raw message
    ///
    /// Never fails: faults the pipeline does not account for are downgraded
    /// to a permerror verdict so attacker-supplied input cannot crash the
    /// authentication path.
    pub async fn check(&self, raw_message: &str) -> Verdict<DkimStatus> {
        match self.run(raw_message).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("DKIM evaluation aborted: {:#}", e);
                Verdict::new(
                    DkimStatus::PermError,
                    format!("Unexpected DKIM processing error: {}", e),
                )
            }
        }
    }

    async fn run(&self, raw_message: &str) -> anyhow::Result<Verdict<DkimStatus>> {
        let headers = extract_headers(raw_message);

        let Some(signature_header) = headers.iter().find(|h| is_dkim_signature(h)) else {
            return Ok(Verdict::new(
                DkimStatus::None,
                "DKIM-Signature header not found",
            ));
        };

        let value = signature_header.splitn(2, ':').nth(1).unwrap_or("");
        let tags = parse_tags(value);
        if tags.is_empty() {
            return Ok(Verdict::new(
                DkimStatus::Neutral,
                "Unable to parse DKIM-Signature header",
            ));
        }

        for required in REQUIRED_TAGS {
            if !tags.contains_key(required) {
                return Ok(Verdict {
                    status: DkimStatus::PermError,
                    message: format!("Missing required DKIM parameter: {}", required),
                    domain: tags.get("d").cloned(),
                });
            }
        }

        // All required tags verified present above.
        let domain = tags["d"].clone();
        let selector = &tags["s"];

        let version = &tags["v"];
        if !(version.eq_ignore_ascii_case("1") || version.eq_ignore_ascii_case("DKIM1")) {
            return Ok(Verdict::for_domain(
                DkimStatus::PermError,
                "Invalid DKIM version",
                &domain,
            ));
        }

        let dns_name = format!("{}._domainkey.{}", selector, domain);
        let records = match self.resolver.lookup_txt(&dns_name).await {
            Ok(records) => records,
            Err(e) => {
                warn!("DKIM DNS lookup failed for {}: {}", dns_name, e);
                return Ok(Verdict::for_domain(
                    DkimStatus::TempError,
                    format!("DNS lookup failed for {}", dns_name),
                    &domain,
                ));
            }
        };
        if records.is_empty() {
            return Ok(Verdict::for_domain(
                DkimStatus::PermError,
                format!("No DKIM record found for {}", dns_name),
                &domain,
            ));
        }

        let Some(key_record) = records
            .iter()
            .find(|r| r.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("v=DKIM1")))
        else {
            return Ok(Verdict::for_domain(
                DkimStatus::PermError,
                "Invalid or missing DKIM TXT record",
                &domain,
            ));
        };

        let key_tags = parse_tags(key_record);
        if !key_tags
            .get("v")
            .is_some_and(|v| v.eq_ignore_ascii_case("DKIM1"))
        {
            return Ok(Verdict::for_domain(
                DkimStatus::PermError,
                "DNS DKIM record missing v=DKIM1",
                &domain,
            ));
        }
        let public_key_b64 = match key_tags.get("p") {
            Some(p) if !p.is_empty() => p,
            _ => {
                return Ok(Verdict::for_domain(
                    DkimStatus::PermError,
                    "Public key (p=) missing or empty",
                    &domain,
                ));
            }
        };

        let algorithm_tag = tags["a"].to_lowercase();
        let algorithm = match algorithm_tag.as_str() {
            "rsa-sha256" => DkimAlgorithm::RsaSha256,
            "rsa-sha1" => DkimAlgorithm::RsaSha1,
            "ed25519-sha256" => DkimAlgorithm::Ed25519Sha256,
            other => {
                return Ok(Verdict::for_domain(
                    DkimStatus::Policy,
                    format!("Unsupported algorithm: {}", other),
                    &domain,
                ));
            }
        };

        // h= is optional; without it nothing is canonicalized and the
        // signature cannot match.
        let h_list = tags.get("h").map(String::as_str).unwrap_or("");
        let canonicalized = canonicalize_headers(&headers, h_list);
        debug!(
            "DKIM canonicalized {} bytes of headers for domain {}",
            canonicalized.len(),
            domain
        );

        let b_value: String = tags["b"].chars().filter(|c| !c.is_whitespace()).collect();
        let signature_bytes = match BASE64.decode(b_value.as_bytes()) {
            Ok(bytes) => bytes,
            Err(_) => {
                return Ok(Verdict::for_domain(
                    DkimStatus::PermError,
                    "Invalid base64 in b=",
                    &domain,
                ));
            }
        };

        match algorithm {
            DkimAlgorithm::Ed25519Sha256 => Ok(verify_ed25519(
                public_key_b64,
                &signature_bytes,
                canonicalized.as_bytes(),
                &domain,
            )?),
            DkimAlgorithm::RsaSha256 | DkimAlgorithm::RsaSha1 => Ok(verify_rsa(
                algorithm,
                public_key_b64,
                &signature_bytes,
                canonicalized.as_bytes(),
                &domain,
            )),
        }
    }
}

/// Header lines of the raw message, unfolded, in wire order
fn extract_headers(raw_message: &str) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for line in raw_message.lines() {
        if line.trim().is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = headers.last_mut() {
                last.push(' ');
                last.push_str(line.trim());
            }
        } else {
            headers.push(line.to_string());
        }
    }
    headers
}

fn is_dkim_signature(line: &str) -> bool {
    line.get(..15)
        .is_some_and(|p| p.eq_ignore_ascii_case("dkim-signature:"))
}

/// Parse `;`-separated `tag=value` pairs, keys lowercased
fn parse_tags(value: &str) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    for part in value.split(';') {
        let part = part.trim();
        let Some(eq_pos) = part.find('=') else {
            continue;
        };
        let name = part[..eq_pos].trim().to_lowercase();
        if name.is_empty() {
            continue;
        }
        tags.insert(name, part[eq_pos + 1..].trim().to_string());
    }
    tags
}

/// Simple canonicalization over the `h=` list: each named header is taken
/// verbatim from the first matching line (never the DKIM-Signature header
/// itself), right-trimmed and terminated with CRLF.
fn canonicalize_headers(headers: &[String], h_list: &str) -> String {
    let mut out = String::new();
    for name in h_list.split(':') {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let needle = format!("{}:", name);
        let found = headers.iter().find(|line| {
            !is_dkim_signature(line)
                && line
                    .get(..needle.len())
                    .is_some_and(|p| p.eq_ignore_ascii_case(&needle))
        });
        if let Some(line) = found {
            out.push_str(line.trim_end());
            out.push_str("\r\n");
        }
    }
    out
}

fn verify_ed25519(
    public_key_b64: &str,
    signature: &[u8],
    data: &[u8],
    domain: &str,
) -> anyhow::Result<Verdict<DkimStatus>> {
    let key_bytes = BASE64
        .decode(public_key_b64.trim())
        .context("invalid base64 in DKIM public key")?;
    let key_bytes: [u8; 32] = key_bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow!("Ed25519 public key must be 32 bytes"))?;
    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)
        .context("invalid Ed25519 public key")?;

    let signature: [u8; 64] = signature
        .try_into()
        .map_err(|_| anyhow!("Ed25519 signature must be 64 bytes"))?;
    let signature = ed25519_dalek::Signature::from_bytes(&signature);

    Ok(match verifying_key.verify(data, &signature) {
        Ok(()) => Verdict::for_domain(DkimStatus::Pass, "Valid Ed25519 DKIM signature", domain),
        Err(_) => Verdict::for_domain(DkimStatus::Fail, "Invalid Ed25519 DKIM signature", domain),
    })
}

fn verify_rsa(
    algorithm: DkimAlgorithm,
    public_key_b64: &str,
    signature: &[u8],
    data: &[u8],
    domain: &str,
) -> Verdict<DkimStatus> {
    let der = match BASE64.decode(public_key_b64.trim()) {
        Ok(der) => der,
        Err(e) => {
            debug!("DKIM public key is not valid base64: {}", e);
            return Verdict::for_domain(DkimStatus::Fail, "Invalid DKIM signature", domain);
        }
    };

    // Keys are published either as SubjectPublicKeyInfo or bare PKCS#1.
    let public_key = match RsaPublicKey::from_public_key_der(&der)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(&der))
    {
        Ok(key) => key,
        Err(e) => {
            debug!("Failed to parse DKIM RSA public key: {}", e);
            return Verdict::for_domain(DkimStatus::Fail, "Invalid DKIM signature", domain);
        }
    };

    let rsa_signature = match RsaSignature::try_from(signature) {
        Ok(sig) => sig,
        Err(_) => {
            return Verdict::for_domain(
                DkimStatus::PermError,
                "Malformed/invalid signature or unsupported key operation",
                domain,
            );
        }
    };

    let result = match algorithm {
        DkimAlgorithm::RsaSha1 => {
            VerifyingKey::<Sha1>::new(public_key).verify(data, &rsa_signature)
        }
        _ => VerifyingKey::<Sha256>::new(public_key).verify(data, &rsa_signature),
    };

    match result {
        Ok(()) => Verdict::for_domain(DkimStatus::Pass, "Valid DKIM signature", domain),
        Err(_) => Verdict::for_domain(DkimStatus::Fail, "Invalid DKIM signature", domain),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email_auth::testing::StaticDns;
    use pretty_assertions::assert_eq;
    use rsa::pkcs8::EncodePublicKey;
    use rsa::signature::{SignatureEncoding, Signer};

    fn checker(dns: StaticDns) -> DkimChecker<StaticDns> {
        DkimChecker::new(Arc::new(dns))
    }

    fn message_with_signature(signature_value: &str) -> String {
        format!(
            "From: alice@example.com\r\nSubject: Hello\r\nDKIM-Signature: {}\r\n\r\nbody\r\n",
            signature_value
        )
    }

    #[tokio::test]
    async fn test_missing_signature_header_is_none() {
        let checker = checker(StaticDns::new());
        let verdict = checker
            .check("From: alice@example.com\r\n\r\nbody\r\n")
            .await;
        assert_eq!(verdict.status, DkimStatus::None);
        assert_eq!(verdict.message, "DKIM-Signature header not found");
    }

    #[tokio::test]
    async fn test_unparsable_signature_is_neutral() {
        let checker = checker(StaticDns::new());
        let verdict = checker.check(&message_with_signature(";;;")).await;
        assert_eq!(verdict.status, DkimStatus::Neutral);
        assert_eq!(verdict.message, "Unable to parse DKIM-Signature header");
    }

    #[tokio::test]
    async fn test_missing_required_tag() {
        let checker = checker(StaticDns::new());
        let verdict = checker
            .check(&message_with_signature(
                "v=1; a=rsa-sha256; d=example.com; s=sel; h=from; b=Zm9v",
            ))
            .await;
        assert_eq!(verdict.status, DkimStatus::PermError);
        assert_eq!(verdict.message, "Missing required DKIM parameter: bh");
        assert_eq!(verdict.domain.as_deref(), Some("example.com"));
    }

    #[tokio::test]
    async fn test_invalid_version() {
        let checker = checker(StaticDns::new());
        let verdict = checker
            .check(&message_with_signature(
                "v=2; a=rsa-sha256; d=example.com; s=sel; h=from; bh=eA==; b=Zm9v",
            ))
            .await;
        assert_eq!(verdict.status, DkimStatus::PermError);
        assert_eq!(verdict.message, "Invalid DKIM version");
    }

    #[tokio::test]
    async fn test_dns_failure_is_temperror() {
        let checker = checker(StaticDns::new().failing("sel._domainkey.example.com"));
        let verdict = checker
            .check(&message_with_signature(
                "v=1; a=rsa-sha256; d=example.com; s=sel; h=from; bh=eA==; b=Zm9v",
            ))
            .await;
        assert_eq!(verdict.status, DkimStatus::TempError);
        assert_eq!(
            verdict.message,
            "DNS lookup failed for sel._domainkey.example.com"
        );
    }

    #[tokio::test]
    async fn test_no_key_record_is_permerror() {
        let checker = checker(StaticDns::new());
        let verdict = checker
            .check(&message_with_signature(
                "v=1; a=rsa-sha256; d=example.com; s=sel; h=from; bh=eA==; b=Zm9v",
            ))
            .await;
        assert_eq!(verdict.status, DkimStatus::PermError);
        assert_eq!(
            verdict.message,
            "No DKIM record found for sel._domainkey.example.com"
        );
    }

    #[tokio::test]
    async fn test_key_record_without_dkim1_prefix() {
        let checker = checker(
            StaticDns::new().with_txt("sel._domainkey.example.com", &["k=rsa; p=Zm9v"]),
        );
        let verdict = checker
            .check(&message_with_signature(
                "v=1; a=rsa-sha256; d=example.com; s=sel; h=from; bh=eA==; b=Zm9v",
            ))
            .await;
        assert_eq!(verdict.status, DkimStatus::PermError);
        assert_eq!(verdict.message, "Invalid or missing DKIM TXT record");
    }

    #[tokio::test]
    async fn test_key_record_with_empty_public_key() {
        let checker = checker(
            StaticDns::new().with_txt("sel._domainkey.example.com", &["v=DKIM1; k=rsa; p="]),
        );
        let verdict = checker
            .check(&message_with_signature(
                "v=1; a=rsa-sha256; d=example.com; s=sel; h=from; bh=eA==; b=Zm9v",
            ))
            .await;
        assert_eq!(verdict.status, DkimStatus::PermError);
        assert_eq!(verdict.message, "Public key (p=) missing or empty");
    }

    #[tokio::test]
    async fn test_unsupported_algorithm_is_policy() {
        let checker = checker(
            StaticDns::new().with_txt("sel._domainkey.example.com", &["v=DKIM1; p=Zm9v"]),
        );
        let verdict = checker
            .check(&message_with_signature(
                "v=1; a=rsa-md5; d=example.com; s=sel; h=from; bh=eA==; b=Zm9v",
            ))
            .await;
        assert_eq!(verdict.status, DkimStatus::Policy);
        assert_eq!(verdict.message, "Unsupported algorithm: rsa-md5");
    }

    #[tokio::test]
    async fn test_invalid_base64_signature() {
        let checker = checker(
            StaticDns::new().with_txt("sel._domainkey.example.com", &["v=DKIM1; p=Zm9v"]),
        );
        let verdict = checker
            .check(&message_with_signature(
                "v=1; a=rsa-sha256; d=example.com; s=sel; h=from; bh=eA==; b=!!!!",
            ))
            .await;
        assert_eq!(verdict.status, DkimStatus::PermError);
        assert_eq!(verdict.message, "Invalid base64 in b=");
    }

    #[tokio::test]
    async fn test_rsa_sha256_signature_verifies() {
        let mut rng = rand::thread_rng();
        let private_key = rsa::RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(private_key.clone());

        let canonicalized = "From: alice@example.com\r\nSubject: Hello\r\n";
        let signature = signing_key.sign(canonicalized.as_bytes());
        let b = BASE64.encode(signature.to_bytes());

        let public_der = private_key.to_public_key().to_public_key_der().unwrap();
        let key_record = format!("v=DKIM1; k=rsa; p={}", BASE64.encode(public_der.as_bytes()));

        let checker = checker(
            StaticDns::new().with_txt("sel._domainkey.example.com", &[key_record.as_str()]),
        );
        let verdict = checker
            .check(&message_with_signature(&format!(
                "v=1; a=rsa-sha256; d=example.com; s=sel; h=from:subject; bh=ZHVtbXk=; b={}",
                b
            )))
            .await;
        assert_eq!(verdict.status, DkimStatus::Pass);
        assert_eq!(verdict.message, "Valid DKIM signature");
        assert_eq!(verdict.domain.as_deref(), Some("example.com"));
    }

    #[tokio::test]
    async fn test_rsa_signature_over_tampered_header_fails() {
        let mut rng = rand::thread_rng();
        let private_key = rsa::RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(private_key.clone());

        let signature = signing_key.sign(b"From: alice@example.com\r\nSubject: Hello\r\n");
        let b = BASE64.encode(signature.to_bytes());

        let public_der = private_key.to_public_key().to_public_key_der().unwrap();
        let key_record = format!("v=DKIM1; k=rsa; p={}", BASE64.encode(public_der.as_bytes()));

        let checker = checker(
            StaticDns::new().with_txt("sel._domainkey.example.com", &[key_record.as_str()]),
        );
        let message = format!(
            "From: alice@example.com\r\nSubject: Tampered\r\nDKIM-Signature: v=1; a=rsa-sha256; d=example.com; s=sel; h=from:subject; bh=ZHVtbXk=; b={}\r\n\r\nbody\r\n",
            b
        );
        let verdict = checker.check(&message).await;
        assert_eq!(verdict.status, DkimStatus::Fail);
        assert_eq!(verdict.message, "Invalid DKIM signature");
    }

    #[tokio::test]
    async fn test_rsa_sha1_signature_verifies() {
        let mut rng = rand::thread_rng();
        let private_key = rsa::RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let signing_key = rsa::pkcs1v15::SigningKey::<Sha1>::new(private_key.clone());

        let canonicalized = "From: alice@example.com\r\n";
        let signature = signing_key.sign(canonicalized.as_bytes());
        let b = BASE64.encode(signature.to_bytes());

        let public_der = private_key.to_public_key().to_public_key_der().unwrap();
        let key_record = format!("v=DKIM1; k=rsa; p={}", BASE64.encode(public_der.as_bytes()));

        let checker = checker(
            StaticDns::new().with_txt("sel._domainkey.example.com", &[key_record.as_str()]),
        );
        let verdict = checker
            .check(&message_with_signature(&format!(
                "v=1; a=rsa-sha1; d=example.com; s=sel; h=from; bh=ZHVtbXk=; b={}",
                b
            )))
            .await;
        assert_eq!(verdict.status, DkimStatus::Pass);
    }

    #[tokio::test]
    async fn test_unparsable_rsa_key_fails() {
        let checker = checker(
            StaticDns::new()
                .with_txt("sel._domainkey.example.com", &["v=DKIM1; k=rsa; p=Zm9vYmFy"]),
        );
        let verdict = checker
            .check(&message_with_signature(
                "v=1; a=rsa-sha256; d=example.com; s=sel; h=from; bh=eA==; b=Zm9vYmFy",
            ))
            .await;
        assert_eq!(verdict.status, DkimStatus::Fail);
        assert_eq!(verdict.message, "Invalid DKIM signature");
    }

    #[tokio::test]
    async fn test_ed25519_signature_verifies() {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]);
        let canonicalized = "From: alice@example.com\r\nSubject: Hello\r\n";
        let signature: ed25519_dalek::Signature = signing_key.sign(canonicalized.as_bytes());
        let b = BASE64.encode(signature.to_bytes());
        let key_record = format!(
            "v=DKIM1; k=ed25519; p={}",
            BASE64.encode(signing_key.verifying_key().to_bytes())
        );

        let checker = checker(
            StaticDns::new().with_txt("sel._domainkey.example.com", &[key_record.as_str()]),
        );
        let verdict = checker
            .check(&message_with_signature(&format!(
                "v=1; a=ed25519-sha256; d=example.com; s=sel; h=from:subject; bh=ZHVtbXk=; b={}",
                b
            )))
            .await;
        assert_eq!(verdict.status, DkimStatus::Pass);
        assert_eq!(verdict.message, "Valid Ed25519 DKIM signature");
    }

    #[tokio::test]
    async fn test_ed25519_wrong_signer_fails() {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]);
        let other_key = ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]);
        let signature: ed25519_dalek::Signature =
            signing_key.sign(b"From: alice@example.com\r\n");
        let b = BASE64.encode(signature.to_bytes());
        let key_record = format!(
            "v=DKIM1; k=ed25519; p={}",
            BASE64.encode(other_key.verifying_key().to_bytes())
        );

        let checker = checker(
            StaticDns::new().with_txt("sel._domainkey.example.com", &[key_record.as_str()]),
        );
        let verdict = checker
            .check(&message_with_signature(&format!(
                "v=1; a=ed25519-sha256; d=example.com; s=sel; h=from; bh=ZHVtbXk=; b={}",
                b
            )))
            .await;
        assert_eq!(verdict.status, DkimStatus::Fail);
        assert_eq!(verdict.message, "Invalid Ed25519 DKIM signature");
    }

    #[tokio::test]
    async fn test_ed25519_bad_key_length_is_unexpected_error() {
        let key_record = format!("v=DKIM1; k=ed25519; p={}", BASE64.encode([1u8; 10]));
        let checker = checker(
            StaticDns::new().with_txt("sel._domainkey.example.com", &[key_record.as_str()]),
        );
        let verdict = checker
            .check(&message_with_signature(
                "v=1; a=ed25519-sha256; d=example.com; s=sel; h=from; bh=eA==; b=Zm9vYmFy",
            ))
            .await;
        assert_eq!(verdict.status, DkimStatus::PermError);
        assert!(verdict
            .message
            .starts_with("Unexpected DKIM processing error:"));
    }

    #[test]
    fn test_extract_headers_unfolds_continuations() {
        let headers = extract_headers(
            "Subject: a very\r\n long subject\r\nFrom: alice@example.com\r\n\r\nbody",
        );
        assert_eq!(
            headers,
            vec![
                "Subject: a very long subject".to_string(),
                "From: alice@example.com".to_string(),
            ]
        );
    }

    #[test]
    fn test_canonicalize_skips_dkim_signature_header() {
        let headers = vec![
            "DKIM-Signature: v=1; b=abc".to_string(),
            "From: alice@example.com".to_string(),
            "To: bob@example.com".to_string(),
        ];
        let canonical = canonicalize_headers(&headers, "from:to");
        assert_eq!(
            canonical,
            "From: alice@example.com\r\nTo: bob@example.com\r\n"
        );
    }

    #[test]
    fn test_parse_tags_keeps_base64_padding() {
        let tags = parse_tags("v=1; b=AbCd==; d=example.com");
        assert_eq!(tags.get("b"), Some(&"AbCd==".to_string()));
        assert_eq!(tags.get("d"), Some(&"example.com".to_string()));
    }
}
