//! TOTP generation and verification.
//!
//! The engine never persists secrets. Enrollment stages a secret outside the
//! user record and the auth layer commits it only after the user proves
//! possession with a correct code.

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use totp_rs::{Algorithm, Secret, TOTP};

use crate::Result;

const DIGITS: usize = 6;
const STEP_SECONDS: u64 = 30;
/// Accepted clock skew, in 30-second steps, on either side of now.
const SKEW_STEPS: u8 = 1;

/// Time-based one-time-password engine, parameterized only by the issuer
/// label shown in authenticator apps.
#[derive(Clone)]
pub struct MfaEngine {
    issuer: String,
}

impl MfaEngine {
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    /// Generates a fresh base32 secret with a 160-bit seed.
    #[must_use]
    pub fn generate_secret(&self) -> String {
        Secret::generate_secret().to_encoded().to_string()
    }

    /// Builds the `otpauth://` URI a client renders as a QR code.
    ///
    /// # Errors
    /// Returns an error if the secret is not valid base32.
    pub fn provisioning_uri(&self, account_label: &str, secret_base32: &str) -> Result<String> {
        let totp = self
            .build(secret_base32, account_label)
            .context("failed to build provisioning uri")?;
        Ok(totp.get_url())
    }

    /// Checks a submitted code against the secret at the provided instant.
    ///
    /// The current step and one adjacent step on each side are accepted; codes
    /// further out are rejected. A malformed secret never verifies.
    #[must_use]
    pub fn verify(&self, secret_base32: &str, code: &str, now: DateTime<Utc>) -> bool {
        let Ok(totp) = self.build(secret_base32, "user") else {
            return false;
        };
        let timestamp = u64::try_from(now.timestamp()).unwrap_or(0);
        totp.check(code, timestamp)
    }

    fn build(&self, secret_base32: &str, account_label: &str) -> anyhow::Result<TOTP> {
        let secret_bytes = Secret::Encoded(secret_base32.to_string())
            .to_bytes()
            .map_err(|e| anyhow!("Invalid totp secret: {e:?}"))?;
        TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW_STEPS,
            STEP_SECONDS,
            secret_bytes,
            Some(self.issuer.clone()),
            account_label.to_string(),
        )
        .map_err(|e| anyhow!("TOTP init error: {e}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn engine() -> MfaEngine {
        MfaEngine::new("Guardiao")
    }

    fn code_at(secret: &str, at: DateTime<Utc>) -> String {
        let secret_bytes = Secret::Encoded(secret.to_string()).to_bytes().unwrap();
        let totp = TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW_STEPS,
            STEP_SECONDS,
            secret_bytes,
            Some("Guardiao".to_string()),
            "user".to_string(),
        )
        .unwrap();
        totp.generate(u64::try_from(at.timestamp()).unwrap())
    }

    #[test]
    fn test_generated_secret_is_base32_160_bit() {
        let secret = engine().generate_secret();
        let bytes = Secret::Encoded(secret).to_bytes().unwrap();
        assert_eq!(bytes.len(), 20);
    }

    #[test]
    fn test_secrets_are_unique() {
        let engine = engine();
        assert_ne!(engine.generate_secret(), engine.generate_secret());
    }

    #[test]
    fn test_provisioning_uri_carries_issuer_and_account() {
        let engine = engine();
        let secret = engine.generate_secret();
        let uri = engine.provisioning_uri("a@acme.com", &secret).unwrap();
        assert!(uri.starts_with("otpauth://totp/"));
        assert!(uri.contains("Guardiao"));
        assert!(uri.contains("a%40acme.com") || uri.contains("a@acme.com"));
        assert!(uri.contains("secret="));
    }

    #[test]
    fn test_provisioning_uri_rejects_bad_secret() {
        assert!(engine().provisioning_uri("a@acme.com", "not-base32!").is_err());
    }

    #[test]
    fn test_verify_accepts_adjacent_steps() {
        let engine = engine();
        let secret = engine.generate_secret();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 15).unwrap();
        let code = code_at(&secret, now);

        assert!(engine.verify(&secret, &code, now));
        assert!(engine.verify(&secret, &code, now - chrono::Duration::seconds(30)));
        assert!(engine.verify(&secret, &code, now + chrono::Duration::seconds(30)));
    }

    #[test]
    fn test_verify_rejects_three_steps_away() {
        let engine = engine();
        let secret = engine.generate_secret();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 15).unwrap();
        let code = code_at(&secret, now);

        assert!(!engine.verify(&secret, &code, now + chrono::Duration::seconds(90)));
        assert!(!engine.verify(&secret, &code, now - chrono::Duration::seconds(90)));
    }

    #[test]
    fn test_verify_rejects_wrong_code_and_bad_secret() {
        let engine = engine();
        let secret = engine.generate_secret();
        let now = Utc::now();
        assert!(!engine.verify(&secret, "000000", now) || code_at(&secret, now) == "000000");
        assert!(!engine.verify("not-base32!", "123456", now));
    }
}
