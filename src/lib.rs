//! # Guardiao (Digital Certificate Tracker)
//!
//! `guardiao` tracks the lifecycle of digital certificates (e-CNPJ, e-CPF and
//! similar files) for accounting firms that manage them on behalf of client
//! companies. Certificate access passwords are stored encrypted and every
//! security-relevant action leaves an audit trail.
//!
//! ## Tenant Model (Organizations, Companies, Certificates)
//!
//! Organizations are the primary tenant boundary. Each organization owns client
//! companies, and each company owns its certificates. Every lookup is scoped by
//! the caller's organization; a record belonging to another organization behaves
//! exactly like a record that does not exist.
//!
//! ## Authentication
//!
//! Password verification uses `Argon2id`. Users with TOTP enabled go through a
//! two-phase login: password first, then a short-lived MFA challenge that must
//! be answered with a valid code before a session is issued. Sessions are opaque
//! bearer tokens; only their SHA-256 digest is persisted.
//!
//! ## Authorization
//!
//! Access is controlled by a strictly ordered role ladder
//! (`operator` < `admin` < `master_admin`). A single gate answers every
//! privilege question: a role satisfies a requirement when it is equal to or
//! above the required rung. Cross-tenant access attempts return `404 Not Found`
//! rather than `403 Forbidden` to prevent resource enumeration.
//!
//! ## Expiry Scanning
//!
//! A background worker walks all tracked certificates and records an alert the
//! first time each configured threshold (30, 15, 5 days) is crossed. Alerts are
//! keyed by certificate and threshold, so repeated scans never duplicate them.

pub mod api;
pub mod audit;
pub mod auth;
pub mod certs;
pub mod cli;
pub mod crypto;
pub mod domain;
pub mod mfa;
pub mod notify;
pub mod scanner;
pub mod store;

mod error;

pub use error::{Error, Result};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        // Should be a hex string (full SHA-1 is 40 chars, but could be short)
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
