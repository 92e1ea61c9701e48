//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches.get_one::<String>("dsn").cloned();
    let master_secret = matches
        .get_one::<String>("master-secret")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --master-secret")?;
    let mfa_issuer = matches
        .get_one::<String>("mfa-issuer")
        .cloned()
        .unwrap_or_else(|| "Guardiao".to_string());
    let session_ttl_seconds = matches
        .get_one::<i64>("session-ttl-seconds")
        .copied()
        .unwrap_or(43_200);
    let challenge_ttl_seconds = matches
        .get_one::<i64>("mfa-challenge-ttl-seconds")
        .copied()
        .unwrap_or(300);
    let scan_interval_seconds = matches
        .get_one::<u64>("scan-interval-seconds")
        .copied()
        .unwrap_or(3600);
    let alert_recipients = matches
        .get_many::<String>("alert-recipient")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    Ok(Action::Server(Args {
        port,
        dsn,
        master_secret,
        mfa_issuer,
        session_ttl_seconds,
        challenge_ttl_seconds,
        scan_interval_seconds,
        alert_recipients,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    #[test]
    fn test_handler_defaults() {
        temp_env::with_vars(
            [
                ("GUARDIAO_DSN", None::<&str>),
                ("GUARDIAO_PORT", None),
                ("GUARDIAO_MFA_ISSUER", None),
                ("GUARDIAO_SESSION_TTL_SECONDS", None),
                ("GUARDIAO_MFA_CHALLENGE_TTL_SECONDS", None),
                ("GUARDIAO_SCAN_INTERVAL_SECONDS", None),
                ("GUARDIAO_ALERT_RECIPIENT", None),
            ],
            || {
                let matches = commands::new().get_matches_from(vec![
                    "guardiao",
                    "--master-secret",
                    "sixteen-byte-key",
                ]);
                let Ok(Action::Server(args)) = handler(&matches) else {
                    panic!("expected a server action");
                };
                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, None);
                assert_eq!(args.master_secret.expose_secret(), "sixteen-byte-key");
                assert_eq!(args.mfa_issuer, "Guardiao");
                assert_eq!(args.session_ttl_seconds, 43_200);
                assert_eq!(args.challenge_ttl_seconds, 300);
                assert_eq!(args.scan_interval_seconds, 3600);
                assert!(args.alert_recipients.is_empty());
            },
        );
    }

    #[test]
    fn test_handler_full_flags() {
        let matches = commands::new().get_matches_from(vec![
            "guardiao",
            "--master-secret",
            "sixteen-byte-key",
            "--port",
            "9000",
            "--dsn",
            "postgres://localhost/guardiao",
            "--mfa-issuer",
            "Acme Certs",
            "--session-ttl-seconds",
            "600",
            "--mfa-challenge-ttl-seconds",
            "120",
            "--scan-interval-seconds",
            "60",
            "--alert-recipient",
            "one@acme.dev",
            "--alert-recipient",
            "two@acme.dev",
        ]);
        let Ok(Action::Server(args)) = handler(&matches) else {
            panic!("expected a server action");
        };
        assert_eq!(args.port, 9000);
        assert_eq!(args.dsn.as_deref(), Some("postgres://localhost/guardiao"));
        assert_eq!(args.mfa_issuer, "Acme Certs");
        assert_eq!(args.session_ttl_seconds, 600);
        assert_eq!(args.challenge_ttl_seconds, 120);
        assert_eq!(args.scan_interval_seconds, 60);
        assert_eq!(
            args.alert_recipients,
            vec!["one@acme.dev".to_string(), "two@acme.dev".to_string()]
        );
    }
}
