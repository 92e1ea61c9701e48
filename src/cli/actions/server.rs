use crate::api::{self, ServerConfig};
use anyhow::Result;
use secrecy::SecretString;

/// Resolved server arguments, one field per CLI flag.
#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub master_secret: SecretString,
    pub mfa_issuer: String,
    pub session_ttl_seconds: i64,
    pub challenge_ttl_seconds: i64,
    pub scan_interval_seconds: u64,
    pub alert_recipients: Vec<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    api::serve(ServerConfig {
        port: args.port,
        dsn: args.dsn,
        master_secret: args.master_secret,
        mfa_issuer: args.mfa_issuer,
        session_ttl_seconds: args.session_ttl_seconds,
        challenge_ttl_seconds: args.challenge_ttl_seconds,
        scan_interval_seconds: args.scan_interval_seconds,
        alert_recipients: args.alert_recipients,
    })
    .await
}
