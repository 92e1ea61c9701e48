//! Expiry notification delivery abstraction.
//!
//! The scanner hands each newly crossed threshold to a `Notifier`. Delivery
//! failures are logged by the caller and never abort a scan. The default
//! implementation logs instead of sending, which keeps local dev and tests
//! free of mail infrastructure.

use anyhow::Result;
use chrono::NaiveDate;
use tracing::info;

/// Context for one certificate crossing one alert threshold.
#[derive(Clone, Debug)]
pub struct AlertMessage {
    pub company_name: String,
    pub certificate_name: String,
    pub expires_on: NaiveDate,
    pub threshold_days: i32,
}

/// Notification delivery abstraction used by the expiry scanner.
pub trait Notifier: Send + Sync {
    /// Deliver an alert or return an error to leave the alert unnotified.
    fn send(&self, recipients: &[String], subject: &str, message: &AlertMessage) -> Result<()>;
}

/// Local dev notifier that logs the alert instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, recipients: &[String], subject: &str, message: &AlertMessage) -> Result<()> {
        info!(
            recipients = %recipients.join(", "),
            subject = %subject,
            company = %message.company_name,
            certificate = %message.certificate_name,
            expires_on = %message.expires_on,
            threshold_days = message.threshold_days,
            "expiry alert send stub"
        );
        Ok(())
    }
}
