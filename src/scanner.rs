//! Expiry sweep.
//!
//! For each configured threshold the scanner alerts every certificate whose
//! expiry sits inside that window, deduplicated per (certificate, threshold)
//! pair by the store. Catching a window late still alerts, so a scanner that
//! was down on the boundary day does not silently skip it. Alerts are
//! created first and marked notified only after the notifier accepted the
//! dispatch; a delivery failure never aborts the sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::time::sleep;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{Certificate, Clock, ExpiryAlert};
use crate::notify::{AlertMessage, Notifier};
use crate::store::{CertificateStore, OrganizationStore};
use crate::Result;

pub const DEFAULT_THRESHOLD_DAYS: [i32; 3] = [30, 15, 5];
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct ExpiryScanner {
    certificates: Arc<dyn CertificateStore>,
    orgs: Arc<dyn OrganizationStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    recipients: Vec<String>,
    thresholds: Vec<i32>,
}

impl ExpiryScanner {
    pub fn new(
        certificates: Arc<dyn CertificateStore>,
        orgs: Arc<dyn OrganizationStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            certificates,
            orgs,
            notifier,
            clock,
            recipients: Vec::new(),
            thresholds: DEFAULT_THRESHOLD_DAYS.to_vec(),
        }
    }

    #[must_use]
    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Vec<i32>) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// One sweep over every organization. Returns the number of alerts
    /// created; re-running on the same day returns zero.
    pub async fn scan(&self) -> Result<usize> {
        let now = self.clock.now();
        let today = now.date_naive();
        let mut created = 0;
        for &threshold in &self.thresholds {
            let horizon = today + chrono::Duration::days(i64::from(threshold));
            let certificates = self
                .certificates
                .list_expiring_between(today, horizon)
                .await?;
            for certificate in certificates {
                let alert = ExpiryAlert {
                    id: Uuid::new_v4(),
                    org_id: certificate.org_id,
                    certificate_id: certificate.id,
                    threshold_days: threshold,
                    notified: false,
                    created_at: now,
                };
                if !self.certificates.insert_alert_if_absent(&alert).await? {
                    continue;
                }
                created += 1;
                self.dispatch(&alert, &certificate).await;
            }
        }
        if created > 0 {
            info!(alerts = created, "Expiry scan created new alerts");
        }
        Ok(created)
    }

    async fn dispatch(&self, alert: &ExpiryAlert, certificate: &Certificate) {
        let message = AlertMessage {
            company_name: self.company_name(certificate).await,
            certificate_name: certificate.name.clone(),
            expires_on: certificate.expires_on,
            threshold_days: alert.threshold_days,
        };
        let subject = format!(
            "Certificate expiring within {} days: {}",
            alert.threshold_days, certificate.name
        );
        if let Err(err) = self.notifier.send(&self.recipients, &subject, &message) {
            error!("Failed to dispatch expiry notification: {err}");
            return;
        }
        if let Err(err) = self.certificates.mark_alert_notified(alert.id).await {
            error!("Failed to mark alert notified: {err}");
        }
    }

    async fn company_name(&self, certificate: &Certificate) -> String {
        match self
            .orgs
            .get_company(certificate.org_id, certificate.company_id)
            .await
        {
            Ok(Some(company)) => company.legal_name,
            Ok(None) => "unknown company".to_string(),
            Err(err) => {
                error!("Failed to resolve company for alert: {err}");
                "unknown company".to_string()
            }
        }
    }
}

/// Spawn a background task that sweeps for expiring certificates on a fixed
/// cadence.
pub fn spawn_scan_worker(
    scanner: ExpiryScanner,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    let interval = normalize_interval(interval);
    tokio::spawn(async move {
        loop {
            if let Err(err) = scanner.scan().await {
                error!("Expiry scan failed: {err}");
            }
            sleep(interval).await;
        }
    })
}

fn normalize_interval(interval: Duration) -> Duration {
    if interval.is_zero() {
        DEFAULT_SCAN_INTERVAL
    } else {
        interval
    }
}
