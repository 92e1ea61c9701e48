//! Expiry scan scenarios, from upload through alert and notification.

mod common;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;

use common::{
    date, harness, register_acme, register_org, seed_company, upload_certificate,
    RecordingNotifier,
};

#[tokio::test]
async fn scan_waits_for_the_window_then_alerts_exactly_once() -> Result<()> {
    let harness = harness()?;
    let (_, admin) = register_acme(&harness.auth).await?;
    let company = seed_company(&harness, &admin, "Acme Filial Ltda", "98.765.432/0001-10").await?;
    // ten days ahead of the clock's 2025-03-10
    upload_certificate(&harness, &admin, company.id, "matriz", date(2025, 3, 20)?, "s3cr3t")
        .await?;

    let scanner = harness.scanner().with_thresholds(vec![5]);
    assert_eq!(scanner.scan().await?, 0);

    harness.clock.advance(Duration::days(6));
    assert_eq!(scanner.scan().await?, 1);
    assert_eq!(scanner.scan().await?, 0);

    let alerts = harness.certs.list_alerts(&admin).await?;
    assert_eq!(alerts.len(), 1);
    let alert = alerts.first().context("one alert")?;
    assert_eq!(alert.threshold_days, 5);
    assert!(alert.notified);
    assert_eq!(harness.notifier.sent_count(), 1);
    Ok(())
}

#[tokio::test]
async fn default_thresholds_fire_one_at_a_time() -> Result<()> {
    let harness = harness()?;
    let (_, admin) = register_acme(&harness.auth).await?;
    let company = seed_company(&harness, &admin, "Acme Filial Ltda", "98.765.432/0001-10").await?;
    // forty days out
    upload_certificate(&harness, &admin, company.id, "matriz", date(2025, 4, 19)?, "s3cr3t")
        .await?;

    let scanner = harness.scanner();
    assert_eq!(scanner.scan().await?, 0);

    harness.clock.advance(Duration::days(10)); // thirty days left
    assert_eq!(scanner.scan().await?, 1);
    harness.clock.advance(Duration::days(15)); // fifteen days left
    assert_eq!(scanner.scan().await?, 1);
    harness.clock.advance(Duration::days(10)); // five days left
    assert_eq!(scanner.scan().await?, 1);

    let alerts = harness.certs.list_alerts(&admin).await?;
    let mut thresholds: Vec<i32> = alerts.iter().map(|alert| alert.threshold_days).collect();
    thresholds.sort_unstable();
    assert_eq!(thresholds, vec![5, 15, 30]);
    Ok(())
}

#[tokio::test]
async fn failed_dispatch_keeps_the_alert_and_the_dedup() -> Result<()> {
    let harness = harness()?;
    let (_, admin) = register_acme(&harness.auth).await?;
    let company = seed_company(&harness, &admin, "Acme Filial Ltda", "98.765.432/0001-10").await?;
    // twenty days out, inside the 30-day window
    upload_certificate(&harness, &admin, company.id, "matriz", date(2025, 3, 30)?, "s3cr3t")
        .await?;

    let scanner = harness
        .scanner_with(Arc::new(RecordingNotifier::failing()))
        .with_thresholds(vec![30]);
    assert_eq!(scanner.scan().await?, 1);

    let alerts = harness.certs.list_alerts(&admin).await?;
    assert_eq!(alerts.len(), 1);
    assert!(!alerts.first().context("one alert")?.notified);

    // the stored alert still blocks a duplicate on the next sweep
    assert_eq!(scanner.scan().await?, 0);
    Ok(())
}

#[tokio::test]
async fn alerts_stay_inside_their_tenant() -> Result<()> {
    let harness = harness()?;
    let (_, ana) = register_acme(&harness.auth).await?;
    let (_, bia) = register_org(
        &harness.auth,
        "Borges Auditoria",
        "90.111.222/0001-33",
        "b@borges.com",
    )
    .await?;
    let acme = seed_company(&harness, &ana, "Acme Filial Ltda", "98.765.432/0001-10").await?;
    let borges = seed_company(&harness, &bia, "Borges Filial Ltda", "11.222.333/0001-44").await?;
    let acme_cert =
        upload_certificate(&harness, &ana, acme.id, "matriz", date(2025, 3, 20)?, "one").await?;
    upload_certificate(&harness, &bia, borges.id, "sede", date(2025, 3, 20)?, "two").await?;

    let scanner = harness.scanner().with_thresholds(vec![15]);
    assert_eq!(scanner.scan().await?, 2);

    let acme_alerts = harness.certs.list_alerts(&ana).await?;
    assert_eq!(acme_alerts.len(), 1);
    assert_eq!(
        acme_alerts.first().map(|alert| alert.certificate_id),
        Some(acme_cert.id)
    );
    assert_eq!(harness.certs.list_alerts(&bia).await?.len(), 1);
    Ok(())
}
