//! Two-phase login and invitation scenarios over the in-memory stack.

mod common;

use anyhow::{bail, Result};
use chrono::Duration;
use guardiao::auth::LoginOutcome;
use guardiao::domain::Role;
use guardiao::store::AuditFilter;
use guardiao::Error;

use common::{code_at, enroll_mfa, harness, login, register_acme, wrong_code, PASSWORD};

#[tokio::test]
async fn wrong_code_keeps_the_challenge_alive_until_the_right_one_lands() -> Result<()> {
    let harness = harness()?;
    let (_, admin) = register_acme(&harness.auth).await?;
    let secret = enroll_mfa(&harness, &admin).await?;

    let outcome = harness.auth.login("a@acme.com", PASSWORD, None).await?;
    let LoginOutcome::MfaPending { challenge } = outcome else {
        bail!("expected a staged challenge");
    };

    let now = harness.clock.now();
    let rejected = harness
        .auth
        .complete_mfa(challenge, &wrong_code(&secret, now)?, None)
        .await;
    assert!(matches!(rejected, Err(Error::InvalidMfaCode)));

    // the failed attempt did not burn the challenge
    let session = harness
        .auth
        .complete_mfa(challenge, &code_at(&secret, now)?, None)
        .await?;
    assert_eq!(session.user.id, admin.id);

    // but the successful one did
    let replay = harness
        .auth
        .complete_mfa(challenge, &code_at(&secret, now)?, None)
        .await;
    assert!(matches!(replay, Err(Error::InvalidMfaCode)));
    Ok(())
}

#[tokio::test]
async fn mfa_login_is_audited_separately_from_the_password_step() -> Result<()> {
    let harness = harness()?;
    let (_, admin) = register_acme(&harness.auth).await?;
    let secret = enroll_mfa(&harness, &admin).await?;

    let LoginOutcome::MfaPending { challenge } =
        harness.auth.login("a@acme.com", PASSWORD, None).await?
    else {
        bail!("expected a staged challenge");
    };
    harness
        .auth
        .complete_mfa(challenge, &code_at(&secret, harness.clock.now())?, None)
        .await?;

    let filter = AuditFilter {
        action: Some("login_mfa".to_string()),
        ..AuditFilter::default()
    };
    let entries = harness.audit.list(&admin, filter).await?;
    assert_eq!(entries.len(), 1);
    Ok(())
}

#[tokio::test]
async fn invitation_expires_after_its_seven_day_window() -> Result<()> {
    let harness = harness()?;
    let (_, admin) = register_acme(&harness.auth).await?;
    let (invitation, token) = harness
        .auth
        .create_invitation(&admin, "b@acme.com", Role::Operator, None)
        .await?;
    assert_eq!(invitation.expires_at, harness.clock.now() + Duration::days(7));

    harness.clock.advance(Duration::days(8));
    let late = harness.auth.accept_invite(&token, "Bia", "An0therPwd!").await;
    assert!(matches!(late, Err(Error::InviteExpired)));
    Ok(())
}

#[tokio::test]
async fn invitation_token_works_exactly_once() -> Result<()> {
    let harness = harness()?;
    let (_, admin) = register_acme(&harness.auth).await?;
    let (_, token) = harness
        .auth
        .create_invitation(&admin, "b@acme.com", Role::Operator, None)
        .await?;

    let operator = harness.auth.accept_invite(&token, "Bia", "An0therPwd!").await?;
    assert_eq!(operator.role, Role::Operator);
    assert_eq!(operator.org_id, admin.org_id);

    let replay = harness.auth.accept_invite(&token, "Eva", "YetAn0ther!").await;
    assert!(matches!(replay, Err(Error::InviteExpired)));

    // the invited operator signs in with the password they chose
    let session = login(&harness.auth, "b@acme.com", "An0therPwd!").await?;
    assert_eq!(session.user.id, operator.id);
    Ok(())
}

#[tokio::test]
async fn operator_reads_of_the_audit_trail_are_forbidden() -> Result<()> {
    let harness = harness()?;
    let (_, admin) = register_acme(&harness.auth).await?;
    let (_, token) = harness
        .auth
        .create_invitation(&admin, "b@acme.com", Role::Operator, None)
        .await?;
    let operator = harness.auth.accept_invite(&token, "Bia", "An0therPwd!").await?;

    let denied = harness.audit.list(&operator, AuditFilter::default()).await;
    assert!(matches!(denied, Err(Error::Forbidden)));

    // one rung up the same call answers
    let entries = harness.audit.list(&admin, AuditFilter::default()).await?;
    assert!(!entries.is_empty());
    Ok(())
}

#[tokio::test]
async fn operator_cannot_invite_at_a_higher_rung() -> Result<()> {
    let harness = harness()?;
    let (_, admin) = register_acme(&harness.auth).await?;
    let (_, token) = harness
        .auth
        .create_invitation(&admin, "b@acme.com", Role::Operator, None)
        .await?;
    let operator = harness.auth.accept_invite(&token, "Bia", "An0therPwd!").await?;

    let denied = harness
        .auth
        .create_invitation(&operator, "c@acme.com", Role::Admin, None)
        .await;
    assert!(matches!(denied, Err(Error::Forbidden)));
    Ok(())
}
