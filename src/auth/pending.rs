//! Staged MFA challenges between the password check and code verification.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

struct Pending {
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

/// In-memory table of MFA challenges issued at login.
///
/// A challenge stays claimable until its code verifies, its TTL passes, or
/// the process restarts. A wrong code leaves the entry in place so the user
/// can retry against the same reference.
pub(super) struct PendingMfa {
    ttl: Duration,
    inner: Mutex<HashMap<Uuid, Pending>>,
}

impl PendingMfa {
    pub(super) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Stages a challenge for a user whose password already checked out.
    pub(super) async fn issue(&self, user_id: Uuid, now: DateTime<Utc>) -> Uuid {
        let mut inner = self.inner.lock().await;
        let ttl = self.ttl;
        inner.retain(|_, pending| now - pending.created_at <= ttl);
        let challenge = Uuid::new_v4();
        inner.insert(
            challenge,
            Pending {
                user_id,
                created_at: now,
            },
        );
        challenge
    }

    /// Looks up the user behind a challenge without consuming it.
    pub(super) async fn peek(&self, challenge: Uuid, now: DateTime<Utc>) -> Option<Uuid> {
        let inner = self.inner.lock().await;
        inner
            .get(&challenge)
            .filter(|pending| now - pending.created_at <= self.ttl)
            .map(|pending| pending.user_id)
    }

    /// Removes a challenge once its code verified.
    pub(super) async fn consume(&self, challenge: Uuid) {
        let mut inner = self.inner.lock().await;
        inner.remove(&challenge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    #[tokio::test]
    async fn peek_does_not_consume() {
        let pending = PendingMfa::new(Duration::minutes(5));
        let user_id = Uuid::new_v4();
        let challenge = pending.issue(user_id, at(0)).await;

        assert_eq!(pending.peek(challenge, at(10)).await, Some(user_id));
        assert_eq!(pending.peek(challenge, at(20)).await, Some(user_id));
    }

    #[tokio::test]
    async fn consume_removes_the_challenge() {
        let pending = PendingMfa::new(Duration::minutes(5));
        let challenge = pending.issue(Uuid::new_v4(), at(0)).await;

        pending.consume(challenge).await;
        assert_eq!(pending.peek(challenge, at(1)).await, None);
    }

    #[tokio::test]
    async fn expired_challenges_are_invisible() {
        let pending = PendingMfa::new(Duration::minutes(5));
        let challenge = pending.issue(Uuid::new_v4(), at(0)).await;

        assert!(pending.peek(challenge, at(299)).await.is_some());
        assert_eq!(pending.peek(challenge, at(301)).await, None);
    }

    #[tokio::test]
    async fn unknown_reference_yields_none() {
        let pending = PendingMfa::new(Duration::minutes(5));
        assert_eq!(pending.peek(Uuid::new_v4(), at(0)).await, None);
    }
}
