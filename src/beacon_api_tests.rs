// src/beacon_api_tests.rs

#[cfg(test)]
mod tests {
    use crate::audit::AuditTrail;
    use crate::beacon_api::{
        AuthError, AuthGateway, AuthSession, LoginGrant, TokenManager, TOKEN_SAFETY_MARGIN_SECS,
    };
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeAuthGateway {
        calls: AtomicUsize,
        fail: bool,
        expires_in: u64,
    }

    impl FakeAuthGateway {
        fn succeeding(expires_in: u64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
                expires_in,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
                expires_in: 0,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthGateway for FakeAuthGateway {
        async fn login(&self) -> Result<LoginGrant, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AuthError::Rejected {
                    status: StatusCode::UNAUTHORIZED,
                    body: Some("Invalid credentials".to_string()),
                })
            } else {
                Ok(LoginGrant {
                    access_token: "test_token_123".to_string(),
                    expires_in: self.expires_in,
                })
            }
        }
    }

    fn quiet_audit() -> Arc<AuditTrail> {
        Arc::new(AuditTrail::new())
    }

    #[test]
    fn session_is_usable_inside_safety_margin() {
        let now = Utc.with_ymd_and_hms(2025, 7, 21, 10, 0, 0).unwrap();
        let session = AuthSession {
            bearer_token: "abc".to_string(),
            expires_at: now + Duration::seconds(3600),
        };
        assert!(
            session.is_usable(now),
            "a fresh one-hour token should be usable"
        );
    }

    #[test]
    fn session_is_unusable_within_safety_margin_of_expiry() {
        let now = Utc.with_ymd_and_hms(2025, 7, 21, 10, 0, 0).unwrap();
        let session = AuthSession {
            bearer_token: "abc".to_string(),
            expires_at: now + Duration::seconds(TOKEN_SAFETY_MARGIN_SECS),
        };
        assert!(
            !session.is_usable(now),
            "a token expiring within the safety margin must not be usable"
        );
    }

    #[test]
    fn login_grant_defaults_expires_in_to_an_hour() {
        let grant: LoginGrant = serde_json::from_str(r#"{"access_token": "t"}"#)
            .expect("grant without expires_in should deserialize");
        assert_eq!(grant.expires_in, 3600);
    }

    #[tokio::test]
    async fn manager_starts_without_a_valid_token() {
        let gateway = Arc::new(FakeAuthGateway::succeeding(3600));
        let manager = TokenManager::new(gateway, quiet_audit());
        assert!(
            !manager.is_valid().await,
            "a freshly constructed manager has no session"
        );
    }

    #[tokio::test]
    async fn authenticate_makes_the_token_valid() {
        let gateway = Arc::new(FakeAuthGateway::succeeding(3600));
        let manager = TokenManager::new(gateway.clone(), quiet_audit());

        manager.authenticate().await.expect("login should succeed");

        assert!(manager.is_valid().await);
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn invalidate_clears_the_session() {
        let gateway = Arc::new(FakeAuthGateway::succeeding(3600));
        let manager = TokenManager::new(gateway, quiet_audit());

        manager.authenticate().await.expect("login should succeed");
        manager.invalidate().await;

        assert!(
            !manager.is_valid().await,
            "the session must be gone after invalidate"
        );
    }

    #[tokio::test]
    async fn ensure_valid_does_not_relogin_while_session_lives() {
        let gateway = Arc::new(FakeAuthGateway::succeeding(3600));
        let manager = TokenManager::new(gateway.clone(), quiet_audit());

        manager.authenticate().await.expect("login should succeed");
        manager.ensure_valid().await.expect("session is live");

        assert_eq!(
            gateway.call_count(),
            1,
            "ensure_valid must be a no-op on a live session"
        );
    }

    #[tokio::test]
    async fn ensure_valid_relogs_in_after_invalidate() {
        let gateway = Arc::new(FakeAuthGateway::succeeding(3600));
        let manager = TokenManager::new(gateway.clone(), quiet_audit());

        manager.authenticate().await.expect("login should succeed");
        manager.invalidate().await;
        manager.ensure_valid().await.expect("re-login should succeed");

        assert_eq!(gateway.call_count(), 2);
        assert!(manager.is_valid().await);
    }

    #[tokio::test]
    async fn failed_authentication_leaves_session_unset() {
        let gateway = Arc::new(FakeAuthGateway::failing());
        let manager = TokenManager::new(gateway, quiet_audit());

        let result = manager.authenticate().await;

        assert!(result.is_err(), "rejected login must surface an error");
        assert!(!manager.is_valid().await);
    }

    #[tokio::test]
    async fn short_lived_grant_is_never_usable() {
        // expires_in below the safety margin means the session is born dead
        let gateway = Arc::new(FakeAuthGateway::succeeding(60));
        let manager = TokenManager::new(gateway, quiet_audit());

        manager.authenticate().await.expect("login should succeed");

        assert!(
            !manager.is_valid().await,
            "a grant shorter than the safety margin must not count as valid"
        );
    }
}
