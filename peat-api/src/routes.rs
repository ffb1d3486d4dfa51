//! API route configuration.

use std::sync::Arc;

use axum::{
    routing::{delete, get},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))

        // Scanning
        .route("/api/scan", get(handlers::scan))
        .route("/api/scan/quick", get(handlers::quick_scan))

        // Cache administration
        .route("/api/cache-stats", get(handlers::cache_stats))
        .route("/api/cache", delete(handlers::clear_cache))

        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use peat_cache::EphemeralCache;
    use peat_core::error::Result;
    use peat_core::narrative::NarrativeContext;
    use peat_core::traits::{BreachLookup, NarrativeGenerator, RegistrationProbe, UsernamePresenceProbe};
    use peat_core::types::{BreachRecord, ServiceRegistration, UsernameHit};
    use peat_scanner::{Adapters, ExposureScanner};
    use peat_store::{DurableCache, MemoryStore};

    use crate::state::ApiConfig;

    struct Canned;

    #[async_trait]
    impl BreachLookup for Canned {
        async fn lookup(&self, _email: &str) -> Result<Vec<BreachRecord>> {
            Ok(vec![BreachRecord::new(
                "Canva",
                "canva.com",
                chrono::NaiveDate::from_ymd_opt(2019, 5, 24),
                vec!["Passwords".into()],
            )])
        }
    }

    #[async_trait]
    impl RegistrationProbe for Canned {
        async fn probe(&self, _email: &str) -> Result<Vec<ServiceRegistration>> {
            Ok(vec![
                "spotify.com".into(),
                ServiceRegistration::rate_limited("instagram.com"),
            ])
        }
    }

    #[async_trait]
    impl UsernamePresenceProbe for Canned {
        async fn probe(&self, usernames: &[String]) -> Result<Vec<UsernameHit>> {
            Ok(usernames
                .iter()
                .map(|u| UsernameHit::new("github.com", format!("https://github.com/{}", u)))
                .collect())
        }
    }

    #[async_trait]
    impl NarrativeGenerator for Canned {
        async fn generate(&self, _context: &NarrativeContext) -> Result<String> {
            Ok("## Immediate Risks\n\nRotate your Canva password.".into())
        }
    }

    fn test_app() -> Router {
        let canned = Arc::new(Canned);
        let adapters = Adapters {
            breach: canned.clone(),
            registration: canned.clone(),
            presence: canned.clone(),
            narrator: canned,
        };
        let scanner = ExposureScanner::new(adapters, Arc::new(EphemeralCache::new()))
            .with_durable(DurableCache::new(Arc::new(MemoryStore::new())));
        create_router(Arc::new(AppState::new(ApiConfig::default(), scanner)))
    }

    async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();

        let (status, body) = send(&app, "GET", "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["cacheEntries"], 0);
    }

    #[tokio::test]
    async fn test_email_scan() {
        let app = test_app();

        let (status, body) = send(&app, "GET", "/api/scan?email=Alice@Example.com").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "alice@example.com");
        assert_eq!(body["breaches"][0]["title"], "Canva");
        assert_eq!(body["breaches"][0]["severity"], "critical");
        assert_eq!(body["registrations"][0], "spotify.com");
        assert_eq!(body["rateLimited"][0], "instagram.com");
        assert_eq!(body["meta"]["cached"], false);

        let (_, again) = send(&app, "GET", "/api/scan?email=alice@example.com").await;
        assert_eq!(again["meta"]["cached"], true);
        assert_eq!(again["meta"]["cacheSource"], "memory");

        let (_, forced) = send(&app, "GET", "/api/scan?email=alice@example.com&forceRefresh=true").await;
        assert_eq!(forced["meta"]["cached"], false);
    }

    #[tokio::test]
    async fn test_username_scan() {
        let app = test_app();

        let (status, body) = send(&app, "GET", "/api/scan?usernames=bob,alice").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "username");
        assert_eq!(body["usernameHits"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_scan_validation_errors() {
        let app = test_app();

        for uri in [
            "/api/scan",
            "/api/scan?email=not-an-email",
            "/api/scan?email=alice@example.com&username=alice",
            "/api/scan?usernames=a,b,c,d,e,f",
        ] {
            let (status, body) = send(&app, "GET", uri).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", uri);
            assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn test_quick_scan() {
        let app = test_app();

        let (status, body) = send(&app, "GET", "/api/scan/quick?email=Alice@Example.com").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "alice@example.com");
        assert_eq!(body["breaches"][0]["title"], "Canva");
        assert_eq!(body["registrations"][0], "spotify.com");
        assert!(body["usernameHits"].as_array().unwrap().is_empty());
        assert_eq!(body["meta"]["sources"]["sherlock"], false);
        assert!(body["meta"].get("breachCountTruncated").is_none());

        let (_, stats) = send(&app, "GET", "/api/cache-stats").await;
        assert_eq!(stats["ephemeral"]["totalEntries"], 0);
        assert_eq!(stats["durable"]["totalRecords"], 0);
    }

    #[tokio::test]
    async fn test_quick_scan_requires_email() {
        let app = test_app();

        for uri in [
            "/api/scan/quick",
            "/api/scan/quick?email=",
            "/api/scan/quick?email=not-an-email",
            "/api/scan/quick?username=alice",
        ] {
            let (status, body) = send(&app, "GET", uri).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", uri);
            assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn test_cache_stats_and_clear() {
        let app = test_app();
        send(&app, "GET", "/api/scan?email=alice@example.com").await;

        let (status, stats) = send(&app, "GET", "/api/cache-stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["ephemeral"]["validEntries"], 1);
        assert_eq!(stats["durable"]["totalRecords"], 1);
        assert!(stats["timestamp"].is_string());

        let (status, cleared) = send(&app, "DELETE", "/api/cache").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cleared["ephemeralCleared"], 1);
        assert!(cleared["durableCleared"].is_null());

        let (_, cleared) = send(&app, "DELETE", "/api/cache?includeDurable=true").await;
        assert_eq!(cleared["ephemeralCleared"], 0);
        assert_eq!(cleared["durableCleared"], 1);
    }
}
