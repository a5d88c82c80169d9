#[cfg(test)]
mod test {
    use http::StatusCode;
    use reqwest::Client;
    use serde_json::Value;

    use crate::config::settings::SettingsConfig;
    use crate::helpers::time::ManualClock;
    use crate::server::server::app;
    use crate::session::SessionError;
    use crate::tests::common::{manager_at, spawn_axum, t0, FakeAuthenticator};

    fn settings() -> SettingsConfig {
        serde_yaml::from_str("metrics:\n  is_enabled: true\n  path: /metrics\n").unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn token_routes_serve_invalidate_and_renew() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let auth = FakeAuthenticator::new();
        let manager = manager_at(auth.clone(), &dir.path().join("session.json"), &clock).await;
        let (handle, addr) = spawn_axum(app(&settings(), manager).await).await;
        let client = Client::new();
        let base = format!("http://{}", addr);

        let resp = client.get(format!("{}/token", base)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["token"], "session-1");
        assert_eq!(body["source"], "manager");

        // cached on the second read
        let body: Value = client.get(format!("{}/token", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(body["token"], "session-1");
        assert_eq!(auth.calls(), 1);

        let resp = client.post(format!("{}/token/invalidate", base)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let body: Value = client.get(format!("{}/token", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(body["token"], "session-2");

        let body: Value = client.post(format!("{}/token/renew", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(body["token"], "session-3");

        let resp = client.get(format!("{}/health", base)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["phase"], "valid");
        assert_eq!(body["account"], "manager");

        let metrics = client.get(format!("{}/metrics", base)).send().await.unwrap().text().await.unwrap();
        assert!(metrics.contains("slsession_renewals_total"), "{metrics}");

        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn rejected_login_maps_to_unauthorized() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let auth = FakeAuthenticator::new();
        auth.push(Err(SessionError::Authentication("Invalid login credential".into())));
        let manager = manager_at(auth.clone(), &dir.path().join("session.json"), &clock).await;
        let (handle, addr) = spawn_axum(app(&settings(), manager).await).await;
        let client = Client::new();

        let resp = client.get(format!("http://{}/token", addr)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "authentication");

        let resp = client.get(format!("http://{}/health", addr)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["phase"], "failed");

        handle.abort();
    }
}
