// Drives the real HTTP authenticator against a fake login endpoint that
// answers like SAP Service Layer: session id in the body, B1SESSION cookie,
// session timeout in minutes.

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{http::header::SET_COOKIE, routing::post, Json, Router};
    use chrono::Duration as ChronoDuration;
    use reqwest::Client;
    use serde_json::{json, Value};

    use crate::config::proc_loader::parse_config;
    use crate::helpers::time::SystemClock;
    use crate::session::{ExpiryPolicy, SessionManager, TokenStore};
    use crate::sources::fetch::HttpAuthenticator;
    use crate::tests::common::spawn_axum;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn burst_of_callers_logs_in_once() {
        let logins = Arc::new(AtomicUsize::new(0));
        let counter = logins.clone();
        let router = Router::new().route(
            "/b1s/v1/Login",
            post(move |Json(body): Json<HashMap<String, String>>| {
                let counter = counter.clone();
                async move {
                    assert_eq!(body.get("UserName").map(String::as_str), Some("manager"));
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    let sid = format!("sid-{}", n);
                    (
                        [(SET_COOKIE, format!("B1SESSION={}; path=/b1s/v1; HttpOnly", sid))],
                        Json(json!({"SessionId": sid, "Version": "1000191", "SessionTimeout": 30})),
                    )
                }
            }),
        );
        let (handle, addr) = spawn_axum(router).await;

        let dir = tempfile::tempdir().unwrap();
        let config = format!(
            r#"
settings:
  session:
    token_file: {token_file}
auth:
  account: manager
  request:
    url: http://{addr}/b1s/v1/Login
    method: POST
    body:
      CompanyDB: {{ value: SBODEMOUS }}
      UserName: {{ value: manager }}
      Password: {{ value: secret }}
  parse:
    token:
      from: cookie
      name: B1SESSION
    session_timeout:
      from: body
      pointer: /SessionTimeout
      unit: minutes
"#,
            token_file = dir.path().join("session.json").display(),
            addr = addr,
        );
        let cfg = parse_config(config).await.unwrap();
        let session = &cfg.settings.session;

        let manager = SessionManager::init_with_clock(
            HttpAuthenticator::new(cfg.auth.clone(), Client::new()),
            TokenStore::new(&session.token_file, cfg.auth.account.clone()),
            ExpiryPolicy::new(
                ChronoDuration::milliseconds(session.session_timeout_ms as i64),
                ChronoDuration::milliseconds(session.expiry_buffer_ms as i64),
            ),
            Duration::from_millis(session.request_timeout_ms),
            Arc::new(SystemClock),
        )
        .await
        .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move { manager.get_token().await }));
        }
        for h in handles {
            let token = h.await.unwrap().unwrap();
            assert_eq!(token.value, "sid-1");
            assert_eq!(token.expires_at - token.issued_at, ChronoDuration::minutes(30));
        }
        assert_eq!(logins.load(Ordering::SeqCst), 1);

        let stored: Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("session.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(stored["value"], "sid-1");
        assert_eq!(stored["source"], "manager");

        handle.abort();
    }
}
