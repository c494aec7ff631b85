use std::net::SocketAddr;

use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth, state::AppState, students};

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(students::router()),
        )
        .route("/health", get(health))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);
    if origins.is_empty() {
        return base.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(allowed)
}

pub async fn serve(app: Router, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    state.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn signup(app: &Router, email: &str, role: &str) -> String {
        let (status, _) = send(
            app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": email, "password": "pa55word", "name": "Tester", "role": role })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(
            app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "pa55word" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "bearer");
        body["access_token"].as_str().unwrap().to_string()
    }

    fn student_body(nim: &str, nama: &str, year: i32) -> Value {
        json!({
            "nim": nim,
            "nama": nama,
            "email": format!("{}@campus.test", nama.to_lowercase()),
            "program_studi": "Teknik Informatika",
            "angkatan": year,
        })
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn register_login_me() {
        let app = build_app(AppState::fake());
        let token = signup(&app, "user@campus.test", "user").await;
        let (status, me) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "user@campus.test");
        assert_eq!(me["role"], "user");
        assert!(me.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn role_defaults_to_user() {
        let app = build_app(AppState::fake());
        let (status, user) = send(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": "plain@campus.test", "password": "x", "name": "Plain" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["role"], "user");
    }

    #[tokio::test]
    async fn duplicate_registration_is_400() {
        let app = build_app(AppState::fake());
        signup(&app, "dup@campus.test", "user").await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": "dup@campus.test", "password": "other", "name": "Again" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Email already registered");
    }

    #[tokio::test]
    async fn bad_login_is_401() {
        let app = build_app(AppState::fake());
        signup(&app, "u@campus.test", "user").await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "u@campus.test", "password": "wrong" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Invalid email or password");
    }

    #[tokio::test]
    async fn missing_or_bad_token_is_401() {
        let app = build_app(AppState::fake());
        let (status, _) = send(&app, "GET", "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, body) = send(&app, "GET", "/api/students", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Invalid token");
    }

    #[tokio::test]
    async fn non_admin_cannot_mutate() {
        let app = build_app(AppState::fake());
        let token = signup(&app, "u@campus.test", "user").await;
        let id = uuid::Uuid::new_v4();

        let (status, _) = send(&app, "POST", "/api/students", Some(&token), Some(json!({}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(
            &app,
            "POST",
            "/api/students",
            Some(&token),
            Some(student_body("A1", "Alice", 2021)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(
            &app,
            "PUT",
            &format!("/api/students/{id}"),
            Some(&token),
            Some(json!({ "nama": "X" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) =
            send(&app, "DELETE", &format!("/api/students/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["detail"], "Admin access required");
    }

    #[tokio::test]
    async fn admin_student_lifecycle() {
        let app = build_app(AppState::fake());
        let admin = signup(&app, "admin@campus.test", "admin").await;

        let (status, alice) = send(
            &app,
            "POST",
            "/api/students",
            Some(&admin),
            Some(student_body("A1", "Alice", 2021)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(alice["created_at"], alice["updated_at"]);
        let (status, _) = send(
            &app,
            "POST",
            "/api/students",
            Some(&admin),
            Some(student_body("B2", "Bob", 2022)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            "POST",
            "/api/students",
            Some(&admin),
            Some(student_body("A1", "Imposter", 2020)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "NIM already exists");

        let (status, found) =
            send(&app, "GET", "/api/students?search=ali", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found, json!([alice.clone()]));

        let (_, by_year) = send(&app, "GET", "/api/students?angkatan=2022", Some(&admin), None).await;
        let by_year = by_year.as_array().unwrap();
        assert_eq!(by_year.len(), 1);
        assert_eq!(by_year[0]["nim"], "B2");

        let (_, all) = send(&app, "GET", "/api/students?search=", Some(&admin), None).await;
        assert_eq!(all.as_array().unwrap().len(), 2);

        let id = alice["id"].as_str().unwrap().to_string();
        let path = format!("/api/students/{id}");

        let (status, same) = send(&app, "PUT", &path, Some(&admin), Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(same, alice);

        let (status, renamed) =
            send(&app, "PUT", &path, Some(&admin), Some(json!({ "nama": "New" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(renamed["nama"], "New");
        for field in ["id", "nim", "email", "program_studi", "angkatan", "created_at"] {
            assert_eq!(renamed[field], alice[field], "{field} changed");
        }
        assert_ne!(renamed["updated_at"], alice["updated_at"]);

        let (status, fetched) = send(&app, "GET", &path, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, renamed);

        let (status, body) = send(&app, "DELETE", &path, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Student deleted successfully");

        let (status, _) = send(&app, "DELETE", &path, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = send(&app, "GET", &path, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Student not found");
    }

    #[tokio::test]
    async fn plain_user_can_read_students() {
        let app = build_app(AppState::fake());
        let admin = signup(&app, "admin@campus.test", "admin").await;
        let user = signup(&app, "user@campus.test", "user").await;
        let (_, created) = send(
            &app,
            "POST",
            "/api/students",
            Some(&admin),
            Some(student_body("A1", "Alice", 2021)),
        )
        .await;

        let (status, list) = send(&app, "GET", "/api/students", Some(&user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list, json!([created.clone()]));

        let path = format!("/api/students/{}", created["id"].as_str().unwrap());
        let (status, got) = send(&app, "GET", &path, Some(&user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(got, created);
    }

    #[tokio::test]
    async fn unknown_student_id_is_404() {
        let app = build_app(AppState::fake());
        let admin = signup(&app, "admin@campus.test", "admin").await;
        let (status, _) = send(&app, "GET", "/api/students/nope", Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(
            &app,
            "PUT",
            &format!("/api/students/{}", uuid::Uuid::new_v4()),
            Some(&admin),
            Some(json!({ "nama": "X" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn null_fields_in_update_are_left_alone() {
        let app = build_app(AppState::fake());
        let admin = signup(&app, "admin@campus.test", "admin").await;
        let (_, alice) = send(
            &app,
            "POST",
            "/api/students",
            Some(&admin),
            Some(student_body("A1", "Alice", 2021)),
        )
        .await;
        let path = format!("/api/students/{}", alice["id"].as_str().unwrap());

        let (status, updated) = send(
            &app,
            "PUT",
            &path,
            Some(&admin),
            Some(json!({
                "nama": "New",
                "nim": null,
                "email": null,
                "program_studi": null,
                "angkatan": null,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["nama"], "New");
        for field in ["nim", "email", "program_studi", "angkatan"] {
            assert_eq!(updated[field], alice[field], "{field} changed");
        }
    }

    #[tokio::test]
    async fn whitespace_search_matches_literally() {
        let app = build_app(AppState::fake());
        let admin = signup(&app, "admin@campus.test", "admin").await;
        send(
            &app,
            "POST",
            "/api/students",
            Some(&admin),
            Some(json!({
                "nim": "A1",
                "nama": "Alice Smith",
                "email": "alice@campus.test",
                "program_studi": "Teknik Informatika",
                "angkatan": 2021,
            })),
        )
        .await;
        send(&app, "POST", "/api/students", Some(&admin), Some(student_body("B2", "Bob", 2021))).await;

        let (status, found) =
            send(&app, "GET", "/api/students?search=%20", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let found = found.as_array().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["nama"], "Alice Smith");
    }

    #[tokio::test]
    async fn malformed_input_gets_json_detail() {
        let app = build_app(AppState::fake());
        let admin = signup(&app, "admin@campus.test", "admin").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/students",
            Some(&admin),
            Some(json!({ "nim": "A1", "angkatan": "soon" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().is_some_and(|d| !d.is_empty()));

        let (status, body) =
            send(&app, "GET", "/api/students?angkatan=abc", Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().is_some_and(|d| !d.is_empty()));

        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "admin@campus.test" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_string());
    }
}
