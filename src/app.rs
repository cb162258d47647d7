/*
 * Responsibility
 * - Config読み込み → 依存生成 (repos / services) → Router 組み立て
 * - Middleware の適用 (security headers / CORS / HTTP)
 * - axum::serve() で起動、Ctrl-C で graceful shutdown
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::repos::{
    MemoryTaskRepo, MemoryUserRepo, PgTaskRepo, PgUserRepo, TaskRepository, UserRepository,
};
use crate::state::AppState;
use crate::{api, middleware};

fn init_tracing() {
    // RUST_LOG=info,task_gate=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // development: fail fast
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("loading configuration")?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );
    tracing::debug!(?config, "configuration loaded");

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

async fn build_state(config: &Config) -> Result<AppState> {
    let (users, tasks): (Arc<dyn UserRepository>, Arc<dyn TaskRepository>) =
        match &config.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(10)
                    .acquire_timeout(config.store_timeout)
                    .connect(url)
                    .await
                    .context("connecting to database")?;
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .context("running migrations")?;
                tracing::info!("connected to postgres, migrations applied");

                (
                    Arc::new(PgUserRepo::new(pool.clone())),
                    Arc::new(PgTaskRepo::new(pool)),
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set: using in-memory stores, data is lost on exit");
                (
                    Arc::new(MemoryUserRepo::new()),
                    Arc::new(MemoryTaskRepo::new()),
                )
            }
        };

    Ok(AppState::new(config, users, tasks)?)
}

fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .nest("/api/v1", api::v1::routes(state.clone()))
        .with_state(state);

    let router = middleware::security_headers::apply(router);
    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router)
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        let config = Config::for_tests();
        let state = AppState::new(
            &config,
            Arc::new(MemoryUserRepo::new()),
            Arc::new(MemoryTaskRepo::new()),
        )
        .unwrap();
        build_router(state, &config)
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
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
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(app: &Router, username: &str, role: Option<&str>) -> (StatusCode, Value) {
        let mut body = json!({"username": username, "password": "pw"});
        if let Some(role) = role {
            body["role"] = json!(role);
        }
        call(app, Method::POST, "/api/v1/users/register", None, Some(body)).await
    }

    async fn login(app: &Router, username: &str, role: &str) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({"username": username, "password": "pw", "role": role})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_open() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn bootstrap_register_login_and_write_access() {
        let app = app();

        let (status, a) = register(&app, "alice", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(a["role"], "admin");
        assert!(a.get("password_hash").is_none());

        let (status, body) = register(&app, "bob", Some("admin")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "PRIVILEGE_ESCALATION_DENIED");

        let (status, b) = register(&app, "bob", Some("user")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(b["role"], "user");

        let bob = login(&app, "bob", "user").await;
        let alice = login(&app, "alice", "admin").await;

        let task = json!({"title": "write docs"});
        let (status, body) =
            call(&app, Method::POST, "/api/v1/tasks", Some(&bob), Some(task.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        let (status, created) =
            call(&app, Method::POST, "/api/v1/tasks", Some(&alice), Some(task)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["title"], "write docs");
        assert_eq!(created["created_by"], a["id"]);

        // readers see the task through its public id
        let id = created["id"].as_str().unwrap();
        let (status, fetched) = call(
            &app,
            Method::GET,
            &format!("/api/v1/tasks/{id}"),
            Some(&bob),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["id"], id);
    }

    #[tokio::test]
    async fn login_response_shape() {
        let app = app();
        register(&app, "alice", None).await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({"username": "alice", "password": "pw", "role": "admin"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["expires_in"], 3_600);
    }

    #[tokio::test]
    async fn wrong_role_and_wrong_password_look_the_same() {
        let app = app();
        register(&app, "alice", None).await;

        let wrong_role = call(
            &app,
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({"username": "alice", "password": "pw", "role": "user"})),
        )
        .await;
        let wrong_password = call(
            &app,
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({"username": "alice", "password": "nope", "role": "admin"})),
        )
        .await;

        assert_eq!(wrong_role.0, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_role, wrong_password);
    }

    #[tokio::test]
    async fn gated_routes_require_a_header() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/api/v1/tasks", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "MISSING_AUTH_HEADER");
    }

    #[tokio::test]
    async fn garbage_token_is_a_bad_request() {
        let app = app();
        let (status, body) =
            call(&app, Method::GET, "/api/v1/tasks", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn duplicate_registration_is_conflict() {
        let app = app();
        register(&app, "alice", None).await;
        let (status, body) = register(&app, "alice", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "USER_ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn malformed_json_is_tagged() {
        let app = app();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/users/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "JSON_SYNTAX_ERROR");
    }

    #[tokio::test]
    async fn me_and_role_assignment() {
        let app = app();
        register(&app, "alice", None).await;
        register(&app, "bob", None).await;
        let alice = login(&app, "alice", "admin").await;

        let (status, me) = call(&app, Method::GET, "/api/v1/users/me", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["username"], "alice");

        let (status, bob) = call(
            &app,
            Method::POST,
            "/api/v1/users/assign",
            Some(&alice),
            Some(json!({"username": "bob", "role": "admin"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bob["role"], "admin");

        // bob's next login must assert the new role
        login(&app, "bob", "admin").await;
    }

    #[tokio::test]
    async fn task_lifecycle_and_public_ids() {
        let app = app();
        register(&app, "alice", None).await;
        let alice = login(&app, "alice", "admin").await;

        let (_, created) = call(
            &app,
            Method::POST,
            "/api/v1/tasks",
            Some(&alice),
            Some(json!({"title": "t", "due_date": "2026-01-02T03:04:05Z"})),
        )
        .await;
        let uri = format!("/api/v1/tasks/{}", created["id"].as_str().unwrap());

        let (status, updated) = call(
            &app,
            Method::PUT,
            &uri,
            Some(&alice),
            Some(json!({"status": "done", "due_date": null})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "done");
        assert_eq!(updated["due_date"], Value::Null);

        let (status, list) = call(&app, Method::GET, "/api/v1/tasks", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (status, _) = call(&app, Method::DELETE, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::GET, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/v1/tasks/not-a-valid-id!",
            Some(&alice),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PUBLIC_ID");
    }

    #[tokio::test]
    async fn security_headers_and_request_id_are_set() {
        let app = app();
        let req = Request::builder()
            .uri("/api/v1/health")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let headers = res.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["cache-control"], "no-store");
        assert!(headers.contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn malformed_query_is_a_tagged_bad_request() {
        let app = app();
        register(&app, "root", Some("admin")).await;
        let token = login(&app, "root", "admin").await;

        let (status, body) = call(
            &app,
            Method::GET,
            "/api/v1/tasks?limit=abc",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_QUERY");
    }

    #[tokio::test]
    async fn oversized_content_length_gets_a_json_413() {
        let app = app();
        let size = 1024 * 1024 + 1;
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/users/register")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, size)
            .body(Body::from(vec![b' '; size]))
            .unwrap();

        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let content_type = res.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("application/json"));
        assert!(res.headers().contains_key("x-request-id"));
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn password_suffix_past_72_bytes_is_rejected_at_login() {
        let app = app();
        let password = "a".repeat(72);
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/users/register",
            None,
            Some(json!({"username": "root", "password": password, "role": "admin"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!({"username": "root", "password": format!("{password}zzz"), "role": "admin"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
    }
}
