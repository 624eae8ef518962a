#![allow(dead_code)]

use std::collections::BTreeMap;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use ticketdesk::config::AppConfig;
use ticketdesk::security::password::Argon2Config;
use ticketdesk::shared::state::AppState;
use ticketdesk::shared::utils::{create_pool, run_migrations};
use ticketdesk::tickets::model::{Severity, Status, Ticket, TicketInput};
use ticketdesk::tickets::store;
use ticketdesk::users::{self, NewAccount, User};
use ticketdesk::web::create_router;

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _dir: TempDir,
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(|_| {})
}

/// App over a throwaway SQLite file, with cheap password hashing.
pub fn spawn_app_with(customize: impl FnOnce(&mut AppConfig)) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = AppConfig::default();
    config.database.url = dir.path().join("test.sqlite3").display().to_string();
    config.password.argon2 = Argon2Config::minimal();
    customize(&mut config);

    let pool = create_pool(&config.database).expect("pool");
    run_migrations(&pool).expect("migrations");
    let state = AppState::new(&config, pool).expect("state");

    TestApp {
        router: create_router(state.clone()),
        state,
        _dir: dir,
    }
}

impl TestApp {
    pub fn create_user(&self, username: &str, is_staff: bool) -> User {
        let mut conn = self.state.conn.get().expect("conn");
        users::create_user(
            &mut conn,
            &self.state.passwords,
            &NewAccount {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password: PASSWORD.to_string(),
                is_staff,
                ..NewAccount::default()
            },
        )
        .expect("create user")
    }

    pub fn create_ticket(&self, title: &str) -> Ticket {
        let mut conn = self.state.conn.get().expect("conn");
        store::insert_ticket(
            &mut conn,
            &TicketInput {
                title: title.to_string(),
                description: "This is a test description.".to_string(),
                severity: Severity::Medium,
                status: Status::Open,
            },
        )
        .expect("create ticket")
    }

    pub fn find_ticket(&self, id: i32) -> Option<Ticket> {
        let mut conn = self.state.conn.get().expect("conn");
        store::find_ticket(&mut conn, id).expect("find ticket")
    }

    pub fn ticket_count(&self) -> usize {
        let mut conn = self.state.conn.get().expect("conn");
        store::list_tickets(&mut conn).expect("list").len()
    }

    pub fn client(&self) -> TestClient {
        TestClient {
            router: self.router.clone(),
            jar: BTreeMap::new(),
        }
    }

    pub async fn login(&self, username: &str) -> TestClient {
        let mut client = self.client();
        let response = client
            .post_form("/login/", &[("username", username), ("password", PASSWORD)])
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER, "login failed: {}", response.body);
        client
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub headers: axum::http::HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn assert_redirect(&self, status: StatusCode, location: &str) {
        assert_eq!(self.status, status, "body: {}", self.body);
        assert_eq!(self.location.as_deref(), Some(location));
    }
}

/// Minimal browser: keeps cookies between requests and can follow redirects.
pub struct TestClient {
    router: Router,
    pub jar: BTreeMap<String, String>,
}

impl TestClient {
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.jar.get(name).map(String::as_str)
    }

    fn store_cookies(&mut self, headers: &axum::http::HeaderMap) {
        for value in headers.get_all(header::SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let mut parts = raw.split(';').map(str::trim);
            let Some((name, value)) = parts.next().and_then(|p| p.split_once('=')) else {
                continue;
            };
            let expired = parts.any(|attr| attr.eq_ignore_ascii_case("max-age=0"));

            if expired || value.is_empty() {
                self.jar.remove(name);
            } else {
                self.jar.insert(name.to_string(), value.to_string());
            }
        }
    }

    async fn send(&mut self, builder: axum::http::request::Builder, body: Body) -> TestResponse {
        let mut builder = builder;
        if !self.jar.is_empty() {
            let cookie_header = self
                .jar
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie_header);
        }

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router is infallible");

        self.store_cookies(response.headers());

        let status = response.status();
        let headers = response.headers().clone();
        let location = headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();

        TestResponse {
            status,
            location,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send(Request::builder().method("GET").uri(uri), Body::empty())
            .await
    }

    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded"),
            Body::from(body),
        )
        .await
    }

    /// GETs the redirect target of `response`.
    pub async fn follow(&mut self, response: &TestResponse) -> TestResponse {
        let location = response
            .location
            .as_deref()
            .unwrap_or_else(|| panic!("not a redirect: {}", response.status));
        self.get(location).await
    }
}
