//! Common test utilities for integration tests
//!
//! Every test gets a fresh router over an in-memory store, a recording
//! notifier (so sent codes and links can be read back) and a manual clock.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tickup_api::app::{build_router, AppState, Backends};
use tickup_api::config::Config;
use tickup_shared::clock::ManualClock;
use tickup_shared::notify::RecordingNotifier;
use tickup_shared::store::memory::MemoryStore;
use tower::ServiceExt;

pub const FRONTEND_URL: &str = "http://app.tickup.test";
pub const BACKEND_URL: &str = "http://api.tickup.test";

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
}

/// A signed-up user as seen by the client
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub token: String,
}

impl TestUser {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Status, headers and parsed JSON body (`Value::Null` when empty)
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }
}

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = [
        ("STORE", "memory"),
        ("JWT_SECRET", "test-secret-key-at-least-32-bytes-long"),
        ("FRONTEND_URL", FRONTEND_URL),
        ("BACKEND_URL", BACKEND_URL),
    ]
    .into_iter()
    .collect();

    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(ManualClock::default());

        let state = AppState::new(
            test_config(),
            Backends::new(store.clone(), store.clone(), notifier.clone(), clock.clone()),
        );

        Self {
            app: build_router(state.clone()),
            state,
            store,
            notifier,
            clock,
        }
    }

    /// Sends one request through the router
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, user: &TestUser) -> TestResponse {
        self.send(Method::GET, uri, Some(&user.bearer()), None).await
    }

    pub async fn post(&self, uri: &str, user: &TestUser, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(&user.bearer()), Some(body))
            .await
    }

    pub async fn patch(&self, uri: &str, user: &TestUser, body: Value) -> TestResponse {
        self.send(Method::PATCH, uri, Some(&user.bearer()), Some(body))
            .await
    }

    pub async fn put(&self, uri: &str, user: &TestUser) -> TestResponse {
        self.send(Method::PUT, uri, Some(&user.bearer()), None).await
    }

    pub async fn delete(&self, uri: &str, user: &TestUser) -> TestResponse {
        self.send(Method::DELETE, uri, Some(&user.bearer()), None)
            .await
    }

    /// Signs up `username` with email `<username>@x.com` and password `secret1`
    pub async fn signup(&self, username: &str) -> TestUser {
        self.signup_with_email(username, &format!("{}@x.com", username))
            .await
    }

    pub async fn signup_with_email(&self, username: &str, email: &str) -> TestUser {
        let response = self
            .send(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({ "username": username, "email": email, "password": "secret1" })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);

        TestUser {
            id: response.body["userId"].as_str().unwrap().to_string(),
            email: response.body["email"].as_str().unwrap().to_string(),
            token: response.body["token"].as_str().unwrap().to_string(),
        }
    }

    /// Creates a task and returns its JSON
    pub async fn create_task(&self, user: &TestUser, title: &str) -> Value {
        let response = self.post("/tasks", user, json!({ "title": title })).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body
    }
}

/// Task id out of a task JSON
pub fn id_of(task: &Value) -> String {
    task["id"].as_str().unwrap().to_string()
}

/// Activity messages of a task JSON, in order
pub fn activity_messages(task: &Value) -> Vec<String> {
    task["activityLog"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["message"].as_str().unwrap().to_string())
        .collect()
}
