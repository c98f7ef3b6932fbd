#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use figment::providers::{Format, Yaml};
use figment::Figment;
use rigauth::config::{extract_config, ConfigV1};
use rigauth::routes::create_router;
use rigauth::startup::build_state;
use rigauth::state::AppState;
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_CONFIG: &str = r#"
version: "1.0.0"
bind_address: 127.0.0.1:8091
logging:
  level: debug
  format: json
auth:
  admin_check_timeout_in_ms: 500
notifications:
  capacity: 10
  seed_samples: true
gateway:
  type: memory
  name: local
  designated_admin: owner@rigs.test
  users:
    - email: owner@rigs.test
      password: hunter22
      role: provider
    - email: renter@rigs.test
      password: digger99
    - email: pending@rigs.test
      password: digger99
      confirmed: false
"#;

pub fn load_test_config() -> ConfigV1 {
    extract_config(Figment::new().merge(Yaml::string(TEST_CONFIG)))
        .expect("Failed to parse test config YAML")
}

pub async fn build_app(config: ConfigV1) -> (Router, AppState) {
    let state = build_state(Arc::new(config)).await;
    (create_router(state.clone()), state)
}

pub fn json_request(path: &str, method: Method, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(path);
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("failed to build request")
}

/// Sends a request and returns the status with the decoded JSON body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request should complete");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}
