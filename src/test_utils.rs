//! Shared fixtures for handler and integration tests.
//!
//! Tests run against the in-memory store and the dummy gateway, through a
//! cookie-saving [`axum_test::TestServer`], so the full request pipeline
//! (routing, extractors, session auth, error mapping) is exercised without
//! any external services.

use axum_test::TestServer;
use rust_decimal::Decimal;

use crate::config::{Config, DummyConfig, GatewayConfig, StorageConfig};
use crate::{AppState, Application};

pub const TEST_ADMIN_EMAIL: &str = "admin@example.com";
pub const TEST_ADMIN_PASSWORD: &str = "correct-horse-battery";
pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_email: TEST_ADMIN_EMAIL.to_string(),
        admin_password: Some(TEST_ADMIN_PASSWORD.to_string()),
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        storage: StorageConfig::Memory,
        gateway: GatewayConfig::Dummy(DummyConfig {
            webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
        }),
        ..Default::default()
    };
    // Production argon2 cost would dominate every test's runtime
    config.auth.password.argon2_memory_kib = 1024;
    config.auth.password.argon2_iterations = 1;
    config.auth.session.cookie_secure = false;
    config.billing.scheduler_enabled = false;
    config
}

pub async fn create_test_app() -> (TestServer, AppState) {
    let config = create_test_config();

    let app = Application::new(config)
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

/// Log in as the bootstrap admin; the server keeps the session cookie.
pub async fn login_admin(server: &TestServer) {
    server
        .post("/authentication/login")
        .json(&serde_json::json!({
            "email": TEST_ADMIN_EMAIL,
            "password": TEST_ADMIN_PASSWORD,
        }))
        .await
        .assert_status_ok();
}

/// Configure the monthly fee, which most ledger operations require.
pub async fn set_monthly_fee(server: &TestServer, fee: Decimal) {
    server
        .put("/admin/api/v1/settings")
        .json(&serde_json::json!({ "monthly_fee": fee }))
        .await
        .assert_status_ok();
}
