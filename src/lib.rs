//! # duebook: Membership Dues Tracking and Collection
//!
//! `duebook` is a self-hostable bookkeeping service for small committees: clubs,
//! housing societies, alumni circles, any group that collects a fixed monthly fee
//! from its members. It tracks who owes what, records cash payments, collects
//! online payments through a hosted payment-link gateway, and reports collected
//! revenue against recorded expenditures.
//!
//! ## Overview
//!
//! The service exposes a JSON API over a membership ledger. An administrator
//! (typically the committee treasurer) enrolls members, sets the monthly fee,
//! and lets the billing generator open one `Pending` dues record per member per
//! month. Payments close those records: cash payments are recorded by hand,
//! online payments arrive as payment-gateway webhooks and are reconciled
//! automatically. A reporting endpoint rolls the whole ledger up into collected,
//! pending, and spent totals.
//!
//! ### Request Flow
//!
//! Admin requests under `/admin/api/v1/*` carry a JWT session cookie obtained
//! from `POST /authentication/login`; handlers authorize through the
//! [`auth::current_user::AdminUser`] extractor. Member-facing payment requests
//! (`POST /orders`) need no session, they reference pending dues records by id
//! and receive a hosted payment link. Webhook deliveries (`POST
//! /webhooks/payment`) are authenticated by an HMAC signature over the raw
//! body instead of a session.
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) holds the axum handlers and their
//! request/response models. The **storage layer** ([`store`]) hides persistence
//! behind the [`store::LedgerStore`] trait with a Postgres backend for real
//! installations and an in-memory backend for tests and trial runs. The
//! **billing engine** ([`billing`]) computes what each member owes and
//! generates the monthly dues records, either on a background interval or on
//! demand. The **gateway adapter** ([`gateway`]) creates payment links and
//! verifies webhook signatures, with a Razorpay implementation and a dummy one
//! for development. Financial rollups live in [`reports`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use duebook::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Parse CLI arguments and load configuration
//!     let args = duebook::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     // Initialize structured logging
//!     duebook::telemetry::init_telemetry()?;
//!
//!     // Create and start the application
//!     let app = Application::new(config).await?;
//!
//!     // Run with graceful shutdown on Ctrl+C
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! With `storage.type: postgres` the application runs its embedded migrations
//! on startup; they can also be applied by hand:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
//! duebook::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod billing;
pub mod config;
pub mod errors;
pub mod gateway;
mod openapi;
pub mod reports;
pub mod store;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::HeaderValue,
    routing::{delete, get, patch, post, put},
};
use bon::Builder;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;

use crate::{
    auth::{password, session},
    config::{CorsOrigin, StorageConfig},
    gateway::PaymentGateway,
    openapi::ApiDoc,
    store::{LedgerStore, MemoryStore, PostgresStore, StoreError, models::UserCreateRequest},
};

/// Application state shared across all request handlers.
///
/// Everything a handler needs: the ledger store, the payment gateway, and the
/// configuration. Cloning is cheap, the store and gateway sit behind [`Arc`]s.
#[derive(Clone, Builder)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub config: Config,
}

/// Get the duebook database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin operator account if it doesn't exist.
///
/// Idempotent: an existing account with the configured email is left alone,
/// and when `admin_password` is unset nothing is created at all. Called on
/// every startup so a fresh installation always has someone who can log in.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(
    config: &Config,
    store: &dyn LedgerStore,
) -> anyhow::Result<()> {
    let Some(admin_password) = config.admin_password.as_deref() else {
        debug!("admin_password not set, skipping initial admin account");
        return Ok(());
    };

    if store.get_user_by_email(&config.admin_email).await?.is_some() {
        debug!(email = %config.admin_email, "initial admin account already exists");
        return Ok(());
    }

    let password_hash = password::hash_password(admin_password, &config.auth.password)
        .map_err(|e| anyhow::anyhow!("Failed to hash initial admin password: {e}"))?;

    let request = UserCreateRequest {
        email: config.admin_email.clone(),
        name: "Administrator".to_string(),
        password_hash: Some(password_hash),
        is_admin: true,
    };
    match store.create_user(&request).await {
        Ok(user) => {
            info!(email = %user.email, "created initial admin account");
            Ok(())
        }
        // Lost a startup race against another replica; the account exists.
        Err(StoreError::DuplicateEmail { .. }) => Ok(()),
        Err(err) => Err(anyhow::anyhow!("Failed to create initial admin account: {err}")),
    }
}

/// Setup the ledger store from configuration, running migrations for Postgres.
/// Returns the store plus the pool (if any) so it can be closed on shutdown.
async fn setup_store(config: &Config) -> anyhow::Result<(Arc<dyn LedgerStore>, Option<PgPool>)> {
    match &config.storage {
        StorageConfig::Memory => {
            info!("Using in-memory storage; the ledger will not survive a restart");
            Ok((Arc::new(MemoryStore::new()), None))
        }
        StorageConfig::Postgres {
            url,
            max_connections,
        } => {
            info!("Using external PostgreSQL storage");
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(*max_connections)
                .connect(url)
                .await?;
            migrator().run(&pool).await?;
            Ok((Arc::new(PostgresStore::new(pool.clone())), Some(pool)))
        }
    }
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.cors.allow_credentials)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
///
/// - Authentication routes (login, logout, me)
/// - Admin ledger routes under `/admin/api/v1`
/// - Member-facing order creation and the gateway webhook at the root
/// - API docs (Scalar UI plus the raw OpenAPI document)
/// - CORS and tracing middleware
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    // Authentication routes (at root level, shared by admin UI and tooling)
    let auth_routes = Router::new()
        .route("/authentication/login", post(api::handlers::auth::login))
        .route("/authentication/logout", post(api::handlers::auth::logout))
        .route("/authentication/me", get(api::handlers::auth::me))
        .with_state(state.clone());

    // Admin API routes
    let api_routes = Router::new()
        // Member management
        .route("/members", get(api::handlers::members::list_members))
        .route("/members", post(api::handlers::members::create_member))
        .route("/members/{id}", get(api::handlers::members::get_member))
        .route("/members/{id}", patch(api::handlers::members::update_member))
        .route("/members/{id}", delete(api::handlers::members::delete_member))
        .route(
            "/members/{id}/dues",
            get(api::handlers::members::list_member_dues),
        )
        // Dues ledger
        .route("/dues", get(api::handlers::dues::list_dues))
        .route("/dues/manual", post(api::handlers::dues::record_manual_payment))
        .route("/dues/backfill", post(api::handlers::dues::backfill_dues))
        .route("/dues/{id}", delete(api::handlers::dues::delete_dues_record))
        // Expenditures
        .route(
            "/expenditures",
            get(api::handlers::expenditures::list_expenditures),
        )
        .route(
            "/expenditures",
            post(api::handlers::expenditures::create_expenditure),
        )
        .route(
            "/expenditures/{id}",
            delete(api::handlers::expenditures::delete_expenditure),
        )
        // Billing settings, reports, on-demand generation
        .route("/settings", get(api::handlers::settings::get_settings))
        .route("/settings", put(api::handlers::settings::update_settings))
        .route("/reports/summary", get(api::handlers::reports::get_summary))
        .route("/billing/run", get(api::handlers::billing::run))
        .with_state(state.clone());

    let router = Router::new()
        .route("/health", get(|| async { "OK" }))
        // Member-facing payment link creation (no session; records are
        // referenced by unguessable ids)
        .route("/orders", post(api::handlers::orders::create_order))
        // Webhook route (gateway deliveries, authenticated by signature)
        .route(
            "/webhooks/payment",
            post(api::handlers::webhooks::payment_webhook),
        )
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .with_state(state.clone())
        .merge(auth_routes)
        .nest("/admin/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    // Create CORS layer from config
    let cors_layer = create_cors_layer(&state.config)?;
    let router = router.layer(cors_layer);

    // Add tracing layer
    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Container for background services and their lifecycle management.
///
/// Currently that is just the billing scheduler. The struct provides a
/// [`shutdown`](BackgroundServices::shutdown) method to stop all tasks
/// gracefully; when dropped, the `drop_guard` cancels the shutdown token so
/// tasks stop even without an explicit shutdown call.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<tokio_util::sync::DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        // Signal all background tasks to shutdown
        self.shutdown_token.cancel();

        // Wait for all background tasks to complete
        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

/// Setup background services (billing scheduler)
fn setup_background_services(
    store: Arc<dyn LedgerStore>,
    config: &Config,
    shutdown_token: CancellationToken,
) -> BackgroundServices {
    let drop_guard = shutdown_token.clone().drop_guard();
    // Track all background task handles for graceful shutdown
    let mut background_tasks = Vec::new();

    if config.billing.scheduler_enabled {
        let interval = config.billing.scheduler_interval;
        let scheduler_shutdown = shutdown_token.clone();
        let handle = tokio::spawn(async move {
            info!("Starting billing scheduler");
            billing::run_scheduler(store, interval, scheduler_shutdown).await;
        });
        background_tasks.push(handle);
    }

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// Main application struct that owns all resources and lifecycle.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects storage, runs migrations,
///    creates the initial admin account, and starts background services
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts
///    handling requests
/// 3. **Shutdown**: when the shutdown signal resolves, background tasks are
///    stopped and database connections closed
pub struct Application {
    router: Router,
    app_state: AppState,
    config: Config,
    pool: Option<PgPool>,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(mut config: Config) -> anyhow::Result<Self> {
        debug!("Starting duebook with configuration: {:#?}", config);

        if config.secret_key.is_none() {
            warn!(
                "secret_key is not configured; generated an ephemeral one, \
                 sessions will not survive a restart"
            );
            config.secret_key = Some(session::generate_secret_key());
        }

        // Connect storage, run migrations, and bootstrap the admin account
        let (store, pool) = setup_store(&config).await?;
        create_initial_admin_user(&config, store.as_ref()).await?;

        let gateway = gateway::from_config(&config.gateway);

        // Create a shutdown token for coordinating graceful shutdown of background tasks
        let shutdown_token = CancellationToken::new();
        let bg_services =
            setup_background_services(store.clone(), &config, shutdown_token.clone());

        // Build app state and router
        let app_state = AppState::builder()
            .store(store)
            .gateway(gateway)
            .config(config.clone())
            .build();

        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            app_state,
            config,
            pool,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, AppState) {
        // Cookies persist across requests so tests can log in once and keep
        // the session, the way a browser client would.
        let server = axum_test::TestServer::builder()
            .save_cookies()
            .build(self.router.into_make_service())
            .expect("Failed to create test server");
        (server, self.app_state)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "duebook listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        // Run the server with graceful shutdown
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        // Shutdown background services and wait for tasks to complete
        self.bg_services.shutdown().await;

        // Close database connections
        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        Ok(())
    }
}
