//! HTTP request handlers for all API endpoints.
//!
//! This module contains Axum route handlers organized by resource type.
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Authentication and authorization checks
//! - Business logic execution via the ledger store
//! - Response serialization
//!
//! # Handler Modules
//!
//! - [`auth`]: Login, logout, and session introspection
//! - [`billing`]: On-demand dues generation
//! - [`dues`]: Dues listing, manual settlement, backfill, and deletion
//! - [`expenditures`]: Expenditure recording and history
//! - [`members`]: Member enrollment, management, and per-member dues
//! - [`orders`]: Payment link creation for members
//! - [`reports`]: Financial summary
//! - [`settings`]: The monthly fee singleton
//! - [`webhooks`]: Signed gateway callbacks
//!
//! # Authentication
//!
//! Admin handlers take the [`crate::auth::current_user::AdminUser`] extractor,
//! which rejects requests without a valid admin session. The order endpoint is
//! open (members pay without accounts) and the webhook authenticates via its
//! HMAC signature instead.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which automatically converts to
//! appropriate HTTP status codes and logs at a severity matched to the cause.

pub mod auth;
pub mod billing;
pub mod dues;
pub mod expenditures;
pub mod members;
pub mod orders;
pub mod reports;
pub mod settings;
pub mod webhooks;
