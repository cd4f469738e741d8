//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! The API is divided into several functional areas:
//!
//! - **Authentication** (`/authentication/*`): Login, logout, current user
//! - **Members** (`/admin/api/v1/members/*`): Member enrollment and management
//! - **Dues** (`/admin/api/v1/dues/*`): Dues records, manual settlement, backfill
//! - **Expenditures** (`/admin/api/v1/expenditures/*`): Outgoing spend tracking
//! - **Settings** (`/admin/api/v1/settings`): The monthly fee singleton
//! - **Reports** (`/admin/api/v1/reports/*`): Financial summary
//! - **Billing** (`/admin/api/v1/billing/*`): On-demand dues generation
//! - **Orders** (`/orders`): Payment link creation for members
//! - **Webhooks** (`/webhooks/payment`): Signed gateway callbacks
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! Interactive documentation is served at `/docs` when the server is running.

pub mod handlers;
pub mod models;
