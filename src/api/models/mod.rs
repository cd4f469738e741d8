//! API request and response data models.
//!
//! These are the structures that cross the HTTP boundary; they are distinct
//! from the storage models in [`crate::store::models`] so the public contract
//! can evolve independently of how the ledger is persisted. All of them carry
//! `utoipa` annotations for the generated OpenAPI document.

pub mod auth;
pub mod dues;
pub mod expenditures;
pub mod members;
pub mod orders;
pub mod settings;
