//! Authentication for operator accounts.
//!
//! Browser-based session authentication only: operators log in via
//! `/authentication/login` with email and password, receive a signed JWT in
//! a secure HTTP-only cookie, and every admin route extracts and verifies
//! that cookie. Passwords are hashed with Argon2id.
//!
//! # Modules
//!
//! - [`current_user`]: Extractors for getting the authenticated operator in handlers
//! - [`password`]: Password hashing and verification using Argon2
//! - [`session`]: JWT session token creation and verification

pub mod current_user;
pub mod password;
pub mod session;
