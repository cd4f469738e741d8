//! Dues arithmetic and generation.

pub mod calculator;
pub mod generator;

pub use calculator::{DueSummary, due_periods, due_summary};
pub use generator::{BillingRun, run_billing, run_scheduler};
