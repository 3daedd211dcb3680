//! Stocktake Activity - Journal of workflow outcomes
//!
//! Provides:
//! - `ActivityLogger`: records every creation and approval attempt
//! - `ReasonCode`: structured codes for rejected attempts
//! - Integration with `IAuditRepository` for persistent journal storage

pub mod logger;
pub mod reason;

pub use logger::ActivityLogger;
pub use reason::ReasonCode;
