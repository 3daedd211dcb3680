//! Stocktake Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `AuditSession`, `Reconciliation`, `ActivityEntry`
//! - **Use cases** - `AuditWorkflowUseCase`
//! - **Port definitions** - `IAuditRepository` for the record store adapter
//! - **State machine** - two-tier supervisor verification of audits
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases orchestrate domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
