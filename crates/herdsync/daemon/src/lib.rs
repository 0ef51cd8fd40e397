//! Herdsync daemon library
//!
//! This module provides the core components for the herdsync daemon:
//! - Sync orchestration (fetch, validate, predict, patch, confirm, notify)
//! - Per-twin leases
//! - Periodic sweep scheduling
//! - Read API and server lifecycle

pub mod api;
pub mod config;
pub mod error;
pub mod lease;
pub mod pipeline;
pub mod scheduler;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError, SyncError};
pub use lease::LeaseRegistry;
pub use pipeline::{Confirmation, RunOutcome, RunReport, RunState, SyncOrchestrator};
pub use scheduler::{Scheduler, SweepSummary};
pub use server::Server;
