//! Herdsync twin store.
//!
//! The pipeline depends only on the [`TwinStore`] contract. Two backends ship:
//! - [`InMemoryTwinStore`] for development and tests (with fault injection)
//! - [`HttpTwinStore`] for a digital-twins REST endpoint speaking JSON patch

mod error;
mod http;
mod memory;
mod traits;

pub use error::{StoreError, StoreResult};
pub use http::{HttpTwinStore, DEFAULT_API_VERSION};
pub use memory::{Fault, InMemoryTwinStore};
pub use traits::TwinStore;
