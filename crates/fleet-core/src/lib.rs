//! The orchestrator engine: retry/backoff timing, the two collection
//! strategies, worker lifecycle, the worker pool, the reconciliation
//! orchestrator, and the client-facing diagnostics fan-out.
//!
//! This crate depends only on `fleet-types` plus the async runtime — it is
//! built entirely against the [`traits::DeviceClient`], [`traits::Repository`],
//! and [`traits::ChangeNotifier`] abstractions so that `fleet-client` and
//! `fleet-store` can be swapped or faked without touching the engine.

pub mod fanout;
pub mod orchestrator;
pub mod pool;
pub mod polling;
pub mod retry;
pub mod streaming;
pub mod traits;
pub mod worker;

pub use fanout::{stream_diagnostics, SnapshotStream};
pub use orchestrator::Orchestrator;
pub use pool::WorkerPool;
pub use retry::RetryConfig;
pub use traits::{ChangeNotifier, DeviceClient, DiagnosticStream, NotifierEvent, NotifierStream, Repository};
pub use worker::WorkerConfig;
