//! Postgres-backed implementations of `fleet_core`'s `Repository` and
//! `ChangeNotifier` traits.

pub mod notifier;
pub mod repository;

pub use notifier::PostgresNotifier;
pub use repository::PostgresRepository;
