//! # hpo-store
//!
//! Durable, concurrent repository of studies, trials, and observations behind
//! the [`Store`] trait. [`InMemoryStore`] is the default backend; enabling the
//! `postgres` feature adds [`PostgresStore`] for a persistent deployment.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod store;

pub use memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
pub use store::Store;
