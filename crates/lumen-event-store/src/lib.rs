//! Lumen — `PostgreSQL` event store.

pub mod migration;
pub mod pg_event_repository;

pub use migration::run_migrations;
pub use pg_event_repository::PgEventRepository;
