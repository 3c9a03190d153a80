//! In-memory adapters, used when no durable store is configured and in tests.

pub mod entity_repository;

pub use entity_repository::InMemoryEntityRepository;
