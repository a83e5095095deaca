//! Infrastructure - concrete adapters for external concerns

pub mod storage;

pub use storage::InMemoryOrderStore;
