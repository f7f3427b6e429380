// Repositories module - persistence layer

pub mod cart_repository;
pub mod store;

pub use cart_repository::{CartRepository, LocalCartRepository, DEFAULT_CART_KEY};
pub use store::{FileStore, InMemoryStore, KeyValueStore};
