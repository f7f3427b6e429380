// Services module - business logic layer

pub mod cart_service;
pub mod catalog;
pub mod notifier;

pub use cart_service::CartService;
pub use catalog::{CatalogApi, HttpCatalogClient};
pub use notifier::{Notifier, RecordingNotifier, TracingNotifier};
