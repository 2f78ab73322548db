pub mod loader;
pub mod models;
pub mod photo;

pub use loader::{BackendClient, CatalogLoader, CatalogSource, LoadOutcome};
pub use models::{PhotoSource, ProductId, ProductRecord, ProductView};
