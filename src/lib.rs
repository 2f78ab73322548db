pub mod api;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod media;
pub mod orchestrator;
pub mod pipeline;
pub mod preview;
pub mod search;
pub mod store;

pub mod util {
    pub mod env;
}

pub use config::GalleryConfig;
pub use orchestrator::{mount, GalleryHandle, GalleryServices, SessionReport};
pub use store::ProductStore;
