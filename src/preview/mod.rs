pub mod provider;

pub use provider::{LinkPreviewProvider, PreviewResolver, PreviewResponse};
