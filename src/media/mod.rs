pub mod normalizer;

pub use normalizer::{HttpImageFetcher, ImageFetcher, ImageNormalizer, SquareCrop};
