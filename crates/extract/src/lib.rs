pub mod classifier;
pub mod document;
pub mod image_prep;

pub use classifier::{Classification, classify};
pub use document::{ExtractError, extract_document};
pub use image_prep::{ImageBudget, ImagePrepError, PreparedImage, prepare_image};
