pub mod error;
pub mod model;

// Re-export key types for easier usage
pub use error::ModelError;
pub use model::*;
