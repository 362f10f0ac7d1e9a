pub mod error;
pub mod types;

pub use error::TranslationError;
pub use types::*;
