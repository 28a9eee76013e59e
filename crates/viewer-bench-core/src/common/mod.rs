pub mod error;
pub mod types;

pub use error::{BatchPosition, Error, Result};
