// Core types and argument validation for the Nefino news adapter

pub mod error;
pub mod news;
pub mod schema;
pub mod types;
pub mod validation;

pub use error::{ValidationError, ValidationResult};
pub use news::{NewsItem, NewsQuery, NewsResult, SearchWindow};
pub use schema::{FieldKind, FieldSpec, InputSchema};
pub use types::*;
