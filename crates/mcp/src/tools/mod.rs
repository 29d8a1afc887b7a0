pub mod news;
mod registry;

pub use news::GetNewsTool;
pub use registry::{Tool, ToolRegistry};
