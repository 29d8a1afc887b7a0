//! API endpoint groups.

pub mod news;

pub use news::{NewsApi, UpstreamNewsBody, UpstreamNewsItem};
