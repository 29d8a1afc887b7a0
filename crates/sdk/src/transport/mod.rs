//! Transport layer for the Nefino SDK.

pub mod http;

pub use http::HttpTransport;
