//! Policy gate transport: a blocking HTTP client for the remote gate service.

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::HttpPolicyGate;
