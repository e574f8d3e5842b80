pub mod auth;
pub mod client;
pub mod error;
pub mod types;

pub use auth::{GraphAuthConfig, TokenProvider};
pub use client::{GraphApi, HttpGraphClient};
pub use error::GraphError;
