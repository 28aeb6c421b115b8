#![warn(clippy::pedantic)]

pub mod adapter;
pub mod config;
pub mod error;

pub use adapter::FieldAdapter;
pub use config::AdapterConfig;
pub use error::AdapterError;
