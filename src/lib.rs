//! modellab - chat completion proxy with cost estimation
//!
//! Forwards chat requests to an LLM aggregation API, resolves model
//! aliases, and prices each call from its token usage.

pub mod config;
pub mod error;
pub mod models;
pub mod pricing;
pub mod proxy;

pub use config::Config;
pub use error::{Error, Result};
