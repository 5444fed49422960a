//! Core types, config, errors, response normalization, and session state for Posterflow.

pub mod config;
pub mod error;
pub mod response;
pub mod session;
pub mod types;

pub use error::{PosterError, Result};
