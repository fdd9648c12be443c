//! # Camel Classifier Common Library
//!
//! Shared code for the camel classifier services:
//! - Error types
//! - Configuration resolution (CLI / env / TOML / defaults)
//! - SQLite schema bootstrap and settings access
//! - Credential primitives (password digests, bearer tokens)

pub mod auth;
pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
