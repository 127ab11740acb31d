//! Core types and trait definitions for the Colloquy answer service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends, model backends and the HTTP layers all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod chat;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod message;
pub mod model;
pub mod store;

pub use error::{BoxError, Error, Result};
