//! # tgram-core
//!
//! Core types, traits, configuration, and error handling for tgram.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;
