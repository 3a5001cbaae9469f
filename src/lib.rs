//! temotes library
//!
//! Fetches chat emotes from several providers through a shared TTL cache and
//! normalizes them into one `Emote` shape. The binary in `main.rs` is a thin
//! wrapper around these modules.

pub mod aggregate;
pub mod cache;
pub mod cli;
pub mod config;
pub mod providers;
