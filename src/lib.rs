//! Chart enrichment library - shared modules for all binaries.

pub mod auth;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod enrich;
pub mod error;
pub mod http;
pub mod leaderboard;
pub mod logging;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod safety;
pub mod stages;
pub mod table;

pub use error::{Error, Result};
