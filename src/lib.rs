// ABOUTME: Library root for crio-hook-installer - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fs;
pub mod handler;
pub mod hooks;
pub mod output;
pub mod socket;
pub mod types;
