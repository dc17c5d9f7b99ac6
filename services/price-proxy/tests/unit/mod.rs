//! Unit tests module organization

pub mod client;
pub mod config;
pub mod middleware;

// Test utilities and helpers
pub mod helpers;
