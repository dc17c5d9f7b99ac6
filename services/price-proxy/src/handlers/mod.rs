//! API handlers for the proxy and monitoring endpoints

pub mod health;
pub mod price;

pub use health::HealthHandlers;
pub use price::PriceHandlers;
