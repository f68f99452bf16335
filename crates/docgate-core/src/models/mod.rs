//! Data models shared across the gateway.

pub mod config;
pub mod metadata;
pub mod result;
