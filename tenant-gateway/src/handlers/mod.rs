//! HTTP handlers.

pub mod connections;
pub mod databases;
pub mod health;
pub mod records;
