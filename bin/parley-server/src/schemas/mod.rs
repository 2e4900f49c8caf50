//! HTTP request / response types.
//!
//! These mirror the core types with OpenAPI schemas attached so the core
//! crate stays free of HTTP concerns.

pub mod chat;
pub mod config;
pub mod models;
pub mod persona;
