//! # TaskDeck API Server Library
//!
//! HTTP surface of TaskDeck: a multi-tenant project and task tracker.
//!
//! ## Modules
//!
//! - `app`: application state and router builder
//! - `config`: configuration from environment variables
//! - `error`: error envelope and HTTP status mapping
//! - `extract`: `Json`, `Path` and `Query` with enveloped rejections
//! - `middleware`: authentication and security headers
//! - `pagination`: `X-Pagination` list responses
//! - `routes`: route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod pagination;
pub mod routes;
