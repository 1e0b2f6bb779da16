//! # AgriSmart
//!
//! Web service for farmers: AI crop recommendations from soil and climate
//! readings, plant disease diagnosis from photos, and a per-user history of
//! both.
//!
//! This crate provides:
//! - Email and password identity providers (local or Firebase)
//! - JSON document stores for history (memory or files)
//! - Server actions that validate input, call the advisor and save results
//! - The axum router and the `agrismart` CLI
//!
//! ## Example
//!
//! ```rust,ignore
//! use agrismart::{app, config::Config, server};
//!
//! let config = Config::load(None)?;
//! let registry = advisor::ProviderRegistry::with_defaults();
//! let state = server::AppState::new(
//!     app::build_identity(&config)?,
//!     app::build_actions(&config, &registry)?,
//!     config.server.max_body_bytes,
//! );
//! server::run_server(state, &config.server.bind_addr).await?;
//! ```

pub mod actions;
pub mod app;
pub mod auth;
pub mod config;
pub mod errors;
pub mod history;
pub mod server;
pub mod store;

pub use actions::{ActionResult, Actions, RATE_LIMIT_MESSAGE};
pub use config::Config;
pub use errors::{AppError, AuthError, StoreError};
pub use history::{History, HistoryCollection};
pub use server::{build_router, run_server, AppState};
