//! # relay-server
//!
//! Axum adapters around [`relay_core`]:
//!
//! - `GET /ws`: clients join and leave user, vendor and area groups and
//!   receive relayed notifications
//! - `POST /notify-*`: backends publish notifications
//! - `GET /health`, `GET /metrics`: operational endpoints
//!
//! [`server::start`] binds the listener and returns a [`server::ServerHandle`]
//! used for graceful shutdown.

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod protocol;
pub mod server;
pub mod session;
pub mod shutdown;

pub use config::ServerConfig;
pub use server::{build_router, start, AppState, ServerHandle};
