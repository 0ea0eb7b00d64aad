//! # mercado-server
//!
//! HTTP API for Mercado: the public catalog, the admin back office and the
//! live change feed, served by axum over `mercado-db`.
//!
//! ## Request Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  request ──► TraceLayer ──► CORS ──► Router                             │
//! │                                        │                                │
//! │                 ┌──────────────────────┼─────────────────────┐          │
//! │                 ▼                      ▼                     ▼          │
//! │          /api/catalog/*        /api/admin/* (AdminSession)  /api/feed   │
//! │                 │                      │                     │          │
//! │                 └──────────┬───────────┘                     │          │
//! │                            ▼                                 │          │
//! │               mercado-db repositories ──► publish ───────────┘          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod feed;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::build_router;
pub use state::AppState;
