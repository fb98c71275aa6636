//! Gateway: single-port HTTP server for the provider webhook and the admin API.
//!
//! Routes: `GET /` health, `GET|POST /webhook`, and `/api/*` admin endpoints guarded by an
//! optional bearer token.

mod admin;
mod server;

pub use server::{build_backend, build_channel, router, run_gateway, serve, GatewayState};
