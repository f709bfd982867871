//! Forward-authentication gateway that signs users in with Plex.
//!
//! A reverse proxy (Traefik, nginx, Caddy) forwards each incoming request's
//! method, scheme, host and URI in `X-Forwarded-*` headers. The gateway
//! routes the request through the configured rules and answers:
//!
//! - `200` with `X-Forwarded-User` when the request may pass
//! - `307` to the Plex login when a session is needed
//! - `401`, `403` or `503` otherwise

pub mod app;
pub mod config;
pub mod error;
pub mod forwarded;
pub mod gateway;
pub mod handlers;
pub mod telemetry;
