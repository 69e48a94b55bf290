//! # panelhub-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the **JSON API** for local parts (`/binary-parts`,
//!   `/analog-parts`) and remote parts (`/remote-parts`,
//!   `/remote-analog-parts`, `/remote-binary-parts`)
//! - Stream standing reads of a remote part as **Server-Sent Events**
//! - Host the single **live observer** over a WebSocket at `/live`
//! - Map [`PanelHubError`](panelhub_domain::error::PanelHubError) into
//!   `{"message": ...}` error bodies with the matching status code
//!
//! ## Dependency rule
//! Depends on `panelhub-app` (for port traits and services) and
//! `panelhub-domain` (for domain types used in request/response mapping).
//! Never leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
