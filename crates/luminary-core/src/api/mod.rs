//! REST API client for the Luminary study backend.
//!
//! This module provides the `ApiClient` used by the sync engine to download
//! study content and replay offline review/quiz results. All calls are
//! authenticated with a bearer token supplied by the host application.
//!
//! The backend is the excluded collaborator: only the four operations the
//! sync subsystem needs are exposed here.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
