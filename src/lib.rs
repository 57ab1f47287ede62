//! Publishing-service proxy for notebook servers.
//!
//! Publish a local document to a remote publishing service, fetch and update
//! the published copy, preview it, pull it back into local storage and search
//! for collaborators, all behind an axum router a host mounts under its own
//! base URL.

pub mod client;
pub mod config;
pub mod content;
pub mod error;
pub mod identity;
pub mod models;
pub mod server;
