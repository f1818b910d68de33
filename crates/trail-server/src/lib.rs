//! Shared library surface for the trail server and its tests.

pub mod api;
pub mod backoff;
pub mod config;
pub mod feed;
pub mod history;
pub mod http;
pub mod loader;
pub mod loops;
pub mod state;
