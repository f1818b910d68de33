//! Application state management.

pub mod store;

pub use store::{AppState, LiveUpdate, SettingsView, StatusReport};
