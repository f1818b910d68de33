//! Background loops for continuous processing.

pub mod cleanup_loop;
pub mod fade_loop;
pub mod live_update_loop;
