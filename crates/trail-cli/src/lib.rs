//! Trail CLI - command line tools for ADS-B track data.
//!
//! - smooth_track: run the altitude smoother over a stored or fetched track

pub mod tracks;

pub use tracks::{fetch_track, parse_document, smooth_tracks, InputTrack, SmoothedTrackOutput};
