pub mod color;
pub mod lifecycle;
pub mod load;
pub mod models;
pub mod settings;
pub mod smoothing;
pub mod spatial;
pub mod trail;

pub use color::{color_for, Rgb};
pub use lifecycle::{
    FadeSweep, GapConnector, IngestOutcome, RebuildOutcome, RetireOutcome, TrailManager,
};
pub use load::{LoadGeneration, LoadTicket};
pub use models::{
    normalize_batch, normalize_hex, ColorMode, PositionSample, RawSample, SampleError, Track,
    TrailPoint, TrailState,
};
pub use settings::{FadeDuration, FadeSettings, TrailSettings};
pub use smoothing::{smooth_altitudes, smooth_samples, SmoothReport, SmoothedTrack};
pub use spatial::{haversine_distance, is_gap, GapPolicy, SceneProjection};
pub use trail::{Trail, TrailBuffer, TrailSnapshot, TrailSummary};
