//! Per-aircraft trail buffers.
//!
//! The buffer keeps typed points for the lifecycle logic plus flat `f32`
//! vertex and color arrays laid out the way a GPU line buffer expects.
//! Flat arrays are sized to `capacity * 3` and grow by doubling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::color::color_for;
use crate::models::{ColorMode, TrailPoint, TrailState};
use crate::spatial::{continuous_runs, GapPolicy, SceneProjection};

pub const DEFAULT_CAPACITY: usize = 1000;
const COMPONENTS: usize = 3;

/// Growable point buffer with flat vertex/color mirrors.
///
/// Points are kept in time order; trimming only ever removes a prefix.
#[derive(Debug, Clone)]
pub struct TrailBuffer {
    points: Vec<TrailPoint>,
    vertices: Vec<f32>,
    colors: Vec<f32>,
    capacity: usize,
}

impl Default for TrailBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl TrailBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: Vec::with_capacity(capacity),
            vertices: vec![0.0; capacity * COMPONENTS],
            colors: vec![0.0; capacity * COMPONENTS],
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn points(&self) -> &[TrailPoint] {
        &self.points
    }

    pub fn last(&self) -> Option<&TrailPoint> {
        self.points.last()
    }

    /// Populated part of the xyz vertex array.
    pub fn vertices(&self) -> &[f32] {
        &self.vertices[..self.points.len() * COMPONENTS]
    }

    /// Populated part of the rgb color array.
    pub fn colors(&self) -> &[f32] {
        &self.colors[..self.points.len() * COMPONENTS]
    }

    /// Append a point and recolor the whole buffer.
    pub fn push(&mut self, point: TrailPoint, mode: ColorMode) {
        if self.points.len() >= self.capacity {
            self.grow(self.capacity * 2);
        }

        self.write_vertex(self.points.len(), &point);
        self.points.push(point);

        self.recolor(mode);
    }

    fn write_vertex(&mut self, idx: usize, point: &TrailPoint) {
        let offset = idx * COMPONENTS;
        self.vertices[offset] = point.x as f32;
        self.vertices[offset + 1] = point.y as f32;
        self.vertices[offset + 2] = point.z as f32;
    }

    /// Append many points, coloring once at the end.
    pub fn extend(&mut self, points: impl IntoIterator<Item = TrailPoint>, mode: ColorMode) {
        for point in points {
            if self.points.len() >= self.capacity {
                self.grow(self.capacity * 2);
            }
            self.write_vertex(self.points.len(), &point);
            self.points.push(point);
        }
        self.recolor(mode);
    }

    /// Recompute every point color for `mode`.
    pub fn recolor(&mut self, mode: ColorMode) {
        for (idx, point) in self.points.iter().enumerate() {
            let offset = idx * COMPONENTS;
            let color = color_for(point, mode).as_array();
            self.colors[offset..offset + COMPONENTS].copy_from_slice(&color);
        }
    }

    /// Drop leading points captured before `cutoff`. Capacity is unchanged.
    pub fn trim_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let removed = self
            .points
            .iter()
            .take_while(|point| point.timestamp < cutoff)
            .count();
        if removed == 0 {
            return 0;
        }

        let len = self.points.len();
        let from = removed * COMPONENTS;
        let to = len * COMPONENTS;
        self.vertices.copy_within(from..to, 0);
        self.colors.copy_within(from..to, 0);
        self.points.drain(..removed);
        removed
    }

    fn grow(&mut self, new_capacity: usize) {
        let used = self.points.len() * COMPONENTS;

        let mut vertices = vec![0.0; new_capacity * COMPONENTS];
        vertices[..used].copy_from_slice(&self.vertices[..used]);
        let mut colors = vec![0.0; new_capacity * COMPONENTS];
        colors[..used].copy_from_slice(&self.colors[..used]);

        self.vertices = vertices;
        self.colors = colors;
        self.points.reserve_exact(new_capacity - self.points.len());
        tracing::trace!("Trail buffer grew {} -> {}", self.capacity, new_capacity);
        self.capacity = new_capacity;
    }
}

/// Accumulated trail for one aircraft.
#[derive(Debug, Clone)]
pub struct Trail {
    pub hex: String,
    pub state: TrailState,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    buffer: TrailBuffer,
}

impl Trail {
    pub fn new(hex: impl Into<String>, capacity: usize, now: DateTime<Utc>) -> Self {
        Self {
            hex: hex.into(),
            state: TrailState::Active,
            created_at: now,
            last_update: now,
            buffer: TrailBuffer::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, point: TrailPoint, mode: ColorMode) {
        if point.timestamp > self.last_update {
            self.last_update = point.timestamp;
        }
        self.buffer.push(point, mode);
    }

    pub fn extend(&mut self, points: Vec<TrailPoint>, mode: ColorMode) {
        if let Some(latest) = points.iter().map(|p| p.timestamp).max() {
            if latest > self.last_update {
                self.last_update = latest;
            }
        }
        self.buffer.extend(points, mode);
    }

    pub fn recolor(&mut self, mode: ColorMode) {
        self.buffer.recolor(mode);
    }

    pub fn trim_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        self.buffer.trim_before(cutoff)
    }

    pub fn buffer(&self) -> &TrailBuffer {
        &self.buffer
    }

    pub fn positions(&self) -> &[TrailPoint] {
        self.buffer.points()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn summary(&self) -> TrailSummary {
        TrailSummary {
            hex: self.hex.clone(),
            state: self.state,
            points: self.len(),
            capacity: self.capacity(),
            last_update: self.last_update,
        }
    }

    /// Render-facing view: points, colors and connected runs.
    pub fn snapshot(&self, projection: &SceneProjection, gap: &GapPolicy) -> TrailSnapshot {
        let colors = self
            .buffer
            .colors()
            .chunks_exact(COMPONENTS)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        let segments = continuous_runs(self.positions(), projection, gap)
            .into_iter()
            .map(|run| [run.start, run.end])
            .collect();

        TrailSnapshot {
            hex: self.hex.clone(),
            state: self.state,
            capacity: self.capacity(),
            last_update: self.last_update,
            positions: self.positions().to_vec(),
            colors,
            segments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailSummary {
    pub hex: String,
    pub state: TrailState,
    pub points: usize,
    pub capacity: usize,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailSnapshot {
    pub hex: String,
    pub state: TrailState,
    pub capacity: usize,
    pub last_update: DateTime<Utc>,
    pub positions: Vec<TrailPoint>,
    pub colors: Vec<[f32; 3]>,
    /// Half-open `[start, end)` index ranges of connected runs
    pub segments: Vec<[usize; 2]>,
}
