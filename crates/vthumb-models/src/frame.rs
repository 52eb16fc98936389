//! Per-frame feature descriptors.
//!
//! These are produced once per sampled frame by the external subject
//! detector and are the only input the scene classifier reads. Pixel data
//! never travels with them: a frame is referenced through [`FrameRef`] and
//! resolved lazily by the persistence collaborator.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    /// Left edge x-coordinate
    pub x: f64,
    /// Top edge y-coordinate
    pub y: f64,
    /// Box width
    pub width: f64,
    /// Box height
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Create from corner coordinates (x1, y1, x2, y2), as detectors emit them.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x: x1,
            y: y1,
            width: (x2 - x1).max(0.0),
            height: (y2 - y1).max(0.0),
        }
    }

    /// Center x-coordinate.
    #[inline]
    pub fn cx(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Center y-coordinate.
    #[inline]
    pub fn cy(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Box area in pixels.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// A detected subject (person) inside a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Subject {
    /// Detection box in pixel coordinates
    pub bbox: BoundingBox,
    /// Detector confidence (0-1)
    pub confidence: f64,
    /// Box area divided by frame area (0-1)
    pub coverage_fraction: f64,
}

impl Subject {
    /// Create a subject, deriving coverage from the frame dimensions.
    pub fn new(bbox: BoundingBox, confidence: f64, frame_width: u32, frame_height: u32) -> Self {
        let frame_area = frame_width as f64 * frame_height as f64;
        let coverage_fraction = if frame_area > 0.0 {
            (bbox.area() / frame_area).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            bbox,
            confidence: confidence.clamp(0.0, 1.0),
            coverage_fraction,
        }
    }

    /// Create a subject with an explicit coverage fraction.
    pub fn with_coverage(confidence: f64, coverage_fraction: f64) -> Self {
        Self {
            bbox: BoundingBox::new(0.0, 0.0, 0.0, 0.0),
            confidence: confidence.clamp(0.0, 1.0),
            coverage_fraction: coverage_fraction.clamp(0.0, 1.0),
        }
    }
}

/// Lightweight handle to a decoded frame.
///
/// The persistence collaborator resolves it back to pixels when writing
/// the selected thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameRef {
    /// Index of the frame in the decoded sequence
    pub frame_index: u64,
    /// Presentation timestamp in seconds
    pub timestamp: f64,
}

impl FrameRef {
    pub fn new(frame_index: u64, timestamp: f64) -> Self {
        Self {
            frame_index,
            timestamp,
        }
    }
}

/// Feature descriptor for one sampled frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameFeatures {
    /// Index of the frame in the decoded sequence
    #[serde(default)]
    pub frame_index: u64,

    /// Presentation timestamp in seconds (>= 0)
    pub timestamp: f64,

    /// Subject detections
    #[serde(default)]
    pub subjects: Vec<Subject>,

    /// Mean luma on the 0-255 scale
    #[serde(default)]
    pub brightness: f64,

    /// Mean HSV saturation normalized to 0-1
    #[serde(default)]
    pub saturation: f64,

    /// Fraction of pixels on an edge (0-1)
    #[serde(default)]
    pub edge_density: f64,

    /// Grayscale pixel variance
    #[serde(default)]
    pub variance: f64,
}

impl FrameFeatures {
    /// Create features for a frame with no detections and neutral statistics.
    pub fn new(frame_index: u64, timestamp: f64) -> Self {
        Self {
            frame_index,
            timestamp,
            subjects: Vec::new(),
            brightness: 128.0,
            saturation: 0.0,
            edge_density: 0.0,
            variance: 0.0,
        }
    }

    /// Set subject detections.
    pub fn with_subjects(mut self, subjects: Vec<Subject>) -> Self {
        self.subjects = subjects;
        self
    }

    /// Set pixel statistics.
    pub fn with_stats(mut self, brightness: f64, saturation: f64, edge_density: f64, variance: f64) -> Self {
        self.brightness = brightness;
        self.saturation = saturation;
        self.edge_density = edge_density;
        self.variance = variance;
        self
    }

    /// Handle for this frame.
    pub fn frame_ref(&self) -> FrameRef {
        FrameRef::new(self.frame_index, self.timestamp)
    }

    /// Check the descriptor is usable.
    ///
    /// Rejects negative or non-finite timestamps and non-finite statistics.
    /// Out-of-range but finite statistics are accepted; the classifier
    /// clamps them.
    pub fn validate(&self) -> ModelResult<()> {
        if !self.timestamp.is_finite() || self.timestamp < 0.0 {
            return Err(ModelError::invalid_features(format!(
                "frame {} has invalid timestamp {}",
                self.frame_index, self.timestamp
            )));
        }

        let stats = [
            ("brightness", self.brightness),
            ("saturation", self.saturation),
            ("edge_density", self.edge_density),
            ("variance", self.variance),
        ];
        if let Some((name, _)) = stats.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ModelError::invalid_features(format!(
                "frame {} has non-finite {}",
                self.frame_index, name
            )));
        }

        Ok(())
    }
}
