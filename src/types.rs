use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub detection: DetectionConfig,
    pub run: RunConfig,
    pub fit: FitConfig,
    pub chart: ChartConfig,
    pub logging: LoggingConfig,
}

/// Where the frames come from: a video file, or a directory of numbered
/// stills captured at a known frame rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Video {
        path: String,
    },
    Frames {
        dir: String,
        /// Inclusive index range of `frame_NNNN.png` files.
        begin: u32,
        end: u32,
        #[serde(default = "default_sequence_fps")]
        fps: f64,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Video {
            path: "resource/screencap.mp4".to_string(),
        }
    }
}

fn default_sequence_fps() -> f64 {
    60.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Reference note color, BGR as decoded.
    pub color: [u8; 3],
    /// Symmetric per-channel tolerance around the reference color.
    pub delta: [u8; 3],
    /// Sub-rectangle of the frame to scan; the whole frame when absent.
    pub roi: Option<RoiConfig>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            color: [255, 243, 243],
            delta: [10, 10, 10],
            roi: Some(RoiConfig {
                x: 1046,
                y: 0,
                width: 217,
                height: 720,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoiConfig {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// A run must begin at or above this position to be kept.
    pub entry_max: f64,
    /// A run must end at or below this position to be kept.
    pub exit_min: f64,
    /// Position whose closest entry becomes the run's zero point.
    pub anchor_reference: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            entry_max: 10.0,
            exit_min: 570.0,
            anchor_reference: 564.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub degree: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self { degree: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub show: bool,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self { show: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "drop_timing=info".to_string(),
        }
    }
}

/// One decoded frame. Carries raw BGR bytes so only the opencv-facing
/// modules rebuild `Mat`s.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: i32,
    pub height: i32,
    pub timestamp_ms: f64,
}

/// Bounding box of one detected region, in coordinates relative to the
/// scanned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn center_y(&self) -> f64 {
        self.y as f64 + self.height as f64 / 2.0
    }
}

/// One (position, time-to-anchor) observation fed to the curve fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub position: f64,
    pub delay_ms: f64,
}

/// Accumulates the samples of every accepted run across the whole stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    samples: Vec<Sample>,
}

impl SampleSet {
    pub fn extend(&mut self, run: Vec<Sample>) {
        self.samples.extend(run);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }
}
