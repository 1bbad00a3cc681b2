// src/source.rs

use crate::types::{Frame, SourceConfig};
use anyhow::{bail, Result};
use opencv::{
    imgcodecs,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A finite, forward-only sequence of timestamped frames. Not restartable;
/// once `next_frame` returns `None` the stream is exhausted.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

pub fn open(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    match config {
        SourceConfig::Video { path } => Ok(Box::new(VideoSource::open(Path::new(path))?)),
        SourceConfig::Frames {
            dir,
            begin,
            end,
            fps,
        } => {
            if *fps <= 0.0 {
                bail!("frame sequence fps must be positive, got {fps}");
            }
            if begin > end {
                bail!("frame range is empty: begin={begin} end={end}");
            }
            Ok(Box::new(ImageSequenceSource::new(
                PathBuf::from(dir),
                *begin,
                *end,
                *fps,
            )))
        }
    }
}

pub struct VideoSource {
    cap: VideoCapture,
    fps: f64,
    current_frame: i32,
}

impl VideoSource {
    pub fn open(path: &Path) -> Result<Self> {
        info!("opening video: {}", path.display());

        let cap = VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)?;
        if !cap.is_opened()? {
            bail!("failed to open video file {}", path.display());
        }

        let fps = cap.get(videoio::CAP_PROP_FPS)?;
        let total_frames = cap.get(videoio::CAP_PROP_FRAME_COUNT)? as i64;
        let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;

        info!(
            "video properties: {}x{} @ {:.1} FPS, {} frames",
            width, height, fps, total_frames
        );

        Ok(Self {
            cap,
            fps,
            current_frame: 0,
        })
    }
}

impl FrameSource for VideoSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut mat = Mat::default();
        if !self.cap.read(&mut mat)? || mat.empty() {
            return Ok(None);
        }
        self.current_frame += 1;

        // Presentation timestamp from the decoder; some backends report none.
        let pts_ms = self.cap.get(videoio::CAP_PROP_POS_MSEC)?;
        let timestamp_ms = if pts_ms > 0.0 {
            pts_ms
        } else if self.fps > 0.0 {
            self.current_frame as f64 / self.fps * 1000.0
        } else {
            self.current_frame as f64
        };

        Ok(Some(Frame {
            width: mat.cols(),
            height: mat.rows(),
            data: mat.data_bytes()?.to_vec(),
            timestamp_ms,
        }))
    }
}

/// Reads `frame_NNNN.png` stills from a directory over an inclusive index
/// range, timestamping them at a fixed nominal frame rate.
pub struct ImageSequenceSource {
    dir: PathBuf,
    begin: u32,
    end: u32,
    next_index: u32,
    frame_interval_ms: f64,
}

impl ImageSequenceSource {
    pub fn new(dir: PathBuf, begin: u32, end: u32, fps: f64) -> Self {
        Self {
            dir,
            begin,
            end,
            next_index: begin,
            frame_interval_ms: 1000.0 / fps,
        }
    }

    fn frame_path(&self, index: u32) -> PathBuf {
        self.dir.join(format!("frame_{index:04}.png"))
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        while self.next_index <= self.end {
            let index = self.next_index;
            self.next_index += 1;

            let path = self.frame_path(index);
            let mat = imgcodecs::imread(&path.to_string_lossy(), imgcodecs::IMREAD_COLOR)?;
            if mat.empty() {
                warn!("unreadable frame image, skipping: {}", path.display());
                continue;
            }

            let timestamp_ms = (index - self.begin) as f64 * self.frame_interval_ms;
            return Ok(Some(Frame {
                width: mat.cols(),
                height: mat.rows(),
                data: mat.data_bytes()?.to_vec(),
                timestamp_ms,
            }));
        }
        Ok(None)
    }
}
