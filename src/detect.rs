// src/detect.rs

use crate::types::{BoundingBox, DetectionConfig, Frame};
use anyhow::Result;
use opencv::{
    core::{self, Mat, Point, Rect, Scalar, Vector},
    imgproc,
    prelude::*,
};

/// Finds regions of a frame whose pixels sit inside an inclusive
/// per-channel color band. A frame with zero matching pixels yields an
/// empty list: that is the gap signal between drops, not an error.
pub struct ColorBandDetector {
    lower: Scalar,
    upper: Scalar,
    roi: Option<Rect>,
}

impl ColorBandDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        let c = config.color;
        let d = config.delta;
        let lower = Scalar::new(
            c[0].saturating_sub(d[0]) as f64,
            c[1].saturating_sub(d[1]) as f64,
            c[2].saturating_sub(d[2]) as f64,
            0.0,
        );
        let upper = Scalar::new(
            c[0].saturating_add(d[0]) as f64,
            c[1].saturating_add(d[1]) as f64,
            c[2].saturating_add(d[2]) as f64,
            0.0,
        );
        let roi = config
            .roi
            .map(|r| Rect::new(r.x, r.y, r.width, r.height));
        Self { lower, upper, roi }
    }

    /// Bounding boxes of all external contours matching the band, in
    /// coordinates relative to the scanned rectangle. Pure function of the
    /// frame; no ordering guarantee on the returned boxes.
    pub fn detect(&self, frame: &Frame) -> Result<Vec<BoundingBox>> {
        let mat = Mat::from_slice(&frame.data)?;
        let mat = mat.reshape(3, frame.height)?;

        let mut mask = Mat::default();
        match self.roi {
            Some(rect) => {
                let view = Mat::roi(&mat, rect)?;
                core::in_range(&view, &self.lower, &self.upper, &mut mask)?;
            }
            None => core::in_range(&mat, &self.lower, &self.upper, &mut mask)?,
        }

        let mut contours: Vector<Vector<Point>> = Vector::new();
        imgproc::find_contours(
            &mask,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_NONE,
            Point::new(0, 0),
        )?;

        let mut boxes = Vec::with_capacity(contours.len());
        for contour in contours.iter() {
            let rect = imgproc::bounding_rect(&contour)?;
            boxes.push(BoundingBox {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
            });
        }
        Ok(boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RoiConfig;

    fn config() -> DetectionConfig {
        DetectionConfig {
            color: [255, 243, 243],
            delta: [10, 10, 10],
            roi: None,
        }
    }

    fn frame_filled(width: i32, height: i32, bgr: [u8; 3]) -> Frame {
        let mut data = vec![0u8; (width * height * 3) as usize];
        for px in data.chunks_exact_mut(3) {
            px.copy_from_slice(&bgr);
        }
        Frame {
            data,
            width,
            height,
            timestamp_ms: 0.0,
        }
    }

    fn paint_block(frame: &mut Frame, x0: i32, y0: i32, w: i32, h: i32, bgr: [u8; 3]) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                let i = ((y * frame.width + x) * 3) as usize;
                frame.data[i..i + 3].copy_from_slice(&bgr);
            }
        }
    }

    #[test]
    fn frame_without_matching_pixels_yields_empty_list() {
        let detector = ColorBandDetector::new(&config());
        let frame = frame_filled(32, 32, [0, 0, 0]);
        assert!(detector.detect(&frame).unwrap().is_empty());
    }

    #[test]
    fn single_block_yields_one_box_at_its_center() {
        let detector = ColorBandDetector::new(&config());
        let mut frame = frame_filled(32, 32, [0, 0, 0]);
        paint_block(&mut frame, 8, 10, 6, 4, [255, 243, 243]);

        let boxes = detector.detect(&frame).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].center_y(), 12.0);
    }

    #[test]
    fn color_just_inside_the_band_still_matches() {
        let detector = ColorBandDetector::new(&config());
        let mut frame = frame_filled(32, 32, [0, 0, 0]);
        paint_block(&mut frame, 4, 4, 3, 3, [245, 233, 253]);

        assert_eq!(detector.detect(&frame).unwrap().len(), 1);
    }

    #[test]
    fn boxes_are_relative_to_the_roi() {
        let mut cfg = config();
        cfg.roi = Some(RoiConfig {
            x: 16,
            y: 0,
            width: 16,
            height: 32,
        });
        let detector = ColorBandDetector::new(&cfg);
        let mut frame = frame_filled(32, 32, [0, 0, 0]);
        // One block inside the ROI, one outside of it.
        paint_block(&mut frame, 20, 6, 4, 4, [255, 243, 243]);
        paint_block(&mut frame, 2, 2, 4, 4, [255, 243, 243]);

        let boxes = detector.detect(&frame).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].x, 4);
        assert_eq!(boxes[0].center_y(), 8.0);
    }
}
