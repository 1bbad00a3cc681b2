// src/chart.rs

use crate::fit::Polynomial;
use crate::types::Sample;
use anyhow::Result;
use opencv::{
    core::{self, Mat, Point, Rect, Scalar},
    highgui, imgproc,
};

const CANVAS_WIDTH: i32 = 960;
const CANVAS_HEIGHT: i32 = 640;
const MARGIN: i32 = 60;
const CURVE_STEPS: usize = 500;
const GRID_DIVISIONS: i32 = 5;
const WINDOW_NAME: &str = "drop timing fit";

/// Displays the sample scatter with the fitted curve overlaid and blocks
/// until a key press. The chart is never written to disk.
pub fn show(samples: &[Sample], poly: &Polynomial) -> Result<()> {
    let canvas = render(samples, poly)?;
    highgui::named_window(WINDOW_NAME, highgui::WINDOW_AUTOSIZE)?;
    highgui::imshow(WINDOW_NAME, &canvas)?;
    highgui::wait_key(0)?;
    Ok(())
}

struct Axes {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Axes {
    fn to_pixel(&self, x: f64, y: f64) -> Point {
        let plot_w = (CANVAS_WIDTH - 2 * MARGIN) as f64;
        let plot_h = (CANVAS_HEIGHT - 2 * MARGIN) as f64;
        let px = MARGIN as f64 + (x - self.x_min) / (self.x_max - self.x_min) * plot_w;
        let py = (CANVAS_HEIGHT - MARGIN) as f64 - (y - self.y_min) / (self.y_max - self.y_min) * plot_h;
        Point::new(px.round() as i32, py.round() as i32)
    }
}

fn render(samples: &[Sample], poly: &Polynomial) -> Result<Mat> {
    let x_min = samples
        .iter()
        .map(|s| s.position)
        .fold(f64::INFINITY, f64::min);
    let x_max = samples
        .iter()
        .map(|s| s.position)
        .fold(f64::NEG_INFINITY, f64::max);

    // Curve sampled across the observed position range.
    let curve: Vec<(f64, f64)> = (0..=CURVE_STEPS)
        .map(|i| {
            let x = x_min + (x_max - x_min) * i as f64 / CURVE_STEPS as f64;
            (x, poly.eval(x))
        })
        .collect();

    // The vertical range covers both the scatter and the curve.
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for value in samples
        .iter()
        .map(|s| s.delay_ms)
        .chain(curve.iter().map(|&(_, y)| y))
    {
        y_min = y_min.min(value);
        y_max = y_max.max(value);
    }
    if y_max - y_min < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }
    let pad = (y_max - y_min) * 0.05;
    let axes = Axes {
        x_min,
        x_max,
        y_min: y_min - pad,
        y_max: y_max + pad,
    };

    let mut canvas = Mat::new_rows_cols_with_default(
        CANVAS_HEIGHT,
        CANVAS_WIDTH,
        core::CV_8UC3,
        Scalar::new(255.0, 255.0, 255.0, 0.0),
    )?;

    draw_grid(&mut canvas, &axes)?;

    // Sample scatter.
    for s in samples {
        imgproc::circle(
            &mut canvas,
            axes.to_pixel(s.position, s.delay_ms),
            3,
            Scalar::new(180.0, 80.0, 0.0, 0.0),
            -1,
            imgproc::LINE_AA,
            0,
        )?;
    }

    // Fitted curve overlay.
    for window in curve.windows(2) {
        imgproc::line(
            &mut canvas,
            axes.to_pixel(window[0].0, window[0].1),
            axes.to_pixel(window[1].0, window[1].1),
            Scalar::new(0.0, 0.0, 255.0, 0.0),
            2,
            imgproc::LINE_AA,
            0,
        )?;
    }

    draw_legend(&mut canvas)?;
    Ok(canvas)
}

fn draw_grid(canvas: &mut Mat, axes: &Axes) -> Result<()> {
    let grid_color = Scalar::new(210.0, 210.0, 210.0, 0.0);
    let text_color = Scalar::new(80.0, 80.0, 80.0, 0.0);

    for i in 0..=GRID_DIVISIONS {
        let fraction = i as f64 / GRID_DIVISIONS as f64;

        let x = axes.x_min + (axes.x_max - axes.x_min) * fraction;
        let bottom = axes.to_pixel(x, axes.y_min);
        let top = axes.to_pixel(x, axes.y_max);
        imgproc::line(canvas, bottom, top, grid_color, 1, imgproc::LINE_8, 0)?;
        imgproc::put_text(
            canvas,
            &format!("{x:.0}"),
            Point::new(bottom.x - 15, CANVAS_HEIGHT - MARGIN + 25),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.45,
            text_color,
            1,
            imgproc::LINE_8,
            false,
        )?;

        let y = axes.y_min + (axes.y_max - axes.y_min) * fraction;
        let left = axes.to_pixel(axes.x_min, y);
        let right = axes.to_pixel(axes.x_max, y);
        imgproc::line(canvas, left, right, grid_color, 1, imgproc::LINE_8, 0)?;
        imgproc::put_text(
            canvas,
            &format!("{y:.0}"),
            Point::new(8, left.y + 5),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.45,
            text_color,
            1,
            imgproc::LINE_8,
            false,
        )?;
    }

    imgproc::rectangle(
        canvas,
        Rect::new(
            MARGIN,
            MARGIN,
            CANVAS_WIDTH - 2 * MARGIN,
            CANVAS_HEIGHT - 2 * MARGIN,
        ),
        Scalar::new(60.0, 60.0, 60.0, 0.0),
        1,
        imgproc::LINE_8,
        0,
    )?;

    imgproc::put_text(
        canvas,
        "y (px)",
        Point::new(CANVAS_WIDTH / 2 - 30, CANVAS_HEIGHT - 15),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.55,
        text_color,
        1,
        imgproc::LINE_8,
        false,
    )?;
    imgproc::put_text(
        canvas,
        "delay (ms)",
        Point::new(10, MARGIN - 20),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.55,
        text_color,
        1,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}

fn draw_legend(canvas: &mut Mat) -> Result<()> {
    let origin_x = CANVAS_WIDTH - MARGIN - 190;
    imgproc::rectangle(
        canvas,
        Rect::new(origin_x, MARGIN + 10, 180, 56),
        Scalar::new(245.0, 245.0, 245.0, 0.0),
        -1,
        imgproc::LINE_8,
        0,
    )?;

    imgproc::circle(
        canvas,
        Point::new(origin_x + 16, MARGIN + 28),
        3,
        Scalar::new(180.0, 80.0, 0.0, 0.0),
        -1,
        imgproc::LINE_AA,
        0,
    )?;
    imgproc::put_text(
        canvas,
        "samples",
        Point::new(origin_x + 32, MARGIN + 33),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        Scalar::new(60.0, 60.0, 60.0, 0.0),
        1,
        imgproc::LINE_8,
        false,
    )?;

    imgproc::line(
        canvas,
        Point::new(origin_x + 8, MARGIN + 50),
        Point::new(origin_x + 24, MARGIN + 50),
        Scalar::new(0.0, 0.0, 255.0, 0.0),
        2,
        imgproc::LINE_AA,
        0,
    )?;
    imgproc::put_text(
        canvas,
        "fitted curve",
        Point::new(origin_x + 32, MARGIN + 55),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        Scalar::new(60.0, 60.0, 60.0, 0.0),
        1,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}
