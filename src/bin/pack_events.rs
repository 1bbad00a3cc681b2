// src/bin/pack_events.rs
//
// Repackages event screenshots into the distributable asset directory:
// images whose file name encodes a capture rect are cropped to it, everything
// else is copied verbatim, and a Qt .qrc manifest of the result is written.

use anyhow::{bail, Context, Result};
use clap::Parser;
use opencv::{
    core::{Mat, Rect, Vector},
    imgcodecs,
    prelude::*,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

const DEFAULT_CROP_SIZE: i32 = 50;

/// Crops and repackages event assets, producing a Qt resource manifest.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Directory holding the raw screenshots.
    #[arg(long, default_value = "resource/src")]
    src: PathBuf,
    /// Directory the packaged assets are written to.
    #[arg(long, default_value = "resource/events")]
    dst: PathBuf,
    /// Path of the generated .qrc manifest.
    #[arg(long, default_value = "resource/events.qrc")]
    manifest: PathBuf,
}

/// Capture rect encoded in a PNG file stem: "X_Y" (50x50 default size) or
/// "X_Y_W_H".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CropSpec {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

fn parse_crop_spec(stem: &str) -> Option<CropSpec> {
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() != 2 && parts.len() != 4 {
        return None;
    }

    let mut values = Vec::with_capacity(parts.len());
    for part in parts {
        values.push(part.parse::<i32>().ok()?);
    }

    let (width, height) = if values.len() == 4 {
        (values[2], values[3])
    } else {
        (DEFAULT_CROP_SIZE, DEFAULT_CROP_SIZE)
    };
    Some(CropSpec {
        x: values[0],
        y: values[1],
        width,
        height,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pack_events=info")),
        )
        .init();

    let args = Args::parse();

    fs::create_dir_all(&args.dst)
        .with_context(|| format!("failed to create {}", args.dst.display()))?;
    let dst_name = match args.dst.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.to_string(),
        None => bail!("destination {} has no directory name", args.dst.display()),
    };

    let mut entries: Vec<String> = Vec::new();

    // Root-level files are packaged as-is.
    for entry in WalkDir::new(&args.src)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        fs::copy(entry.path(), args.dst.join(&name))
            .with_context(|| format!("failed to copy {}", entry.path().display()))?;
        entries.push(manifest_entry(&dst_name, Path::new(&name)));
    }

    // One level of subdirectories; the destination itself may live inside
    // the source tree and is skipped.
    for entry in WalkDir::new(&args.src)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_dir() || entry.file_name().to_string_lossy() == dst_name {
            continue;
        }
        let sub_name = entry.file_name().to_string_lossy().to_string();
        let dst_subdir = args.dst.join(&sub_name);
        fs::create_dir_all(&dst_subdir)?;

        for file in WalkDir::new(entry.path())
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !file.file_type().is_file() {
                continue;
            }
            match package_file(file.path(), &dst_subdir) {
                Ok(packaged_name) => {
                    entries.push(manifest_entry(&dst_name, &Path::new(&sub_name).join(packaged_name)));
                }
                Err(e) => warn!("skipping {}: {e:#}", file.path().display()),
            }
        }
    }

    entries.sort();
    fs::write(&args.manifest, render_manifest(&entries))
        .with_context(|| format!("failed to write {}", args.manifest.display()))?;
    info!("wrote {} entries to {}", entries.len(), args.manifest.display());
    Ok(())
}

/// Packages one file from a subdirectory and returns the name it was
/// written under. Unreadable images and out-of-bounds rects are errors the
/// caller downgrades to a skip.
fn package_file(src: &Path, dst_dir: &Path) -> Result<String> {
    let file_name = src
        .file_name()
        .and_then(|n| n.to_str())
        .context("file name is not valid UTF-8")?
        .to_string();

    let is_png = src
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("png"));
    let spec = if is_png {
        src.file_stem()
            .and_then(|s| s.to_str())
            .and_then(parse_crop_spec)
    } else {
        None
    };

    let Some(spec) = spec else {
        fs::copy(src, dst_dir.join(&file_name))
            .with_context(|| format!("failed to copy {}", src.display()))?;
        return Ok(file_name);
    };

    let img = imgcodecs::imread(&src.to_string_lossy(), imgcodecs::IMREAD_COLOR)?;
    if img.empty() {
        bail!("unreadable image");
    }
    if spec.x < 0
        || spec.y < 0
        || spec.width <= 0
        || spec.height <= 0
        || spec.x + spec.width > img.cols()
        || spec.y + spec.height > img.rows()
    {
        bail!(
            "crop rect {}x{}+{}+{} exceeds image bounds {}x{}",
            spec.width,
            spec.height,
            spec.x,
            spec.y,
            img.cols(),
            img.rows()
        );
    }

    let cropped = Mat::roi(&img, Rect::new(spec.x, spec.y, spec.width, spec.height))?.try_clone()?;
    let out_name = format!("{}_{}.png", spec.x, spec.y);
    imgcodecs::imwrite(
        &dst_dir.join(&out_name).to_string_lossy(),
        &cropped,
        &Vector::new(),
    )?;
    info!("cropped {} -> {}", src.display(), out_name);
    Ok(out_name)
}

/// Manifest entries are rooted at the resource directory: "./<dst>/<path>".
fn manifest_entry(dst_name: &str, rel: &Path) -> String {
    let rel = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("./{dst_name}/{rel}")
}

fn render_manifest(entries: &[String]) -> String {
    let mut out = String::from("<RCC>\n    <qresource prefix=\"/\">\n");
    for entry in entries {
        out.push_str(&format!("        <file>{entry}</file>\n"));
    }
    out.push_str("    </qresource>\n</RCC>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_part_stem_uses_the_default_size() {
        assert_eq!(
            parse_crop_spec("120_48"),
            Some(CropSpec {
                x: 120,
                y: 48,
                width: 50,
                height: 50
            })
        );
    }

    #[test]
    fn four_part_stem_carries_its_own_size() {
        assert_eq!(
            parse_crop_spec("10_20_30_40"),
            Some(CropSpec {
                x: 10,
                y: 20,
                width: 30,
                height: 40
            })
        );
    }

    #[test]
    fn other_stems_are_not_crop_specs() {
        assert_eq!(parse_crop_spec("banner"), None);
        assert_eq!(parse_crop_spec("1_2_3"), None);
        assert_eq!(parse_crop_spec("a_b"), None);
        assert_eq!(parse_crop_spec("10_20_30_40_50"), None);
    }

    #[test]
    fn manifest_entries_use_forward_slashes() {
        let rel = Path::new("banners").join("title.png");
        assert_eq!(manifest_entry("events", &rel), "./events/banners/title.png");
    }

    #[test]
    fn manifest_has_the_expected_shape() {
        let entries = vec![
            "./events/a.png".to_string(),
            "./events/sub/b.png".to_string(),
        ];
        let xml = render_manifest(&entries);
        assert_eq!(
            xml,
            "<RCC>\n    <qresource prefix=\"/\">\n        \
             <file>./events/a.png</file>\n        \
             <file>./events/sub/b.png</file>\n    </qresource>\n</RCC>\n"
        );
    }

    #[test]
    fn non_png_files_are_copied_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let src_dir = dir.path().join("src");
        let dst_dir = dir.path().join("dst");
        fs::create_dir_all(&src_dir).unwrap();
        fs::create_dir_all(&dst_dir).unwrap();

        let src_file = src_dir.join("notes.txt");
        fs::write(&src_file, "hello").unwrap();

        let name = package_file(&src_file, &dst_dir).unwrap();
        assert_eq!(name, "notes.txt");
        assert_eq!(fs::read_to_string(dst_dir.join("notes.txt")).unwrap(), "hello");
    }

    #[test]
    fn png_without_a_crop_spec_is_copied_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let src_dir = dir.path().join("src");
        let dst_dir = dir.path().join("dst");
        fs::create_dir_all(&src_dir).unwrap();
        fs::create_dir_all(&dst_dir).unwrap();

        // Not a real PNG, but the copy path never decodes it.
        let src_file = src_dir.join("banner.png");
        fs::write(&src_file, b"not-an-image").unwrap();

        let name = package_file(&src_file, &dst_dir).unwrap();
        assert_eq!(name, "banner.png");
        assert!(dst_dir.join("banner.png").exists());
    }
}
