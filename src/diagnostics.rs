// Diagnostics Module - Layout dumps and offline frame snapshots
use anyhow::{anyhow, Result};
use image::RgbImage;
use serde::Serialize;
use std::path::Path;

use crate::layout::{Layout, Position};
use crate::scheduler::Scheduler;
use crate::types::Rgb;

// Radius of the dot drawn for each LED, in pixels
const DOT_RADIUS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    Csv,
    Json,
}

impl DumpFormat {
    pub fn from_string(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(DumpFormat::Csv),
            "json" => Ok(DumpFormat::Json),
            other => Err(anyhow!("Unknown dump format '{}' (expected csv or json)", other)),
        }
    }
}

#[derive(Serialize)]
struct PositionRecord {
    index: usize,
    x: f64,
    y: f64,
    radius: f64,
    angle: f64,
}

impl From<&Position> for PositionRecord {
    fn from(p: &Position) -> Self {
        PositionRecord {
            index: p.index,
            x: p.x,
            y: p.y,
            radius: p.radius,
            angle: p.angle,
        }
    }
}

/// Coordinates of every active position, one record per LED.
pub fn dump_layout(layout: &Layout, format: DumpFormat) -> Result<String> {
    let records: Vec<PositionRecord> = layout
        .positions()
        .iter()
        .filter(|p| p.active)
        .map(PositionRecord::from)
        .collect();

    match format {
        DumpFormat::Json => Ok(serde_json::to_string_pretty(&records)?),
        DumpFormat::Csv => {
            let mut out = String::from("index,x,y,radius,angle\n");
            for r in &records {
                out.push_str(&format!("{},{:.4},{:.4},{:.4},{:.6}\n", r.index, r.x, r.y, r.radius, r.angle));
            }
            Ok(out)
        }
    }
}

/// Run the schedule from time zero up to `at_ms` in `step_ms` frames and
/// leave the frame for `at_ms` in the scheduler's buffer.
pub fn advance_to(scheduler: &mut Scheduler, at_ms: u64, step_ms: u64) {
    let step = step_ms.max(1) as usize;
    for now in (0..at_ms).step_by(step) {
        scheduler.render_frame(now);
        scheduler.poll_timers(now);
    }
    scheduler.render_frame(at_ms);
}

/// Draw each active LED as a dot on a square black canvas, world origin at
/// the centre, +y up.
pub fn render_snapshot(frame: &[Rgb], positions: &[Position], size: u32) -> RgbImage {
    let mut img = RgbImage::new(size, size);

    let extent = positions
        .iter()
        .filter(|p| p.active)
        .map(|p| p.x.abs().max(p.y.abs()))
        .fold(0.0_f64, f64::max);
    if extent <= 0.0 {
        return img;
    }

    let half = size as f64 / 2.0;
    let scale = (half - (DOT_RADIUS + 1) as f64) / extent;

    for p in positions.iter().filter(|p| p.active) {
        let Some(color) = frame.get(p.index) else {
            continue;
        };
        let cx = (half + p.x * scale).round() as i64;
        let cy = (half - p.y * scale).round() as i64;

        for dy in -DOT_RADIUS..=DOT_RADIUS {
            for dx in -DOT_RADIUS..=DOT_RADIUS {
                if dx * dx + dy * dy > DOT_RADIUS * DOT_RADIUS {
                    continue;
                }
                let (px, py) = (cx + dx, cy + dy);
                if px >= 0 && py >= 0 && px < size as i64 && py < size as i64 {
                    img.put_pixel(px as u32, py as u32, image::Rgb([color.r, color.g, color.b]));
                }
            }
        }
    }

    img
}

pub fn save_snapshot(path: &Path, frame: &[Rgb], positions: &[Position], size: u32) -> Result<()> {
    render_snapshot(frame, positions, size).save(path)?;
    Ok(())
}
