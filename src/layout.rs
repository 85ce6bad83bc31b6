// Layout Module - Maps strip slots onto concentric rings in a shared plane
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Coordinate given to slots with no physical LED behind them.
pub const SENTINEL_COORD: f64 = -1000.0;

/// One physical ring. `count` may be fractional: a ring whose circumference
/// does not divide evenly still spaces its LEDs as if it held `count` of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingSpec {
    pub count: f64,
    pub radius: f64,
    pub offset: f64,  // Rotation, in LED units
    pub center_x: f64,
    pub center_y: f64,
}

impl RingSpec {
    pub fn new(count: f64, radius: f64, offset: f64) -> Self {
        RingSpec { count, radius, offset, ..Default::default() }
    }

    pub fn centered_at(mut self, center_x: f64, center_y: f64) -> Self {
        self.center_x = center_x;
        self.center_y = center_y;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfiguration {
    pub slots_per_ring: usize,  // Strip length allocated to each ring
    pub rings: Vec<RingSpec>,
}

impl Default for LayoutConfiguration {
    // Four strips of 128, one ring per strip
    fn default() -> Self {
        LayoutConfiguration {
            slots_per_ring: 128,
            rings: vec![
                RingSpec::new(24.0, 50.0, 3.0).centered_at(42.4, 42.4),
                RingSpec::new(49.5, 140.0, 3.0),
                RingSpec::new(84.9, 210.0, 2.0),
                RingSpec::new(99.5, 300.0, 1.0),
            ],
        }
    }
}

impl LayoutConfiguration {
    pub fn total_slots(&self) -> usize {
        self.slots_per_ring * self.rings.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub angle: f64,
    pub active: bool,
}

impl Position {
    fn new(index: usize, x: f64, y: f64, active: bool) -> Self {
        Position {
            index,
            x,
            y,
            radius: (x * x + y * y).sqrt(),
            angle: y.atan2(x),
            active,
        }
    }
}

/// Place every slot of every ring. Pure; runs once at startup.
pub fn build_layout(config: &LayoutConfiguration) -> Vec<Position> {
    let mut positions = Vec::with_capacity(config.total_slots());

    for (ring_idx, ring) in config.rings.iter().enumerate() {
        // NaN and non-positive counts leave the whole ring dark
        let count = if ring.count.is_finite() && ring.count > 0.0 { ring.count } else { 0.0 };

        for j in 0..config.slots_per_ring {
            let index = ring_idx * config.slots_per_ring + j;

            if (j as f64) < count {
                let phase = 2.0 * PI * (j as f64 + ring.offset) / count;
                let x = ring.center_x + ring.radius * phase.sin();
                let y = ring.center_y + ring.radius * phase.cos();
                positions.push(Position::new(index, x, y, true));
            } else {
                positions.push(Position::new(index, SENTINEL_COORD, SENTINEL_COORD, false));
            }
        }
    }

    positions
}

/// Immutable set of positions shared by every consumer.
#[derive(Debug, Clone)]
pub struct Layout {
    positions: Vec<Position>,
}

impl Layout {
    pub fn new(config: &LayoutConfiguration) -> Self {
        Layout { positions: build_layout(config) }
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.positions.iter().filter(|p| p.active).count()
    }
}
