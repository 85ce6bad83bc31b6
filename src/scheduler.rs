// Scheduler Module - Frame ticks, pattern rotation and crossfade timing
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::compositor::{composite, fill_inactive};
use crate::layout::Layout;
use crate::noise::NoiseField;
use crate::palette::Palette;
use crate::patterns::{Frame, PatternGenerator, QuadrantTest};
use crate::sink::DisplaySink;
use crate::types::Rgb;

/// Monotonic millisecond clock. Sampled once per frame.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock { start: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub pattern_interval_secs: f64,
    pub crossfade_step_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            pattern_interval_secs: 120.0,
            crossfade_step_ms: 20,
        }
    }
}

/// Fires when at least `interval_ms` has passed since its own last fire,
/// however many frames that took. One fire per poll.
#[derive(Debug, Clone)]
pub struct PeriodicTimer {
    interval_ms: u64,
    last_fire_ms: u64,
}

impl PeriodicTimer {
    pub fn new(interval_ms: u64, start_ms: u64) -> Self {
        PeriodicTimer { interval_ms, last_fire_ms: start_ms }
    }

    /// Re-anchor the phase: the next fire is `interval_ms` after `now_ms`.
    pub fn restart(&mut self, now_ms: u64) {
        self.last_fire_ms = now_ms;
    }

    pub fn poll(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_fire_ms) >= self.interval_ms {
            self.last_fire_ms = now_ms;
            true
        } else {
            false
        }
    }
}

/// Which pattern is showing, which is fading in, and how far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationState {
    current: usize,
    next: usize,
    mix: u8,
    pattern_count: usize,
}

impl AnimationState {
    pub fn new(pattern_count: usize) -> Self {
        let pattern_count = pattern_count.max(1);
        AnimationState {
            current: 0,
            next: 1 % pattern_count,
            mix: 0,
            pattern_count,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn next(&self) -> usize {
        self.next
    }

    pub fn mix(&self) -> u8 {
        self.mix
    }

    /// Promote the incoming pattern and restart the fade from zero.
    pub fn advance(&mut self) {
        self.current = self.next;
        self.next = (self.current + 1) % self.pattern_count;
        self.mix = 0;
    }

    pub fn step_crossfade(&mut self) {
        self.mix = self.mix.saturating_add(1);
    }
}

/// Wall time spent in each half of a tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickStats {
    pub render: Duration,
    pub transmit: Duration,
}

pub struct Scheduler {
    layout: Layout,
    noise: NoiseField,
    palette: Palette,
    generators: Vec<Box<dyn PatternGenerator>>,
    state: AnimationState,
    advance_timer: PeriodicTimer,
    crossfade_timer: PeriodicTimer,
    frame: Vec<Rgb>,
    current_out: Vec<Rgb>,
    next_out: Vec<Rgb>,
}

impl Scheduler {
    pub fn new(
        layout: Layout,
        noise: NoiseField,
        palette: Palette,
        generators: Vec<Box<dyn PatternGenerator>>,
        schedule: &ScheduleConfig,
        start_ms: u64,
    ) -> Result<Self> {
        if generators.is_empty() {
            anyhow::bail!("Pattern set is empty");
        }

        let len = layout.len();
        let mut frame = vec![Rgb::BLACK; len];
        fill_inactive(&mut frame, layout.positions(), Rgb::BLACK);

        let advance_ms = (schedule.pattern_interval_secs.max(0.0) * 1000.0) as u64;

        Ok(Scheduler {
            state: AnimationState::new(generators.len()),
            layout,
            noise,
            palette,
            generators,
            advance_timer: PeriodicTimer::new(advance_ms, start_ms),
            crossfade_timer: PeriodicTimer::new(schedule.crossfade_step_ms, start_ms),
            frame,
            current_out: vec![Rgb::BLACK; len],
            next_out: vec![Rgb::BLACK; len],
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    pub fn frame(&self) -> &[Rgb] {
        &self.frame
    }

    pub fn pattern_names(&self) -> Vec<&str> {
        self.generators.iter().map(|g| g.name()).collect()
    }

    /// Render current and next into their private buffers and composite.
    pub fn render_frame(&mut self, now_ms: u64) {
        let frame = Frame {
            positions: self.layout.positions(),
            now_ms,
            noise: &self.noise,
            palette: &self.palette,
        };

        let (current, next) = (self.state.current, self.state.next);
        self.generators[current].render(&frame, &mut self.current_out);
        if next == current {
            // A lone pattern must not advance its own state twice per frame
            self.next_out.copy_from_slice(&self.current_out);
        } else {
            self.generators[next].render(&frame, &mut self.next_out);
        }

        composite(
            &mut self.frame,
            self.layout.positions(),
            &self.current_out,
            &self.next_out,
            self.state.mix,
        );
    }

    /// Service the pattern-advance and crossfade timers against `now_ms`.
    /// An advance restarts the fade, so the frame after it always shows the
    /// new current pattern alone. The crossfade phase is re-anchored at each
    /// advance and does not step on the advancing tick.
    pub fn poll_timers(&mut self, now_ms: u64) {
        if self.advance_timer.poll(now_ms) {
            self.state.advance();
            self.crossfade_timer.restart(now_ms);
            tracing::info!(
                current = self.generators[self.state.current].name(),
                next = self.generators[self.state.next].name(),
                "pattern advanced"
            );
        } else if self.crossfade_timer.poll(now_ms) {
            self.state.step_crossfade();
        }
    }

    /// One full frame: render, hand off to the sink, then run the timers.
    pub fn tick(&mut self, now_ms: u64, sink: &mut dyn DisplaySink, brightness: u8) -> Result<TickStats> {
        let started = Instant::now();
        self.render_frame(now_ms);
        let render = started.elapsed();

        let started = Instant::now();
        sink.show(&self.frame, brightness)?;
        let transmit = started.elapsed();

        self.poll_timers(now_ms);
        Ok(TickStats { render, transmit })
    }

    /// Colour for slots with no LED behind them. Never touched by rendering.
    pub fn set_background(&mut self, color: Rgb) {
        fill_inactive(&mut self.frame, self.layout.positions(), color);
    }

    /// Write the quadrant test pattern straight into the frame buffer.
    pub fn render_test_pattern(&mut self, now_ms: u64) {
        let frame = Frame {
            positions: self.layout.positions(),
            now_ms,
            noise: &self.noise,
            palette: &self.palette,
        };
        QuadrantTest.render(&frame, &mut self.frame);
    }
}
