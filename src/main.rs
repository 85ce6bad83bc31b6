// RingLight - Generative ambient animations for concentric LED rings
// Streams noise, sweep and zoom patterns to WLED controllers over DDP
use anyhow::Result;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

mod compositor;
mod config;
mod diagnostics;
mod layout;
mod multi_device;
mod noise;
mod palette;
mod patterns;
mod scheduler;
mod sink;
mod types;

use config::{Args, RingLightConfig};
use diagnostics::DumpFormat;
use layout::Layout;
use noise::NoiseField;
use palette::Palette;
use scheduler::{Clock, Scheduler, SystemClock};
use sink::{DdpSink, DisplaySink, LogSink};
use types::InterpolationMode;

// Frame step used to simulate an uncapped schedule for snapshots
const UNCAPPED_FRAME_MS: u64 = 8;

const SNAPSHOT_SIZE: u32 = 600;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn frame_period(fps: f64) -> Option<Duration> {
    if fps > 0.0 {
        Some(Duration::from_secs_f64(1.0 / fps))
    } else {
        None
    }
}

fn build_scheduler(config: &RingLightConfig, layout: Layout, start_ms: u64) -> Result<Scheduler> {
    let palette = Palette::parse(&config.palette, InterpolationMode::from_string(&config.interpolation))?;
    let noise = NoiseField::new(&config.noise);
    let generators = patterns::build_pattern_set(&config.patterns);

    let mut scheduler = Scheduler::new(layout, noise, palette, generators, &config.schedule, start_ms)?;
    scheduler.set_background(config.background_color()?);
    Ok(scheduler)
}

fn open_sink(config: &RingLightConfig, total_leds: usize) -> Result<Box<dyn DisplaySink>> {
    let devices = config.resolved_devices();
    if devices.is_empty() {
        tracing::warn!("no WLED devices configured, frames will only be logged (set wled_ip or --wled-ip)");
        return Ok(Box::new(LogSink::default()));
    }

    for (i, device) in devices.iter().enumerate() {
        tracing::info!(
            "Device {}: {} (LEDs {}-{}, {})",
            i,
            device.ip,
            device.led_offset,
            (device.led_offset + device.led_count).saturating_sub(1),
            if device.enabled { "enabled" } else { "disabled" }
        );
    }
    Ok(Box::new(DdpSink::new(&devices, config.fail_fast, total_leds)?))
}

fn sleep_remaining(period: Option<Duration>, frame_start: Instant) {
    if let Some(period) = period {
        let elapsed = frame_start.elapsed();
        if elapsed < period {
            thread::sleep(period - elapsed);
        }
    }
}

/// Show the quadrant pattern until interrupted.
fn run_test_pattern(
    scheduler: &mut Scheduler,
    sink: &mut dyn DisplaySink,
    config: &RingLightConfig,
    running: &AtomicBool,
) -> Result<()> {
    let clock = SystemClock::new();
    let period = frame_period(config.fps);
    tracing::info!("showing quadrant test pattern, Ctrl+C to quit");

    while running.load(Ordering::SeqCst) {
        let frame_start = Instant::now();
        scheduler.render_test_pattern(clock.now_ms());
        sink.show(scheduler.frame(), config.global_brightness)?;
        sleep_remaining(period, frame_start);
    }
    Ok(())
}

/// The main frame loop. Runs until Ctrl+C; each iteration samples the clock
/// once and hands exactly one frame to the sink.
fn run_animation(
    scheduler: &mut Scheduler,
    sink: &mut dyn DisplaySink,
    config: &RingLightConfig,
    running: &AtomicBool,
) -> Result<()> {
    let clock = SystemClock::new();
    let period = frame_period(config.fps);

    let mut frames: u64 = 0;
    let mut render_time = Duration::ZERO;
    let mut transmit_time = Duration::ZERO;
    let mut stats_start = Instant::now();

    tracing::info!(patterns = ?scheduler.pattern_names(), "animation running, Ctrl+C to quit");

    while running.load(Ordering::SeqCst) {
        let frame_start = Instant::now();
        let stats = scheduler.tick(clock.now_ms(), sink, config.global_brightness)?;

        frames += 1;
        render_time += stats.render;
        transmit_time += stats.transmit;

        let window = stats_start.elapsed();
        if window >= Duration::from_secs(1) {
            let n = frames.max(1) as u32;
            tracing::debug!(
                frames,
                fps = frames as f64 / window.as_secs_f64(),
                render_us = (render_time / n).as_micros() as u64,
                transmit_us = (transmit_time / n).as_micros() as u64,
                mix = scheduler.state().mix(),
                "frame stats"
            );
            frames = 0;
            render_time = Duration::ZERO;
            transmit_time = Duration::ZERO;
            stats_start = Instant::now();
        }

        sleep_remaining(period, frame_start);
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    // Get config file path (custom or default)
    let cfg_arg = args.cfg.as_deref();
    let config_path = RingLightConfig::config_path(cfg_arg)?;
    let config_file_exists = config_path.exists();

    let mut config = if config_file_exists {
        match RingLightConfig::load_with_path(cfg_arg) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("Failed to load config file {}: {}", config_path.display(), e);
                tracing::error!("Please fix the config file or delete it to regenerate with defaults.");
                return Err(e);
            }
        }
    } else {
        RingLightConfig {
            config_path: Some(config_path.clone()),
            ..Default::default()
        }
    };

    let args_provided = config.merge_with_args(&args)?;

    // Save config only on first run or when the command line changed something
    if !config_file_exists || args_provided {
        config.save()?;
    }
    tracing::info!("Using config file: {}", config_path.display());

    let layout = Layout::new(&config.layout);
    let total_leds = layout.len();
    tracing::info!(slots = total_leds, active = layout.active_count(), "layout built");

    if let Some(ref format) = args.dump_layout {
        print!("{}", diagnostics::dump_layout(&layout, DumpFormat::from_string(format)?)?);
        return Ok(());
    }

    if let Some(ref path) = args.snapshot {
        let mut scheduler = build_scheduler(&config, layout, 0)?;
        let step_ms = frame_period(config.fps).map_or(UNCAPPED_FRAME_MS, |p| p.as_millis().max(1) as u64);
        diagnostics::advance_to(&mut scheduler, args.at_ms, step_ms);
        diagnostics::save_snapshot(path, scheduler.frame(), scheduler.layout().positions(), SNAPSHOT_SIZE)?;
        println!("Snapshot at {} ms written to {}", args.at_ms, path.display());
        return Ok(());
    }

    if config.palette_is_preset() {
        tracing::info!(palette = %config.palette, "palette preset");
    } else {
        tracing::info!(palette = %config.palette, "custom palette");
    }

    let mut sink = open_sink(&config, total_leds)?;

    // Setup Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let mut scheduler = build_scheduler(&config, layout, 0)?;

    let result = if args.test_pattern {
        run_test_pattern(&mut scheduler, sink.as_mut(), &config, &running)
    } else {
        // Brief orientation flash before the animation starts
        if config.startup_test_ms > 0 {
            scheduler.render_test_pattern(0);
            sink.show(scheduler.frame(), config.global_brightness)?;
            thread::sleep(Duration::from_millis(config.startup_test_ms));
        }
        run_animation(&mut scheduler, sink.as_mut(), &config, &running)
    };

    if let Err(e) = sink.blank(total_leds) {
        tracing::warn!("Failed to blank display: {}", e);
    }
    tracing::info!("stopped");
    result
}
