// Config Module - Configuration management and command-line argument parsing
use anyhow::{anyhow, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::layout::LayoutConfiguration;
use crate::multi_device::WLEDDevice;
use crate::noise::NoiseConfig;
use crate::palette::{builtin_palette, get_palette_names};
use crate::patterns::{default_pattern_set, PatternConfig};
use crate::scheduler::ScheduleConfig;
use crate::types::Rgb;

const APP_DIR: &str = "ringlight";

#[derive(Parser, Debug, Default)]
#[command(
    author,
    version,
    about = "Generative ambient animations for concentric LED rings, streamed to WLED over DDP",
    long_about = "Maps concentric LED rings into a common coordinate space and renders a rotating set of\n\
                  noise, sweep and zoom patterns, crossfading between them.\n\
                  Frames are sent to one or more WLED controllers via the DDP protocol."
)]
pub struct Args {
    /// Config file path or name (names live in ~/.config/ringlight/)
    #[arg(long)]
    pub cfg: Option<String>,

    /// WLED device address (single device covering every slot)
    #[arg(short, long)]
    pub wled_ip: Option<String>,

    /// Global brightness (0-255)
    #[arg(short, long)]
    pub brightness: Option<u8>,

    /// Frame rate cap, 0 for unlimited
    #[arg(short, long)]
    pub fps: Option<f64>,

    /// Palette preset name or stop list ("0:FFFFFF,255:FF0000")
    #[arg(short, long)]
    pub palette: Option<String>,

    /// Palette interpolation: linear, basis or catmullrom
    #[arg(long)]
    pub interpolation: Option<String>,

    /// Comma-separated pattern rotation, e.g. "zoom,noise,sweep"
    #[arg(long)]
    pub patterns: Option<String>,

    /// Seconds each pattern stays current before the next one takes over
    #[arg(short = 'i', long)]
    pub interval: Option<f64>,

    /// Show the quadrant orientation pattern instead of animating
    #[arg(long)]
    pub test_pattern: bool,

    /// Print active LED coordinates (csv or json) and exit
    #[arg(long, value_name = "FORMAT")]
    pub dump_layout: Option<String>,

    /// Render a single frame to a PNG file and exit
    #[arg(long, value_name = "PATH")]
    pub snapshot: Option<PathBuf>,

    /// Animation time for --snapshot, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingLightConfig {
    pub fps: f64,
    pub global_brightness: u8,
    pub palette: String,
    pub interpolation: String,
    pub background: String,
    pub startup_test_ms: u64,
    pub wled_ip: String,
    pub fail_fast: bool,
    pub wled_devices: Vec<WLEDDevice>,
    pub patterns: Vec<PatternConfig>,
    pub schedule: ScheduleConfig,
    pub noise: NoiseConfig,
    pub layout: LayoutConfiguration,

    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for RingLightConfig {
    fn default() -> Self {
        RingLightConfig {
            fps: 120.0,
            global_brightness: 128,
            palette: "iluk".to_string(),
            interpolation: "linear".to_string(),
            background: "000000".to_string(),
            startup_test_ms: 500,
            wled_ip: String::new(),
            fail_fast: false,
            wled_devices: Vec::new(),
            patterns: default_pattern_set(),
            schedule: ScheduleConfig::default(),
            noise: NoiseConfig::default(),
            layout: LayoutConfiguration::default(),
            config_path: None,
        }
    }
}

impl RingLightConfig {
    /// Apply command-line overrides. Returns whether anything was overridden.
    pub fn merge_with_args(&mut self, args: &Args) -> Result<bool> {
        let mut args_provided = false;

        if let Some(ref wled_ip) = args.wled_ip {
            self.wled_ip = wled_ip.clone();
            // an explicit address replaces any device list
            self.wled_devices.clear();
            args_provided = true;
        }

        if let Some(brightness) = args.brightness {
            self.global_brightness = brightness;
            args_provided = true;
        }

        if let Some(fps) = args.fps {
            self.fps = fps;
            args_provided = true;
        }

        if let Some(ref palette) = args.palette {
            self.palette = palette.clone();
            args_provided = true;
        }

        if let Some(ref interpolation) = args.interpolation {
            self.interpolation = interpolation.clone();
            args_provided = true;
        }

        if let Some(ref patterns) = args.patterns {
            self.patterns = parse_pattern_list(patterns)?;
            args_provided = true;
        }

        if let Some(interval) = args.interval {
            self.schedule.pattern_interval_secs = interval;
            args_provided = true;
        }

        self.sanitize();
        Ok(args_provided)
    }

    /// Devices to stream to. A bare `wled_ip` becomes one device spanning
    /// the whole frame.
    pub fn resolved_devices(&self) -> Vec<WLEDDevice> {
        if !self.wled_devices.is_empty() {
            return self.wled_devices.clone();
        }
        if self.wled_ip.is_empty() {
            return Vec::new();
        }
        vec![WLEDDevice {
            ip: self.wled_ip.clone(),
            led_offset: 0,
            led_count: self.layout.total_slots(),
            enabled: true,
        }]
    }

    pub fn background_color(&self) -> Result<Rgb> {
        Rgb::from_hex(&self.background)
    }

    pub fn config_path(cfg_arg: Option<&str>) -> Result<PathBuf> {
        let home = std::env::var("HOME")?;
        let config_dir = PathBuf::from(home).join(".config").join(APP_DIR);

        if let Some(cfg) = cfg_arg {
            // Check if it's an absolute path
            let path = PathBuf::from(cfg);
            if path.is_absolute() {
                return Ok(path);
            }

            // Check if it contains path separators (relative path)
            if cfg.contains('/') || cfg.contains('\\') {
                return Ok(path);
            }

            // Otherwise treat as config name in config directory
            std::fs::create_dir_all(&config_dir)?;
            let filename = if cfg.ends_with(".toml") {
                cfg.to_string()
            } else {
                format!("{}.toml", cfg)
            };

            Ok(config_dir.join(filename))
        } else {
            std::fs::create_dir_all(&config_dir)?;
            Ok(config_dir.join("config.toml"))
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut parsed: Self = toml::from_str(contents)?;
        parsed.sanitize();
        Ok(parsed)
    }

    pub fn load_with_path(cfg_arg: Option<&str>) -> Result<Self> {
        let path = Self::config_path(cfg_arg)?;
        let contents = std::fs::read_to_string(&path)?;
        let mut parsed = Self::from_toml(&contents)?;
        parsed.config_path = Some(path);
        Ok(parsed)
    }

    /// Sanitize config values to handle common formatting issues
    pub fn sanitize(&mut self) {
        self.palette = self.palette.trim().to_string();
        if self.palette.is_empty() {
            self.palette = "iluk".to_string();
        }
        self.interpolation = self.interpolation.trim().to_lowercase();
        self.background = self.background.trim().trim_start_matches('#').to_uppercase();
        if Rgb::from_hex(&self.background).is_err() {
            self.background = "000000".to_string();
        }
        self.wled_ip = self.wled_ip.trim().to_string();
        for device in &mut self.wled_devices {
            device.ip = device.ip.trim().to_string();
        }

        // Clamp numeric values to reasonable ranges
        self.fps = self.fps.max(0.0).min(1000.0);
        self.startup_test_ms = self.startup_test_ms.min(60_000);
        self.schedule.pattern_interval_secs = self.schedule.pattern_interval_secs.max(1.0).min(86_400.0);
        self.schedule.crossfade_step_ms = self.schedule.crossfade_step_ms.max(1).min(10_000);
        self.noise.scale = self.noise.scale.max(1.0).min(1.0e9);
        self.layout.slots_per_ring = self.layout.slots_per_ring.max(1).min(100_000);

        if self.patterns.is_empty() {
            self.patterns = default_pattern_set();
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        let body = toml::to_string_pretty(self)?;
        Ok(format!(
            "# RingLight Configuration File\n\
             # palette: preset ({}) or stops like \"0:FFFFFF,96:CCFF00,255:EB497F\"\n\
             # fps: frame rate cap, 0 for unlimited\n\
             # wled_ip: single controller covering every slot; use [[wled_devices]] for more\n\n{}",
            get_palette_names().join(", "),
            body
        ))
    }

    pub fn save(&self) -> Result<()> {
        let path = match self.config_path.clone() {
            Some(path) => path,
            None => Self::config_path(None)?,
        };

        let mut sanitized = self.clone();
        sanitized.sanitize();
        std::fs::write(&path, sanitized.to_toml()?)?;
        Ok(())
    }

    /// Whether `palette` names a preset rather than a stop list.
    pub fn palette_is_preset(&self) -> bool {
        builtin_palette(&self.palette).is_some()
    }
}

/// Parse "zoom,noise,sweep" into pattern entries with default settings.
pub fn parse_pattern_list(list: &str) -> Result<Vec<PatternConfig>> {
    let patterns = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| PatternConfig::from_name(name).ok_or_else(|| anyhow!("Unknown pattern '{}'", name)))
        .collect::<Result<Vec<_>>>()?;

    if patterns.is_empty() {
        return Err(anyhow!("Pattern list is empty"));
    }
    Ok(patterns)
}
