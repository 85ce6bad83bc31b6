use anyhow::{anyhow, Result};
use ddp_rs::connection::DDPConnection;
use ddp_rs::protocol::{PixelConfig, ID};
use serde::{Deserialize, Serialize};
use std::net::UdpSocket;
use std::time::{Duration, Instant};

// WLED DDP timeout is ~1 second, so send keepalive every 500ms to be safe
const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(500);

const DDP_PORT: u16 = 4048;

/// One WLED controller and the window of the frame it displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WLEDDevice {
    pub ip: String,
    pub led_offset: usize,
    pub led_count: usize,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl WLEDDevice {
    fn byte_range(&self) -> std::ops::Range<usize> {
        self.led_offset * 3..(self.led_offset + self.led_count) * 3
    }
}

pub struct MultiDeviceConfig {
    pub devices: Vec<WLEDDevice>,
    pub fail_fast: bool,
}

impl MultiDeviceConfig {
    /// Reject empty device lists, overlapping windows and windows that run
    /// past the end of a `total_leds` frame.
    pub fn validate(&self, total_leds: usize) -> Result<()> {
        let enabled: Vec<&WLEDDevice> = self.devices.iter().filter(|d| d.enabled).collect();
        if enabled.is_empty() {
            return Err(anyhow!("No devices configured"));
        }

        for (i, dev1) in enabled.iter().enumerate() {
            let dev1_end = dev1.led_offset + dev1.led_count;
            if dev1_end > total_leds {
                return Err(anyhow!(
                    "Device {} wants LEDs {}-{}, frame has {} LEDs",
                    dev1.ip,
                    dev1.led_offset,
                    dev1_end.saturating_sub(1),
                    total_leds
                ));
            }

            for dev2 in &enabled[i + 1..] {
                let dev2_end = dev2.led_offset + dev2.led_count;
                if dev1.led_offset < dev2_end && dev1_end > dev2.led_offset {
                    return Err(anyhow!(
                        "Overlapping LED ranges: Device {} ({}-{}) overlaps with Device {} ({}-{})",
                        dev1.ip,
                        dev1.led_offset,
                        dev1_end - 1,
                        dev2.ip,
                        dev2.led_offset,
                        dev2_end - 1
                    ));
                }
            }
        }

        Ok(())
    }
}

struct DeviceConnection {
    device_config: WLEDDevice,
    ddp_connection: DDPConnection,
    last_send_time: Instant,
}

impl DeviceConnection {
    fn new(device_config: WLEDDevice) -> Result<Self> {
        let dest_addr = format!("{}:{}", device_config.ip, DDP_PORT);
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        let ddp_connection = DDPConnection::try_new(&dest_addr, PixelConfig::default(), ID::Default, socket)?;

        Ok(DeviceConnection {
            device_config,
            ddp_connection,
            last_send_time: Instant::now(),
        })
    }
}

/// Whether a device window needs to go on the wire this frame: anything lit,
/// or a keepalive so WLED does not drop back to its own effects.
fn should_send(device_frame: &[u8], since_last_send: Duration) -> bool {
    since_last_send >= KEEPALIVE_INTERVAL || device_frame.iter().any(|&b| b != 0)
}

pub struct MultiDeviceManager {
    devices: Vec<DeviceConnection>,
    fail_fast: bool,
}

impl MultiDeviceManager {
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn new(config: MultiDeviceConfig, total_leds: usize) -> Result<Self> {
        config.validate(total_leds)?;

        let mut devices = Vec::new();
        for device_config in &config.devices {
            if device_config.enabled {
                match DeviceConnection::new(device_config.clone()) {
                    Ok(conn) => devices.push(conn),
                    Err(e) => {
                        tracing::warn!(ip = %device_config.ip, error = %e, "failed to connect");
                    }
                }
            }
        }

        if devices.is_empty() {
            return Err(anyhow!("No devices connected successfully"));
        }

        Ok(MultiDeviceManager { devices, fail_fast: config.fail_fast })
    }

    /// Send packed RGB bytes, one window per device. Returns the per-device
    /// errors that were tolerated; with `fail_fast` the first one aborts.
    pub fn send_frame(&mut self, frame: &[u8]) -> Result<Vec<String>> {
        self.send(frame, false)
    }

    /// Like `send_frame`, but every window goes out even when it is all zero.
    /// Used to turn the LEDs off.
    pub fn send_frame_forced(&mut self, frame: &[u8]) -> Result<Vec<String>> {
        self.send(frame, true)
    }

    fn send(&mut self, frame: &[u8], force: bool) -> Result<Vec<String>> {
        // Frame size should be divisible by 3 (RGB)
        if frame.len() % 3 != 0 {
            return Err(anyhow!(
                "Frame size must be divisible by 3 (RGB), got {} bytes",
                frame.len()
            ));
        }

        let mut errors = Vec::new();

        for device in &mut self.devices {
            let range = device.device_config.byte_range();
            let Some(device_frame) = frame.get(range) else {
                let err = format!(
                    "Device {} range exceeds frame size (device wants LEDs {}-{}, frame has {} LEDs)",
                    device.device_config.ip,
                    device.device_config.led_offset,
                    device.device_config.led_offset + device.device_config.led_count - 1,
                    frame.len() / 3
                );
                if self.fail_fast {
                    return Err(anyhow!(err));
                }
                errors.push(err);
                continue;
            };

            if !force && !should_send(device_frame, device.last_send_time.elapsed()) {
                continue;
            }

            match device.ddp_connection.write(device_frame) {
                Ok(_) => device.last_send_time = Instant::now(),
                Err(e) => {
                    let err = format!("Failed to send to {}: {:?}", device.device_config.ip, e);
                    if self.fail_fast {
                        return Err(anyhow!(err));
                    }
                    errors.push(err);
                }
            }
        }

        Ok(errors)
    }
}
