// Sink Module - Where finished frames go
use anyhow::Result;

use crate::multi_device::{MultiDeviceConfig, MultiDeviceManager, WLEDDevice};
use crate::types::{frame_to_bytes, Rgb};

/// Accepts one complete frame, indexed like the layout, and transmits it.
/// `show` blocks until the frame is out; that is the loop's backpressure.
pub trait DisplaySink {
    fn show(&mut self, frame: &[Rgb], brightness: u8) -> Result<()>;

    /// Turn everything off, used on shutdown.
    fn blank(&mut self, len: usize) -> Result<()> {
        self.show(&vec![Rgb::BLACK; len], 0)
    }
}

/// Streams frames to WLED controllers over DDP.
pub struct DdpSink {
    manager: MultiDeviceManager,
}

impl DdpSink {
    pub fn new(devices: &[WLEDDevice], fail_fast: bool, total_leds: usize) -> Result<Self> {
        let config = MultiDeviceConfig { devices: devices.to_vec(), fail_fast };
        let manager = MultiDeviceManager::new(config, total_leds)?;
        tracing::info!(devices = manager.device_count(), "DDP sink ready");
        Ok(DdpSink { manager })
    }
}

impl DisplaySink for DdpSink {
    fn show(&mut self, frame: &[Rgb], brightness: u8) -> Result<()> {
        let bytes = frame_to_bytes(frame, brightness);
        for err in self.manager.send_frame(&bytes)? {
            tracing::warn!("{}", err);
        }
        Ok(())
    }

    // Black frames are normally held back until keepalive; this one must go out now
    fn blank(&mut self, len: usize) -> Result<()> {
        for err in self.manager.send_frame_forced(&vec![0u8; len * 3])? {
            tracing::warn!("{}", err);
        }
        Ok(())
    }
}

/// Discards frames, logging a one-line summary of each at trace level. Used
/// when no controllers are configured.
#[derive(Default)]
pub struct LogSink {
    frames: u64,
}

impl DisplaySink for LogSink {
    fn show(&mut self, frame: &[Rgb], brightness: u8) -> Result<()> {
        self.frames += 1;
        let lit = frame.iter().filter(|c| **c != Rgb::BLACK).count();
        tracing::trace!(frame = self.frames, lit, brightness, "frame");
        Ok(())
    }
}

/// Keeps every frame it is shown.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    pub frames: Vec<Vec<Rgb>>,
    pub brightness: u8,
}

#[cfg(test)]
impl MemorySink {
    pub fn last_frame(&self) -> &[Rgb] {
        self.frames.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
impl DisplaySink for MemorySink {
    fn show(&mut self, frame: &[Rgb], brightness: u8) -> Result<()> {
        self.frames.push(frame.to_vec());
        self.brightness = brightness;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_sends_black_frame() {
        let mut sink = MemorySink::default();
        sink.blank(5).unwrap();
        assert_eq!(sink.last_frame(), &[Rgb::BLACK; 5]);
        assert_eq!(sink.brightness, 0);
    }

    #[test]
    fn test_ddp_blank_goes_out_right_after_a_lit_frame() {
        use std::net::UdpSocket;
        use std::time::Duration;

        let receiver = UdpSocket::bind("127.0.0.1:4048").unwrap();
        receiver.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        let device = WLEDDevice { ip: "127.0.0.1".to_string(), led_offset: 0, led_count: 4, enabled: true };
        let mut sink = DdpSink::new(&[device], true, 4).unwrap();

        sink.show(&[Rgb::RED; 4], 255).unwrap();
        sink.blank(4).unwrap();

        // DDP header first, pixel payload last
        let mut buf = [0u8; 1500];
        let n = receiver.recv(&mut buf).unwrap();
        assert!(n >= 12);
        assert_eq!(&buf[n - 12..n], &[255u8, 0, 0].repeat(4)[..]);

        let n = receiver.recv(&mut buf).unwrap();
        assert!(n >= 12);
        assert!(buf[n - 12..n].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_log_sink_counts() {
        let mut sink = LogSink::default();
        sink.show(&[Rgb::RED, Rgb::BLACK], 255).unwrap();
        sink.show(&[Rgb::RED, Rgb::BLACK], 255).unwrap();
        assert_eq!(sink.frames, 2);
    }
}
