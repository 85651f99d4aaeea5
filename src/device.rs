//! The boundary to the radio hardware.
//!
//! Everything that actually touches a device (tuning, clocking, moving
//! samples off the wire) lives behind these two traits. The acquisition
//! loop and the sinks only ever see [`RxStreamer`] and [`ChannelInfo`].

use hifitime::{Duration, Unit};

use crate::{complex::Sample, error::Result};

/// Time as reported by the device, measured from its own epoch
pub type DeviceTime = Duration;

/// Convert a (possibly fractional) number of seconds into device time
pub fn device_secs(secs: f64) -> DeviceTime {
    secs * Unit::Second
}

/// Split a device time into whole seconds and the fractional remainder
pub fn full_and_frac_secs(time: DeviceTime) -> (i64, f64) {
    let secs = time.to_seconds();
    let full = secs.floor();
    (full as i64, secs - full)
}

/// Outcome classification of one receive call, decided once by the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RxStatus {
    None,
    Timeout,
    Other(String),
}

/// What a single bounded receive call handed back
#[derive(Debug, Clone, PartialEq)]
pub struct PacketReceipt {
    /// Samples written into each channel buffer (identical across channels)
    pub samples: usize,
    pub status: RxStatus,
    pub time: DeviceTime,
}

impl PacketReceipt {
    pub fn timeout(time: DeviceTime) -> Self {
        Self {
            samples: 0,
            status: RxStatus::Timeout,
            time,
        }
    }
}

/// "Stream exactly N samples starting at T, then stop"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamCommand {
    pub num_samps: usize,
    /// `None` streams immediately
    pub start_time: Option<DeviceTime>,
}

/// A lock-step receive stream over a set of channels.
///
/// Channel `i` of the stream is the `i`-th entry of the channel list it was
/// opened with, independent of the hardware channel number.
pub trait RxStreamer {
    fn num_channels(&self) -> usize;
    /// Largest number of samples a single `recv` can deliver per channel
    fn max_samples_per_call(&self) -> usize;
    fn issue_stream_command(&mut self, cmd: StreamCommand) -> Result<()>;
    /// Block for at most `timeout` waiting for one packet. `buffs` holds one
    /// slice per channel, each at least `max_samples_per_call` long.
    fn recv(&mut self, buffs: &mut [&mut [Sample]], timeout: std::time::Duration)
        -> PacketReceipt;
}

/// Descriptive metadata for one channel, as it goes into the meta file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelInfo {
    pub mboard_id: String,
    pub mboard_serial: String,
    pub mboard_name: String,
    pub rx_id: String,
    pub rx_subdev_name: String,
    pub rx_subdev_spec: String,
    pub freq_hz: f64,
    pub rate_sps: f64,
    pub gain_db: f64,
    pub antenna: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuneRequest {
    pub target_freq: f64,
    pub integer_n: bool,
}

impl TuneRequest {
    pub fn new(target_freq: f64) -> Self {
        Self {
            target_freq,
            integer_n: false,
        }
    }
}

/// Where a motherboard takes its clock or time reference from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    Internal,
    External,
    Mimo,
}

/// A (possibly multi-motherboard) receive device
pub trait RadioDevice {
    type Streamer: RxStreamer;

    /// Human readable description of the whole device
    fn pp_string(&self) -> String;
    fn num_mboards(&self) -> usize;
    fn num_rx_channels(&self) -> usize;

    fn set_rx_subdev_spec(&mut self, spec: &str) -> Result<()>;
    fn set_rx_rate(&mut self, rate: f64) -> Result<()>;
    fn rx_rate(&self, ch: usize) -> f64;
    fn set_rx_freq(&mut self, req: TuneRequest, ch: usize) -> Result<()>;
    fn rx_freq(&self, ch: usize) -> f64;
    fn set_rx_gain(&mut self, gain: f64, ch: usize) -> Result<()>;
    fn rx_gain(&self, ch: usize) -> f64;
    fn set_rx_antenna(&mut self, ant: &str, ch: usize) -> Result<()>;
    fn rx_antenna(&self, ch: usize) -> String;
    fn rx_info(&self, ch: usize) -> ChannelInfo;

    /// Set the time on one motherboard, or all of them when `mboard` is `None`
    fn set_time_now(&mut self, time: DeviceTime, mboard: Option<usize>) -> Result<()>;
    /// Latch `time` on the next PPS edge on every motherboard
    fn set_time_unknown_pps(&mut self, time: DeviceTime) -> Result<()>;
    fn set_time_source(&mut self, source: TimeSource, mboard: Option<usize>) -> Result<()>;
    fn set_clock_source(&mut self, source: TimeSource, mboard: Option<usize>) -> Result<()>;

    /// Open a lock-step stream over `channels` (hardware channel numbers)
    fn rx_stream(&mut self, channels: &[usize]) -> Result<Self::Streamer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_and_frac_secs() {
        let (full, frac) = full_and_frac_secs(device_secs(1.625));
        assert_eq!(full, 1);
        assert!((frac - 0.625).abs() < 1e-9);
    }

    #[test]
    fn test_timeout_receipt_is_empty() {
        let r = PacketReceipt::timeout(device_secs(0.0));
        assert_eq!(r.samples, 0);
        assert_eq!(r.status, RxStatus::Timeout);
    }
}
