//! A software stand-in for a multi-motherboard receiver.
//!
//! Every channel carries a unit-ish test tone with a per-channel phase
//! offset, so aligned captures are easy to eyeball. Streams honour the
//! "N samples starting at T, then done" command and block like hardware
//! would while waiting for the start time.

use std::{
    f64::consts::PI,
    thread,
    time::{Duration, Instant},
};

use tracing::debug;

use crate::{
    complex::Sample,
    device::{
        device_secs, ChannelInfo, DeviceTime, PacketReceipt, RadioDevice, RxStatus, RxStreamer,
        StreamCommand, TimeSource, TuneRequest,
    },
    error::{Error, Result},
};

/// Gain range of the simulated front end (dB)
const GAIN_RANGE: (f64, f64) = (0.0, 76.0);
/// Integer-N tuning lands on multiples of this (Hz)
const INT_N_STEP: f64 = 1e6;

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub mboards: usize,
    pub channels_per_mboard: usize,
    /// Samples per packet, like an MTU-limited fc32 stream
    pub max_samps_per_packet: usize,
    /// Offset of the test tone from the center frequency (Hz)
    pub tone_hz: f64,
    /// Report an overflow after this many packets
    pub fail_after: Option<usize>,
    /// Stop delivering after this many packets
    pub stall_after: Option<usize>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            mboards: 1,
            channels_per_mboard: 2,
            max_samps_per_packet: 363,
            tone_hz: 100e3,
            fail_after: None,
            stall_after: None,
        }
    }
}

impl SimConfig {
    /// Parse a device address string like `"mboards=2, channels=2, spp=1000"`.
    /// Unknown keys are ignored so real device args pass through harmlessly.
    pub fn from_args(args: &str) -> Result<Self> {
        let mut cfg = Self::default();
        for pair in args.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("Malformed device arg {:?}", pair)))?;
            let parse = |v: &str| {
                v.trim()
                    .parse::<usize>()
                    .map_err(|_| Error::Config(format!("Bad value for {}: {:?}", key, v)))
            };
            match key.trim() {
                "mboards" => cfg.mboards = parse(value)?,
                "channels" => cfg.channels_per_mboard = parse(value)?,
                "spp" => cfg.max_samps_per_packet = parse(value)?,
                "fail_after" => cfg.fail_after = Some(parse(value)?),
                "stall_after" => cfg.stall_after = Some(parse(value)?),
                other => debug!(key = other, "Ignoring device arg"),
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mboards == 0 || self.channels_per_mboard == 0 || self.max_samps_per_packet == 0 {
            return Err(Error::Config(
                "mboards, channels and spp must all be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct BoardState {
    time_source: TimeSource,
    clock_source: TimeSource,
    time_set: bool,
}

#[derive(Debug, Clone)]
struct ChanState {
    freq: f64,
    gain: f64,
    antenna: String,
    subdev: String,
}

pub struct SimulatedRadio {
    cfg: SimConfig,
    boards: Vec<BoardState>,
    chans: Vec<ChanState>,
    subdev_spec: String,
    rate: f64,
    /// Host instant that corresponds to device time zero
    epoch: Instant,
}

fn default_chans(cfg: &SimConfig, slots: &[String]) -> Vec<ChanState> {
    (0..cfg.mboards * cfg.channels_per_mboard)
        .map(|ch| ChanState {
            freq: 0.0,
            gain: 0.0,
            antenna: "RX2".into(),
            subdev: slots[ch % cfg.channels_per_mboard].clone(),
        })
        .collect()
}

impl SimulatedRadio {
    pub fn new(cfg: SimConfig) -> Result<Self> {
        cfg.validate()?;
        let slots: Vec<String> = (0..cfg.channels_per_mboard)
            .map(|i| format!("A:{}", i))
            .collect();
        let boards = vec![
            BoardState {
                time_source: TimeSource::Internal,
                clock_source: TimeSource::Internal,
                time_set: false,
            };
            cfg.mboards
        ];
        Ok(Self {
            chans: default_chans(&cfg, &slots),
            subdev_spec: slots.join(" "),
            boards,
            cfg,
            rate: 1e6,
            epoch: Instant::now(),
        })
    }

    pub fn time_set(&self, mboard: usize) -> bool {
        self.boards.get(mboard).map_or(false, |b| b.time_set)
    }

    pub fn time_source(&self, mboard: usize) -> TimeSource {
        self.boards[mboard].time_source
    }

    pub fn clock_source(&self, mboard: usize) -> TimeSource {
        self.boards[mboard].clock_source
    }

    fn chan(&self, ch: usize) -> Result<&ChanState> {
        self.chans.get(ch).ok_or(Error::InvalidChannel {
            channel: ch,
            available: self.chans.len(),
        })
    }

    fn chan_mut(&mut self, ch: usize) -> Result<&mut ChanState> {
        let available = self.chans.len();
        self.chans.get_mut(ch).ok_or(Error::InvalidChannel {
            channel: ch,
            available,
        })
    }

    fn boards_mut(&mut self, mboard: Option<usize>) -> Result<&mut [BoardState]> {
        match mboard {
            None => Ok(&mut self.boards),
            Some(mb) if mb < self.boards.len() => Ok(&mut self.boards[mb..=mb]),
            Some(mb) => Err(Error::Config(format!("No motherboard {}", mb))),
        }
    }
}

impl RadioDevice for SimulatedRadio {
    type Streamer = SimStreamer;

    fn pp_string(&self) -> String {
        format!(
            "Simulated receiver: {} mboard(s), {} rx channel(s) each, subdev {:?}",
            self.cfg.mboards, self.cfg.channels_per_mboard, self.subdev_spec
        )
    }

    fn num_mboards(&self) -> usize {
        self.cfg.mboards
    }

    fn num_rx_channels(&self) -> usize {
        self.chans.len()
    }

    fn set_rx_subdev_spec(&mut self, spec: &str) -> Result<()> {
        let slots: Vec<String> = spec.split_whitespace().map(str::to_owned).collect();
        if slots.is_empty() {
            return Err(Error::Config(format!("Empty subdev spec {:?}", spec)));
        }
        self.cfg.channels_per_mboard = slots.len();
        self.chans = default_chans(&self.cfg, &slots);
        self.subdev_spec = slots.join(" ");
        Ok(())
    }

    fn set_rx_rate(&mut self, rate: f64) -> Result<()> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(Error::Config(format!("Invalid sample rate {}", rate)));
        }
        self.rate = rate;
        Ok(())
    }

    fn rx_rate(&self, _ch: usize) -> f64 {
        self.rate
    }

    fn set_rx_freq(&mut self, req: TuneRequest, ch: usize) -> Result<()> {
        let freq = if req.integer_n {
            (req.target_freq / INT_N_STEP).round() * INT_N_STEP
        } else {
            req.target_freq
        };
        self.chan_mut(ch)?.freq = freq;
        Ok(())
    }

    fn rx_freq(&self, ch: usize) -> f64 {
        self.chan(ch).map_or(0.0, |c| c.freq)
    }

    fn set_rx_gain(&mut self, gain: f64, ch: usize) -> Result<()> {
        self.chan_mut(ch)?.gain = gain.clamp(GAIN_RANGE.0, GAIN_RANGE.1);
        Ok(())
    }

    fn rx_gain(&self, ch: usize) -> f64 {
        self.chan(ch).map_or(0.0, |c| c.gain)
    }

    fn set_rx_antenna(&mut self, ant: &str, ch: usize) -> Result<()> {
        match ant {
            "RX2" | "TX/RX" => {
                self.chan_mut(ch)?.antenna = ant.to_owned();
                Ok(())
            }
            _ => Err(Error::Config(format!("Unknown antenna {:?}", ant))),
        }
    }

    fn rx_antenna(&self, ch: usize) -> String {
        self.chan(ch).map(|c| c.antenna.clone()).unwrap_or_default()
    }

    fn rx_info(&self, ch: usize) -> ChannelInfo {
        let mb = ch / self.cfg.channels_per_mboard;
        let subdev = self.chan(ch).map(|c| c.subdev.clone()).unwrap_or_default();
        ChannelInfo {
            mboard_id: "Simulated".into(),
            mboard_serial: format!("SIM{:04}", mb),
            mboard_name: format!("sim{}", mb),
            rx_id: "Sim RX".into(),
            rx_subdev_name: format!("Sim RX ({})", subdev),
            rx_subdev_spec: self.subdev_spec.clone(),
            freq_hz: self.rx_freq(ch),
            rate_sps: self.rx_rate(ch),
            gain_db: self.rx_gain(ch),
            antenna: self.rx_antenna(ch),
        }
    }

    fn set_time_now(&mut self, _time: DeviceTime, mboard: Option<usize>) -> Result<()> {
        for b in self.boards_mut(mboard)? {
            b.time_set = true;
        }
        self.epoch = Instant::now();
        Ok(())
    }

    fn set_time_unknown_pps(&mut self, _time: DeviceTime) -> Result<()> {
        for b in &mut self.boards {
            b.time_set = true;
        }
        self.epoch = Instant::now();
        Ok(())
    }

    fn set_time_source(&mut self, source: TimeSource, mboard: Option<usize>) -> Result<()> {
        for b in self.boards_mut(mboard)? {
            b.time_source = source;
        }
        Ok(())
    }

    fn set_clock_source(&mut self, source: TimeSource, mboard: Option<usize>) -> Result<()> {
        for b in self.boards_mut(mboard)? {
            b.clock_source = source;
        }
        Ok(())
    }

    fn rx_stream(&mut self, channels: &[usize]) -> Result<SimStreamer> {
        for &ch in channels {
            self.chan(ch)?;
        }
        Ok(SimStreamer {
            channels: channels.to_vec(),
            max_samps: self.cfg.max_samps_per_packet,
            rate: self.rate,
            tone_hz: self.cfg.tone_hz,
            epoch: self.epoch,
            fail_after: self.cfg.fail_after,
            stall_after: self.cfg.stall_after,
            pending: None,
            next_index: 0,
            packets: 0,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    remaining: usize,
    start: Option<DeviceTime>,
    issued_at: Instant,
}

pub struct SimStreamer {
    channels: Vec<usize>,
    max_samps: usize,
    rate: f64,
    tone_hz: f64,
    epoch: Instant,
    fail_after: Option<usize>,
    stall_after: Option<usize>,
    pending: Option<Pending>,
    next_index: usize,
    packets: usize,
}

fn to_std(time: DeviceTime) -> Duration {
    Duration::from_secs_f64(time.to_seconds().max(0.0))
}

impl SimStreamer {
    fn now(&self) -> DeviceTime {
        device_secs(self.epoch.elapsed().as_secs_f64())
    }

    fn idle(&self, timeout: Duration) -> PacketReceipt {
        thread::sleep(timeout);
        PacketReceipt::timeout(self.now())
    }

    fn sample(&self, stream_ch: usize, index: usize) -> Sample {
        let t = index as f64 / self.rate;
        let phase = 2.0 * PI * self.tone_hz * t + stream_ch as f64 * PI / 4.0;
        Sample::new(0.5 * phase.cos() as f32, 0.5 * phase.sin() as f32)
    }
}

impl RxStreamer for SimStreamer {
    fn num_channels(&self) -> usize {
        self.channels.len()
    }

    fn max_samples_per_call(&self) -> usize {
        self.max_samps
    }

    fn issue_stream_command(&mut self, cmd: StreamCommand) -> Result<()> {
        self.pending = Some(Pending {
            remaining: cmd.num_samps,
            start: cmd.start_time,
            issued_at: Instant::now(),
        });
        self.next_index = 0;
        self.packets = 0;
        Ok(())
    }

    fn recv(&mut self, buffs: &mut [&mut [Sample]], timeout: Duration) -> PacketReceipt {
        let pending = match self.pending {
            Some(p) if p.remaining > 0 => p,
            _ => return self.idle(timeout),
        };
        if self.stall_after == Some(self.packets) {
            return self.idle(timeout);
        }
        if self.fail_after == Some(self.packets) {
            return PacketReceipt {
                samples: 0,
                status: RxStatus::Other("ERROR_CODE_OVERFLOW (simulated)".into()),
                time: self.now(),
            };
        }

        // Wait for the scheduled start, but never past our timeout
        let start_at = match pending.start {
            Some(t) => self.epoch + to_std(t),
            None => pending.issued_at,
        };
        let wait = start_at.saturating_duration_since(Instant::now());
        if wait > timeout {
            return self.idle(timeout);
        }
        thread::sleep(wait);

        let room = buffs.iter().map(|b| b.len()).min().unwrap_or(self.max_samps);
        let n = pending.remaining.min(self.max_samps).min(room);
        for (stream_ch, buf) in buffs.iter_mut().enumerate() {
            for (j, s) in buf[..n].iter_mut().enumerate() {
                *s = self.sample(stream_ch, self.next_index + j);
            }
        }
        let base = pending.start.map_or(0.0, |t| t.to_seconds());
        let time = device_secs(base + self.next_index as f64 / self.rate);

        self.next_index += n;
        self.packets += 1;
        self.pending = Some(Pending {
            remaining: pending.remaining - n,
            ..pending
        });
        PacketReceipt {
            samples: n,
            status: RxStatus::None,
            time,
        }
    }
}
