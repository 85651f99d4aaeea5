//! The bounded receive loop.
//!
//! One stream command asks the device for exactly `target` samples, then we
//! keep calling `recv` until they've all arrived, the stream goes quiet, or
//! the device reports an error. Every call advances all channels together.

use std::time::Duration;

use tracing::{info, warn};

use crate::{
    accumulator::ChannelAccumulator,
    complex::Sample,
    device::{full_and_frac_secs, DeviceTime, RxStatus, RxStreamer, StreamCommand},
    error::{Error, Result},
};

/// Once the first packet is in, the rest should already be in flight
pub const SUBSEQUENT_TIMEOUT: Duration = Duration::from_millis(100);

/// Padding added on top of the start offset for the first receive
pub const FIRST_TIMEOUT_PADDING: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct AcquisitionParams {
    /// Samples per channel to collect
    pub target: usize,
    /// Device time to start streaming at, `None` to start immediately
    pub start_time: Option<DeviceTime>,
    /// How long the first `recv` may block
    pub first_timeout: Duration,
    /// Log every packet as it arrives
    pub verbose: bool,
}

/// How long the first `recv` may wait for a stream starting `secs_in_future` from now.
///
/// Negative, non-finite or unrepresentable offsets are a config error.
pub fn first_timeout(secs_in_future: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs_in_future)
        .ok()
        .and_then(|offset| offset.checked_add(FIRST_TIMEOUT_PADDING))
        .ok_or_else(|| {
            Error::Config(format!(
                "start offset of {} seconds is out of range",
                secs_in_future
            ))
        })
}

impl AcquisitionParams {
    /// Stream `target` samples starting `secs_in_future` seconds from device time zero
    pub fn scheduled(target: usize, secs_in_future: f64, verbose: bool) -> Result<Self> {
        let first_timeout = first_timeout(secs_in_future)?;
        Ok(Self {
            target,
            start_time: Some(crate::device::device_secs(secs_in_future)),
            first_timeout,
            verbose,
        })
    }
}

/// How an acquisition ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Completed,
    /// Stream went quiet before the target; whatever arrived is kept
    TimedOut,
    /// Device error with its description
    Failed(String),
}

#[derive(Debug)]
enum LoopState {
    Idle,
    Streaming,
    Done(Status),
}

/// The per-channel buffers of one finished run plus how it ended
#[derive(Debug)]
pub struct AcquisitionSession {
    channels: Vec<ChannelAccumulator>,
    target: usize,
    accumulated: usize,
    status: Status,
}

impl AcquisitionSession {
    /// Build a session from already-filled buffers. All buffers must be the same length.
    pub fn from_parts(channels: Vec<ChannelAccumulator>, target: usize, status: Status) -> Self {
        let accumulated = channels.first().map_or(0, ChannelAccumulator::len);
        debug_assert!(channels.iter().all(|c| c.len() == accumulated));
        Self {
            channels,
            target,
            accumulated,
            status,
        }
    }

    pub fn channels(&self) -> &[ChannelAccumulator] {
        &self.channels
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn accumulated(&self) -> usize {
        self.accumulated
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn is_complete(&self) -> bool {
        self.status == Status::Completed
    }

    /// Turn a non-completed ending into the matching error
    pub fn check(&self) -> Result<()> {
        match &self.status {
            Status::Completed => Ok(()),
            Status::TimedOut => Err(Error::Timeout {
                received: self.accumulated,
                target: self.target,
            }),
            Status::Failed(msg) => Err(Error::Device(msg.clone())),
        }
    }

    pub fn log_summary(&self) {
        for (i, ch) in self.channels.iter().enumerate() {
            info!(channel = i, samples = ch.len(), "Accumulated buffer");
        }
    }
}

/// Drives a streamer from `Idle` through `Streaming` to one terminal status
pub struct AcquisitionLoop<'a, S: RxStreamer + ?Sized> {
    streamer: &'a mut S,
    params: AcquisitionParams,
    state: LoopState,
}

impl<'a, S: RxStreamer + ?Sized> AcquisitionLoop<'a, S> {
    pub fn new(streamer: &'a mut S, params: AcquisitionParams) -> Self {
        Self {
            streamer,
            params,
            state: LoopState::Idle,
        }
    }

    /// Issue the stream command and receive until a terminal state.
    ///
    /// Only a failure to issue the stream command is returned as `Err`;
    /// timeouts and device errors end up in the session status so the
    /// partial buffers stay available.
    pub fn run(mut self) -> Result<AcquisitionSession> {
        let target = self.params.target;
        let num_channels = self.streamer.num_channels();
        let max_samps = self.streamer.max_samples_per_call();

        let mut channels: Vec<_> = (0..num_channels)
            .map(|_| ChannelAccumulator::with_capacity(target))
            .collect();
        let mut buffs = vec![vec![Sample::default(); max_samps]; num_channels];
        let mut accumulated = 0usize;

        self.streamer.issue_stream_command(StreamCommand {
            num_samps: target,
            start_time: self.params.start_time,
        })?;
        self.state = LoopState::Streaming;

        let mut timeout = self.params.first_timeout;
        while accumulated < target {
            let receipt = {
                let mut views: Vec<&mut [Sample]> =
                    buffs.iter_mut().map(|b| b.as_mut_slice()).collect();
                self.streamer.recv(&mut views, timeout)
            };
            timeout = SUBSEQUENT_TIMEOUT;

            // A driver can't hand back more than fits in the buffers
            let n = receipt.samples.min(max_samps);
            for (acc, buf) in channels.iter_mut().zip(&buffs) {
                acc.append(&buf[..n]);
            }
            accumulated += n;

            match receipt.status {
                RxStatus::Timeout => {
                    warn!(accumulated, target, "Receive timed out");
                    self.state = LoopState::Done(Status::TimedOut);
                    break;
                }
                RxStatus::Other(msg) => {
                    self.state = LoopState::Done(Status::Failed(msg));
                    break;
                }
                RxStatus::None => {
                    if self.params.verbose {
                        let (full, frac) = full_and_frac_secs(receipt.time);
                        info!(
                            "Received packet: {} samples, {} full secs, {} frac secs",
                            n, full, frac
                        );
                    }
                }
            }
        }

        let status = match self.state {
            LoopState::Done(status) => status,
            LoopState::Streaming | LoopState::Idle => Status::Completed,
        };
        Ok(AcquisitionSession {
            channels,
            target,
            accumulated,
            status,
        })
    }
}
