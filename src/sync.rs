//! Aligning device time across motherboards before streaming

use std::{thread, time::Duration};

use clap::ValueEnum;
use tracing::info;

use crate::{
    device::{device_secs, RadioDevice, TimeSource},
    error::{Error, Result},
};

/// How long to wait for a PPS edge to latch the new time
pub const PPS_SETTLE: Duration = Duration::from_secs(1);
/// How long the MIMO slave needs to lock to the master
pub const MIMO_SETTLE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SyncMode {
    /// Set every board's time immediately (off by a few round trips)
    Now,
    /// Latch time on the external PPS edge
    Pps,
    /// Slave board 1 to board 0 over the MIMO cable
    Mimo,
}

/// Zero the device time on every motherboard according to `mode`
pub fn synchronize<D: RadioDevice + ?Sized>(device: &mut D, mode: SyncMode) -> Result<()> {
    info!(?mode, "Setting device timestamp to 0...");
    let zero = device_secs(0.0);
    match mode {
        SyncMode::Now => device.set_time_now(zero, None),
        SyncMode::Pps => {
            device.set_time_source(TimeSource::External, None)?;
            device.set_time_unknown_pps(zero)?;
            thread::sleep(PPS_SETTLE);
            Ok(())
        }
        SyncMode::Mimo => {
            let boards = device.num_mboards();
            if boards != 2 {
                return Err(Error::Config(format!(
                    "MIMO sync needs exactly 2 motherboards, found {}",
                    boards
                )));
            }
            device.set_clock_source(TimeSource::Mimo, Some(1))?;
            device.set_time_source(TimeSource::Mimo, Some(1))?;
            device.set_time_now(zero, Some(0))?;
            thread::sleep(MIMO_SETTLE);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimConfig, SimulatedRadio};

    #[test]
    fn test_now() {
        let mut dev = SimulatedRadio::new(SimConfig::default()).unwrap();
        synchronize(&mut dev, SyncMode::Now).unwrap();
        assert!(dev.time_set(0));
    }

    #[test]
    fn test_mimo_requires_two_boards() {
        let mut dev = SimulatedRadio::new(SimConfig {
            mboards: 1,
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(
            synchronize(&mut dev, SyncMode::Mimo),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_mimo_slaves_second_board() {
        let mut dev = SimulatedRadio::new(SimConfig {
            mboards: 2,
            ..Default::default()
        })
        .unwrap();
        synchronize(&mut dev, SyncMode::Mimo).unwrap();
        assert_eq!(dev.clock_source(1), TimeSource::Mimo);
        assert_eq!(dev.time_source(1), TimeSource::Mimo);
        assert_eq!(dev.time_source(0), TimeSource::Internal);
        assert!(dev.time_set(0));
    }
}
