//! Normalizing the command line into what the pipeline needs

use crate::{
    acquisition::first_timeout,
    args::Args,
    error::{Error, Result},
    sync::SyncMode,
};

/// Split a channel list like `"0,1"` (quotes and apostrophes also separate)
pub fn parse_channel_list(list: &str) -> Result<Vec<usize>> {
    let channels = list
        .split(|c| matches!(c, ',' | '\'' | '"'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| Error::InvalidChannelList(s.to_owned()))
        })
        .collect::<Result<Vec<_>>>()?;
    if channels.is_empty() {
        return Err(Error::InvalidChannelList(list.to_owned()));
    }
    Ok(channels)
}

/// Every requested channel has to exist on the device
pub fn validate_channels(channels: &[usize], available: usize) -> Result<()> {
    match channels.iter().find(|&&ch| ch >= available) {
        Some(&channel) => Err(Error::InvalidChannel { channel, available }),
        None => Ok(()),
    }
}

/// Where the datagram sink should send to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

/// Validated, normalized run configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub device_args: String,
    pub secs_in_future: f64,
    pub total_samples: usize,
    pub freq: f64,
    pub rate: f64,
    pub gain: f64,
    pub antenna: Option<String>,
    pub subdev: Option<String>,
    pub integer_n: bool,
    pub sync: SyncMode,
    pub channels: Vec<usize>,
    pub prefix: Option<String>,
    pub destination: Option<Destination>,
    pub samples_per_datagram: usize,
    pub verbose: bool,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

impl TryFrom<Args> for RunConfig {
    type Error = Error;

    fn try_from(args: Args) -> Result<Self> {
        first_timeout(args.secs).map_err(|_| {
            Error::Config(format!(
                "--secs must be a non-negative number of seconds, got {}",
                args.secs
            ))
        })?;
        if !(args.rate.is_finite() && args.rate > 0.0) {
            return Err(Error::Config(format!("--rate must be positive, got {}", args.rate)));
        }
        let samples_per_datagram = usize::try_from(args.datagram_samps)
            .map_err(|_| Error::Config("--datagram-samps is too large".into()))?;
        Ok(Self {
            channels: parse_channel_list(&args.channels)?,
            destination: non_empty(args.addr).map(|host| Destination {
                host,
                port: args.port,
            }),
            prefix: non_empty(args.prefix),
            antenna: non_empty(args.ant),
            subdev: non_empty(args.subdev),
            device_args: args.args,
            secs_in_future: args.secs,
            total_samples: args.nsamps,
            freq: args.freq,
            rate: args.rate,
            gain: args.gain,
            integer_n: args.int_n,
            sync: args.sync,
            samples_per_datagram,
            verbose: !args.dilv,
        })
    }
}
