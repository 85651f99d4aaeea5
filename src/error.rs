//! Error types shared by the acquisition loop and the sinks

use std::{io, path::PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The stream stopped delivering before the full sample count arrived
    #[error("Receive timeout before all samples received ({received} of {target})")]
    Timeout { received: usize, target: usize },
    /// The device flagged a packet with something other than a timeout
    #[error("Receiver error {0}")]
    Device(String),
    #[error("Invalid channel {channel} specified, device has {available} rx channels")]
    InvalidChannel { channel: usize, available: usize },
    #[error("Invalid channel list entry {0:?}")]
    InvalidChannelList(String),
    #[error("Range {offset}+{count} is out of bounds for a buffer of {len} samples")]
    OutOfRange {
        offset: usize,
        count: usize,
        len: usize,
    },
    #[error("Could not write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Datagram send failed: {0}")]
    Send(#[source] io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{} channel(s) failed to write", .0.len())]
    ChannelWrites(Vec<ChannelWriteFailure>),
}

/// A single channel's file output that did not make it to disk
#[derive(Debug)]
pub struct ChannelWriteFailure {
    pub channel: usize,
    pub error: Error,
}
