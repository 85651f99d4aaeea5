//! Fire-and-forget UDP export of the captured buffers.
//!
//! Wire format, every field native byte order:
//!
//! ```text
//! [u32] number of channels
//! [u32] samples per channel
//! [u32] datagrams per channel = floor(samples / samples_per_datagram)
//! then for each channel, for each datagram:
//!       samples_per_datagram * 8 bytes of fc32 samples
//! ```
//!
//! There are no sequence numbers, acks or retries. Trailing samples that
//! don't fill a whole datagram are not sent.

use std::{
    io,
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    thread,
    time::Duration,
};

use tracing::{debug, info, warn};

use crate::{
    acquisition::AcquisitionSession,
    complex::{sample_bytes, SAMPLE_SIZE},
    error::{Error, Result},
};

pub const DEFAULT_SAMPLES_PER_DATAGRAM: usize = 256;

/// Gap between payload datagrams so the receiver can keep up
pub const DEFAULT_PACING: Duration = Duration::from_millis(10);

/// Something that can push one datagram at a time to a fixed peer
pub trait DatagramSocket {
    fn send_datagram(&mut self, buf: &[u8]) -> io::Result<()>;
}

impl DatagramSocket for UdpSocket {
    fn send_datagram(&mut self, buf: &[u8]) -> io::Result<()> {
        let n = self.send(buf)?;
        if n != buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short datagram send ({} of {} bytes)", n, buf.len()),
            ));
        }
        Ok(())
    }
}

/// Open a UDP socket connected to `host:port`
pub fn connect(host: &str, port: u16) -> Result<UdpSocket> {
    let dest: SocketAddr = (host, port)
        .to_socket_addrs()
        .map_err(|e| Error::Config(format!("Cannot resolve {}:{}: {}", host, port, e)))?
        .next()
        .ok_or_else(|| Error::Config(format!("No address for {}:{}", host, port)))?;
    let bind: SocketAddr = if dest.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };
    let socket = UdpSocket::bind(bind).map_err(Error::Send)?;
    socket.connect(dest).map_err(Error::Send)?;
    Ok(socket)
}

/// Number of whole datagrams a channel of `total` samples is split into
pub fn datagrams_per_channel(total: usize, samples_per_datagram: usize) -> usize {
    if samples_per_datagram == 0 {
        0
    } else {
        total / samples_per_datagram
    }
}

/// The three 4-byte fields that precede the payload
pub fn header_fields(channels: usize, total: usize, datagrams: usize) -> Result<[[u8; 4]; 3]> {
    let field = |name: &str, v: usize| {
        u32::try_from(v)
            .map(u32::to_ne_bytes)
            .map_err(|_| Error::Config(format!("{} ({}) does not fit the 4-byte header", name, v)))
    };
    Ok([
        field("channel count", channels)?,
        field("sample count", total)?,
        field("datagram count", datagrams)?,
    ])
}

/// Summary of a completed send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendSummary {
    pub datagrams_per_channel: usize,
    pub payload_datagrams: usize,
    pub bytes_sent: usize,
}

pub struct DatagramSink<S> {
    socket: S,
    samples_per_datagram: usize,
    pacing: Duration,
}

impl<S: DatagramSocket> DatagramSink<S> {
    pub fn new(socket: S, samples_per_datagram: usize) -> Self {
        Self {
            socket,
            samples_per_datagram,
            pacing: DEFAULT_PACING,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn into_inner(self) -> S {
        self.socket
    }

    fn send(&mut self, buf: &[u8]) -> Result<()> {
        self.socket.send_datagram(buf).map_err(Error::Send)
    }

    /// Send the header then every channel's whole datagrams, in channel order.
    ///
    /// Stops at the first failed send; whatever went out already stays out.
    pub fn send_session(&mut self, session: &AcquisitionSession) -> Result<SendSummary> {
        if self.samples_per_datagram == 0 {
            return Err(Error::Config("samples per datagram must be non-zero".into()));
        }
        let total = session.target();
        let datagrams = datagrams_per_channel(total, self.samples_per_datagram);
        let dropped = total - datagrams * self.samples_per_datagram;
        if dropped > 0 {
            warn!(dropped, "Trailing samples per channel do not fill a datagram and will not be sent");
        }

        for field in header_fields(session.num_channels(), total, datagrams)? {
            self.send(&field)?;
        }
        let mut bytes_sent = 12;
        let mut payload_datagrams = 0;

        for (ch, acc) in session.channels().iter().enumerate() {
            let samples = acc.slice(0, datagrams * self.samples_per_datagram)?;
            for chunk in samples.chunks_exact(self.samples_per_datagram) {
                let bytes = sample_bytes(chunk);
                self.send(bytes)?;
                bytes_sent += bytes.len();
                payload_datagrams += 1;
                thread::sleep(self.pacing);
            }
            debug!(channel = ch, datagrams, "Channel sent");
        }

        info!(
            payload_datagrams,
            bytes = bytes_sent,
            "Sent {} samples per datagram",
            self.samples_per_datagram
        );
        debug_assert_eq!(
            bytes_sent,
            12 + payload_datagrams * self.samples_per_datagram * SAMPLE_SIZE
        );
        Ok(SendSummary {
            datagrams_per_channel: datagrams,
            payload_datagrams,
            bytes_sent,
        })
    }
}
