//! Argument parsing for running from the command line

use clap::Parser;

use crate::{datagram_sink::DEFAULT_SAMPLES_PER_DATAGRAM, sync::SyncMode};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(after_help = "\
Receives time-aligned samples from multiple channels, across several DSPs,
several motherboards, or both. Use --sync to pick how motherboard time is aligned.

  Select multiple channels per motherboard with --subdev, e.g. --subdev \"A:0 B:0\"
  Select multiple motherboards with --args, e.g. --args \"mboards=2\"")]
pub struct Args {
    /// Device address args
    #[clap(long, default_value = "")]
    pub args: String,
    /// Number of seconds in the future to start receiving
    #[clap(long, default_value_t = 1.5)]
    pub secs: f64,
    /// Total number of samples to receive per channel
    #[clap(long, default_value_t = 10000)]
    pub nsamps: usize,
    /// RF center frequency in Hz for all channels
    #[clap(long, default_value_t = 900e6)]
    pub freq: f64,
    /// Rate of incoming samples for all channels
    #[clap(long, default_value_t = 100e6 / 16.0)]
    pub rate: f64,
    /// Gain for the RF chain for all channels
    #[clap(long, default_value_t = 0.0)]
    pub gain: f64,
    /// RX antenna selection for all channels
    #[clap(long)]
    pub ant: Option<String>,
    /// Enables file output with this filename prefix
    #[clap(long)]
    pub prefix: Option<String>,
    /// Enables UDP output to this address
    #[clap(long)]
    pub addr: Option<String>,
    /// UDP port
    #[clap(long, default_value_t = 1337)]
    #[clap(value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,
    /// Samples carried by each UDP datagram
    #[clap(long, default_value_t = DEFAULT_SAMPLES_PER_DATAGRAM as u64)]
    #[clap(value_parser = clap::value_parser!(u64).range(1..))]
    pub datagram_samps: u64,
    /// Synchronization method
    #[clap(long, value_enum, default_value_t = SyncMode::Now)]
    pub sync: SyncMode,
    /// Subdev spec (homogeneous across motherboards)
    #[clap(long)]
    pub subdev: Option<String>,
    /// Disable inner-loop (per packet) verbose output
    #[clap(long)]
    pub dilv: bool,
    /// Tune with integer-N tuning
    #[clap(long)]
    pub int_n: bool,
    /// Which channel(s) to use (specify "0", "1", "0,1", etc)
    #[clap(long, default_value = "0")]
    pub channels: String,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["multi_rx"]);
        assert_eq!(args.nsamps, 10000);
        assert_eq!(args.secs, 1.5);
        assert_eq!(args.rate, 6.25e6);
        assert_eq!(args.port, 1337);
        assert_eq!(args.datagram_samps, 256);
        assert_eq!(args.sync, SyncMode::Now);
        assert_eq!(args.channels, "0");
        assert!(args.prefix.is_none());
        assert!(args.addr.is_none());
        assert!(!args.dilv);
    }

    #[test]
    fn test_full_command_line() {
        let args = Args::parse_from([
            "multi_rx",
            "--nsamps",
            "1000",
            "--sync",
            "mimo",
            "--channels",
            "0,1",
            "--prefix",
            "/tmp/run_",
            "--addr",
            "10.10.0.10",
            "--port",
            "4000",
            "--dilv",
            "--int-n",
            "--subdev",
            "A:0 B:0",
        ]);
        assert_eq!(args.sync, SyncMode::Mimo);
        assert_eq!(args.channels, "0,1");
        assert_eq!(args.prefix.as_deref(), Some("/tmp/run_"));
        assert_eq!(args.port, 4000);
        assert!(args.dilv && args.int_n);
        assert_eq!(args.subdev.as_deref(), Some("A:0 B:0"));
    }

    #[test]
    fn test_rejects_port_zero() {
        assert!(Args::try_parse_from(["multi_rx", "--port", "0"]).is_err());
        assert!(Args::try_parse_from(["multi_rx", "--sync", "gps"]).is_err());
    }
}
