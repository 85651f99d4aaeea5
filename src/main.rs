use chrono::Utc;
use clap::Parser;
use multi_rx::{
    args::{convert_filter, Args},
    config::{validate_channels, RunConfig},
    datagram_sink::{self, DatagramSink},
    fan_out::fan_out,
    device::{ChannelInfo, RadioDevice, TuneRequest},
    sim::{SimConfig, SimulatedRadio},
    sync::synchronize,
    AcquisitionLoop, AcquisitionParams, Error, FileSink,
};
use tracing::{error, info, warn};

fn setup<D: RadioDevice>(dev: &mut D, cfg: &RunConfig) -> multi_rx::Result<()> {
    // The subdev spec changes the channel mapping, so it goes first
    if let Some(spec) = &cfg.subdev {
        dev.set_rx_subdev_spec(spec)?;
    }
    info!("Using Device: {}", dev.pp_string());
    info!(
        mboards = dev.num_mboards(),
        rx_channels = dev.num_rx_channels(),
        "Device topology"
    );

    info!("Setting RX Rate: {} Msps...", cfg.rate / 1e6);
    dev.set_rx_rate(cfg.rate)?;
    info!("Actual RX Rate: {} Msps...", dev.rx_rate(0) / 1e6);

    info!("Setting RX Freq: {} MHz...", cfg.freq / 1e6);
    let tune = TuneRequest {
        target_freq: cfg.freq,
        integer_n: cfg.integer_n,
    };
    for ch in 0..dev.num_rx_channels() {
        dev.set_rx_freq(tune, ch)?;
    }
    info!("Actual RX Freq: {} MHz...", dev.rx_freq(0) / 1e6);

    info!("Setting RX Gain: {} dB...", cfg.gain);
    for ch in 0..dev.num_rx_channels() {
        dev.set_rx_gain(cfg.gain, ch)?;
    }
    info!("Actual RX Gain: {} dB...", dev.rx_gain(0));

    if let Some(ant) = &cfg.antenna {
        for ch in 0..dev.num_rx_channels() {
            dev.set_rx_antenna(ant, ch)?;
        }
    }

    synchronize(dev, cfg.sync)
}

fn run<D: RadioDevice>(dev: &mut D, cfg: &RunConfig) -> multi_rx::Result<()> {
    setup(dev, cfg)?;
    validate_channels(&cfg.channels, dev.num_rx_channels())?;

    let mut rx_stream = dev.rx_stream(&cfg.channels)?;
    info!(
        utc = %Utc::now(),
        "Begin streaming {} samples, {} seconds in the future...",
        cfg.total_samples,
        cfg.secs_in_future
    );
    let params = AcquisitionParams::scheduled(cfg.total_samples, cfg.secs_in_future, cfg.verbose)?;
    let session = AcquisitionLoop::new(&mut rx_stream, params).run()?;
    session.log_summary();
    session.check()?;

    let files = cfg.prefix.as_deref().map(|prefix| {
        let info: Vec<ChannelInfo> = cfg.channels.iter().map(|&ch| dev.rx_info(ch)).collect();
        (FileSink::new(prefix), info)
    });
    let datagrams = cfg.destination.as_ref().map(|dest| {
        move || -> multi_rx::Result<_> {
            info!("Sending samples to {}:{}", dest.host, dest.port);
            let socket = datagram_sink::connect(&dest.host, dest.port)?;
            Ok(DatagramSink::new(socket, cfg.samples_per_datagram))
        }
    });
    fan_out(
        &session,
        files.as_ref().map(|(sink, info)| (sink, info.as_slice())),
        datagrams,
    )
}

fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(convert_filter(args.verbose.log_level_filter()))
        .with_writer(std::io::stderr)
        .init();

    let result = RunConfig::try_from(args).and_then(|cfg| {
        info!("Creating the device with: {}...", cfg.device_args);
        let mut dev = SimulatedRadio::new(SimConfig::from_args(&cfg.device_args)?)?;
        run(&mut dev, &cfg)
    });

    match result {
        Ok(()) => info!("Done!"),
        // Partial data is expected here, not a crash
        Err(e @ Error::Timeout { .. }) => warn!("{}", e),
        Err(Error::ChannelWrites(failures)) => {
            for f in &failures {
                error!(channel = f.channel, "Sink I/O failure: {}", f.error);
            }
            std::process::exit(1);
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
