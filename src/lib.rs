pub mod accumulator;
pub mod acquisition;
pub mod args;
pub mod complex;
pub mod config;
pub mod datagram_sink;
pub mod device;
pub mod error;
pub mod fan_out;
pub mod file_sink;
pub mod sim;
pub mod sync;
pub mod timer;

pub use accumulator::ChannelAccumulator;
pub use acquisition::{AcquisitionLoop, AcquisitionParams, AcquisitionSession, Status};
pub use complex::{Complex, Sample, SAMPLE_SIZE};
pub use datagram_sink::DatagramSink;
pub use device::{PacketReceipt, RadioDevice, RxStatus, RxStreamer};
pub use error::{Error, Result};
pub use file_sink::FileSink;
pub use timer::ScopedTimer;
