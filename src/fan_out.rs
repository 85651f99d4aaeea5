//! Hand a finished session to the file and datagram outputs

use tracing::{error, info};

use crate::{
    acquisition::AcquisitionSession,
    datagram_sink::{DatagramSink, DatagramSocket},
    device::ChannelInfo,
    error::Result,
    file_sink::FileSink,
    timer::ScopedTimer,
};

/// Run the file output, then the datagram output, each only if requested.
///
/// A file failure doesn't stop the datagram output; the first error from
/// either stage is returned once both have had their turn.
pub fn fan_out<S, C>(
    session: &AcquisitionSession,
    files: Option<(&FileSink, &[ChannelInfo])>,
    datagrams: Option<C>,
) -> Result<()>
where
    S: DatagramSocket,
    C: FnOnce() -> Result<DatagramSink<S>>,
{
    let mut file_result = Ok(());
    if let Some((sink, info)) = files {
        let written = {
            let _tmr = ScopedTimer::new("Write file buffer: ");
            sink.write(session, info).and_then(|s| s.into_result())
        };
        match written {
            Ok(n) => info!("Total written: {} MB", n as f64 / 1024.0 / 1024.0),
            Err(e) => {
                error!("File output incomplete: {}", e);
                file_result = Err(e);
            }
        }
    }

    if let Some(connect) = datagrams {
        connect()?.send_session(session)?;
    }
    file_result
}
