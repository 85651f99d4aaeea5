//! Dump each channel to a `_meta` text file and a raw `_binary` file

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, error};

use crate::{
    acquisition::AcquisitionSession,
    complex::{sample_bytes, Sample, SAMPLE_SIZE},
    device::ChannelInfo,
    error::{ChannelWriteFailure, Error, Result},
};

/// Above this many samples the meta file skips the per-sample listing
pub const INLINE_DUMP_LIMIT: usize = 16000;

pub fn meta_path(prefix: &str, channel: usize) -> PathBuf {
    PathBuf::from(format!("{}ch_{}_meta", prefix, channel))
}

pub fn binary_path(prefix: &str, channel: usize) -> PathBuf {
    PathBuf::from(format!("{}ch_{}_binary", prefix, channel))
}

/// The descriptive header at the top of every meta file
pub fn meta_header(channel: usize, info: &ChannelInfo, total_samples: usize) -> String {
    format!(
        "channel              : {}\n\
         mboard id            : {}\n\
         mboard_serial        : {}\n\
         mboard_name          : {}\n\
         rx_id                : {}\n\
         rx_subdev_name       : {}\n\
         rx_subdev_spec       : {}\n\
         total samples        : {}\n\
         sample size          : {}\n\
         RX frequency (MHz)   : {}\n\
         RX sample rate (MHz) : {}\n\
         RX gain (dB)         : {}\n\
         RX antenna           : {}\n",
        channel,
        info.mboard_id,
        info.mboard_serial,
        info.mboard_name,
        info.rx_id,
        info.rx_subdev_name,
        info.rx_subdev_spec,
        total_samples,
        SAMPLE_SIZE,
        info.freq_hz / 1e6,
        info.rate_sps / 1e6,
        info.gain_db,
        info.antenna,
    )
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_meta(path: &Path, header: &str, samples: &[Sample]) -> Result<()> {
    let file = File::create(path).map_err(io_err(path))?;
    let mut w = BufWriter::new(file);
    w.write_all(header.as_bytes()).map_err(io_err(path))?;
    if samples.len() < INLINE_DUMP_LIMIT {
        for (i, s) in samples.iter().enumerate() {
            writeln!(w, "{} {} {}", i, s.re, s.im).map_err(io_err(path))?;
        }
    }
    w.flush().map_err(io_err(path))
}

fn write_binary(path: &Path, samples: &[Sample]) -> Result<usize> {
    let bytes = sample_bytes(samples);
    let mut file = File::create(path).map_err(io_err(path))?;
    file.write_all(bytes).map_err(io_err(path))?;
    Ok(bytes.len())
}

/// Result of writing every channel; a failed channel doesn't stop the others
#[derive(Debug, Default)]
pub struct WriteSummary {
    pub bytes_written: usize,
    pub failures: Vec<ChannelWriteFailure>,
}

impl WriteSummary {
    pub fn into_result(self) -> Result<usize> {
        if self.failures.is_empty() {
            Ok(self.bytes_written)
        } else {
            Err(Error::ChannelWrites(self.failures))
        }
    }
}

/// Writes `<prefix>ch_<N>_meta` and `<prefix>ch_<N>_binary`, overwriting whatever is there
pub struct FileSink {
    prefix: String,
}

impl FileSink {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn write_channel(
        &self,
        channel: usize,
        samples: &[Sample],
        info: &ChannelInfo,
    ) -> Result<usize> {
        let meta = meta_path(&self.prefix, channel);
        write_meta(&meta, &meta_header(channel, info, samples.len()), samples)?;
        let binary = binary_path(&self.prefix, channel);
        let n = write_binary(&binary, samples)?;
        debug!(channel, bytes = n, path = ?binary, "Wrote channel");
        Ok(n)
    }

    /// Write the first `session.target()` samples of every channel.
    ///
    /// `info` holds one entry per session channel, in the same order.
    pub fn write(&self, session: &AcquisitionSession, info: &[ChannelInfo]) -> Result<WriteSummary> {
        if info.len() != session.num_channels() {
            return Err(Error::Config(format!(
                "{} channel descriptions for {} channels",
                info.len(),
                session.num_channels()
            )));
        }
        let total = session.target();
        let mut summary = WriteSummary::default();
        for (channel, (acc, info)) in session.channels().iter().zip(info).enumerate() {
            let res = acc
                .slice(0, total)
                .and_then(|samples| self.write_channel(channel, samples, info));
            match res {
                Ok(n) => summary.bytes_written += n,
                Err(e) => {
                    error!(channel, "File output failed: {}", e);
                    summary.failures.push(ChannelWriteFailure { channel, error: e });
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{accumulator::ChannelAccumulator, acquisition::Status};
    use std::fs;

    fn session(channels: usize, n: usize) -> AcquisitionSession {
        let accs = (0..channels)
            .map(|ch| {
                let mut acc = ChannelAccumulator::new();
                let chunk: Vec<_> = (0..n)
                    .map(|i| Sample::new(i as f32 * 0.5, ch as f32 - i as f32))
                    .collect();
                acc.append(&chunk);
                acc
            })
            .collect();
        AcquisitionSession::from_parts(accs, n, Status::Completed)
    }

    fn info(n: usize) -> Vec<ChannelInfo> {
        (0..n)
            .map(|ch| ChannelInfo {
                mboard_id: "sim".into(),
                mboard_serial: format!("SIM{}", ch),
                freq_hz: 900e6,
                rate_sps: 6.25e6,
                gain_db: 10.0,
                antenna: "RX2".into(),
                ..Default::default()
            })
            .collect()
    }

    fn prefix(dir: &tempfile::TempDir) -> String {
        format!("{}/run_", dir.path().display())
    }

    fn dump_lines(meta: &str) -> usize {
        meta.lines().filter(|l| !l.contains(':')).count()
    }

    #[test]
    fn test_paths() {
        assert_eq!(meta_path("out/", 3), PathBuf::from("out/ch_3_meta"));
        assert_eq!(binary_path("", 0), PathBuf::from("ch_0_binary"));
    }

    #[test]
    fn test_meta_header_fields() {
        let header = meta_header(1, &info(2)[1], 42);
        assert!(header.starts_with("channel              : 1\n"));
        assert!(header.contains("mboard_serial        : SIM1\n"));
        assert!(header.contains("total samples        : 42\n"));
        assert!(header.contains("sample size          : 8\n"));
        assert!(header.contains("RX frequency (MHz)   : 900\n"));
        assert!(header.contains("RX sample rate (MHz) : 6.25\n"));
        assert!(header.contains("RX antenna           : RX2\n"));
        assert_eq!(header.lines().count(), 13);
    }

    #[test]
    fn test_inline_dump_below_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(prefix(&dir));
        let s = session(1, INLINE_DUMP_LIMIT - 1);
        sink.write(&s, &info(1)).unwrap().into_result().unwrap();
        let meta = fs::read_to_string(meta_path(&prefix(&dir), 0)).unwrap();
        assert_eq!(dump_lines(&meta), 15999);
        assert!(meta.contains("\n2 1 -2\n"));
    }

    #[test]
    fn test_no_inline_dump_at_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(prefix(&dir));
        let s = session(1, INLINE_DUMP_LIMIT);
        sink.write(&s, &info(1)).unwrap().into_result().unwrap();
        let meta = fs::read_to_string(meta_path(&prefix(&dir), 0)).unwrap();
        assert_eq!(dump_lines(&meta), 0);
    }

    #[test]
    fn test_binary_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(prefix(&dir));
        let s = session(2, 1000);
        let written = sink.write(&s, &info(2)).unwrap().into_result().unwrap();
        assert_eq!(written, 2 * 1000 * SAMPLE_SIZE);
        for ch in 0..2 {
            let raw = fs::read(binary_path(&prefix(&dir), ch)).unwrap();
            assert_eq!(raw.len(), 1000 * SAMPLE_SIZE);
            let back: Vec<Sample> = raw
                .chunks_exact(SAMPLE_SIZE)
                .map(|b| {
                    Sample::new(
                        f32::from_ne_bytes(b[..4].try_into().unwrap()),
                        f32::from_ne_bytes(b[4..].try_into().unwrap()),
                    )
                })
                .collect();
            assert_eq!(back.as_slice(), s.channels()[ch].as_slice());
        }
    }

    #[test]
    fn test_overdelivery_truncated_to_target() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(prefix(&dir));
        let full = session(1, 300);
        let s = AcquisitionSession::from_parts(full.channels().to_vec(), 256, Status::Completed);
        sink.write(&s, &info(1)).unwrap().into_result().unwrap();
        let raw = fs::read(binary_path(&prefix(&dir), 0)).unwrap();
        assert_eq!(raw.len(), 256 * SAMPLE_SIZE);
    }

    #[test]
    fn test_failed_channel_does_not_stop_others() {
        let dir = tempfile::tempdir().unwrap();
        let p = prefix(&dir);
        // A directory squatting on channel 0's meta path makes its create fail
        fs::create_dir(meta_path(&p, 0)).unwrap();
        let sink = FileSink::new(p.clone());
        let summary = sink.write(&session(2, 10), &info(2)).unwrap();
        assert_eq!(summary.bytes_written, 10 * SAMPLE_SIZE);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].channel, 0);
        assert!(binary_path(&p, 1).exists());
        assert!(matches!(
            summary.into_result(),
            Err(Error::ChannelWrites(f)) if f.len() == 1
        ));
    }

    #[test]
    fn test_short_buffer_is_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(prefix(&dir));
        let short = session(1, 10);
        let s = AcquisitionSession::from_parts(short.channels().to_vec(), 20, Status::TimedOut);
        let summary = sink.write(&s, &info(1)).unwrap();
        assert!(matches!(
            summary.failures[0].error,
            Error::OutOfRange { len: 10, .. }
        ));
    }

    #[test]
    fn test_info_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(prefix(&dir));
        assert!(matches!(
            sink.write(&session(2, 4), &info(1)),
            Err(Error::Config(_))
        ));
    }
}
