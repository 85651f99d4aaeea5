//! Scope timing for the slow output stages

use std::time::Instant;

use tracing::info;

/// Logs the wall-clock time between its creation and the end of its scope.
///
/// Dropping happens on every exit path (early return, `?`, unwinding), so
/// the report always fires exactly once.
pub struct ScopedTimer {
    label: String,
    start: Instant,
}

impl ScopedTimer {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            start: Instant::now(),
        }
    }

    /// Seconds elapsed so far
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for ScopedTimer {
    fn default() -> Self {
        Self::new("")
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        info!("{}total time {}", self.label, self.elapsed_secs());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io,
        sync::{Arc, Mutex},
        time::Duration,
    };

    #[test]
    fn test_elapsed_is_monotonic() {
        let tmr = ScopedTimer::new("test: ");
        std::thread::sleep(Duration::from_millis(5));
        let first = tmr.elapsed_secs();
        assert!(first >= 0.005);
        assert!(tmr.elapsed_secs() >= first);
    }

    /// Collects everything the fmt subscriber writes
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture_logs(f: impl FnOnce()) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_reports_on_early_return() {
        fn bail() -> Result<(), ()> {
            let _tmr = ScopedTimer::new("Write file buffer: ");
            Err::<(), ()>(())?;
            info!("not reached");
            Ok(())
        }
        let logs = capture_logs(|| assert!(bail().is_err()));
        assert_eq!(logs.matches("Write file buffer: total time ").count(), 1);
        assert!(!logs.contains("not reached"));
        let elapsed: f64 = logs
            .split("total time ")
            .nth(1)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert!(elapsed >= 0.0);
    }

    #[test]
    fn test_reports_once_per_scope() {
        let logs = capture_logs(|| {
            for _ in 0..3 {
                let _tmr = ScopedTimer::default();
            }
        });
        assert_eq!(logs.matches("total time ").count(), 3);
    }
}
