//! Throughput and ETA reporting for long copies.

use std::time::{Duration, Instant};

use tracing::info;

const KIB: f64 = 1024.0;

/// Minimum time between two progress lines.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Human-readable byte count using binary multiples: `512B`, `1.50kB`,
/// `3.00MB`, `2.25GB`, `1.10TB`.
pub fn format_bytes(size: u64) -> String {
    let mut s = size as f64;
    if s < KIB {
        return format!("{size}B");
    }
    for unit in ["kB", "MB", "GB"] {
        s /= KIB;
        if s < KIB {
            return format!("{s:.2}{unit}");
        }
    }
    format!("{:.2}TB", s / KIB)
}

/// Whole seconds as `<h>h<mm>m<ss>s`, e.g. `0h01m05s`. Negative and
/// non-finite inputs print as zero.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}h{:02}m{:02}s", total / 3600, total / 60 % 60, total % 60)
}

/// Tracks bytes copied against a known total and emits an `info!` line at
/// most once per [`REPORT_INTERVAL`].
#[derive(Debug)]
pub struct Progress {
    total: u64,
    processed: u64,
    started: Instant,
    last_report: Instant,
}

impl Progress {
    pub fn new(total: u64) -> Self {
        let now = Instant::now();
        Progress {
            total,
            processed: 0,
            started: now,
            last_report: now,
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Record `n` more bytes; `written` is the current output size.
    pub fn advance(&mut self, n: u64, written: u64) {
        self.advance_at(n, written, Instant::now());
    }

    /// Like [`Progress::advance`] with an explicit clock. Returns `true` if a
    /// line was emitted.
    pub fn advance_at(&mut self, n: u64, written: u64, now: Instant) -> bool {
        self.processed += n;
        if now.duration_since(self.last_report) <= REPORT_INTERVAL {
            return false;
        }
        self.last_report = now;

        let elapsed = now.duration_since(self.started).as_secs_f64();
        info!(
            "speed: {:.2} MB/s wrote: {} ({}%) elapsed: {} eta: {}",
            self.rate_mib(elapsed),
            format_bytes(written),
            self.percent(),
            format_duration(elapsed),
            format_duration(self.eta(elapsed)),
        );
        true
    }

    fn rate_mib(&self, elapsed: f64) -> f64 {
        if elapsed > 0.0 {
            self.processed as f64 / (KIB * KIB) / elapsed
        } else {
            0.0
        }
    }

    /// Whole percent of the total processed so far.
    pub fn percent(&self) -> u64 {
        if self.total == 0 {
            return 100;
        }
        (self.processed as f64 * 100.0 / self.total as f64) as u64
    }

    /// Seconds remaining at the average rate so far.
    pub fn eta(&self, elapsed: f64) -> f64 {
        if self.processed == 0 {
            return 0.0;
        }
        self.total.saturating_sub(self.processed) as f64 * elapsed / self.processed as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_below_one_kib() {
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(1023), "1023B");
    }

    #[test]
    fn bytes_binary_units() {
        assert_eq!(format_bytes(1024), "1.00kB");
        assert_eq!(format_bytes(1536), "1.50kB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00MB");
        assert_eq!(format_bytes(512 * 1024 * 1024), "512.00MB");
        assert_eq!(format_bytes(9 * 1024 * 1024 * 1024 / 4), "2.25GB");
        assert_eq!(format_bytes(2 * 1024u64.pow(4)), "2.00TB");
    }

    #[test]
    fn duration_layout() {
        assert_eq!(format_duration(0.0), "0h00m00s");
        assert_eq!(format_duration(65.9), "0h01m05s");
        assert_eq!(format_duration(3600.0 * 26.0 + 61.0), "26h01m01s");
        assert_eq!(format_duration(-4.0), "0h00m00s");
        assert_eq!(format_duration(f64::NAN), "0h00m00s");
    }

    #[test]
    fn percent_and_eta() {
        let mut p = Progress::new(400);
        let t0 = p.started;
        p.advance_at(100, 100, t0);
        assert_eq!(p.percent(), 25);
        assert_eq!(p.eta(10.0), 30.0);
        assert_eq!(p.processed(), 100);
    }

    #[test]
    fn empty_total_is_complete() {
        let p = Progress::new(0);
        assert_eq!(p.percent(), 100);
        assert_eq!(p.eta(5.0), 0.0);
    }

    #[test]
    fn reports_are_throttled() {
        let mut p = Progress::new(1000);
        let t0 = p.started;
        assert!(!p.advance_at(10, 10, t0 + Duration::from_millis(500)));
        assert!(p.advance_at(10, 20, t0 + Duration::from_millis(1500)));
        assert!(!p.advance_at(10, 30, t0 + Duration::from_millis(2000)));
        assert!(p.advance_at(10, 40, t0 + Duration::from_millis(2600)));
        assert_eq!(p.processed(), 40);
    }
}
