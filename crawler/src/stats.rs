//! Crawl-wide counters, owned solely by the Coordinator.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct CrawlStats {
    start_time: Instant,
    pub pages_processed: usize,
    pub pages_errored: usize,
    pub pages_skipped: usize,
}

impl CrawlStats {
    pub fn start() -> Self {
        Self {
            start_time: Instant::now(),
            pages_processed: 0,
            pages_errored: 0,
            pages_skipped: 0,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn pages_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.pages_processed as f64 / elapsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_is_zero_with_no_pages() {
        let stats = CrawlStats::start();
        assert_eq!(stats.pages_per_second(), 0.0);
    }
}
