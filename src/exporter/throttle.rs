// file: src/exporter/throttle.rs
// description: paces attachment archive saves in fixed-size convoys
// reference: https://docs.rs/tokio/latest/tokio/time/

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Saves at most `convoy_size` files per `interval`.
pub struct AttachmentThrottler {
    output_dir: PathBuf,
    convoy_size: usize,
    interval: Duration,
    saved_in_convoy: usize,
    convoy_started: Instant,
    total_saved: u64,
}

impl AttachmentThrottler {
    pub fn new(output_dir: impl Into<PathBuf>, convoy_size: usize, interval: Duration) -> Self {
        Self {
            output_dir: output_dir.into(),
            convoy_size: convoy_size.max(1),
            interval,
            saved_in_convoy: 0,
            convoy_started: Instant::now(),
            total_saved: 0,
        }
    }

    pub fn total_saved(&self) -> u64 {
        self.total_saved
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn save(&mut self, filename: &str, content: &[u8]) -> Result<PathBuf> {
        if self.saved_in_convoy == 0 {
            self.convoy_started = Instant::now();
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(filename);
        tokio::fs::write(&path, content).await?;
        self.total_saved += 1;
        self.saved_in_convoy += 1;
        debug!("Saved attachment archive {}", path.display());

        if self.saved_in_convoy >= self.convoy_size {
            let elapsed = self.convoy_started.elapsed();
            if elapsed < self.interval {
                let wait = self.interval - elapsed;
                debug!("Attachment convoy full, waiting {:?}", wait);
                tokio::time::sleep(wait).await;
            }
            self.saved_in_convoy = 0;
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_waits_after_full_convoy() {
        let dir = tempfile::tempdir().unwrap();
        let mut throttler = AttachmentThrottler::new(dir.path(), 5, Duration::from_millis(1000));

        let start = Instant::now();
        for i in 0..5 {
            throttler.save(&format!("RefNo {}.zip", i), b"zip").await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(1000));

        let second = Instant::now();
        for i in 5..9 {
            throttler.save(&format!("RefNo {}.zip", i), b"zip").await.unwrap();
        }
        assert!(second.elapsed() < Duration::from_millis(1000));
        assert_eq!(throttler.total_saved(), 9);
        assert!(dir.path().join("RefNo 8.zip").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_when_convoy_already_slow() {
        let dir = tempfile::tempdir().unwrap();
        let mut throttler = AttachmentThrottler::new(dir.path(), 2, Duration::from_millis(1000));

        throttler.save("a.zip", b"a").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let before = Instant::now();
        throttler.save("b.zip", b"b").await.unwrap();
        assert!(before.elapsed() < Duration::from_millis(1000));
    }
}
