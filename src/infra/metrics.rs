// ============================================================
// Layer 6 — Metrics & Early Stopping
// ============================================================
// One CSV row per epoch plus the patience-based early stopping
// rule: training stops after `patience` consecutive epochs without
// a new best validation loss.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

#[derive(Debug, Clone, Copy)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub learning_rate: f64,
}

/// Appends epoch metrics to a CSV file, writing the header once.
pub struct MetricsLogger {
    path: PathBuf,
}

impl MetricsLogger {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating metrics dir {}", parent.display()))?;
        }
        let mut file = File::create(&path)
            .with_context(|| format!("creating metrics log {}", path.display()))?;
        writeln!(file, "epoch,train_loss,val_loss,learning_rate")
            .context("writing metrics header")?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self, metrics: &EpochMetrics) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening metrics log {}", self.path.display()))?;
        writeln!(
            file,
            "{},{:.6},{:.6},{:.8}",
            metrics.epoch, metrics.train_loss, metrics.val_loss, metrics.learning_rate
        )
        .context("appending metrics row")?;
        Ok(())
    }
}

/// Patience counter over validation loss. Strict improvement resets
/// the counter; anything else increments it.
#[derive(Debug)]
pub struct EarlyStopping {
    patience: usize,
    best_loss: f64,
    stale_epochs: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best_loss: f64::INFINITY,
            stale_epochs: 0,
        }
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    /// Feed one epoch's validation loss. Returns true when it set a
    /// new best.
    pub fn observe(&mut self, val_loss: f64) -> bool {
        if val_loss < self.best_loss {
            self.best_loss = val_loss;
            self.stale_epochs = 0;
            true
        } else {
            self.stale_epochs += 1;
            false
        }
    }

    pub fn should_stop(&self) -> bool {
        self.stale_epochs >= self.patience
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_after_patience_non_improving_epochs() {
        // Two improving epochs, then strictly increasing loss: with
        // patience 3 the stop fires exactly 3 epochs later.
        let mut stopper = EarlyStopping::new(3);
        assert!(stopper.observe(0.9));
        assert!(stopper.observe(0.5));
        let increasing = [0.6, 0.7, 0.8];
        for (i, loss) in increasing.iter().enumerate() {
            assert!(!stopper.observe(*loss));
            assert_eq!(stopper.should_stop(), i == 2);
        }
        assert_eq!(stopper.best_loss(), 0.5);
    }

    #[test]
    fn equal_loss_is_not_an_improvement() {
        let mut stopper = EarlyStopping::new(1);
        assert!(stopper.observe(0.5));
        assert!(!stopper.observe(0.5));
        assert!(stopper.should_stop());
    }

    #[test]
    fn improvement_resets_the_counter() {
        let mut stopper = EarlyStopping::new(2);
        stopper.observe(0.5);
        stopper.observe(0.6);
        assert!(!stopper.should_stop());
        assert!(stopper.observe(0.4));
        assert!(!stopper.should_stop());
    }

    #[test]
    fn metrics_rows_append_in_order() {
        let path = std::env::temp_dir().join(format!("realign-metrics-{}.csv", std::process::id()));
        let logger = MetricsLogger::create(&path).unwrap();
        for epoch in 1..=2 {
            logger
                .log(&EpochMetrics {
                    epoch,
                    train_loss: 0.5 / epoch as f64,
                    val_loss: 0.6 / epoch as f64,
                    learning_rate: 1e-4,
                })
                .unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "epoch,train_loss,val_loss,learning_rate");
        assert!(lines[1].starts_with("1,"));
        assert!(lines[2].starts_with("2,"));
        std::fs::remove_file(&path).unwrap();
    }
}
