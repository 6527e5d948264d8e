/// Summary of one finished epoch
#[derive(Debug, Clone, Default)]
pub struct EpochMetrics {
    pub epoch: usize,
    /// Training samples seen this epoch
    pub samples: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub train_accuracy: f64,
    pub val_accuracy: f64,
    pub duration_secs: f64,
}

impl EpochMetrics {
    /// Keras-style progress line, e.g.
    /// `60000/60000 - 12s - loss: 0.2154 - acc: 0.9342 - val_loss: 0.0561 - val_acc: 0.9817`
    pub fn progress_line(&self) -> String {
        format!(
            "{n}/{n} - {:.0}s - loss: {:.4} - acc: {:.4} - val_loss: {:.4} - val_acc: {:.4}",
            self.duration_secs,
            self.train_loss,
            self.train_accuracy,
            self.val_loss,
            self.val_accuracy,
            n = self.samples,
        )
    }
}

/// Loss and accuracy of a model over a whole split
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub loss: f64,
    pub accuracy: f64,
}

/// Sample-weighted running loss and accuracy
#[derive(Debug, Default)]
pub struct MetricsAccumulator {
    weighted_loss: f64,
    correct: usize,
    total: usize,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `loss` is the mean over the `total` samples of one batch
    pub fn update(&mut self, loss: f64, correct: usize, total: usize) {
        self.weighted_loss += loss * total as f64;
        self.correct += correct;
        self.total += total;
    }

    pub fn avg_loss(&self) -> f64 {
        if self.total == 0 { return 0.0; }
        self.weighted_loss / self.total as f64
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 { return 0.0; }
        self.correct as f64 / self.total as f64
    }

    pub fn samples(&self) -> usize {
        self.total
    }

    pub fn score(&self) -> Score {
        Score {
            loss: self.avg_loss(),
            accuracy: self.accuracy(),
        }
    }
}

/// Per-epoch record of a `fit` run, in epoch order
#[derive(Debug, Default)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, metrics: EpochMetrics) {
        self.epochs.push(metrics);
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    /// `None` before the first epoch
    pub fn best_val_loss(&self) -> Option<f64> {
        self.epochs.iter().map(|m| m.val_loss).reduce(f64::min)
    }
}
