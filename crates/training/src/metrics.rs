//! Classification metrics for seizure/non-seizure predictions.

use std::fmt;

/// Confusion matrix with true labels on rows and predictions on columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    classes: usize,
    counts: Vec<u64>,
}

impl ConfusionMatrix {
    pub fn new(classes: usize) -> Self {
        Self {
            classes,
            counts: vec![0; classes * classes],
        }
    }

    pub fn from_labels(y_true: &[usize], y_pred: &[usize], classes: usize) -> Self {
        let mut m = Self::new(classes);
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            m.add(t, p);
        }
        m
    }

    /// Labels outside `0..classes` are ignored.
    pub fn add(&mut self, truth: usize, pred: usize) {
        if truth < self.classes && pred < self.classes {
            self.counts[truth * self.classes + pred] += 1;
        }
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn get(&self, truth: usize, pred: usize) -> u64 {
        self.counts[truth * self.classes + pred]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: u64 = (0..self.classes).map(|c| self.get(c, c)).sum();
        correct as f64 / total as f64
    }

    pub fn support(&self, class: usize) -> u64 {
        (0..self.classes).map(|p| self.get(class, p)).sum()
    }

    fn predicted(&self, class: usize) -> u64 {
        (0..self.classes).map(|t| self.get(t, class)).sum()
    }

    /// Precision of `class`; 0 when nothing was predicted as `class`.
    pub fn precision(&self, class: usize) -> f64 {
        ratio(self.get(class, class), self.predicted(class))
    }

    /// Recall of `class`; 0 when `class` never occurs.
    pub fn recall(&self, class: usize) -> f64 {
        ratio(self.get(class, class), self.support(class))
    }

    pub fn f1(&self, class: usize) -> f64 {
        let p = self.precision(class);
        let r = self.recall(class);
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    /// Unweighted mean of per-class F1 over every class.
    pub fn macro_f1(&self) -> f64 {
        if self.classes == 0 {
            return 0.0;
        }
        (0..self.classes).map(|c| self.f1(c)).sum::<f64>() / self.classes as f64
    }

    /// Support-weighted mean of per-class F1.
    pub fn weighted_f1(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (0..self.classes)
            .map(|c| self.f1(c) * self.support(c) as f64)
            .sum::<f64>()
            / total as f64
    }

    pub fn report(&self) -> ClassificationReport<'_> {
        ClassificationReport { matrix: self }
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .counts
            .iter()
            .map(|c| c.to_string().len())
            .max()
            .unwrap_or(1);
        for t in 0..self.classes {
            let open = if t == 0 { "[[" } else { " [" };
            write!(f, "{open}")?;
            for p in 0..self.classes {
                if p > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{:>width$}", self.get(t, p))?;
            }
            if t + 1 == self.classes {
                write!(f, "]]")?;
            } else {
                writeln!(f, "]")?;
            }
        }
        Ok(())
    }
}

/// Per-class precision/recall/F1/support table.
pub struct ClassificationReport<'a> {
    matrix: &'a ConfusionMatrix,
}

impl fmt::Display for ClassificationReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.matrix;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in 0..m.classes() {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c,
                m.precision(c),
                m.recall(c),
                m.f1(c),
                m.support(c)
            )?;
        }
        writeln!(f)?;
        let total = m.total();
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy",
            "",
            "",
            m.accuracy(),
            total
        )?;
        let n = m.classes().max(1) as f64;
        let macro_p = (0..m.classes()).map(|c| m.precision(c)).sum::<f64>() / n;
        let macro_r = (0..m.classes()).map(|c| m.recall(c)).sum::<f64>() / n;
        writeln!(
            f,
            "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            "macro avg",
            macro_p,
            macro_r,
            m.macro_f1(),
            total
        )?;
        let denom = total.max(1) as f64;
        let weighted_p = (0..m.classes())
            .map(|c| m.precision(c) * m.support(c) as f64)
            .sum::<f64>()
            / denom;
        let weighted_r = (0..m.classes())
            .map(|c| m.recall(c) * m.support(c) as f64)
            .sum::<f64>()
            / denom;
        write!(
            f,
            "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            "weighted avg",
            weighted_p,
            weighted_r,
            m.weighted_f1(),
            total
        )
    }
}

/// Index of the largest value of each row of a row-major `[rows, cols]` buffer.
pub fn argmax_rows(values: &[f32], cols: usize) -> Vec<usize> {
    if cols == 0 {
        return Vec::new();
    }
    values
        .chunks(cols)
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0usize, f32::NEG_INFINITY), |best, (i, &v)| {
                    if v > best.1 {
                        (i, v)
                    } else {
                        best
                    }
                })
                .0
        })
        .collect()
}

/// Mean categorical cross-entropy of probability rows against class labels.
///
/// Probabilities are clipped to `[1e-7, 1 - 1e-7]` before the log.
pub fn categorical_cross_entropy(probs: &[f32], labels: &[usize], cols: usize) -> f64 {
    if labels.is_empty() || cols == 0 {
        return 0.0;
    }
    const EPS: f64 = 1e-7;
    let sum: f64 = probs
        .chunks(cols)
        .zip(labels.iter())
        .map(|(row, &label)| {
            let p = row.get(label).copied().unwrap_or(0.0) as f64;
            -p.clamp(EPS, 1.0 - EPS).ln()
        })
        .sum();
    sum / labels.len() as f64
}
