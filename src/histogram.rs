/*!
Fixed-width histogram with underflow and overflow bins.

Slot 0 counts values below `range_start`, slots `1..=num_bins` the regular bins
and slot `num_bins + 1` values at or above `range_end`.

```rust
use hopper::histogram::Histogram;

let mut h = Histogram::new(0.0, 10.0, 5).unwrap();
for x in [-1.0, 0.0, 3.9, 9.99, 10.0] {
    h.accumulate(x);
}
assert_eq!(h.counts().to_vec(), vec![1, 1, 1, 0, 0, 1, 1]);
```
*/

use std::fmt;

use ndarray::{s, Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{HopperError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    range_start: f64,
    range_end: f64,
    num_bins: usize,
    units_per_bin: f64,
    counts: Array1<u64>,
}

/// JSON layout of a histogram: bin positions and matching counts.
///
/// `values` holds `range_start`, the center of every regular bin and
/// `range_end`. `data` holds the counts in the same order, so the first and last
/// entries are the underflow and overflow counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramJson {
    pub values: Vec<f64>,
    pub data: Vec<u64>,
}

impl Histogram {
    pub fn new(range_start: f64, range_end: f64, num_bins: usize) -> Result<Self> {
        if num_bins == 0 {
            return Err(HopperError::InvalidParameter(
                "histogram needs at least one bin".into(),
            ));
        }
        if !(range_start.is_finite() && range_end.is_finite() && range_start < range_end) {
            return Err(HopperError::InvalidParameter(format!(
                "histogram range must be finite with start < end, got [{range_start}, {range_end})"
            )));
        }
        Ok(Self {
            range_start,
            range_end,
            num_bins,
            units_per_bin: (range_end - range_start) / num_bins as f64,
            counts: Array1::zeros(num_bins + 2),
        })
    }

    /// Slot a value falls into. NaN goes to the overflow slot.
    pub fn slot(&self, x: f64) -> usize {
        if x < self.range_start {
            0
        } else if x >= self.range_end || x.is_nan() {
            self.num_bins + 1
        } else {
            let bin = ((x - self.range_start) / self.units_per_bin) as usize;
            bin.min(self.num_bins - 1) + 1
        }
    }

    pub fn accumulate(&mut self, x: f64) {
        let slot = self.slot(x);
        self.counts[slot] += 1;
    }

    pub fn reset(&mut self) {
        self.counts.fill(0);
    }

    pub fn range_start(&self) -> f64 {
        self.range_start
    }

    pub fn range_end(&self) -> f64 {
        self.range_end
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    pub fn units_per_bin(&self) -> f64 {
        self.units_per_bin
    }

    /// All `num_bins + 2` counts, underflow first, overflow last.
    pub fn counts(&self) -> &Array1<u64> {
        &self.counts
    }

    /// Counts of the regular bins only.
    pub fn bin_counts(&self) -> ArrayView1<'_, u64> {
        self.counts.slice(s![1..=self.num_bins])
    }

    pub fn total(&self) -> u64 {
        self.counts.sum()
    }

    /// `[lower, upper)` edges of regular bin `i` (zero based).
    pub fn bin_edges(&self, i: usize) -> (f64, f64) {
        let lower = self.range_start + i as f64 * self.units_per_bin;
        (lower, lower + self.units_per_bin)
    }

    pub fn bin_centers(&self) -> Vec<f64> {
        (0..self.num_bins)
            .map(|i| {
                let (lower, upper) = self.bin_edges(i);
                0.5 * (lower + upper)
            })
            .collect()
    }

    pub fn to_json_value(&self) -> HistogramJson {
        let mut values = Vec::with_capacity(self.num_bins + 2);
        values.push(self.range_start);
        values.extend(self.bin_centers());
        values.push(self.range_end);
        HistogramJson {
            values,
            data: self.counts.to_vec(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_json_value())?)
    }
}

impl fmt::Display for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "< {}: {}", self.range_start, self.counts[0])?;
        for i in 0..self.num_bins {
            let (lower, upper) = self.bin_edges(i);
            writeln!(f, "[{lower},{upper}) : {}", self.counts[i + 1])?;
        }
        write!(f, ">= {}: {}", self.range_end, self.counts[self.num_bins + 1])
    }
}
