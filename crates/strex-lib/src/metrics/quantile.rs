//! Constant-memory streaming percentile estimation (P² algorithm).
//!
//! Jain & Chlamtac, "The P² algorithm for dynamic calculation of quantiles and
//! histograms without storing observations", CACM 28(10), 1985.

use crate::error::{Result, StrexError};
use serde::{Deserialize, Serialize};

const MARKERS: usize = 5;

/// Tracks a single percentile over an unbounded stream in O(1) time and space.
///
/// The first five observations are kept and the exact percentile of that
/// partial sample is reported. From the sixth observation on, five markers
/// approximate the distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PSquared {
    p: f64,
    initial: Vec<f64>,
    initialized: bool,
    /// Marker heights, always sorted ascending.
    q: [f64; MARKERS],
    /// Actual marker positions.
    n: [i64; MARKERS],
    /// Desired marker positions.
    desired: [f64; MARKERS],
    /// Desired position increments per observation.
    dn: [f64; MARKERS],
    count: u64,
    last: Option<f64>,
}

impl PSquared {
    /// Create an estimator for percentile `p`, given as a fraction in `(0, 1)`.
    pub fn new(p: f64) -> Result<Self> {
        if !(p > 0.0 && p < 1.0) {
            return Err(StrexError::InvalidPercentile(p));
        }
        Ok(Self {
            p,
            initial: Vec::with_capacity(MARKERS),
            initialized: false,
            q: [0.0; MARKERS],
            n: [0; MARKERS],
            desired: [0.0; MARKERS],
            dn: [0.0; MARKERS],
            count: 0,
            last: None,
        })
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    /// Number of observations accepted so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Most recent estimate, `None` until the first observation.
    pub fn estimate(&self) -> Option<f64> {
        self.last
    }

    /// Feed one observation and return the updated percentile estimate.
    pub fn accept(&mut self, x: f64) -> f64 {
        self.count += 1;
        if !self.initialized {
            if self.initial.len() < MARKERS {
                self.initial.push(x);
                self.initial.sort_by(|a, b| a.total_cmp(b));
                let idx = (self.p * self.initial.len() as f64) as usize;
                let value = self.initial[idx.min(self.initial.len() - 1)];
                self.last = Some(value);
                return value;
            }
            self.init_markers();
        }

        let k = self.locate(x);
        for pos in self.n.iter_mut().skip(k + 1) {
            *pos += 1;
        }
        for (d, inc) in self.desired.iter_mut().zip(self.dn.iter()) {
            *d += inc;
        }

        for i in 1..MARKERS - 1 {
            let d = self.desired[i] - self.n[i] as f64;
            let room_up = self.n[i + 1] - self.n[i] > 1;
            let room_down = self.n[i - 1] - self.n[i] < -1;
            if (d >= 1.0 && room_up) || (d <= -1.0 && room_down) {
                let ds: i64 = if d >= 0.0 { 1 } else { -1 };
                let candidate = self.parabolic(ds, i);
                self.q[i] = if self.q[i - 1] < candidate && candidate < self.q[i + 1] {
                    candidate
                } else {
                    self.linear(ds, i)
                };
                self.n[i] += ds;
            }
        }

        debug_assert!(
            self.q.windows(2).all(|w| !(w[0] > w[1])),
            "P² markers out of order: {:?}",
            self.q
        );

        let value = self.q[2];
        self.last = Some(value);
        value
    }

    fn init_markers(&mut self) {
        self.initialized = true;
        for (i, &value) in self.initial.iter().enumerate() {
            self.q[i] = value;
            self.n[i] = i as i64;
        }
        let p = self.p;
        self.desired = [0.0, 2.0 * p, 4.0 * p, 2.0 + 2.0 * p, 4.0];
        self.dn = [0.0, p / 2.0, p, (1.0 + p) / 2.0, 1.0];
    }

    /// Bracket index of `x`, widening the extreme markers when needed.
    fn locate(&mut self, x: f64) -> usize {
        if x < self.q[0] {
            self.q[0] = x;
            return 0;
        }
        if x > self.q[4] {
            self.q[4] = x;
            return 3;
        }
        (1..MARKERS - 1).find(|&i| x < self.q[i]).map_or(3, |i| i - 1)
    }

    fn linear(&self, d: i64, i: usize) -> f64 {
        let j = (i as i64 + d) as usize;
        self.q[i] + d as f64 * (self.q[j] - self.q[i]) / (self.n[j] - self.n[i]) as f64
    }

    fn parabolic(&self, d: i64, i: usize) -> f64 {
        let d = d as f64;
        let (n_prev, n_cur, n_next) = (
            self.n[i - 1] as f64,
            self.n[i] as f64,
            self.n[i + 1] as f64,
        );
        let a = d / (n_next - n_prev);
        let b = (n_cur - n_prev + d) * (self.q[i + 1] - self.q[i]) / (n_next - n_cur)
            + (n_next - n_cur - d) * (self.q[i] - self.q[i - 1]) / (n_cur - n_prev);
        self.q[i] + a * b
    }
}
