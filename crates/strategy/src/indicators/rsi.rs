/// Wilder-smoothed relative strength index on a 0-100 scale.
///
/// The first `period` price changes seed simple averages of gains and losses;
/// every later change is folded in with Wilder's smoothing. Callers validate
/// `period >= 2`.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
}

#[derive(Debug, Clone, Copy)]
struct Averages {
    gain: f64,
    loss: f64,
}

impl Averages {
    fn value(self) -> f64 {
        match (self.gain, self.loss) {
            (g, l) if l == 0.0 && g == 0.0 => 50.0,
            (_, l) if l == 0.0 => 100.0,
            (g, l) => 100.0 - 100.0 / (1.0 + g / l),
        }
    }
}

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    /// RSI of the full window (oldest first). `None` below `period + 1` closes.
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        self.last_values::<1>(closes).map(|[v]| v)
    }

    /// RSI at the previous and the latest close, for crossing detection.
    /// `None` below `period + 2` closes.
    pub fn last_two(&self, closes: &[f64]) -> Option<(f64, f64)> {
        self.last_values::<2>(closes).map(|[prev, curr]| (prev, curr))
    }

    /// The last `N` RSI readings from a single smoothing pass.
    fn last_values<const N: usize>(&self, closes: &[f64]) -> Option<[f64; N]> {
        let p = self.period;
        if p == 0 || closes.len() < p + N {
            return None;
        }

        let mut changes = closes.windows(2).map(|w| w[1] - w[0]);
        let mut avg = Averages { gain: 0.0, loss: 0.0 };
        for change in changes.by_ref().take(p) {
            avg.gain += change.max(0.0);
            avg.loss += (-change).max(0.0);
        }
        avg.gain /= p as f64;
        avg.loss /= p as f64;

        // Readings exist for closes[p..]; keep the trailing N.
        let total = closes.len() - p;
        let mut out = [0.0; N];
        let mut idx = 0;
        let mut push = |reading: f64, idx: &mut usize| {
            if *idx + N >= total {
                out[*idx + N - total] = reading;
            }
            *idx += 1;
        };
        push(avg.value(), &mut idx);
        let k = (p - 1) as f64;
        for change in changes {
            avg.gain = (avg.gain * k + change.max(0.0)) / p as f64;
            avg.loss = (avg.loss * k + (-change).max(0.0)) / p as f64;
            push(avg.value(), &mut idx);
        }
        Some(out)
    }
}
