use std::collections::VecDeque;

pub const LATENCY_WINDOW: usize = 20;

/// Rolling one-way latency estimate for one connection.
#[derive(Debug, Clone)]
pub struct LatencyEstimator {
    samples: VecDeque<u32>,
    window: usize,
}

impl Default for LatencyEstimator {
    fn default() -> Self {
        Self::new(LATENCY_WINDOW)
    }
}

impl LatencyEstimator {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
        }
    }

    pub fn push(&mut self, sample_ms: u32) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(sample_ms);
    }

    /// Records half the round trip between a ping stamped `sent` and its
    /// echo received at `received`, both short stamps.
    pub fn push_round_trip(&mut self, sent: u32, received: u32) {
        self.push(received.saturating_sub(sent) / 2);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Median of the window, taking the lower middle for even counts.
    pub fn median(&self) -> u32 {
        if self.samples.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u32> = self.samples.iter().copied().collect();
        let middle = (sorted.len() - 1) / 2;
        *sorted.select_nth_unstable(middle).1
    }
}

/// Milliseconds since the epoch, kept to the last nine decimal digits so it
/// fits the four-byte stamp field.
pub fn short_stamp(now_ms: u64) -> u32 {
    (now_ms % 1_000_000_000) as u32
}
