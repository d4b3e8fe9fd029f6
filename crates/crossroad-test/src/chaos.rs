//! Radio air model
//!
//! Each frame put on the air is either lost or delivered once or twice, each
//! copy after its own delay. Conditions modelled:
//! - Propagation latency with jitter (jitter also reorders frames)
//! - Random and burst loss
//! - Duplication

use std::time::Duration;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Jitter distribution type
#[derive(Clone, Debug)]
pub enum JitterDistribution {
    /// No jitter
    None,
    /// Uniform in `[min_ms, max_ms]`
    Uniform { min_ms: u32, max_ms: u32 },
    /// Pareto distribution (heavy tail), capped at `cap_ms`
    Pareto { scale_ms: f64, shape: f64, cap_ms: f64 },
}

impl JitterDistribution {
    /// Sample a jitter value
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match self {
            JitterDistribution::None => Duration::ZERO,
            JitterDistribution::Uniform { min_ms, max_ms } => {
                if max_ms <= min_ms {
                    return Duration::from_millis(u64::from(*min_ms));
                }
                let dist = Uniform::new_inclusive(*min_ms, *max_ms);
                Duration::from_millis(u64::from(dist.sample(rng)))
            }
            JitterDistribution::Pareto {
                scale_ms,
                shape,
                cap_ms,
            } => {
                // Inverse CDF; 1 - u keeps the base away from zero
                let u: f64 = rng.gen();
                let value = scale_ms / (1.0 - u).powf(1.0 / shape);
                Duration::from_millis(value.min(*cap_ms) as u64)
            }
        }
    }
}

/// Air conditions between two controllers
#[derive(Clone, Debug)]
pub struct ChaosConfig {
    /// Base latency
    pub base_latency: Duration,
    /// Jitter distribution
    pub jitter: JitterDistribution,
    /// Frame loss rate (0.0 - 1.0)
    pub loss_rate: f64,
    /// Probability that a frame starts a loss burst
    pub burst_loss_prob: f64,
    /// Frames lost after a burst starts, inclusive range
    pub burst_length: (u32, u32),
    /// Duplicate probability
    pub duplicate_prob: f64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        ChaosConfig::clean()
    }
}

impl ChaosConfig {
    /// Without jitter every frame flies for the same time, so none overtakes another
    pub fn preserves_order(&self) -> bool {
        matches!(self.jitter, JitterDistribution::None)
    }

    /// Perfect air: fixed 1 ms flight, nothing lost
    pub fn clean() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(1),
            jitter: JitterDistribution::None,
            loss_rate: 0.0,
            burst_loss_prob: 0.0,
            burst_length: (0, 0),
            duplicate_prob: 0.0,
        }
    }

    /// Busy band: a few lost and duplicated frames, order preserved
    pub fn noisy() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(3),
            jitter: JitterDistribution::None,
            loss_rate: 0.03,
            burst_loss_prob: 0.0,
            burst_length: (0, 0),
            duplicate_prob: 0.02,
        }
    }

    /// Interference: bursts long enough to break the heartbeat, and
    /// enough jitter to reorder frames
    pub fn hostile() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(5),
            jitter: JitterDistribution::Pareto {
                scale_ms: 2.0,
                shape: 1.5,
                cap_ms: 80.0,
            },
            loss_rate: 0.1,
            burst_loss_prob: 0.05,
            burst_length: (2, 6),
            duplicate_prob: 0.05,
        }
    }
}

/// Air statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChaosStats {
    pub frames_sent: u64,
    pub frames_delivered: u64,
    pub frames_lost: u64,
    pub frames_duplicated: u64,
    pub max_latency_ms: u64,
}

impl ChaosStats {
    pub fn loss_rate(&self) -> f64 {
        if self.frames_sent == 0 {
            0.0
        } else {
            self.frames_lost as f64 / self.frames_sent as f64
        }
    }
}

/// One direction of radio air
pub struct ChaosAir {
    config: ChaosConfig,
    rng: StdRng,
    /// Frames still to lose in the current burst
    burst_remaining: u32,
    stats: ChaosStats,
}

impl ChaosAir {
    pub fn new(config: ChaosConfig, seed: u64) -> Self {
        ChaosAir {
            config,
            rng: StdRng::seed_from_u64(seed),
            burst_remaining: 0,
            stats: ChaosStats::default(),
        }
    }

    /// Put one frame on the air
    ///
    /// Returns the flight time of every copy that will arrive; empty when
    /// the frame is lost.
    pub fn transmit(&mut self) -> Vec<Duration> {
        self.stats.frames_sent += 1;

        if self.should_drop() {
            self.stats.frames_lost += 1;
            return Vec::new();
        }

        let mut copies = vec![self.flight_time()];
        if self.rng.gen::<f64>() < self.config.duplicate_prob {
            copies.push(self.flight_time());
            self.stats.frames_duplicated += 1;
        }

        for latency in &copies {
            let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
            self.stats.frames_delivered += 1;
            self.stats.max_latency_ms = self.stats.max_latency_ms.max(ms);
        }
        copies
    }

    fn flight_time(&mut self) -> Duration {
        self.config.base_latency + self.config.jitter.sample(&mut self.rng)
    }

    fn should_drop(&mut self) -> bool {
        if self.burst_remaining > 0 {
            self.burst_remaining -= 1;
            return true;
        }

        if self.rng.gen::<f64>() < self.config.burst_loss_prob {
            let (min, max) = self.config.burst_length;
            // This frame is the first of the burst
            self.burst_remaining = self.rng.gen_range(min..=max.max(min)).saturating_sub(1);
            return true;
        }

        self.rng.gen::<f64>() < self.config.loss_rate
    }

    pub fn stats(&self) -> &ChaosStats {
        &self.stats
    }

    pub fn config(&self) -> &ChaosConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_air_delivers_everything() {
        let mut air = ChaosAir::new(ChaosConfig::clean(), 1);
        for _ in 0..500 {
            assert_eq!(air.transmit(), vec![Duration::from_millis(1)]);
        }
        let stats = air.stats();
        assert_eq!(stats.frames_lost, 0);
        assert_eq!(stats.frames_delivered, 500);
        assert_eq!(stats.max_latency_ms, 1);
    }

    #[test]
    fn test_hostile_air_loses_frames() {
        let mut air = ChaosAir::new(ChaosConfig::hostile(), 12345);
        for _ in 0..2000 {
            air.transmit();
        }

        let stats = air.stats();
        assert!(stats.loss_rate() > 0.1);
        assert!(stats.loss_rate() < 0.6);
        assert!(stats.frames_duplicated > 0);
        assert!(stats.max_latency_ms <= 85);
    }

    #[test]
    fn test_same_seed_same_air() {
        let mut a = ChaosAir::new(ChaosConfig::noisy(), 7);
        let mut b = ChaosAir::new(ChaosConfig::noisy(), 7);
        for _ in 0..200 {
            assert_eq!(a.transmit(), b.transmit());
        }
    }

    #[test]
    fn test_burst_loses_consecutive_frames() {
        let config = ChaosConfig {
            burst_loss_prob: 1.0,
            burst_length: (3, 3),
            ..ChaosConfig::clean()
        };
        let mut air = ChaosAir::new(config, 0);
        for _ in 0..9 {
            assert!(air.transmit().is_empty());
        }
        assert_eq!(air.stats().frames_lost, 9);
    }

    #[test]
    fn test_order_preserving_presets() {
        assert!(ChaosConfig::clean().preserves_order());
        assert!(ChaosConfig::noisy().preserves_order());
        assert!(!ChaosConfig::hostile().preserves_order());
    }

    #[test]
    fn test_uniform_jitter_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let jitter = JitterDistribution::Uniform {
            min_ms: 3,
            max_ms: 9,
        };
        for _ in 0..1000 {
            let sample = jitter.sample(&mut rng);
            assert!(sample >= Duration::from_millis(3));
            assert!(sample <= Duration::from_millis(9));
        }

        let degenerate = JitterDistribution::Uniform {
            min_ms: 4,
            max_ms: 4,
        };
        assert_eq!(degenerate.sample(&mut rng), Duration::from_millis(4));
    }

    #[test]
    fn test_pareto_heavy_tail_is_capped() {
        let mut rng = StdRng::seed_from_u64(42);
        let pareto = JitterDistribution::Pareto {
            scale_ms: 50.0,
            shape: 1.5,
            cap_ms: 1000.0,
        };

        let samples: Vec<Duration> = (0..1000).map(|_| pareto.sample(&mut rng)).collect();
        let avg = samples.iter().map(|d| d.as_millis()).sum::<u128>() / 1000;
        let max = samples.iter().map(|d| d.as_millis()).max().unwrap();

        assert!(max > avg * 2);
        assert!(max <= 1000);
    }
}
