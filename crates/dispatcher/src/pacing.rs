use std::time::Duration;

use rand::Rng;

use campaigner_core::config::PacingConfig;

/// 相邻两次派发之间的间隔策略
pub trait PacingPolicy: Send + Sync {
    fn next_delay(&self) -> Duration;
}

/// 拟人化节奏：基础间隔均匀分布，叠加小概率长停顿。
/// 均匀的机器节奏容易被运营商侧风控识别，长停顿模拟操作员离开。
pub struct AntiDetectPacing {
    base_min_seconds: f64,
    base_max_seconds: f64,
    long_pause_probability: f64,
    long_pause_min_seconds: f64,
    long_pause_max_seconds: f64,
}

impl AntiDetectPacing {
    pub fn new(config: &PacingConfig) -> Self {
        Self {
            base_min_seconds: config.base_min_seconds,
            base_max_seconds: config.base_max_seconds,
            long_pause_probability: config.long_pause_probability,
            long_pause_min_seconds: config.long_pause_min_seconds,
            long_pause_max_seconds: config.long_pause_max_seconds,
        }
    }

    fn sample_with<R: Rng>(&self, rng: &mut R) -> Duration {
        let mut seconds = rng.random_range(self.base_min_seconds..self.base_max_seconds);
        if rng.random_bool(self.long_pause_probability) {
            seconds +=
                rng.random_range(self.long_pause_min_seconds..self.long_pause_max_seconds);
        }
        Duration::from_secs_f64(seconds)
    }
}

impl Default for AntiDetectPacing {
    fn default() -> Self {
        Self::new(&PacingConfig::default())
    }
}

impl PacingPolicy for AntiDetectPacing {
    fn next_delay(&self) -> Duration {
        self.sample_with(&mut rand::rng())
    }
}

/// 固定间隔，用于测试
pub struct FixedPacing(pub Duration);

impl PacingPolicy for FixedPacing {
    fn next_delay(&self) -> Duration {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: usize = 10_000;

    #[test]
    fn samples_stay_inside_both_bands() {
        let pacing = AntiDetectPacing::default();
        let mut rng = rand::rng();

        for _ in 0..SAMPLES {
            let seconds = pacing.sample_with(&mut rng).as_secs_f64();
            let in_base_band = (45.0..180.0).contains(&seconds);
            let in_long_band = (345.0..1080.0).contains(&seconds);
            assert!(
                in_base_band || in_long_band,
                "sample {seconds} outside both bands"
            );
        }
    }

    #[test]
    fn long_pause_fraction_is_near_configured_probability() {
        let pacing = AntiDetectPacing::default();
        let mut rng = rand::rng();

        let long_pauses = (0..SAMPLES)
            .filter(|_| pacing.sample_with(&mut rng).as_secs_f64() >= 180.0)
            .count();
        let fraction = long_pauses as f64 / SAMPLES as f64;
        assert!(
            (0.12..=0.18).contains(&fraction),
            "long pause fraction {fraction} outside tolerance"
        );
    }

    #[test]
    fn zero_probability_never_produces_long_pauses() {
        let config = PacingConfig {
            long_pause_probability: 0.0,
            ..PacingConfig::default()
        };
        let pacing = AntiDetectPacing::new(&config);
        let mut rng = rand::rng();

        for _ in 0..1000 {
            let seconds = pacing.sample_with(&mut rng).as_secs_f64();
            assert!(seconds < 180.0);
        }
    }

    #[test]
    fn fixed_pacing_is_constant() {
        let pacing = FixedPacing(Duration::from_millis(5));
        assert_eq!(pacing.next_delay(), Duration::from_millis(5));
        assert_eq!(pacing.next_delay(), Duration::from_millis(5));
    }
}
