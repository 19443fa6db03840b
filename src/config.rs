use crate::types::Config;
use anyhow::{bail, Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.sampling;
        if s.frames_per_sequence == 0 {
            bail!("sampling.frames_per_sequence must be at least 1");
        }
        if !(s.target_duration_secs.is_finite() && s.target_duration_secs > 0.0)
            || !(s.initial_fps.is_finite() && s.initial_fps > 0.0)
        {
            bail!(
                "sampling duration and initial fps must be positive (got {} s, {} fps)",
                s.target_duration_secs,
                s.initial_fps
            );
        }
        if !(0.0..1.0).contains(&s.fps_smoothing) {
            bail!("sampling.fps_smoothing must be in [0, 1), got {}", s.fps_smoothing);
        }
        let threshold = self.matching.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            bail!("matching.similarity_threshold must be in [0, 1], got {}", threshold);
        }
        let a = &self.attempt;
        if !(a.tick_interval_ms.is_finite() && a.tick_interval_ms > 0.0) {
            bail!("attempt.tick_interval_ms must be positive, got {}", a.tick_interval_ms);
        }
        if !(a.advance_delay_ms.is_finite() && a.advance_delay_ms >= 0.0) {
            bail!("attempt.advance_delay_ms must be zero or more, got {}", a.advance_delay_ms);
        }
        Ok(())
    }
}
