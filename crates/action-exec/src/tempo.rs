//! Human-like typing cadence.
//!
//! A typing plan assigns every character a randomized delay, with an
//! occasional longer pause so the cadence reads as a person thinking rather
//! than a script replaying. Plans are built up front so the executor's inner
//! loop is just "sleep, insert, repeat".

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::TypingConfig;

#[derive(Clone, Debug, PartialEq)]
pub struct TypingStep {
    pub ch: char,
    /// Delay *before* this character is inserted.
    pub delay_ms: u64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypingPlan {
    pub steps: Vec<TypingStep>,
}

impl TypingPlan {
    pub fn total_delay_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.delay_ms).sum()
    }
}

/// Build a typing plan for `text` under the given cadence config.
pub fn plan_typing(text: &str, cfg: &TypingConfig) -> TypingPlan {
    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    plan_typing_with(text, cfg, &mut rng)
}

fn plan_typing_with(text: &str, cfg: &TypingConfig, rng: &mut StdRng) -> TypingPlan {
    let speed = if cfg.speed_multiplier > 0.0 {
        cfg.speed_multiplier
    } else {
        1.0
    };
    let steps = text
        .chars()
        .map(|ch| {
            let (lo, hi) = cfg.char_delay_ms;
            let mut delay = rng.gen_range(lo..=hi.max(lo));
            if rng.gen_bool(cfg.pause_probability.clamp(0.0, 1.0)) {
                let (plo, phi) = cfg.pause_ms;
                delay += rng.gen_range(plo..=phi.max(plo));
            }
            TypingStep {
                ch,
                delay_ms: scale(delay, speed),
            }
        })
        .collect();
    TypingPlan { steps }
}

pub(crate) fn scale(delay_ms: u64, speed_multiplier: f64) -> u64 {
    ((delay_ms as f64) / speed_multiplier).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_config() -> TypingConfig {
        TypingConfig {
            seed: Some(7),
            ..TypingConfig::default()
        }
    }

    #[test]
    fn plan_covers_every_character_in_order() {
        let plan = plan_typing("hello@example.com", &seeded_config());
        let typed: String = plan.steps.iter().map(|s| s.ch).collect();
        assert_eq!(typed, "hello@example.com");
    }

    #[test]
    fn seeded_plans_are_reproducible() {
        let a = plan_typing("course registration", &seeded_config());
        let b = plan_typing("course registration", &seeded_config());
        assert_eq!(a, b);
    }

    #[test]
    fn speed_multiplier_shrinks_delays() {
        let slow = plan_typing("hello", &seeded_config());
        let fast = plan_typing(
            "hello",
            &TypingConfig {
                speed_multiplier: 10.0,
                ..seeded_config()
            },
        );
        assert!(fast.total_delay_ms() < slow.total_delay_ms());
    }

    #[test]
    fn delays_stay_within_configured_bounds_without_pauses() {
        let cfg = TypingConfig {
            pause_probability: 0.0,
            char_delay_ms: (40, 120),
            seed: Some(3),
            ..TypingConfig::default()
        };
        let plan = plan_typing("abcdefghij", &cfg);
        assert!(plan.steps.iter().all(|s| (40..=120).contains(&s.delay_ms)));
    }
}
