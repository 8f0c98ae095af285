//! Recommendation effectiveness tracking as a pure state transition.

use serde::{Deserialize, Serialize};

const SCORE_STEP: f64 = 0.1;
const INITIAL_SCORE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackEvent {
    Helpful,
    NotHelpful,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectivenessStats {
    pub helpful: i64,
    pub not_helpful: i64,
    /// In `[0, 1]`, starting at 0.5.
    pub score: f64,
}

impl Default for EffectivenessStats {
    fn default() -> Self {
        Self {
            helpful: 0,
            not_helpful: 0,
            score: INITIAL_SCORE,
        }
    }
}

impl EffectivenessStats {
    pub fn total(&self) -> i64 {
        self.helpful + self.not_helpful
    }
}

pub fn apply_feedback(stats: EffectivenessStats, event: FeedbackEvent) -> EffectivenessStats {
    match event {
        FeedbackEvent::Helpful => EffectivenessStats {
            helpful: stats.helpful + 1,
            score: (stats.score + SCORE_STEP).clamp(0.0, 1.0),
            ..stats
        },
        FeedbackEvent::NotHelpful => EffectivenessStats {
            not_helpful: stats.not_helpful + 1,
            score: (stats.score - SCORE_STEP).clamp(0.0, 1.0),
            ..stats
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpful_feedback_raises_score() {
        let start = EffectivenessStats::default();
        let next = apply_feedback(start, FeedbackEvent::Helpful);
        assert_eq!(next.helpful, 1);
        assert!((next.score - 0.6).abs() < 1e-12);
        // input untouched
        assert_eq!(start, EffectivenessStats::default());
    }

    #[test]
    fn score_is_clamped() {
        let mut stats = EffectivenessStats::default();
        for _ in 0..20 {
            stats = apply_feedback(stats, FeedbackEvent::NotHelpful);
        }
        assert_eq!(stats.score, 0.0);
        assert_eq!(stats.not_helpful, 20);
        assert_eq!(stats.total(), 20);
        for _ in 0..30 {
            stats = apply_feedback(stats, FeedbackEvent::Helpful);
        }
        assert_eq!(stats.score, 1.0);
    }
}
