use serde::{Deserialize, Serialize};

use casedb_core::config::StanceSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StanceLabel {
    Support,
    Oppose,
    Neutral,
}

/// A side wins only when its probability clears `threshold` and beats the
/// other side by at least `margin`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelPolicy {
    pub threshold: f32,
    pub margin: f32,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self { threshold: 0.6, margin: 0.05 }
    }
}

impl From<&StanceSettings> for LabelPolicy {
    fn from(settings: &StanceSettings) -> Self {
        Self { threshold: settings.threshold, margin: settings.margin }
    }
}

impl LabelPolicy {
    pub fn label(&self, entailment: f32, contradiction: f32) -> StanceLabel {
        if entailment >= self.threshold && entailment >= contradiction + self.margin {
            StanceLabel::Support
        } else if contradiction >= self.threshold && contradiction >= entailment + self.margin {
            StanceLabel::Oppose
        } else {
            StanceLabel::Neutral
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_boundaries() {
        let p = LabelPolicy::default();
        assert_eq!(p.label(0.7, 0.1), StanceLabel::Support);
        assert_eq!(p.label(0.55, 0.5), StanceLabel::Neutral);
        assert_eq!(p.label(0.0, 0.65), StanceLabel::Oppose);
        assert_eq!(p.label(0.62, 0.6), StanceLabel::Neutral, "both clear the threshold, neither by the margin");
    }

    #[test]
    fn thresholds_are_inclusive() {
        let p = LabelPolicy { threshold: 0.5, margin: 0.25 };
        assert_eq!(p.label(0.5, 0.25), StanceLabel::Support);
        assert_eq!(p.label(0.75, 0.5), StanceLabel::Support);
        assert_eq!(p.label(0.25, 0.5), StanceLabel::Oppose);
        assert_eq!(p.label(0.5, 0.375), StanceLabel::Neutral);
    }
}
