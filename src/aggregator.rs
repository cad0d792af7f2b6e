// RepWatch: Prediction Aggregator
//
// Folds the verdicts buffered over one repetition into a single class.
// Pure: the result depends only on the policy and the verdict list.

use crate::config::*;
use crate::events::{ClassifierVerdict, PostureClass};

/// How per-window verdicts become one repetition verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AggregationPolicy {
    /// Sum each verdict's confidence onto its class, normalise, take the arg-max.
    /// Ties go to the class seen most recently.
    #[default]
    ConfidenceWeighted,
    /// The last verdict of the cycle, unchanged.
    MostRecent,
}

impl AggregationPolicy {
    pub fn name(self) -> &'static str {
        match self {
            Self::ConfidenceWeighted => "weighted",
            Self::MostRecent => "latest",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "weighted" => Some(Self::ConfidenceWeighted),
            "latest" => Some(Self::MostRecent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Decided {
        class: PostureClass,
        confidence: f32,
        verdicts: usize,
    },
    /// Fewer than [`MIN_AGGREGATE_VERDICTS`] verdicts; the caller picks a fallback.
    InsufficientSamples { available: usize },
}

pub fn aggregate(policy: AggregationPolicy, verdicts: &[ClassifierVerdict]) -> Aggregation {
    if verdicts.len() < MIN_AGGREGATE_VERDICTS {
        return Aggregation::InsufficientSamples {
            available: verdicts.len(),
        };
    }

    let (class, confidence) = match policy {
        AggregationPolicy::MostRecent => {
            // Length checked above.
            let last = verdicts[verdicts.len() - 1];
            (last.class, last.confidence)
        }
        AggregationPolicy::ConfidenceWeighted => weighted_vote(verdicts),
    };

    Aggregation::Decided {
        class,
        confidence,
        verdicts: verdicts.len(),
    }
}

fn weighted_vote(verdicts: &[ClassifierVerdict]) -> (PostureClass, f32) {
    let mut scores = [0.0f32; POSTURE_CLASS_COUNT];
    let mut last_seen = [0usize; POSTURE_CLASS_COUNT];

    for (position, verdict) in verdicts.iter().enumerate() {
        scores[verdict.class.index()] += verdict.confidence;
        last_seen[verdict.class.index()] = position + 1;
    }

    let total: f32 = scores.iter().sum();
    let mut best = verdicts[verdicts.len() - 1].class.index();
    for (index, &score) in scores.iter().enumerate() {
        let better = score > scores[best]
            || (score == scores[best] && last_seen[index] > last_seen[best]);
        if better {
            best = index;
        }
    }

    let confidence = if total > 0.0 { scores[best] / total } else { 0.0 };
    // `best` always comes from a valid class index.
    let class = PostureClass::ALL[best];
    (class, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use PostureClass::*;

    fn v(class: PostureClass, confidence: f32) -> ClassifierVerdict {
        ClassifierVerdict::new(class, confidence)
    }

    #[test]
    fn weighted_majority_picks_heaviest_class() {
        let verdicts = [v(GoodForm, 0.9), v(HipsSagging, 0.6), v(GoodForm, 0.8)];
        match aggregate(AggregationPolicy::ConfidenceWeighted, &verdicts) {
            Aggregation::Decided {
                class,
                confidence,
                verdicts,
            } => {
                assert_eq!(class, GoodForm);
                assert!((confidence - 1.7 / 2.3).abs() < 1e-5);
                assert_eq!(verdicts, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn most_recent_returns_last_verdict_unchanged() {
        let verdicts = [v(GoodForm, 0.9), v(HipsSagging, 0.6), v(GoodForm, 0.8)];
        assert_eq!(
            aggregate(AggregationPolicy::MostRecent, &verdicts),
            Aggregation::Decided {
                class: GoodForm,
                confidence: 0.8,
                verdicts: 3
            }
        );
    }

    #[test]
    fn single_verdict_is_insufficient() {
        for policy in [AggregationPolicy::ConfidenceWeighted, AggregationPolicy::MostRecent] {
            assert_eq!(
                aggregate(policy, &[v(HipsHigh, 0.99)]),
                Aggregation::InsufficientSamples { available: 1 }
            );
            assert_eq!(
                aggregate(policy, &[]),
                Aggregation::InsufficientSamples { available: 0 }
            );
        }
    }

    #[test]
    fn weighted_tie_goes_to_most_recent_class() {
        let verdicts = [v(HipsHigh, 0.5), v(PartialRom, 0.5)];
        match aggregate(AggregationPolicy::ConfidenceWeighted, &verdicts) {
            Aggregation::Decided { class, confidence, .. } => {
                assert_eq!(class, PartialRom);
                assert!((confidence - 0.5).abs() < 1e-6);
            }
            other => panic!("unexpected {other:?}"),
        }

        let reversed = [v(PartialRom, 0.5), v(HipsHigh, 0.5)];
        match aggregate(AggregationPolicy::ConfidenceWeighted, &reversed) {
            Aggregation::Decided { class, .. } => assert_eq!(class, HipsHigh),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn confident_minority_can_outweigh_count() {
        let verdicts = [v(GoodForm, 0.2), v(GoodForm, 0.2), v(HipsSagging, 0.95)];
        match aggregate(AggregationPolicy::ConfidenceWeighted, &verdicts) {
            Aggregation::Decided { class, .. } => assert_eq!(class, HipsSagging),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_confidence_verdicts_still_decide() {
        let verdicts = [v(HipsHigh, 0.0), v(GoodForm, 0.0)];
        assert_eq!(
            aggregate(AggregationPolicy::ConfidenceWeighted, &verdicts),
            Aggregation::Decided {
                class: GoodForm,
                confidence: 0.0,
                verdicts: 2
            }
        );
    }

    #[test]
    fn aggregation_is_pure() {
        let verdicts = [v(HipsSagging, 0.7), v(GoodForm, 0.6), v(HipsSagging, 0.4)];
        let first = aggregate(AggregationPolicy::ConfidenceWeighted, &verdicts);
        assert_eq!(aggregate(AggregationPolicy::ConfidenceWeighted, &verdicts), first);
    }

    #[test]
    fn policy_names_round_trip() {
        for policy in [AggregationPolicy::ConfidenceWeighted, AggregationPolicy::MostRecent] {
            assert_eq!(AggregationPolicy::from_name(policy.name()), Some(policy));
        }
    }
}
