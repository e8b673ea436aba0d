use crate::models::analysis::{Assessment, PerspectiveAnalysis, Stance};

/// Minimum number of agreeing perspectives for a "Likely" verdict.
const CONSENSUS_MIN: usize = 2;

/// Deception score cut-offs, validated at startup so that
/// 0 <= moderate < high <= 10.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeceptionThresholds {
    pub high: f64,
    pub moderate: f64,
}

impl Default for DeceptionThresholds {
    fn default() -> Self {
        Self {
            high: 7.0,
            moderate: 5.0,
        }
    }
}

/// Combine perspective stances and the deception score into one verdict.
///
/// - High deception always wins, whatever the stances say.
/// - Support consensus gives "Likely True", downgraded to "Mixed" by moderate deception.
/// - Refute consensus gives "Likely False" regardless of deception.
/// - Anything else is "Mixed".
pub fn overall_assessment(
    support_count: usize,
    refute_count: usize,
    deception_score: f64,
    thresholds: DeceptionThresholds,
) -> Assessment {
    if deception_score >= thresholds.high {
        Assessment::SuspiciousDeceptive
    } else if support_count > refute_count && support_count >= CONSENSUS_MIN {
        if deception_score >= thresholds.moderate {
            Assessment::Mixed
        } else {
            Assessment::LikelyTrue
        }
    } else if refute_count > support_count && refute_count >= CONSENSUS_MIN {
        Assessment::LikelyFalse
    } else {
        Assessment::Mixed
    }
}

/// Count stances across `analyses` and apply [`overall_assessment`].
pub fn assess<'a>(
    analyses: impl IntoIterator<Item = &'a PerspectiveAnalysis>,
    deception_score: f64,
    thresholds: DeceptionThresholds,
) -> Assessment {
    let (support, refute) = analyses
        .into_iter()
        .fold((0, 0), |(support, refute), analysis| match analysis.stance {
            Stance::Support => (support + 1, refute),
            Stance::Refute => (support, refute + 1),
            Stance::Neutral => (support, refute),
        });
    overall_assessment(support, refute, deception_score, thresholds)
}
