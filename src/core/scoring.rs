// Creator scoring seam

use crate::db::creator::DEFAULT_TRUST_SCORE;
use crate::db::Creator;

/// Produces the score attached to a creator's new token
pub trait CreatorScorer: Send + Sync {
    fn score(&self, creator: Option<&Creator>) -> f64;
}

/// Uses whatever trust score the ledger holds, or the neutral default
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredScoreScorer;

impl CreatorScorer for StoredScoreScorer {
    fn score(&self, creator: Option<&Creator>) -> f64 {
        creator.map(|c| c.trust_score).unwrap_or(DEFAULT_TRUST_SCORE)
    }
}

/// Same score for everyone
#[derive(Debug, Clone, Copy)]
pub struct FixedScorer(pub f64);

impl CreatorScorer for FixedScorer {
    fn score(&self, _creator: Option<&Creator>) -> f64 {
        self.0
    }
}
