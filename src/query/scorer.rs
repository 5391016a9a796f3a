//! Scoring of matched documents.
//!
//! Terms are weighted with classic TF-IDF:
//!
//! ```text
//! score = sqrt(tf) * idf^2 * boost / sqrt(field_length)
//! idf   = 1 + ln(N / (df + 1))
//! ```
//!
//! `N` and `df` are taken over the whole snapshot and count deleted
//! documents until they are merged away, so `idf` never drops below 1 and
//! scores are never negative.

use std::fmt::Debug;

/// Inverse document frequency of a term.
pub fn idf(total_docs: u64, doc_freq: u64) -> f32 {
    let total_docs = total_docs.max(doc_freq).max(1) as f64;
    (1.0 + (total_docs / (doc_freq as f64 + 1.0)).ln()).max(0.0) as f32
}

/// Trait for document scorers.
pub trait Scorer: Send + Sync + Debug {
    /// Score a document given the frequency of the match in it and the
    /// length of the matched field.
    fn score(&self, term_freq: u32, field_length: u32) -> f32;

    /// Get the boost factor for this scorer.
    fn boost(&self) -> f32;

    /// Get the name of this scorer.
    fn name(&self) -> &'static str;
}

/// TF-IDF scorer of one term (or phrase).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TfIdfScorer {
    idf: f32,
    boost: f32,
}

impl TfIdfScorer {
    /// Create a scorer from document statistics.
    pub fn new(total_docs: u64, doc_freq: u64, boost: f32) -> Self {
        TfIdfScorer {
            idf: idf(total_docs, doc_freq),
            boost,
        }
    }

    /// Create a scorer from a precomputed idf.
    pub fn with_idf(idf: f32, boost: f32) -> Self {
        TfIdfScorer { idf, boost }
    }

    /// The idf of the scored term.
    pub fn idf(&self) -> f32 {
        self.idf
    }
}

impl Scorer for TfIdfScorer {
    fn score(&self, term_freq: u32, field_length: u32) -> f32 {
        if term_freq == 0 {
            return 0.0;
        }
        let norm = 1.0 / (field_length.max(1) as f32).sqrt();
        (term_freq as f32).sqrt() * self.idf * self.idf * self.boost * norm
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn name(&self) -> &'static str {
        "tf_idf"
    }
}

/// Scorer that gives every match the same score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantScorer {
    score: f32,
}

impl ConstantScorer {
    /// Create a constant scorer.
    pub fn new(score: f32) -> Self {
        ConstantScorer { score }
    }
}

impl Scorer for ConstantScorer {
    fn score(&self, _term_freq: u32, _field_length: u32) -> f32 {
        self.score
    }

    fn boost(&self) -> f32 {
        self.score
    }

    fn name(&self) -> &'static str {
        "constant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idf_is_at_least_one() {
        assert!(idf(10, 10) >= 0.99);
        assert!(idf(0, 0) > 0.0);
        assert!(idf(1000, 1) > idf(1000, 100));
    }

    #[test]
    fn test_tf_idf_score() {
        let scorer = TfIdfScorer::new(2, 2, 1.0);
        let idf = scorer.idf();
        let expected = idf * idf / 3f32.sqrt();
        assert!((scorer.score(1, 3) - expected).abs() < 1e-6);
        // shorter fields score higher
        assert!(scorer.score(1, 3) > scorer.score(1, 4));
        assert!(scorer.score(4, 4) > scorer.score(1, 4));
        assert_eq!(scorer.score(0, 4), 0.0);
    }

    #[test]
    fn test_boost_scales_score() {
        let plain = TfIdfScorer::new(100, 5, 1.0);
        let boosted = TfIdfScorer::new(100, 5, 2.0);
        assert!((boosted.score(2, 10) - 2.0 * plain.score(2, 10)).abs() < 1e-5);
    }

    #[test]
    fn test_constant_scorer() {
        let scorer = ConstantScorer::new(1.5);
        assert_eq!(scorer.score(7, 100), 1.5);
        assert_eq!(scorer.boost(), 1.5);
    }
}
