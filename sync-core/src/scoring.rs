//! Similarity and quality scoring for newly discovered peers.
//!
//! The baseline similarity comes from an external resonance service. When
//! that call is unavailable the score degrades to a conservative default
//! instead of failing discovery.

/// Fixed constants of the peer scoring formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    /// Baseline used when the resonance service is unavailable.
    pub default_similarity: f64,
    /// Flat boost added to every baseline.
    pub engagement_boost: f64,
    /// Quality at zero similarity.
    pub quality_offset: f64,
    /// Quality gained per unit of similarity.
    pub quality_slope: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            default_similarity: 0.5,
            engagement_boost: 0.1,
            quality_offset: 0.2,
            quality_slope: 0.8,
        }
    }
}

/// Scores computed for a peer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerScore {
    /// Similarity in `[0, 1]`.
    pub similarity: f64,
    /// Quality in `[0, 1]`, linear in similarity.
    pub quality: f64,
    /// Whether the external baseline was used (false means the default was).
    pub from_service: bool,
}

/// Score a peer from an optional external baseline.
///
/// `baseline` is `None` when the resonance call failed. Non-finite baselines
/// are treated the same way.
pub fn score_peer(baseline: Option<f64>, params: &ScoringParams) -> PeerScore {
    let (base, from_service) = match baseline {
        Some(value) if value.is_finite() => (value, true),
        _ => (params.default_similarity, false),
    };

    let similarity = clamp_unit(base + params.engagement_boost);
    let quality = clamp_unit(params.quality_offset + params.quality_slope * similarity);

    PeerScore {
        similarity,
        quality,
        from_service,
    }
}

/// Clamp to `[0, 1]`, mapping NaN to 0.
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn service_baseline_gets_boost() {
        let score = score_peer(Some(0.6), &ScoringParams::default());
        assert!((score.similarity - 0.7).abs() < EPS);
        assert!((score.quality - (0.2 + 0.8 * 0.7)).abs() < EPS);
        assert!(score.from_service);
    }

    #[test]
    fn unavailable_service_uses_default() {
        let score = score_peer(None, &ScoringParams::default());
        assert!((score.similarity - 0.6).abs() < EPS);
        assert!(!score.from_service);
    }

    #[test]
    fn nan_baseline_uses_default() {
        let score = score_peer(Some(f64::NAN), &ScoringParams::default());
        assert!(!score.from_service);
        assert!((score.similarity - 0.6).abs() < EPS);
    }

    #[test]
    fn scores_are_clamped() {
        let high = score_peer(Some(5.0), &ScoringParams::default());
        assert_eq!(high.similarity, 1.0);
        assert_eq!(high.quality, 1.0);

        let low = score_peer(Some(-3.0), &ScoringParams::default());
        assert_eq!(low.similarity, 0.0);
        assert!((low.quality - 0.2).abs() < EPS);
    }

    #[test]
    fn similarity_is_monotonic_in_baseline() {
        let params = ScoringParams::default();
        let mut previous = f64::NEG_INFINITY;
        for step in 0..=40 {
            let baseline = -0.5 + step as f64 * 0.05;
            let score = score_peer(Some(baseline), &params);
            assert!(score.similarity >= previous);
            assert!((0.0..=1.0).contains(&score.similarity));
            assert!((0.0..=1.0).contains(&score.quality));
            previous = score.similarity;
        }
    }
}
