//! Correlation-based pattern matching.
//!
//! Locates occurrences of a short reference track inside a longer target by
//! normalized cross-correlation. A window matches when its correlation against
//! the reference reaches 95% of the reference's zero-lag autocorrelation;
//! matches are greedy, leftmost-first, and non-overlapping. This module only
//! consumes the engine's read path: both inputs arrive as flat sample
//! slices.

use ndarray::{Array1, LinalgScalar, s};
use num_traits::{Float, NumCast};

/// Fraction of the reference's self-similarity a window must reach to match.
const MATCH_THRESHOLD: f64 = 0.95;

/// Floating-point types the matcher can accumulate in.
///
/// `f64` is the default used by [`find_occurrences`]; `f32` trades precision
/// for speed on long targets.
pub trait MatchFloat: Float + NumCast + LinalgScalar {}

impl MatchFloat for f32 {}
impl MatchFloat for f64 {}

/// One located occurrence of the reference inside the target, as an inclusive
/// sample range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    /// Offset of the first matching sample.
    pub start: usize,
    /// Offset of the last matching sample.
    pub end: usize,
}

/// Finds every non-overlapping occurrence of `reference` inside `target`,
/// in ascending order of start offset.
///
/// Returns an empty list when the reference is empty, longer than the target,
/// or silent (a zero-norm reference never matches anything).
pub fn find_occurrences(target: &[i16], reference: &[i16]) -> Vec<MatchSpan> {
    find_occurrences_in::<f64>(target, reference)
}

/// [`find_occurrences`] with a caller-chosen accumulation precision.
pub fn find_occurrences_in<F: MatchFloat>(target: &[i16], reference: &[i16]) -> Vec<MatchSpan> {
    let m = reference.len();
    let n = target.len();
    if m == 0 || m > n {
        return Vec::new();
    }

    let reference = lift::<F>(reference);
    let target = lift::<F>(target);
    let reference_energy = reference.dot(&reference);

    // Zero-lag autocorrelation of the reference is the ceiling any window can
    // reach; the threshold sits at 95% of it.
    let autocorr = normalized_score(reference_energy, reference_energy, reference_energy);
    let threshold = autocorr * to_float::<F, _>(MATCH_THRESHOLD);
    if autocorr <= F::zero() {
        return Vec::new();
    }

    // Running window energies come from a prefix-sum table so each offset
    // costs one dot product.
    let mut prefix_sq = Vec::with_capacity(n + 1);
    prefix_sq.push(F::zero());
    let mut acc = F::zero();
    for &v in target.iter() {
        acc = acc + v * v;
        prefix_sq.push(acc);
    }

    let mut matches = Vec::new();
    let mut i = 0;
    while i + m <= n {
        let window_energy = prefix_sq[i + m] - prefix_sq[i];
        let dot = target.slice(s![i..i + m]).dot(&reference);
        let score = normalized_score(dot, window_energy, reference_energy);
        if score >= threshold {
            matches.push(MatchSpan {
                start: i,
                end: i + m - 1,
            });
            i += m;
        } else {
            i += 1;
        }
    }
    matches
}

/// `dot / sqrt(energy_a * energy_b)`, with degenerate all-zero windows
/// scoring zero instead of dividing by zero.
fn normalized_score<F: MatchFloat>(dot: F, energy_a: F, energy_b: F) -> F {
    let denom = (energy_a * energy_b).sqrt();
    if denom == F::zero() {
        F::zero()
    } else {
        dot / denom
    }
}

fn lift<F: MatchFloat>(samples: &[i16]) -> Array1<F> {
    samples.iter().map(|&s| to_float::<F, _>(s)).collect()
}

fn to_float<F: MatchFloat, T: NumCast>(value: T) -> F {
    NumCast::from(value).expect("i16 and f64 literals are representable in f32/f64")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;

    #[test]
    fn finds_verbatim_occurrence_at_known_offset() {
        let reference = [100i16, -200, 300, -400];
        let mut target = vec![5i16; 16];
        target[6..10].copy_from_slice(&reference);

        let matches = find_occurrences(&target, &reference);
        assert_eq!(matches, vec![MatchSpan { start: 6, end: 9 }]);
    }

    #[test]
    fn matches_are_greedy_and_non_overlapping() {
        let reference = [1000i16, -2000, 3000];
        let mut target = vec![0i16; 12];
        target[0..3].copy_from_slice(&reference);
        target[3..6].copy_from_slice(&reference);
        target[9..12].copy_from_slice(&reference);

        let matches = find_occurrences(&target, &reference);
        assert_eq!(
            matches,
            vec![
                MatchSpan { start: 0, end: 2 },
                MatchSpan { start: 3, end: 5 },
                MatchSpan { start: 9, end: 11 },
            ]
        );
    }

    #[test]
    fn dissimilar_signals_do_not_match() {
        let reference = [1000i16, 1000, 1000, 1000];
        let target = [1000i16, -1000, 1000, -1000, 1000, -1000, 1000, -1000];
        assert!(find_occurrences(&target, &reference).is_empty());
    }

    #[test]
    fn reference_longer_than_target_yields_nothing() {
        assert!(find_occurrences(&[1, 2], &[1, 2, 3]).is_empty());
        assert!(find_occurrences(&[1, 2, 3], &[]).is_empty());
    }

    #[test]
    fn silent_windows_never_match() {
        // A zero-norm reference scores zero everywhere, even against silence.
        let reference = [0i16; 4];
        let target = [0i16; 16];
        assert!(find_occurrences(&target, &reference).is_empty());

        // A real reference must not match a silent stretch of target.
        let reference = [500i16, 600, 700];
        let target = [0i16; 10];
        assert!(find_occurrences(&target, &reference).is_empty());
    }

    #[test]
    fn scaled_copy_still_correlates() {
        // Normalization makes the score amplitude-invariant; a half-volume
        // copy of the reference still scores 1.0.
        let reference = [400i16, -800, 1200, -1600];
        let scaled: Vec<i16> = reference.iter().map(|&s| s / 2).collect();
        let mut target = vec![0i16; 12];
        target[4..8].copy_from_slice(&scaled);

        let matches = find_occurrences(&target, &reference);
        assert_eq!(matches, vec![MatchSpan { start: 4, end: 7 }]);
    }

    #[test]
    fn normalized_score_is_unit_for_self() {
        let r = lift::<f64>(&[3, -1, 4, -1, 5]);
        let energy = r.dot(&r);
        assert_approx_eq!(normalized_score(energy, energy, energy), 1.0, 1e-12);
        assert_approx_eq!(normalized_score(0.0, 0.0, energy), 0.0, 1e-12);
    }

    #[test]
    fn f32_precision_agrees_on_clean_matches() {
        let reference = [100i16, -200, 300, -400];
        let mut target = vec![7i16; 20];
        target[10..14].copy_from_slice(&reference);

        let coarse = find_occurrences_in::<f32>(&target, &reference);
        let fine = find_occurrences_in::<f64>(&target, &reference);
        assert_eq!(coarse, fine);
    }
}
