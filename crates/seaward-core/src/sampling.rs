//! Numerically stable softmax and categorical sampling shared by choice and bandit rules.

use rand::{Rng, RngCore};

/// Softmax over `values` after subtracting the maximum.
///
/// NaN counts as negative infinity. If any value is `+inf` the mass is split evenly
/// between those entries; if every value is `-inf` the result is uniform.
#[must_use]
pub fn stable_softmax(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let cleaned: Vec<f64> = values
        .iter()
        .map(|value| if value.is_nan() { f64::NEG_INFINITY } else { *value })
        .collect();
    let max = cleaned.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max == f64::INFINITY {
        let winners = cleaned.iter().filter(|v| **v == f64::INFINITY).count() as f64;
        return cleaned
            .iter()
            .map(|v| if *v == f64::INFINITY { 1.0 / winners } else { 0.0 })
            .collect();
    }
    if max == f64::NEG_INFINITY {
        let uniform = 1.0 / cleaned.len() as f64;
        return vec![uniform; cleaned.len()];
    }

    let weights: Vec<f64> = cleaned.iter().map(|v| (v - max).exp()).collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Draw an index by cumulative inversion with a single uniform draw.
///
/// The first index whose cumulative probability exceeds the draw wins, so
/// zero-probability entries are never returned. Rounding shortfall falls on the
/// last positive entry. Returns `None` when no entry has positive probability.
pub fn sample_index(probabilities: &[f64], rng: &mut dyn RngCore) -> Option<usize> {
    let last_positive = probabilities.iter().rposition(|p| *p > 0.0)?;
    let draw: f64 = rng.random();
    let mut cumulative = 0.0;
    for (index, probability) in probabilities.iter().enumerate() {
        if *probability <= 0.0 {
            continue;
        }
        cumulative += probability;
        if draw < cumulative {
            return Some(index);
        }
    }
    Some(last_positive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn softmax_matches_closed_form() {
        let probabilities = stable_softmax(&[1.0, 0.0]);
        let expected = 1.0_f64.exp() / (1.0_f64.exp() + 1.0);
        assert!((probabilities[0] - expected).abs() < 1e-12);
        assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn softmax_survives_huge_utilities() {
        let probabilities = stable_softmax(&[1_000.0, 999.0, -5_000.0]);
        assert!(probabilities.iter().all(|p| p.is_finite()));
        assert!(probabilities[0] > probabilities[1]);
        assert!(probabilities[2] < 1e-300);
    }

    #[test]
    fn softmax_degenerate_inputs() {
        assert!(stable_softmax(&[]).is_empty());
        assert_eq!(stable_softmax(&[0.0, 0.0, 0.0, 0.0]), vec![0.25; 4]);
        assert_eq!(
            stable_softmax(&[f64::NEG_INFINITY, f64::NAN]),
            vec![0.5, 0.5]
        );
        assert_eq!(
            stable_softmax(&[f64::INFINITY, 3.0, f64::INFINITY]),
            vec![0.5, 0.0, 0.5]
        );
    }

    #[test]
    fn sampling_never_returns_zero_mass() {
        let mut rng = SmallRng::seed_from_u64(77);
        let probabilities = [0.0, 0.3, 0.0, 0.7, 0.0];
        for _ in 0..2_000 {
            let index = sample_index(&probabilities, &mut rng).expect("positive mass");
            assert!(index == 1 || index == 3);
        }
        assert_eq!(sample_index(&[0.0, 0.0], &mut rng), None);
    }

    #[test]
    fn sampling_is_deterministic_under_seed() {
        let probabilities = [0.2, 0.5, 0.3];
        let draw = |seed| {
            let mut rng = SmallRng::seed_from_u64(seed);
            (0..64)
                .map(|_| sample_index(&probabilities, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(9), draw(9));
    }
}
