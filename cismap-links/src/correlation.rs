use statrs::function::erf::erfc;

use cismap_core::errors::{CisMapError, Result};

/// Fewest aligned observations for which the Fisher z-test is defined.
pub const MIN_OBSERVATIONS: usize = 3;

///
/// A correlation coefficient and its two-tailed p-value.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub r: f64,
    pub p: f64,
    pub n: usize,
}

///
/// Anything that turns two tissue-aligned series into a [Correlation].
///
pub trait CorrelationBackend: Sync {
    fn correlate(&self, histone_levels: &[f64], expression: &[f64]) -> Result<Correlation>;
}

///
/// Pearson correlation of `ln(x + 1)`-transformed series, with the
/// p-value from the Fisher z-transform.
///
#[derive(Debug, Clone, Copy, Default)]
pub struct PearsonFisher;

impl CorrelationBackend for PearsonFisher {
    fn correlate(&self, histone_levels: &[f64], expression: &[f64]) -> Result<Correlation> {
        correlate(histone_levels, expression)
    }
}

///
/// Correlate histone levels with expression across tissues.
///
/// # Arguments
///
/// - histone_levels: per-tissue histone signal, raw units
/// - expression: per-tissue expression, raw units, same tissue order
///
/// # Returns
///
/// `r` and `p` where `p = 2 * Phi(-|z|)`, `z = atanh(r) * sqrt(n - 3)`.
/// A perfect correlation yields the smallest positive `f64` instead of 0.
///
pub fn correlate(histone_levels: &[f64], expression: &[f64]) -> Result<Correlation> {
    if histone_levels.len() != expression.len() {
        return Err(CisMapError::InvalidArgument(format!(
            "series lengths differ: {} histone levels, {} expression values",
            histone_levels.len(),
            expression.len()
        )));
    }

    let n = histone_levels.len();
    if n < MIN_OBSERVATIONS {
        return Err(CisMapError::InsufficientData {
            observed: n,
            required: MIN_OBSERVATIONS,
        });
    }

    let x: Vec<f64> = histone_levels.iter().map(|v| v.ln_1p()).collect();
    let y: Vec<f64> = expression.iter().map(|v| v.ln_1p()).collect();

    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(CisMapError::UndefinedCorrelation(
            "series contain values that are not finite after ln(x + 1)".to_string(),
        ));
    }

    let r = pearson(&x, &y)?;
    let p = fisher_p_value(r, n);

    Ok(Correlation { r, p, n })
}

fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|v| *v == values[0])
}

fn pearson(x: &[f64], y: &[f64]) -> Result<f64> {
    if is_constant(x) || is_constant(y) {
        return Err(CisMapError::UndefinedCorrelation(
            "one of the series has zero variance".to_string(),
        ));
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y.iter()) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return Err(CisMapError::UndefinedCorrelation(
            "one of the series has zero variance".to_string(),
        ));
    }

    let r = sxy / (sxx.sqrt() * syy.sqrt());
    if !r.is_finite() {
        return Err(CisMapError::UndefinedCorrelation(format!(
            "coefficient is {}",
            r
        )));
    }

    Ok(r.clamp(-1.0, 1.0))
}

///
/// Two-tailed p-value of `r` under the Fisher z null with standard error
/// `1 / sqrt(n - 3)`, clamped to `[f64::MIN_POSITIVE, 1]`.
///
pub fn fisher_p_value(r: f64, n: usize) -> f64 {
    if r.abs() >= 1.0 {
        return f64::MIN_POSITIVE;
    }

    let z = r.atanh() * ((n.saturating_sub(3)) as f64).sqrt();
    let p = erfc(z.abs() / std::f64::consts::SQRT_2);

    if p.is_nan() {
        return 1.0;
    }
    p.clamp(f64::MIN_POSITIVE, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn test_monotone_series_correlate_strongly() {
        let c = correlate(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 4.0, 6.0, 8.0, 10.0]).unwrap();

        assert!(c.r > 0.995, "r = {}", c.r);
        assert!(c.p < 1e-3, "p = {}", c.p);
        assert_eq!(c.n, 5);
    }

    #[rstest]
    fn test_anticorrelated_series() {
        let c = correlate(&[1.0, 2.0, 3.0, 4.0, 5.0], &[10.0, 8.0, 6.0, 4.0, 2.0]).unwrap();

        assert!(c.r < -0.9);
        assert!(c.p < 0.05);
    }

    #[rstest]
    fn test_perfect_correlation_clamps_p() {
        // identical series after the transform
        let c = correlate(&[0.0, 1.0, 3.0, 7.0], &[0.0, 1.0, 3.0, 7.0]).unwrap();

        assert_abs_diff_eq!(c.r, 1.0, epsilon = 1e-12);
        assert!(c.p > 0.0);
        assert!(c.p < 1e-30);

        assert_eq!(fisher_p_value(1.0, 10), f64::MIN_POSITIVE);
        assert_eq!(fisher_p_value(-1.0, 10), f64::MIN_POSITIVE);
    }

    #[rstest]
    #[case(vec![1.0, 2.0], vec![3.0, 4.0])]
    #[case(vec![], vec![])]
    fn test_too_few_observations(#[case] x: Vec<f64>, #[case] y: Vec<f64>) {
        assert!(matches!(
            correlate(&x, &y),
            Err(CisMapError::InsufficientData { required: 3, .. })
        ));
    }

    #[rstest]
    fn test_length_mismatch_is_invalid() {
        assert!(matches!(
            correlate(&[1.0, 2.0, 3.0], &[1.0, 2.0]),
            Err(CisMapError::InvalidArgument(_))
        ));
    }

    #[rstest]
    fn test_zero_variance_is_undefined() {
        assert!(matches!(
            correlate(&[2.0, 2.0, 2.0, 2.0], &[1.0, 2.0, 3.0, 4.0]),
            Err(CisMapError::UndefinedCorrelation(_))
        ));
    }

    #[rstest]
    fn test_non_finite_is_undefined() {
        assert!(matches!(
            correlate(&[1.0, f64::NAN, 3.0, 4.0], &[1.0, 2.0, 3.0, 4.0]),
            Err(CisMapError::UndefinedCorrelation(_))
        ));
    }

    #[rstest]
    fn test_three_observations_have_no_power() {
        // sqrt(n - 3) = 0, so z = 0 and p = 1
        assert_eq!(fisher_p_value(0.8, 3), 1.0);
    }

    #[rstest]
    fn test_fisher_p_value_known_value() {
        // r = 0.5, n = 28: z = atanh(0.5) * 5 = 2.7465, p = 0.006023
        assert_abs_diff_eq!(fisher_p_value(0.5, 28), 0.006023, epsilon = 1e-5);
    }

    #[rstest]
    fn test_backend_delegates() {
        let backend = PearsonFisher;
        let direct = correlate(&[1.0, 5.0, 2.0, 8.0], &[2.0, 9.0, 1.0, 7.0]).unwrap();
        let via = backend
            .correlate(&[1.0, 5.0, 2.0, 8.0], &[2.0, 9.0, 1.0, 7.0])
            .unwrap();
        assert_eq!(direct, via);
    }
}
