//! Descriptive statistics and Welch's t-test
//!
//! Every function here is symmetric in its two samples where it takes two,
//! so swapping baseline and candidate never changes a gate's outcome.

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator), 0 when fewer than two values
pub fn sample_variance(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Sample standard deviation (n - 1 denominator), 0 when fewer than two values
pub fn sample_stddev(values: &[f64], mean: f64) -> f64 {
    sample_variance(values, mean).sqrt()
}

/// Pooled standard deviation of two samples given their sizes and stddevs
pub fn pooled_stddev(n_a: usize, stddev_a: f64, n_b: usize, stddev_b: f64) -> f64 {
    let dof = (n_a + n_b).saturating_sub(2);
    if dof == 0 {
        return 0.0;
    }
    let weighted = n_a.saturating_sub(1) as f64 * stddev_a.powi(2)
        + n_b.saturating_sub(1) as f64 * stddev_b.powi(2);
    (weighted / dof as f64).sqrt()
}

/// Outcome of Welch's unequal-variance t-test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WelchTest {
    /// Magnitude of the t statistic
    pub t_abs: f64,
    /// Welch-Satterthwaite degrees of freedom
    pub degrees_of_freedom: f64,
    /// Two-tailed p-value
    pub p_value: f64,
}

/// Welch's t-test for a difference in means.
///
/// When both samples have zero variance the test degenerates: any non-zero
/// difference in means is treated as certain (p = 0), equal means as no
/// evidence at all (p = 1).
pub fn welch_t_test(a: &[f64], b: &[f64]) -> WelchTest {
    let (n_a, n_b) = (a.len() as f64, b.len() as f64);
    let (mean_a, mean_b) = (mean(a), mean(b));
    let se_a = sample_variance(a, mean_a) / n_a;
    let se_b = sample_variance(b, mean_b) / n_b;
    let se_diff = (se_a + se_b).sqrt();
    let delta = (mean_a - mean_b).abs();

    if !se_diff.is_finite() || se_diff < f64::EPSILON {
        return WelchTest {
            t_abs: if delta > 0.0 { f64::INFINITY } else { 0.0 },
            degrees_of_freedom: (n_a + n_b - 2.0).max(0.0),
            p_value: if delta > 0.0 { 0.0 } else { 1.0 },
        };
    }

    let t_abs = delta / se_diff;
    let dof_denominator = welch_term(se_a, n_a) + welch_term(se_b, n_b);
    let degrees_of_freedom = if dof_denominator > f64::EPSILON {
        (se_a + se_b).powi(2) / dof_denominator
    } else {
        n_a + n_b - 2.0
    };

    WelchTest {
        t_abs,
        degrees_of_freedom,
        p_value: two_tailed_p(t_abs, degrees_of_freedom),
    }
}

fn welch_term(se: f64, n: f64) -> f64 {
    if n > 1.0 && se > f64::EPSILON {
        se.powi(2) / (n - 1.0)
    } else {
        0.0
    }
}

/// P(|T| >= t) for Student's t with `dof` degrees of freedom
fn two_tailed_p(t_abs: f64, dof: f64) -> f64 {
    if dof <= 0.0 {
        return 1.0;
    }
    let x = dof / (dof + t_abs * t_abs);
    regularized_incomplete_beta(x, dof / 2.0, 0.5).clamp(0.0, 1.0)
}

/// I_x(a, b) via its continued fraction (Lentz)
fn regularized_incomplete_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let front =
        (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();
    // The fraction converges fast only below the mean of the distribution
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(x, a, b) / a
    } else {
        1.0 - front * beta_continued_fraction(1.0 - x, b, a) / b
    }
}

#[allow(clippy::many_single_char_names)]
fn beta_continued_fraction(x: f64, a: f64, b: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 1e-12;
    const TINY: f64 = 1e-30;

    let clamp_tiny = |v: f64| if v.abs() < TINY { TINY } else { v };

    let mut c = 1.0;
    let mut d = 1.0 / clamp_tiny(1.0 - (a + b) * x / (a + 1.0));
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let even = m * (b - m) * x / ((a - 1.0 + m2) * (a + m2));
        d = 1.0 / clamp_tiny(1.0 + even * d);
        c = clamp_tiny(1.0 + even / c);
        h *= d * c;

        let odd = -(a + m) * (a + b + m) * x / ((a + m2) * (a + 1.0 + m2));
        d = 1.0 / clamp_tiny(1.0 + odd * d);
        c = clamp_tiny(1.0 + odd / c);
        let step = d * c;
        h *= step;

        if (step - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Lanczos approximation of ln Γ(x) for x > 0
#[allow(clippy::excessive_precision)]
fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_93,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_13,
        -176.615_029_162_140_59,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_571_6e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x <= 0.0 {
        return f64::INFINITY;
    }
    let x = x - 1.0;
    let sum = COEFFICIENTS
        .iter()
        .enumerate()
        .skip(1)
        .fold(COEFFICIENTS[0], |acc, (i, c)| acc + c / (x + i as f64));
    let t = x + G + 0.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + sum.ln()
}
