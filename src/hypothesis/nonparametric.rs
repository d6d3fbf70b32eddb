// Non-parametric tests: Wilcoxon signed-rank (Pratt) and Mann-Whitney U
//
// Small untied samples use the exact null distribution. Otherwise a normal
// approximation with tie correction is used.
//
// References:
// - Wilcoxon (1945). Individual comparisons by ranking methods.
// - Pratt (1959). Remarks on zeros and ties in the Wilcoxon signed rank
//   procedures. JASA 54(287), 655-667.
// - Cureton (1967). The normal approximation to the signed-rank sampling
//   distribution when zero differences are present. JASA 62(319).
// - Mann & Whitney (1947). On a test of whether one of two random variables
//   is stochastically larger than the other.

use super::config::Alternative;
use super::normality::standard_normal;
use super::parametric::tail_probability;
use crate::error::{GainError, Result};
use statrs::distribution::ContinuousCDF;

/// Rank statistic with its p-value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankTest {
    pub statistic: f64,
    pub p_value: f64,
    /// Whether the exact null distribution was used
    pub exact: bool,
}

const WILCOXON_EXACT_MAX_N: usize = 50;
const MANN_WHITNEY_EXACT_MAX_N: usize = 8;

/// Average ranks (1-based) of `values`, returned in input order,
/// plus the sizes of every tie group
fn rank_with_ties(values: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));

    let mut ranks = vec![0.0; values.len()];
    let mut ties = Vec::new();
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let average = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = average;
        }
        if end - start > 1 {
            ties.push(end - start);
        }
        start = end;
    }
    (ranks, ties)
}

fn tie_term(ties: &[usize]) -> f64 {
    ties.iter()
        .map(|&t| {
            let t = t as f64;
            t * (t * t - 1.0)
        })
        .sum()
}

/// Wilcoxon signed-rank test on `a - b` with Pratt's zero handling
///
/// Zero differences are ranked together with the others and then left out of
/// both rank sums. The statistic is T+ for one-sided alternatives and
/// min(T+, T-) for two-sided.
pub fn wilcoxon_pratt(a: &[f64], b: &[f64], alternative: Alternative) -> Result<RankTest> {
    if a.len() != b.len() {
        return Err(GainError::PairedLengthMismatch {
            len_a: a.len(),
            len_b: b.len(),
        });
    }
    if a.is_empty() {
        return Err(GainError::EmptySample {
            label: "differences".to_string(),
        });
    }

    let diffs: Vec<f64> = a.iter().zip(b).map(|(x, y)| x - y).collect();
    let magnitudes: Vec<f64> = diffs.iter().map(|d| d.abs()).collect();
    let (ranks, _) = rank_with_ties(&magnitudes);

    let r_plus: f64 = diffs.iter().zip(&ranks).filter(|(d, _)| **d > 0.0).map(|(_, r)| r).sum();
    let r_minus: f64 = diffs.iter().zip(&ranks).filter(|(d, _)| **d < 0.0).map(|(_, r)| r).sum();

    let n = diffs.len();
    let n_zero = diffs.iter().filter(|d| **d == 0.0).count();
    let nonzero_ranks: Vec<f64> = diffs
        .iter()
        .zip(&ranks)
        .filter(|(d, _)| **d != 0.0)
        .map(|(_, r)| *r)
        .collect();
    let (_, nonzero_ties) = rank_with_ties(&nonzero_ranks);

    if nonzero_ranks.is_empty() {
        return Err(GainError::DegenerateSample {
            label: "differences".to_string(),
            reason: "all paired differences are zero".to_string(),
        });
    }

    let statistic = match alternative {
        Alternative::TwoSided => r_plus.min(r_minus),
        _ => r_plus,
    };

    if n_zero == 0 && nonzero_ties.is_empty() && n <= WILCOXON_EXACT_MAX_N {
        let p_value = signed_rank_exact_p(n, r_plus, alternative);
        return Ok(RankTest {
            statistic,
            p_value,
            exact: true,
        });
    }

    let nf = n as f64;
    let zf = n_zero as f64;
    let mean = nf * (nf + 1.0) / 4.0 - zf * (zf + 1.0) / 4.0;
    let var24 = nf * (nf + 1.0) * (2.0 * nf + 1.0)
        - zf * (zf + 1.0) * (2.0 * zf + 1.0)
        - 0.5 * tie_term(&nonzero_ties);
    let se = (var24 / 24.0).sqrt();
    if !(se.is_finite() && se > 0.0) {
        return Err(GainError::DegenerateSample {
            label: "differences".to_string(),
            reason: "signed-rank variance is 0".to_string(),
        });
    }

    let z = (statistic - mean) / se;
    let normal = standard_normal()?;
    Ok(RankTest {
        statistic,
        p_value: tail_probability(&normal, z, alternative),
        exact: false,
    })
}

// Count sign assignments of ranks 1..=n by their positive rank sum
fn signed_rank_counts(n: usize) -> Vec<f64> {
    let max_sum = n * (n + 1) / 2;
    let mut counts = vec![0.0; max_sum + 1];
    counts[0] = 1.0;
    for rank in 1..=n {
        for s in (rank..=max_sum).rev() {
            counts[s] += counts[s - rank];
        }
    }
    counts
}

fn signed_rank_exact_p(n: usize, r_plus: f64, alternative: Alternative) -> f64 {
    let counts = signed_rank_counts(n);
    let total: f64 = counts.iter().sum();
    let t = r_plus.round() as usize;
    let max_sum = counts.len() - 1;

    let upper = |t: usize| counts[t.min(max_sum + 1)..].iter().sum::<f64>() / total;
    let lower = |t: usize| counts[..=t.min(max_sum)].iter().sum::<f64>() / total;

    let p = match alternative {
        Alternative::Greater => upper(t),
        Alternative::Less => lower(t),
        Alternative::TwoSided => {
            let t_min = t.min(max_sum - t);
            2.0 * lower(t_min)
        }
    };
    p.clamp(0.0, 1.0)
}

/// Mann-Whitney U test for independent samples
///
/// The statistic is U for sample `a`: the number of (a, b) pairs with
/// a > b, ties counting one half.
pub fn mann_whitney_u(a: &[f64], b: &[f64], alternative: Alternative) -> Result<RankTest> {
    if a.is_empty() {
        return Err(GainError::EmptySample {
            label: "a".to_string(),
        });
    }
    if b.is_empty() {
        return Err(GainError::EmptySample {
            label: "b".to_string(),
        });
    }

    let n_a = a.len();
    let n_b = b.len();
    let combined: Vec<f64> = a.iter().chain(b).copied().collect();
    let (ranks, ties) = rank_with_ties(&combined);

    let rank_sum_a: f64 = ranks[..n_a].iter().sum();
    let na = n_a as f64;
    let nb = n_b as f64;
    let u_a = rank_sum_a - na * (na + 1.0) / 2.0;
    let u_b = na * nb - u_a;

    if ties.is_empty() && n_a <= MANN_WHITNEY_EXACT_MAX_N && n_b <= MANN_WHITNEY_EXACT_MAX_N {
        let counts = mann_whitney_counts(n_a, n_b);
        let total: f64 = counts.iter().sum();
        let upper = |u: f64| counts[u.round() as usize..].iter().sum::<f64>() / total;
        let p = match alternative {
            Alternative::Greater => upper(u_a),
            Alternative::Less => upper(u_b),
            Alternative::TwoSided => 2.0 * upper(u_a.max(u_b)),
        };
        return Ok(RankTest {
            statistic: u_a,
            p_value: p.clamp(0.0, 1.0),
            exact: true,
        });
    }

    let n = na + nb;
    let mean = na * nb / 2.0;
    let sd = (na * nb / 12.0 * ((n + 1.0) - tie_term(&ties) / (n * (n - 1.0)))).sqrt();
    if !(sd.is_finite() && sd > 0.0) {
        return Err(GainError::DegenerateSample {
            label: "a+b".to_string(),
            reason: "all observations are tied".to_string(),
        });
    }

    let normal = standard_normal()?;
    // Continuity-corrected upper tail of the relevant U
    let upper = |u: f64| normal.sf((u - mean - 0.5) / sd);
    let p = match alternative {
        Alternative::Greater => upper(u_a),
        Alternative::Less => upper(u_b),
        Alternative::TwoSided => 2.0 * upper(u_a.max(u_b)),
    };

    Ok(RankTest {
        statistic: u_a,
        p_value: p.clamp(0.0, 1.0),
        exact: false,
    })
}

// Frequencies of U = 0..=m*n under the null, for samples of size m and n
fn mann_whitney_counts(m: usize, n: usize) -> Vec<f64> {
    // table[i][j] holds the frequency vector for sizes (i, j)
    let mut table: Vec<Vec<Vec<f64>>> = vec![vec![Vec::new(); n + 1]; m + 1];
    for i in 0..=m {
        for j in 0..=n {
            table[i][j] = if i == 0 || j == 0 {
                vec![1.0]
            } else {
                let mut freq = vec![0.0; i * j + 1];
                // Largest observation from the first sample adds j to U
                for (u, c) in table[i - 1][j].iter().enumerate() {
                    freq[u + j] += c;
                }
                for (u, c) in table[i][j - 1].iter().enumerate() {
                    freq[u] += c;
                }
                freq
            };
        }
    }
    std::mem::take(&mut table[m][n])
}
