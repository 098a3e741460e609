//! Spontaneous decay of a substrate, applied cell by cell.
//!
//! First- and second-order kinetics use their closed-form solutions and are
//! exact for any `dt`. Michaelis-Menten has no closed form; a backward Euler
//! step is taken, which reduces to a quadratic in the new concentration and
//! is solved directly.

use crate::error::{NumericalWarning, StepReport};
use crate::grid::Grid;
use rayon::prelude::*;
use substratum_data::DecayKinetics;

/// `c * exp(-k*dt)`
#[inline]
#[must_use]
pub fn first_order(c: f64, k: f64, dt: f64) -> f64 {
    c * (-k * dt).exp()
}

/// `c / (1 + k*c*dt)`
#[inline]
#[must_use]
pub fn second_order(c: f64, k: f64, dt: f64) -> f64 {
    c / (1.0 + k * c * dt)
}

/// Positive root of `c'^2 + (km - c + k*dt)*c' - c*km = 0`, the backward
/// Euler step of `dc/dt = -k*c/(km+c)`. Returns `None` if the root is not
/// finite.
#[inline]
#[must_use]
pub fn michaelis_menten(c: f64, k: f64, dt: f64, km: f64) -> Option<f64> {
    let b = km - c + k * dt;
    let root = (b * b + 4.0 * c * km).sqrt();
    // Pick the cancellation-free form of the root for the sign of b.
    let next = if b > 0.0 {
        2.0 * c * km / (b + root)
    } else {
        (root - b) / 2.0
    };
    // The exact root lies in [0, c].
    next.is_finite().then_some(next.min(c).max(0.0))
}

/// Decays a single non-negative concentration. The flag is set when the
/// Michaelis-Menten step had to fall back to a first-order approximation.
#[inline]
fn decay_one(c: f64, k: f64, dt: f64, kinetics: DecayKinetics) -> (f64, bool) {
    let c = c.max(0.0);
    match kinetics {
        DecayKinetics::FirstOrder => (first_order(c, k, dt), false),
        DecayKinetics::SecondOrder => (second_order(c, k, dt), false),
        DecayKinetics::MichaelisMenten { km } => match michaelis_menten(c, k, dt, km) {
            Some(next) => (next, false),
            None => {
                let saturation = km + c;
                let next = if saturation > 0.0 {
                    first_order(c, k / saturation, dt)
                } else {
                    0.0
                };
                (next, true)
            }
        },
    }
}

/// Applies one decay step to every value in the grid.
pub fn apply(
    grid: &mut Grid,
    rate: f64,
    dt: f64,
    kinetics: DecayKinetics,
    substrate: &str,
) -> StepReport {
    let mut report = StepReport::default();
    if rate == 0.0 || dt == 0.0 {
        return report;
    }

    if let DecayKinetics::MichaelisMenten { km } = kinetics {
        if km > 0.0 && rate * dt > km {
            report.push(
                substrate,
                NumericalWarning::MichaelisMentenStiff {
                    rate_dt: rate * dt,
                    km,
                },
            );
        }
    }

    let fallback = grid
        .values_mut()
        .par_iter_mut()
        .map(|c| {
            let original = *c;
            let (next, fell_back) = decay_one(original, rate, dt, kinetics);
            *c = next;
            fell_back.then_some(original)
        })
        .reduce(|| None, |a, b| a.or(b));

    if let Some(concentration) = fallback {
        report.push(
            substrate,
            NumericalWarning::MichaelisMentenFallback { concentration },
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_first_order_half_life() {
        let k = std::f64::consts::LN_2 / 10.0;
        assert!((first_order(8.0, k, 10.0) - 4.0).abs() < EPS);
        assert!((first_order(8.0, k, 30.0) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_second_order_closed_form() {
        // 1/c' = 1/c + k*dt
        let next = second_order(2.0, 0.5, 3.0);
        assert!((1.0 / next - (0.5 + 1.5)).abs() < EPS);
    }

    #[test]
    fn test_zero_rate_is_identity() {
        for kinetics in [
            DecayKinetics::FirstOrder,
            DecayKinetics::SecondOrder,
            DecayKinetics::MichaelisMenten { km: 0.3 },
        ] {
            let (next, _) = decay_one(5.0, 0.0, 100.0, kinetics);
            assert!((next - 5.0).abs() < EPS, "{kinetics:?}");
        }
    }

    #[test]
    fn test_michaelis_menten_satisfies_implicit_equation() {
        let (c, k, dt, km) = (3.0, 0.7, 2.0, 1.5);
        let next = michaelis_menten(c, k, dt, km).unwrap();
        let residual = next - (c - k * dt * next / (km + next));
        assert!(residual.abs() < 1e-10);
        assert!(next > 0.0 && next < c);
    }

    #[test]
    fn test_michaelis_menten_zero_km_is_zero_order() {
        assert!((michaelis_menten(5.0, 1.0, 2.0, 0.0).unwrap() - 3.0).abs() < EPS);
        assert_eq!(michaelis_menten(1.0, 1.0, 2.0, 0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_michaelis_menten_never_negative_for_huge_steps() {
        let next = michaelis_menten(1e-3, 50.0, 1e6, 0.2).unwrap();
        assert!(next >= 0.0);
    }

    #[test]
    fn test_apply_reports_stiff_michaelis_menten() {
        let mut grid = Grid::lattice(&[4], 1.0).unwrap();
        grid.fill(2.0);
        let report = apply(
            &mut grid,
            1.0,
            10.0,
            DecayKinetics::MichaelisMenten { km: 0.5 },
            "glucose",
        );
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind(), "michaelis_menten_stiff");
        assert!(grid.values().iter().all(|&v| (0.0..2.0).contains(&v)));
    }

    #[test]
    fn test_apply_falls_back_when_root_overflows() {
        let c = 1e200;
        assert_eq!(michaelis_menten(c, 1.0, 1.0, c), None);

        let mut grid = Grid::scalar(1.0).unwrap();
        grid.fill(c);
        let report = apply(
            &mut grid,
            1.0,
            1.0,
            DecayKinetics::MichaelisMenten { km: c },
            "glucose",
        );
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind(), "michaelis_menten_fallback");
        let next = grid.values()[0];
        assert!(next.is_finite());
        assert!((0.0..=c).contains(&next));
    }

    #[test]
    fn test_apply_elementwise() {
        let mut grid = Grid::lattice(&[2, 2], 1.0).unwrap();
        grid.values_mut().copy_from_slice(&[0.0, 1.0, 2.0, 4.0]);
        let report = apply(&mut grid, 0.25, 2.0, DecayKinetics::FirstOrder, "o2");
        assert!(report.is_clean());
        let factor = (-0.5f64).exp();
        for (got, want) in grid.values().iter().zip([0.0, 1.0, 2.0, 4.0]) {
            assert!((got - want * factor).abs() < EPS);
        }
    }
}
