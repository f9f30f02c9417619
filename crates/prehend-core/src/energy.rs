//! Energy descent: one step of V0 energy and satisfaction per occasion per cycle.
//!
//! ```text
//! ΔE = E(n-1) - E(n-2)          (0 on the first cycle)
//! A  = 1 - stddev(coherences)   (organ agreement)
//! R  = mean(coherences)         (resonance)
//! I  = max(coherences)          (intensity)
//! E  = α(1-S) + βΔE + γ(1-A) + δ(1-R) + ζI, clamped to [0, 1]
//! S  = 1 - E(1-R)
//! ```
//!
//! Neither quantity is monotone per step; only the loop's stopping rule has
//! to be deterministic.

use crate::config::EnergyCoefficients;
use crate::occasion::Occasion;
use crate::stats::{max, mean, population_stddev};

/// Summary of the coherence vector for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrganSignal {
    pub agreement: f64,
    pub resonance: f64,
    pub intensity: f64,
}

impl OrganSignal {
    pub fn from_coherences(coherences: &[f64]) -> Self {
        Self {
            agreement: 1.0 - population_stddev(coherences),
            resonance: mean(coherences),
            intensity: max(coherences),
        }
    }
}

/// Pure energy step. Returns `(v0_energy, satisfaction)`.
pub fn next_energy(
    coeffs: &EnergyCoefficients,
    signal: &OrganSignal,
    satisfaction: f64,
    delta_e: f64,
) -> (f64, f64) {
    let raw = coeffs.alpha * (1.0 - satisfaction)
        + coeffs.beta * delta_e
        + coeffs.gamma * (1.0 - signal.agreement)
        + coeffs.delta * (1.0 - signal.resonance)
        + coeffs.zeta * signal.intensity;
    let energy = raw.clamp(0.0, 1.0);
    let satisfaction = (1.0 - energy * (1.0 - signal.resonance)).clamp(0.0, 1.0);
    assert!(
        (0.0..=1.0).contains(&energy) && (0.0..=1.0).contains(&satisfaction),
        "energy state left [0, 1]: energy={energy}, satisfaction={satisfaction}"
    );
    (energy, satisfaction)
}

/// Advance one occasion by one cycle.
pub fn descend(occasion: &mut Occasion, signal: &OrganSignal, coeffs: &EnergyCoefficients) {
    let delta_e = match occasion.previous_v0_energy {
        Some(prev) => occasion.v0_energy - prev,
        None => 0.0,
    };
    let (energy, satisfaction) = next_energy(coeffs, signal, occasion.satisfaction, delta_e);

    occasion.previous_v0_energy = Some(occasion.v0_energy);
    occasion.previous_satisfaction = occasion.satisfaction;
    occasion.v0_energy = energy;
    occasion.satisfaction = satisfaction;
    occasion.cycle += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn occ() -> Occasion {
        Occasion::new("t".to_string(), 0, Vec::new())
    }

    #[test]
    fn test_signal_single_organ_full_agreement() {
        let s = OrganSignal::from_coherences(&[0.8]);
        assert_eq!(s.agreement, 1.0);
        assert_eq!(s.resonance, 0.8);
        assert_eq!(s.intensity, 0.8);
    }

    #[test]
    fn test_signal_no_organs() {
        let s = OrganSignal::from_coherences(&[]);
        assert_eq!(s.agreement, 1.0);
        assert_eq!(s.resonance, 0.0);
        assert_eq!(s.intensity, 0.0);
    }

    #[test]
    fn test_first_cycle_zero_coherence() {
        let mut o = occ();
        descend(&mut o, &OrganSignal::from_coherences(&[0.0, 0.0]), &EnergyCoefficients::default());
        // 0.40·1 + 0 + 0 + 0.10·1 + 0
        assert_relative_eq!(o.v0_energy, 0.5, epsilon = 1e-12);
        assert_relative_eq!(o.satisfaction, 0.5, epsilon = 1e-12);
        assert_eq!(o.cycle, 1);
        assert_eq!(o.previous_v0_energy, Some(1.0));
        assert_eq!(o.previous_satisfaction, 0.0);
    }

    #[test]
    fn test_momentum_uses_previous_step() {
        let coeffs = EnergyCoefficients::default();
        let signal = OrganSignal::from_coherences(&[0.0]);
        let mut o = occ();
        descend(&mut o, &signal, &coeffs);
        descend(&mut o, &signal, &coeffs);
        // ΔE = 0.5 - 1.0; E = 0.4·0.5 - 0.125 + 0.1
        assert_relative_eq!(o.v0_energy, 0.175, epsilon = 1e-12);
        assert_relative_eq!(o.satisfaction, 0.825, epsilon = 1e-12);
    }

    #[test]
    fn test_negative_raw_energy_clamps_to_zero() {
        let coeffs = EnergyCoefficients {
            alpha: 0.0,
            beta: 1.0,
            gamma: 0.0,
            delta: 0.0,
            zeta: 0.0,
        };
        let (e, s) = next_energy(&coeffs, &OrganSignal::from_coherences(&[0.5]), 0.0, -0.9);
        assert_eq!(e, 0.0);
        assert_eq!(s, 1.0);
    }

    proptest! {
        #[test]
        fn prop_energy_and_satisfaction_stay_in_unit_range(
            coherences in proptest::collection::vec(0.0f64..=1.0, 0..6),
            cycles in 1usize..12,
        ) {
            let coeffs = EnergyCoefficients::default();
            let signal = OrganSignal::from_coherences(&coherences);
            let mut o = occ();
            for _ in 0..cycles {
                descend(&mut o, &signal, &coeffs);
                prop_assert!((0.0..=1.0).contains(&o.v0_energy));
                prop_assert!((0.0..=1.0).contains(&o.satisfaction));
            }
        }
    }
}
