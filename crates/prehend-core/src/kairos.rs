use crate::config::KairosConfig;
use crate::occasion::Occasion;

/// The four Kairos conditions evaluated against one occasion's last step.
pub struct KairosDetector<'a> {
    config: &'a KairosConfig,
}

impl<'a> KairosDetector<'a> {
    pub fn new(config: &'a KairosConfig) -> Self {
        Self { config }
    }

    /// Pure check over a single energy transition.
    pub fn is_ripe(
        &self,
        previous_energy: f64,
        energy: f64,
        previous_satisfaction: f64,
        satisfaction: f64,
    ) -> bool {
        self.config.in_window(energy)
            && satisfaction > previous_satisfaction
            && (energy - previous_energy).abs() < self.config.stability_epsilon
            && satisfaction > self.config.coherence_floor
    }

    /// Check the occasion's latest step and latch the flag. Returns true only
    /// on the cycle Kairos is first detected.
    pub fn observe(&self, occasion: &mut Occasion) -> bool {
        if occasion.kairos_detected {
            return false;
        }
        let Some(previous_energy) = occasion.previous_v0_energy else {
            return false;
        };
        if self.is_ripe(
            previous_energy,
            occasion.v0_energy,
            occasion.previous_satisfaction,
            occasion.satisfaction,
        ) {
            occasion.kairos_detected = true;
            occasion.kairos_cycle = Some(occasion.cycle);
            return true;
        }
        false
    }
}
