use rand::{rngs::SmallRng, Rng};
use relief_policy::{
    helper::{random_seed, seeded_rng},
    DisasterAction, DisasterState, DisasterType, Outcome, ScenarioSource, Severity,
};

/// Disaster types drawn by the simulator.
pub const SIMULATED_TYPES: [DisasterType; 4] = [
    DisasterType::Earthquake,
    DisasterType::Flood,
    DisasterType::Fire,
    DisasterType::Hurricane,
];

const MAX_DELAY_HOURS: f64 = 12.0;
const MIN_RESPONSE_HOURS: f64 = 0.5;
const SPEEDUP_PER_UNIT: f64 = 10.0;
const PEOPLE_PER_SEVERITY: f64 = 250.0;
const FULL_DEPLOYMENT: f64 = 15.0;

/// Synthetic scenario generator with a seeded RNG.
#[derive(Debug, Clone)]
pub struct DisasterSimulator {
    seed: u64,
    rng: SmallRng,
}

impl DisasterSimulator {
    /// Creates a simulator with a fixed seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: seeded_rng(seed),
        }
    }

    /// Seed the simulator was created with.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Draws `count` states.
    pub fn generate(&mut self, count: usize) -> Vec<DisasterState> {
        (0..count).map(|_| self.generate_state()).collect()
    }
}

impl Default for DisasterSimulator {
    fn default() -> Self {
        Self::new(random_seed())
    }
}

impl ScenarioSource for DisasterSimulator {
    /// Severity `0..=3`, alerts `1..=10`, delay in `[0, 12)` hours, resources `5..=20`,
    /// and one of [`SIMULATED_TYPES`].
    fn generate_state(&mut self) -> DisasterState {
        let severity = Severity::ALL[self.rng.gen_range(0..Severity::ALL.len())];
        let num_alerts = self.rng.gen_range(1..=10);
        let delay = self.rng.gen_range(0.0..MAX_DELAY_HOURS);
        let resources = self.rng.gen_range(5..=20);
        let disaster_type = SIMULATED_TYPES[self.rng.gen_range(0..SIMULATED_TYPES.len())];
        DisasterState::new(severity, num_alerts, delay, resources, disaster_type)
    }

    /// More resources shorten the response and reach more people.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn simulate_outcome(&mut self, state: &DisasterState, action: &DisasterAction) -> Outcome {
        let total = f64::from(action.total_resources());
        let response_time_hours =
            (state.response_delay_hours() - total / SPEEDUP_PER_UNIT).max(MIN_RESPONSE_HOURS);
        let severity_factor = f64::from(state.severity().ordinal() + 1) * PEOPLE_PER_SEVERITY;
        let action_factor = total / FULL_DEPLOYMENT;
        let noise = self.rng.gen_range(0.7..1.3);
        Outcome {
            response_time_hours,
            people_helped: (severity_factor * action_factor * noise) as u64,
            resources_used: action.total_resources(),
        }
    }
}
