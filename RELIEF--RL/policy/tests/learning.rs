use rand::{rngs::SmallRng, SeedableRng};
use relief_policy::{
    reward::{MAX_REWARD, MIN_REWARD},
    DisasterState, DisasterType, FixedScenario, Hyperparameters, Outcome, PolicyAgent,
    RewardModel, ScenarioSource, Severity, SharedPolicyAgent,
};
use tempfile::tempdir;

fn scenario() -> FixedScenario {
    FixedScenario::new(
        DisasterState::new(Severity::Critical, 6, 4.0, 12, DisasterType::Earthquake),
        Outcome {
            response_time_hours: 3.5,
            people_helped: 1_900,
            resources_used: 12,
        },
    )
}

fn train(agent: &SharedPolicyAgent, source: &mut FixedScenario, episodes: usize, seed: u64) {
    let mut rng = SmallRng::seed_from_u64(seed);
    for _ in 0..episodes {
        let state = source.generate_state();
        agent.cycle(&state, true, None, &mut rng, |action| {
            let outcome = source.simulate_outcome(&state, action);
            RewardModel::reward(&state, action, &outcome)
        });
    }
}

#[test]
fn terminal_training_records_every_episode() {
    let mut rng = SmallRng::seed_from_u64(1);
    let agent = SharedPolicyAgent::new(PolicyAgent::with_random_weights(
        Hyperparameters::default(),
        &mut rng,
    ));
    let mut source = scenario();
    train(&agent, &mut source, 250, 2);

    let snapshot = agent.snapshot();
    assert_eq!(snapshot.training_episodes(), 250);
    for step in snapshot.history() {
        assert_eq!(step.td_target, step.reward);
        assert!((MIN_REWARD..=MAX_REWARD).contains(&step.reward));
        assert!(step.state.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}

#[test]
fn identical_seeds_train_identical_policies() {
    let build = || {
        let mut rng = SmallRng::seed_from_u64(10);
        SharedPolicyAgent::new(PolicyAgent::with_random_weights(
            Hyperparameters::default(),
            &mut rng,
        ))
    };
    let (a, b) = (build(), build());
    train(&a, &mut scenario(), 120, 33);
    train(&b, &mut scenario(), 120, 33);
    assert_eq!(a.snapshot().value_function(), b.snapshot().value_function());
}

#[test]
fn persisted_policy_selects_like_the_trained_one() {
    let mut rng = SmallRng::seed_from_u64(4);
    let agent = SharedPolicyAgent::new(PolicyAgent::with_random_weights(
        Hyperparameters::default(),
        &mut rng,
    ));
    train(&agent, &mut scenario(), 80, 5);
    let trained = agent.snapshot();

    let dir = tempdir().unwrap();
    let path = dir.path().join("learned_policy.json");
    trained.save_policy(&path).unwrap();

    let mut restored = PolicyAgent::with_random_weights(
        Hyperparameters::default(),
        &mut SmallRng::seed_from_u64(999),
    );
    restored.load_policy(&path).unwrap();

    let state = scenario().generate_state();
    let before = trained.greedy(&state, &mut SmallRng::seed_from_u64(7));
    let reloaded = restored.greedy(&state, &mut SmallRng::seed_from_u64(7));
    assert_eq!(before.action, reloaded.action);
    assert_eq!(before.category, reloaded.category);
}
