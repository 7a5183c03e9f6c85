use relief_policy::{
    config::ReliefConfig, feedback_reward, ActionPlanner, ActionTaken, DisasterReport,
    FeedbackOutcome, PriorityActionType, PriorityOptimizer, ScenarioReport,
};

#[test]
fn critical_earthquake_ranks_rescue_above_communication() {
    let report = ScenarioReport::new("critical", "earthquake", 25_000, 0);
    let ranked = PriorityOptimizer::default().optimize_actions(&report, 7);
    assert_eq!(ranked.len(), 4);

    let find = |kind| ranked.iter().find(|r| r.action_type == kind).unwrap();
    let rescue = find(PriorityActionType::Rescue);
    let communication = find(PriorityActionType::Communication);
    assert!(rescue.raw_score > communication.raw_score);
    assert!(rescue.priority_score >= communication.priority_score);
    assert_eq!(ranked.last().unwrap().action_type, PriorityActionType::Communication);
}

#[test]
fn configured_optimizer_ranks_with_its_own_table() {
    let config = ReliefConfig::from_toml_str(
        r#"
        [priority]
        default_resources = 3

        [priority.weights]
        rescue = [0.0, 0.0, 0.0, 0.0, 0.0]
        communication = [0.2, 0.2, 0.2, 0.2, 0.2]
        "#,
    )
    .unwrap();
    let configured = config.priority.optimizer().unwrap();
    let report = ScenarioReport::new("low", "flood", 500, 0);
    let ranked = configured.optimize(&report);
    assert_eq!(ranked.last().unwrap().action_type, PriorityActionType::Rescue);
    assert_eq!(ranked.last().unwrap().priority_score, 0.0);

    let stock = PriorityOptimizer::default().optimize(&report);
    assert_eq!(stock.last().unwrap().action_type, PriorityActionType::Communication);
}

#[test]
fn feedback_from_a_good_dispatch_raises_priority() {
    let mut optimizer = PriorityOptimizer::default();
    let report = ScenarioReport::new("medium", "fire", 4_000, 0);
    let before = optimizer.optimize_actions(&report, 4);
    let logistics = before
        .iter()
        .find(|r| r.action_type == PriorityActionType::Logistics)
        .unwrap()
        .clone();

    let reward = feedback_reward(
        &ActionTaken {
            estimated_impact: 2_400,
            resources_allocated: 4,
        },
        &FeedbackOutcome {
            people_helped: 2_400,
            completion_time_hours: 6.0,
            deadline_hours: 8.0,
            resources_used: 4,
        },
    );
    assert!(reward > 0.0);
    optimizer.update_from_feedback(&logistics.state_features, PriorityActionType::Logistics, reward);

    let after = optimizer.calculate_priority(&logistics.state_features, PriorityActionType::Logistics);
    assert!(after > logistics.priority_score);
}

#[test]
fn planner_and_optimizer_agree_on_action_set() {
    let planned = ActionPlanner::default().plan(
        &DisasterReport::new("Delta Flood", "high", "flood", 8_000),
        chrono::Utc::now(),
    );
    let mut planned_types: Vec<_> = planned.iter().map(|a| a.action_type).collect();
    planned_types.sort_by_key(|kind| kind.index());
    assert_eq!(planned_types, PriorityActionType::ALL);
}
