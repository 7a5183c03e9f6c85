use std::{path::PathBuf, sync::Arc};

use anyhow::{ensure, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use relief_policy::{
    ActionPlanner, DisasterReport, PolicyTelemetry, ReliefConfig, ScenarioReport,
};
use relief_simulation::{
    trainer::{trailing_mean, Episode},
    TrainingEngine,
};
use serde_json::json;
use shared_event_bus::{EventKind, FileEventPublisher};
use shared_logging::{JsonLogger, LogLevel};

const DEFAULT_POLICY_PATH: &str = "RELIEF--RL/policies/learned_policy.json";

#[derive(Parser, Debug)]
#[command(name = "relief", version, about = "Disaster-response policy training and ranking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Trains a policy on simulated disasters and demonstrates it.
    Train(TrainArgs),
    /// Runs a saved policy greedily on simulated disasters.
    Demo(DemoArgs),
    /// Ranks response action types for a scenario.
    Rank(RankArgs),
    /// Generates a rule-based action plan for a disaster report.
    Plan(PlanArgs),
}

#[derive(Args, Debug)]
struct Telemetry {
    /// JSON-lines log file.
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// JSON-lines event file.
    #[arg(long)]
    event_log: Option<PathBuf>,
    /// Include debug records in the log file.
    #[arg(long)]
    verbose: bool,
}

impl Telemetry {
    fn build(&self, component: &str) -> Result<Option<PolicyTelemetry>> {
        if self.log_file.is_none() && self.event_log.is_none() {
            return Ok(None);
        }
        let mut builder = PolicyTelemetry::builder(component);
        if let Some(path) = &self.log_file {
            builder = builder.log_path(path);
        }
        if let Some(path) = &self.event_log {
            builder = builder.event_publisher(Arc::new(FileEventPublisher::new(path)?));
        }
        if self.verbose {
            builder = builder.min_level(LogLevel::Debug);
        }
        builder.build().map(Some)
    }
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides `training.episodes`.
    #[arg(long)]
    episodes: Option<usize>,
    /// Overrides `training.seed`.
    #[arg(long)]
    seed: Option<u64>,
    /// Where to save the trained policy; overrides `training.policy_path`.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Publish an event per episode as well as progress events.
    #[arg(long)]
    episode_events: bool,
    #[command(flatten)]
    telemetry: Telemetry,
}

#[derive(Args, Debug)]
struct DemoArgs {
    /// Saved policy.
    #[arg(long, default_value = DEFAULT_POLICY_PATH)]
    policy: PathBuf,
    /// Scenarios to run.
    #[arg(long, default_value_t = 5)]
    count: usize,
    /// Simulator seed.
    #[arg(long)]
    seed: Option<u64>,
    #[command(flatten)]
    telemetry: Telemetry,
}

#[derive(Args, Debug)]
struct RankArgs {
    /// `low`, `medium`, `high`, or `critical`.
    #[arg(long, default_value = "medium")]
    severity: String,
    /// Disaster type label.
    #[arg(long = "type", default_value = "earthquake")]
    disaster_type: String,
    /// People affected.
    #[arg(long, default_value_t = 1_000)]
    population: u64,
    /// Resource units on hand; defaults to `priority.default_resources`.
    #[arg(long)]
    resources: Option<u32>,
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(flatten)]
    telemetry: Telemetry,
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Disaster title used in descriptions.
    #[arg(long)]
    title: String,
    /// Severity label.
    #[arg(long, default_value = "medium")]
    severity: String,
    /// Disaster type label.
    #[arg(long = "type", default_value = "earthquake")]
    disaster_type: String,
    /// People affected.
    #[arg(long, default_value_t = 1_000)]
    population: u64,
    /// Upstream disaster identifier.
    #[arg(long)]
    id: Option<String>,
    /// Append the decision to this JSON-lines file.
    #[arg(long)]
    decision_log: Option<PathBuf>,
    #[command(flatten)]
    telemetry: Telemetry,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Train(args) => handle_train(args),
        Commands::Demo(args) => handle_demo(args),
        Commands::Rank(args) => handle_rank(args),
        Commands::Plan(args) => handle_plan(args),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ReliefConfig> {
    path.map_or_else(
        || Ok(ReliefConfig::default()),
        |path| ReliefConfig::load(path).with_context(|| format!("loading {}", path.display())),
    )
}

fn handle_train(args: TrainArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(output) = args.output {
        config.training.policy_path = Some(output);
    }
    if config.training.policy_path.is_none() {
        config.training.policy_path = Some(PathBuf::from(DEFAULT_POLICY_PATH));
    }
    let mut builder = TrainingEngine::builder()
        .config(config)
        .episode_events(args.episode_events);
    if let Some(episodes) = args.episodes {
        builder = builder.episodes(episodes);
    }
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    if let Some(telemetry) = args.telemetry.build("trainer")? {
        builder = builder.telemetry(telemetry);
    }
    let mut engine = builder.build()?;

    let report = engine.train()?;
    let training = &engine.config().training;
    for through in (training.log_every..=report.episodes).step_by(training.log_every) {
        println!(
            "Episode {through}/{} | Avg Reward (last {}): {:.2}",
            report.episodes,
            training.reward_window,
            trailing_mean(&report.episode_rewards[..through], training.reward_window)
        );
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "run_id": report.run_id,
            "seed": engine.seed(),
            "episodes": report.episodes,
            "final_average_reward": report.final_average_reward,
            "policy_path": training.policy_path,
            "started_at": report.started_at,
            "finished_at": report.finished_at,
        }))?
    );
    print_episodes(&engine.demonstrate());
    Ok(())
}

fn handle_demo(args: DemoArgs) -> Result<()> {
    ensure!(args.policy.exists(), "policy file {} not found", args.policy.display());
    let mut config = ReliefConfig::default();
    config.training.demonstrations = args.count;
    let mut builder = TrainingEngine::builder().config(config).episodes(0);
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    if let Some(telemetry) = args.telemetry.build("demo")? {
        builder = builder.telemetry(telemetry);
    }
    let mut engine = builder.build()?;
    engine.load_policy(&args.policy)?;
    print_episodes(&engine.demonstrate());
    Ok(())
}

fn handle_rank(args: RankArgs) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let optimizer = config.priority.optimizer()?;
    let report = ScenarioReport::new(
        args.severity,
        args.disaster_type,
        args.population,
        0,
    );
    let resources = args.resources.unwrap_or(config.priority.default_resources);
    let ranked = optimizer.optimize_actions(&report, resources);
    let output = json!({
        "scenario": report,
        "available_resources": resources,
        "ranked_actions": ranked,
    });
    if let Some(telemetry) = args.telemetry.build("priority")? {
        telemetry.log(LogLevel::Info, EventKind::ActionsRanked.label(), &output)?;
        telemetry.event(EventKind::ActionsRanked, output.clone())?;
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn handle_plan(args: PlanArgs) -> Result<()> {
    let mut report = DisasterReport::new(
        args.title,
        args.severity,
        args.disaster_type,
        args.population,
    );
    report.id = args.id;
    let planner = ActionPlanner::default();
    let (actions, record) = match &args.decision_log {
        Some(path) => {
            let log = JsonLogger::new(path)?;
            let (actions, record) = planner.plan_and_record(&report, &log)?;
            (actions, Some(record))
        }
        None => (planner.plan(&report, Utc::now()), None),
    };
    let output = json!({
        "report": report,
        "actions": actions,
        "decision": record,
    });
    if let Some(telemetry) = args.telemetry.build("planner")? {
        telemetry.log(LogLevel::Info, EventKind::PlanGenerated.label(), &output)?;
        telemetry.event(EventKind::PlanGenerated, output.clone())?;
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_episodes(episodes: &[Episode]) {
    for (idx, episode) in episodes.iter().enumerate() {
        println!("--- Scenario {} ---", idx + 1);
        println!("State: {}", episode.state);
        println!("Action ({}): {}", episode.category, episode.action);
        println!(
            "Outcome: response {:.2}h, {} helped, {} used",
            episode.outcome.response_time_hours,
            episode.outcome.people_helped,
            episode.outcome.resources_used
        );
        println!("Reward: {:.2}", episode.reward);
    }
}
