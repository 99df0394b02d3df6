use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use setwise::{
    clock::SystemClock,
    config::{Config, ConfigStore, FileConfigStore},
    engine::{CurrentSet, EndAction, SessionEngine, SetInput, SetOutcome},
    history::{export_csv, SessionSummary},
    identity::LocalIdentity,
    mirror::DirectoryMirror,
    model::{Target, WorkoutPlan},
    rest_timer::TickOutcome,
    runtime::{FixedTicker, RestEvent, Runner, StdinEventSource},
    storage::{open_store, StorageBackend, Store},
    util::{format_duration, format_mmss},
};
use std::{
    fs::File,
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type Engine = SessionEngine<Box<dyn Store>, SystemClock>;

/// track workout sessions set by set, with rest timers that survive restarts
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    /// directory holding plans, sessions and rest state
    #[clap(long, global = true)]
    data_dir: Option<PathBuf>,

    /// config file to read instead of the default location
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// storage backend to use
    #[clap(long, value_enum, global = true)]
    backend: Option<StorageBackend>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// manage workout plans
    Plan {
        #[clap(subcommand)]
        action: PlanCommand,
    },
    /// start a session for one day of a plan (by id, name or number)
    Start { plan: String, day: String },
    /// show the active session and the next set
    Status,
    /// complete the next set; empty values record the target
    Done {
        #[clap(short, long)]
        reps: Option<String>,
        /// seconds held, for timed exercises
        #[clap(short, long)]
        time: Option<String>,
    },
    /// skip the next set
    Skip,
    /// end the active session now
    End {
        /// mark the session abandoned instead of completed
        #[clap(long)]
        abandon: bool,
    },
    /// count down the running rest; Enter skips it
    Rest,
    /// list finished sessions, newest first
    History {
        /// also write the list to a CSV file
        #[clap(long)]
        csv: Option<PathBuf>,
    },
    /// retry mirroring of plans and completed sessions
    Sync,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum PlanCommand {
    /// add or replace plans from a JSON file (one plan or an array)
    Import { file: PathBuf },
    List,
    Show { plan: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanFile {
    Many(Vec<WorkoutPlan>),
    One(Box<WorkoutPlan>),
}

impl PlanFile {
    fn into_plans(self) -> Vec<WorkoutPlan> {
        match self {
            PlanFile::Many(plans) => plans,
            PlanFile::One(plan) => vec![*plan],
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let config = apply_overrides(config_store.load(), &cli);
    init_tracing(&config.log_filter);

    let mut engine = open_engine(&config)?;
    run(cli.command, &mut engine, &config)
}

fn apply_overrides(mut config: Config, cli: &Cli) -> Config {
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    config
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn open_engine(config: &Config) -> Result<Engine> {
    let data_dir = config.data_dir();
    let store = open_store(config.backend, &data_dir).with_context(|| {
        format!(
            "failed to open {} store in {}",
            config.backend,
            data_dir.display()
        )
    })?;

    let engine = SessionEngine::new(store, SystemClock);
    let identity = LocalIdentity::load_or_create(engine.repo(), config.account_id.clone());
    let mut engine = engine.with_identity(Box::new(identity));
    if let Some(dir) = &config.mirror_dir {
        engine = engine.with_mirror(Box::new(DirectoryMirror::new(dir)));
    }
    engine.mount().context("failed to restore rest timer")?;
    Ok(engine)
}

fn run(command: Command, engine: &mut Engine, config: &Config) -> Result<()> {
    match command {
        Command::Plan { action } => run_plan(action, engine),
        Command::Start { plan, day } => {
            let session = engine.start_session(&plan, &day)?;
            println!(
                "Started session {} ({} sets).",
                session.id,
                session.total_sets()
            );
            print_status(engine);
            Ok(())
        }
        Command::Status => {
            print_status(engine);
            Ok(())
        }
        Command::Done { reps, time } => {
            let outcome = engine.complete_set(SetInput {
                reps,
                time_seconds: time,
            })?;
            print_outcome(engine, &outcome, "Done");
            Ok(())
        }
        Command::Skip => {
            let outcome = engine.skip_set()?;
            print_outcome(engine, &outcome, "Skipped");
            Ok(())
        }
        Command::End { abandon } => {
            let action = if abandon {
                EndAction::Abandon
            } else {
                EndAction::Complete
            };
            let session = engine.end_active_session(action)?;
            println!("Session {} is {}.", session.id, session.status);
            if let Some(summary) = engine.history().into_iter().find(|s| s.id == session.id) {
                print_summary_line(&summary);
            }
            Ok(())
        }
        Command::Rest => run_rest(engine, config.tick_interval()),
        Command::History { csv } => {
            let summaries = engine.history();
            if summaries.is_empty() {
                println!("No finished sessions yet.");
            }
            for summary in &summaries {
                print_summary_line(summary);
            }
            if let Some(path) = csv {
                let file = File::create(&path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                export_csv(&summaries, file)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Wrote {} sessions to {}.", summaries.len(), path.display());
            }
            Ok(())
        }
        Command::Sync => {
            let report = engine.sync_pending();
            println!(
                "Mirrored {} sessions and {} plans ({} not sent).",
                report.sessions_sent, report.plans_sent, report.failed
            );
            Ok(())
        }
    }
}

fn run_plan(action: PlanCommand, engine: &mut Engine) -> Result<()> {
    match action {
        PlanCommand::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let plans = serde_json::from_str::<PlanFile>(&raw)
                .with_context(|| format!("{} is not a plan or a list of plans", file.display()))?
                .into_plans();
            let count = engine.import_plans(plans)?;
            println!("Imported {count} plans.");
        }
        PlanCommand::List => {
            let plans = engine.plans();
            if plans.is_empty() {
                println!("No plans. Import one with `setwise plan import <FILE>`.");
            }
            for (i, plan) in plans.iter().enumerate() {
                println!(
                    "{:>2}. {}  [{}]  {} days",
                    i + 1,
                    plan.name,
                    plan.id,
                    plan.days.len()
                );
            }
        }
        PlanCommand::Show { plan } => {
            let plan = engine
                .find_plan(&plan)
                .with_context(|| format!("no plan matches '{plan}'"))?;
            print_plan(&plan);
        }
    }
    Ok(())
}

fn print_plan(plan: &WorkoutPlan) {
    match &plan.gym_type {
        Some(gym) => println!("{} ({gym})", plan.name),
        None => println!("{}", plan.name),
    }
    for day in &plan.days {
        match day.weekday {
            Some(weekday) => println!("  Day {}: {} ({weekday})", day.order, day.name),
            None => println!("  Day {}: {}", day.order, day.name),
        }
        for block in &day.blocks {
            println!("    {} ({} min)", block.title, block.duration_minutes);
            for exercise in &block.exercises {
                println!(
                    "      {} - {} x {}, rest {}",
                    exercise.name,
                    exercise.sets,
                    describe_target(exercise.target()),
                    format_mmss(u64::from(exercise.rest_seconds))
                );
            }
        }
    }
}

fn describe_target(target: Target) -> String {
    match target {
        Target::Reps {
            min: Some(min),
            max: Some(max),
        } if min != max => format!("{min}-{max} reps"),
        Target::Reps {
            min: Some(n), ..
        }
        | Target::Reps {
            min: None,
            max: Some(n),
        } => format!("{n} reps"),
        Target::Time(secs) => format!("{secs}s"),
        Target::Reps {
            min: None,
            max: None,
        }
        | Target::Unspecified => "open".to_string(),
    }
}

fn describe_set_target(current: &CurrentSet) -> String {
    match (current.set.target_reps, current.set.target_time_seconds) {
        (Some(reps), _) => format!("{reps} reps"),
        (None, Some(secs)) => format!("{secs}s"),
        (None, None) => "no target".to_string(),
    }
}

fn local(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn print_status(engine: &Engine) {
    let Some(session) = engine.active_session() else {
        println!("No active session.");
        return;
    };
    let resolved = session.sets().filter(|s| s.is_resolved()).count();
    println!(
        "Session {} started {}: {}/{} sets done.",
        session.id,
        local(session.started_at),
        resolved,
        session.total_sets()
    );

    match engine.current_set() {
        Some(current) => {
            let ctx = &current.context;
            println!(
                "Next: {} ({}), set {} of {}, target {}.",
                ctx.exercise_name.as_deref().unwrap_or("(removed exercise)"),
                ctx.block_title.as_deref().unwrap_or("(removed block)"),
                current.set.set_number,
                ctx.sets_in_exercise,
                describe_set_target(&current)
            );
        }
        None => println!("All sets resolved. Finish with `setwise end`."),
    }

    let rest = engine.rest();
    if rest.resting {
        println!("Resting: {} left.", format_mmss(rest.remaining));
    }
}

fn print_outcome(engine: &Engine, outcome: &SetOutcome, verb: &str) {
    println!("{verb}: {}.", outcome.position);
    if outcome.completed {
        println!("Session complete!");
        if let Some(summary) = engine.last_completed_summary() {
            print_summary_line(&summary);
        }
        return;
    }
    if let Some(secs) = outcome.rest_seconds {
        println!(
            "Rest {} started. Run `setwise rest` to count it down.",
            format_mmss(u64::from(secs))
        );
    }
    print_status(engine);
}

fn print_summary_line(summary: &SessionSummary) {
    let duration = summary
        .duration_secs
        .map(|secs| format_duration(chrono::Duration::seconds(secs)))
        .unwrap_or_else(|| "--:--:--".to_string());
    println!(
        "{}  {:<9}  {} / {}  {}/{} sets  {} reps  {}",
        local(summary.started_at),
        summary.status,
        summary.plan_name.as_deref().unwrap_or("(removed plan)"),
        summary.day_name.as_deref().unwrap_or("(removed day)"),
        summary.completed_sets,
        summary.total_sets,
        summary.total_reps,
        duration
    );
}

fn run_rest(engine: &mut Engine, tick_interval: Duration) -> Result<()> {
    let rest = engine.rest();
    if !rest.resting {
        println!("Not resting.");
        return Ok(());
    }

    println!(
        "Resting {} (press Enter to skip).",
        format_mmss(rest.remaining)
    );
    let runner = Runner::new(StdinEventSource::new(), FixedTicker::new(tick_interval));
    let mut stdout = io::stdout();
    loop {
        match runner.step() {
            RestEvent::Tick => match engine.tick()? {
                TickOutcome::Running(left) => {
                    write!(stdout, "\r{}   ", format_mmss(left))?;
                    stdout.flush()?;
                }
                TickOutcome::Finished => {
                    writeln!(stdout, "\rRest over.")?;
                    break;
                }
                TickOutcome::Idle if !engine.rest().resting => break,
                TickOutcome::Idle => {}
            },
            RestEvent::Dismiss => {
                engine.dismiss_rest()?;
                writeln!(stdout, "\rRest skipped.")?;
                break;
            }
            RestEvent::Foreground => engine.on_foreground()?,
            RestEvent::Background => engine.on_background(),
        }
    }
    Ok(())
}
