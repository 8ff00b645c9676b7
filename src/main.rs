mod app;
mod cli;
mod config;
mod entities;
mod error;
mod mirror;
mod model;
mod notify;
mod report;
mod scheduler;
mod store;
mod util;

use chrono::{Local, NaiveDateTime};
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::app::{App, GoalSummary};
use crate::cli::{
    ActivityAdd, ActivityCommand, ActivityUpdate, BackupCommand, Cli, Command, GoalAdd,
    GoalCommand, GoalStatusArg, GoalUpdate, NotifyCommand,
};
use crate::config::Config;
use crate::error::AppError;
use crate::mirror::Mirror;
use crate::model::{ActivityChanges, ActivityInput, GoalChanges, GoalInput, GoalStatus};
use crate::notify::{Notifier, SendOutcome};
use crate::store::{RestoreOutcome, Store};
use crate::util::{format_backup_info, format_dashboard, format_goal_detail, format_progress};

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout carries command output only.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> Result<(), AppError> {
    let Cli {
        data_file,
        mirror_uri,
        command,
    } = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(path) = data_file {
        config.data_file = path;
    }
    if let Some(uri) = mirror_uri {
        config.mirror_uri = Some(uri);
    }

    let mirror = connect_mirror(&config).await;
    let store = Store::new(config.data_file.clone(), mirror);
    let notifier = Notifier::new(config.telegram.clone(), config.http_timeout)?;
    debug!(
        data_file = %store.data_file().display(),
        mirror = store.mirror_enabled(),
        "store ready"
    );
    let app = App::new(store, notifier);

    match command {
        Command::Schedule => scheduler::run(&app, &config.schedule, config.test_on_start).await,
        command if is_mutating(&command) => {
            let mut lock = app.store().open_lock()?;
            let _guard = lock.write()?;
            dispatch(&app, command).await
        }
        command => dispatch(&app, command).await,
    }
}

/// A mirror that cannot be reached leaves the process in primary-only mode.
async fn connect_mirror(config: &Config) -> Option<Mirror> {
    let uri = config.mirror_uri.as_deref()?;
    match Mirror::connect(uri, config.mirror_connect_timeout).await {
        Ok(mirror) => Some(mirror),
        Err(err) => {
            warn!(%err, "mirror unavailable, continuing with primary store only");
            None
        }
    }
}

fn is_mutating(command: &Command) -> bool {
    matches!(
        command,
        Command::Goal(GoalCommand::Add(_) | GoalCommand::Update(_) | GoalCommand::Remove(_))
            | Command::Activity(_)
            | Command::Backup(BackupCommand::Import(_) | BackupCommand::Restore)
    )
}

async fn dispatch(app: &App, command: Command) -> Result<(), AppError> {
    let now = local_now();
    match command {
        Command::Goal(command) => handle_goal(app, command, now).await,
        Command::Activity(command) => handle_activity(app, command, now).await,
        Command::Dashboard(args) => {
            let dashboard = app.dashboard(now.date(), args.page, args.per_page)?;
            println!("{}", format_dashboard(&dashboard));
            Ok(())
        }
        Command::Progress => {
            println!("{}", format_progress(&app.progress(now.date())?));
            Ok(())
        }
        Command::Reports => {
            println!("{}", format_progress(&app.reports(now.date())?));
            Ok(())
        }
        Command::Notify(command) => handle_notify(app, command, now).await,
        Command::Backup(command) => handle_backup(app, command).await,
        Command::Schedule => Err(AppError::InvalidInput(
            "schedule is handled before dispatch".to_string(),
        )),
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

async fn handle_goal(app: &App, command: GoalCommand, now: NaiveDateTime) -> Result<(), AppError> {
    match command {
        GoalCommand::Add(args) => handle_goal_add(app, args, now).await,
        GoalCommand::List => {
            let goals = app.list_goals()?;
            if goals.is_empty() {
                println!("No goals found.");
            } else {
                print_goal_list(&goals);
            }
            Ok(())
        }
        GoalCommand::Show(args) => {
            println!("{}", format_goal_detail(&app.goal_detail(args.id)?));
            Ok(())
        }
        GoalCommand::Update(args) => handle_goal_update(app, args).await,
        GoalCommand::Remove(args) => {
            let (goal, removed) = app.remove_goal(args.id).await?;
            println!(
                "Goal ID: {} removed along with {} activities.",
                goal.id, removed
            );
            Ok(())
        }
    }
}

async fn handle_goal_add(app: &App, args: GoalAdd, now: NaiveDateTime) -> Result<(), AppError> {
    require_non_empty("goal title", &args.title)?;
    let goal = app
        .add_goal(
            GoalInput {
                title: args.title,
                description: args.description,
                target_date: args.target_date,
            },
            now,
        )
        .await?;
    println!("Created goal ID: {}", goal.id);
    Ok(())
}

async fn handle_goal_update(app: &App, args: GoalUpdate) -> Result<(), AppError> {
    if let Some(title) = &args.title {
        require_non_empty("goal title", title)?;
    }
    let goal = app
        .update_goal(
            args.id,
            GoalChanges {
                title: args.title,
                description: args.description,
                target_date: args.target_date,
                status: args.status.map(goal_status_from_arg),
            },
        )
        .await?;
    println!("Updated goal {}.", goal.id);
    Ok(())
}

async fn handle_activity(
    app: &App,
    command: ActivityCommand,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    match command {
        ActivityCommand::Add(args) => handle_activity_add(app, args, now).await,
        ActivityCommand::Update(args) => handle_activity_update(app, args).await,
        ActivityCommand::Remove(args) => {
            let activity = app.remove_activity(args.id).await?;
            println!("Activity ID: {} removed.", activity.id);
            Ok(())
        }
    }
}

async fn handle_activity_add(
    app: &App,
    args: ActivityAdd,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    require_non_empty("activity title", &args.title)?;
    let activity = app
        .add_activity(
            args.goal_id,
            ActivityInput {
                title: args.title,
                note: args.note,
            },
            now,
        )
        .await?;
    println!(
        "Logged activity ID: {} for goal ID: {}",
        activity.id, activity.goal_id
    );
    Ok(())
}

async fn handle_activity_update(app: &App, args: ActivityUpdate) -> Result<(), AppError> {
    if let Some(title) = &args.title {
        require_non_empty("activity title", title)?;
    }
    let activity = app
        .update_activity(
            args.id,
            ActivityChanges {
                title: args.title,
                note: args.note,
            },
        )
        .await?;
    println!("Updated activity {}.", activity.id);
    Ok(())
}

/// Every notify command prints a JSON outcome, including failures.
async fn handle_notify(
    app: &App,
    command: NotifyCommand,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    let outcome = match command {
        NotifyCommand::Weekly => SendOutcome::settle(app.send_weekly_report(now.date()).await),
        NotifyCommand::Monthly => SendOutcome::settle(app.send_monthly_report(now.date()).await),
        NotifyCommand::Backup => SendOutcome::settle(app.send_monthly_backup(now).await),
        NotifyCommand::ManualBackup => SendOutcome::settle(app.send_manual_backup(now).await),
        NotifyCommand::Test => app.send_test_message().await,
    };
    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}

async fn handle_backup(app: &App, command: BackupCommand) -> Result<(), AppError> {
    match command {
        BackupCommand::Export(args) => {
            let path = app.export_snapshot(args.output.as_deref())?;
            println!("Exported to {}", path.display());
        }
        BackupCommand::Import(args) => {
            if !app.import_snapshot(&args.path).await {
                return Err(AppError::Storage(format!(
                    "could not import {}",
                    args.path.display()
                )));
            }
            println!("Imported {}", args.path.display());
        }
        BackupCommand::Restore => match app.restore_from_mirror().await? {
            RestoreOutcome::Restored(doc) => println!(
                "Restored {} goals and {} activities from mirror.",
                doc.goals.len(),
                doc.activities.len()
            ),
            RestoreOutcome::NoBackup => {
                return Err(AppError::NotFound("no mirrored backup".to_string()))
            }
            RestoreOutcome::Unavailable => {
                return Err(AppError::Storage(
                    "mirror is not configured or unreachable".to_string(),
                ))
            }
            RestoreOutcome::Failed(message) => return Err(AppError::Storage(message)),
        },
        BackupCommand::Info => println!("{}", format_backup_info(&app.backup_info().await)),
        BackupCommand::Download(args) => {
            let path = app.copy_primary(&args.dest)?;
            println!("Saved {}", path.display());
        }
    }
    Ok(())
}

fn goal_status_from_arg(status: GoalStatusArg) -> GoalStatus {
    match status {
        GoalStatusArg::Active => GoalStatus::Active,
        GoalStatusArg::Paused => GoalStatus::Paused,
        GoalStatusArg::Completed => GoalStatus::Completed,
    }
}

fn require_non_empty(label: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{label} cannot be empty")));
    }
    Ok(())
}

fn print_goal_list(goals: &[GoalSummary]) {
    println!(
        "{:<4} {:<10} {:<11} {:<5} {}",
        "ID", "STATUS", "TARGET", "ACTS", "TITLE"
    );
    for summary in goals {
        let goal = &summary.goal;
        println!(
            "{:<4} {:<10} {:<11} {:<5} {}",
            goal.id,
            goal.status.as_str(),
            goal.target_date.to_string(),
            summary.activity_count,
            goal.title
        );
    }
}
