use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "goaltrack",
    version,
    about = "Track yearly goals and the activities logged against them"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Primary data file (overrides GOALTRACK_DATA_FILE)"
    )]
    pub data_file: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "URI",
        help = "Mirror backup database; a plain path means a SQLite file (overrides GOALTRACK_MIRROR_URI)"
    )]
    pub mirror_uri: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(subcommand)]
    Goal(GoalCommand),
    #[command(subcommand)]
    Activity(ActivityCommand),
    Dashboard(DashboardArgs),
    Progress,
    Reports,
    #[command(subcommand)]
    Notify(NotifyCommand),
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Run the weekly and monthly jobs until interrupted.
    Schedule,
}

#[derive(Subcommand, Debug)]
pub enum GoalCommand {
    Add(GoalAdd),
    List,
    Show(GoalShow),
    Update(GoalUpdate),
    Remove(GoalRemove),
}

#[derive(Subcommand, Debug)]
pub enum ActivityCommand {
    Add(ActivityAdd),
    Update(ActivityUpdate),
    Remove(ActivityRemove),
}

#[derive(Subcommand, Debug)]
pub enum NotifyCommand {
    Weekly,
    Monthly,
    /// Send the monthly backup file now.
    Backup,
    #[command(name = "manual-backup")]
    ManualBackup,
    Test,
}

#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    Export(BackupExport),
    Import(BackupImport),
    /// Replace the primary data with the mirror copy.
    Restore,
    Info,
    /// Copy the raw primary file under a timestamped name.
    Download(BackupDownload),
}

#[derive(Args, Debug)]
pub struct GoalAdd {
    pub title: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub target_date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct GoalShow {
    pub id: i64,
}

#[derive(Args, Debug)]
pub struct GoalUpdate {
    pub id: i64,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub target_date: Option<NaiveDate>,
    #[arg(long, value_enum)]
    pub status: Option<GoalStatusArg>,
}

#[derive(Args, Debug)]
pub struct GoalRemove {
    pub id: i64,
}

#[derive(Args, Debug)]
pub struct ActivityAdd {
    pub goal_id: i64,
    pub title: String,
    #[arg(long, default_value = "")]
    pub note: String,
}

#[derive(Args, Debug)]
pub struct ActivityUpdate {
    pub id: i64,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Args, Debug)]
pub struct ActivityRemove {
    pub id: i64,
}

#[derive(Args, Debug)]
pub struct DashboardArgs {
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    #[arg(long, default_value_t = 10)]
    pub per_page: usize,
}

#[derive(Args, Debug)]
pub struct BackupExport {
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct BackupImport {
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct BackupDownload {
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub dest: PathBuf,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum GoalStatusArg {
    Active,
    Paused,
    Completed,
}
