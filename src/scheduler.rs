use std::time::Duration;

use chrono::{Datelike, Local, NaiveDateTime, NaiveTime, Weekday};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::app::App;
use crate::error::AppError;
use crate::notify::SendOutcome;

const TICK: Duration = Duration::from_secs(60);
const MAX_CATCH_UP_DAYS: i64 = 31;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub weekly_day: Weekday,
    pub weekly_time: NaiveTime,
    /// A day missing from the current month (e.g. 31 in April) never fires.
    pub monthly_day: u32,
    pub monthly_time: NaiveTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Job {
    WeeklyReport,
    MonthlyReview,
}

/// Jobs whose fire instant falls in `(previous, now]`, in firing order. Each
/// kind appears at most once; missed runs collapse into the latest.
pub fn due_jobs(previous: NaiveDateTime, now: NaiveDateTime, config: &ScheduleConfig) -> Vec<Job> {
    if now <= previous {
        return Vec::new();
    }
    let earliest = now.date() - chrono::Duration::days(MAX_CATCH_UP_DAYS);
    let mut day = previous.date().max(earliest);
    let mut due = Vec::new();
    while day <= now.date() {
        if day.weekday() == config.weekly_day {
            due.push((day.and_time(config.weekly_time), Job::WeeklyReport));
        }
        if day.day() == config.monthly_day {
            due.push((day.and_time(config.monthly_time), Job::MonthlyReview));
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    due.retain(|(instant, _)| previous < *instant && *instant <= now);
    due.sort_by_key(|(instant, job)| (*job as u8, std::cmp::Reverse(*instant)));
    due.dedup_by_key(|(_, job)| *job);
    due.sort_by_key(|(instant, _)| *instant);
    due.into_iter().map(|(_, job)| job).collect()
}

pub async fn run_job(app: &App, job: Job, now: NaiveDateTime) -> Vec<SendOutcome> {
    match job {
        Job::WeeklyReport => {
            info!("sending weekly report");
            vec![SendOutcome::settle(app.send_weekly_report(now.date()).await)]
        }
        Job::MonthlyReview => {
            info!("sending monthly report and backup");
            let report = SendOutcome::settle(app.send_monthly_report(now.date()).await);
            let backup = SendOutcome::settle(app.send_monthly_backup(now).await);
            vec![report, backup]
        }
    }
}

pub async fn run(app: &App, config: &ScheduleConfig, test_on_start: bool) -> Result<(), AppError> {
    info!(
        weekly_day = %config.weekly_day,
        weekly_time = %config.weekly_time,
        monthly_day = config.monthly_day,
        monthly_time = %config.monthly_time,
        "scheduler started"
    );
    if test_on_start {
        log_outcomes(
            Job::WeeklyReport,
            &run_job(app, Job::WeeklyReport, Local::now().naive_local()).await,
        );
    }

    let mut interval = tokio::time::interval(TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut previous = Local::now().naive_local();
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Local::now().naive_local();
                for job in due_jobs(previous, now, config) {
                    log_outcomes(job, &run_job(app, job, now).await);
                }
                previous = now;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("scheduler stopped");
                return Ok(());
            }
        }
    }
}

fn log_outcomes(job: Job, outcomes: &[SendOutcome]) {
    for outcome in outcomes {
        if outcome.success {
            info!(?job, message = %outcome.message, "job finished");
        } else {
            warn!(?job, message = %outcome.message, "job did not deliver");
        }
    }
}
