use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::AppError;
use crate::model::{
    Activity, ActivityChanges, ActivityInput, Document, Goal, GoalChanges, GoalInput,
};
use crate::notify::{Notifier, SendOutcome};
use crate::report::{self, DashboardStats, Page, ProgressView};
use crate::store::{file_timestamp, BackupInfo, RestoreOutcome, Store};
use crate::util::{
    format_backup_caption, format_monthly_message, format_weekly_message, BackupKind,
    TEST_MESSAGE,
};

pub struct App {
    store: Store,
    notifier: Notifier,
}

#[derive(Clone, Debug, Serialize)]
pub struct GoalSummary {
    pub goal: Goal,
    pub activity_count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct GoalDetail {
    pub goal: Goal,
    pub activities: Vec<Activity>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub goals: Page<Goal>,
    pub messaging_configured: bool,
}

impl App {
    pub fn new(store: Store, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn add_goal(&self, input: GoalInput, now: NaiveDateTime) -> Result<Goal, AppError> {
        let mut doc = self.store.load()?;
        let goal = doc.add_goal(input, now);
        self.store.save(&doc).await?;
        info!(goal_id = goal.id, "created goal");
        Ok(goal)
    }

    pub fn list_goals(&self) -> Result<Vec<GoalSummary>, AppError> {
        let doc = self.store.load()?;
        Ok(doc
            .goals
            .iter()
            .map(|goal| GoalSummary {
                goal: goal.clone(),
                activity_count: doc.activity_count_for_goal(goal.id),
            })
            .collect())
    }

    pub fn goal_detail(&self, id: i64) -> Result<GoalDetail, AppError> {
        let doc = self.store.load()?;
        let goal = doc.goal(id)?.clone();
        Ok(GoalDetail {
            activities: doc.activities_for_goal(id),
            goal,
        })
    }

    pub async fn update_goal(&self, id: i64, changes: GoalChanges) -> Result<Goal, AppError> {
        let mut doc = self.store.load()?;
        let goal = doc.update_goal(id, changes)?;
        self.store.save(&doc).await?;
        Ok(goal)
    }

    pub async fn remove_goal(&self, id: i64) -> Result<(Goal, usize), AppError> {
        let mut doc = self.store.load()?;
        let removed = doc.remove_goal(id)?;
        self.store.save(&doc).await?;
        info!(goal_id = id, activities = removed.1, "removed goal");
        Ok(removed)
    }

    pub async fn add_activity(
        &self,
        goal_id: i64,
        input: ActivityInput,
        now: NaiveDateTime,
    ) -> Result<Activity, AppError> {
        let mut doc = self.store.load()?;
        let activity = doc.add_activity(goal_id, input, now)?;
        self.store.save(&doc).await?;
        info!(activity_id = activity.id, goal_id, "logged activity");
        Ok(activity)
    }

    pub async fn update_activity(
        &self,
        id: i64,
        changes: ActivityChanges,
    ) -> Result<Activity, AppError> {
        let mut doc = self.store.load()?;
        let activity = doc.update_activity(id, changes)?;
        self.store.save(&doc).await?;
        Ok(activity)
    }

    pub async fn remove_activity(&self, id: i64) -> Result<Activity, AppError> {
        let mut doc = self.store.load()?;
        let activity = doc.remove_activity(id)?;
        self.store.save(&doc).await?;
        Ok(activity)
    }

    pub fn dashboard(
        &self,
        today: NaiveDate,
        page: usize,
        per_page: usize,
    ) -> Result<Dashboard, AppError> {
        let doc = self.store.load()?;
        Ok(Dashboard {
            stats: report::dashboard_stats(&doc, today),
            goals: report::paginate(&doc.goals, page, per_page),
            messaging_configured: self.notifier.is_configured(),
        })
    }

    pub fn progress(&self, today: NaiveDate) -> Result<ProgressView, AppError> {
        Ok(report::progress(&self.store.load()?, today))
    }

    pub fn reports(&self, today: NaiveDate) -> Result<ProgressView, AppError> {
        let view = self.progress(today)?;
        if !report::has_report_data(&view) {
            return Err(AppError::NotFound(
                "no activity this week or month yet; log an activity first".to_string(),
            ));
        }
        Ok(view)
    }

    pub async fn send_weekly_report(&self, today: NaiveDate) -> Result<SendOutcome, AppError> {
        let weekly = report::weekly_report(&self.store.load()?, today);
        if weekly.stats.total_activities == 0 {
            return Ok(SendOutcome::failed("no activity this week to report"));
        }
        Ok(self
            .notifier
            .send_message(&format_weekly_message(&weekly))
            .await)
    }

    pub async fn send_monthly_report(&self, today: NaiveDate) -> Result<SendOutcome, AppError> {
        let monthly = report::monthly_report(&self.store.load()?, today);
        if monthly.stats.total_activities == 0 {
            return Ok(SendOutcome::failed("no activity this month to report"));
        }
        Ok(self
            .notifier
            .send_message(&format_monthly_message(&monthly))
            .await)
    }

    pub async fn send_monthly_backup(&self, now: NaiveDateTime) -> Result<SendOutcome, AppError> {
        self.send_backup(BackupKind::Monthly, now).await
    }

    pub async fn send_manual_backup(&self, now: NaiveDateTime) -> Result<SendOutcome, AppError> {
        self.send_backup(BackupKind::Manual, now).await
    }

    async fn send_backup(
        &self,
        kind: BackupKind,
        now: NaiveDateTime,
    ) -> Result<SendOutcome, AppError> {
        let scratch = tempfile::tempdir()?;
        let path = scratch
            .path()
            .join(format!("goals_backup_{}.json", file_timestamp(now)));
        self.store.export_snapshot(Some(&path))?;
        let outcome = self
            .notifier
            .send_file(&path, &format_backup_caption(kind, now))
            .await;
        Ok(after_cleanup(outcome, scratch.close()))
    }

    pub async fn send_test_message(&self) -> SendOutcome {
        self.notifier.send_message(TEST_MESSAGE).await
    }

    pub fn export_snapshot(&self, path: Option<&Path>) -> Result<PathBuf, AppError> {
        self.store.export_snapshot(path)
    }

    pub async fn import_snapshot(&self, path: &Path) -> bool {
        self.store.import_snapshot(path).await
    }

    pub fn copy_primary(&self, dest_dir: &Path) -> Result<PathBuf, AppError> {
        self.store.copy_primary(dest_dir)
    }

    pub async fn backup_info(&self) -> BackupInfo {
        self.store.backup_info().await
    }

    pub async fn restore_from_mirror(&self) -> Result<RestoreOutcome, AppError> {
        let outcome = self.store.restore_from_mirror().await;
        if let RestoreOutcome::Restored(doc) = &outcome {
            self.store.save(doc).await?;
        }
        Ok(outcome)
    }

    pub fn load(&self) -> Result<Document, AppError> {
        self.store.load()
    }
}

fn after_cleanup(outcome: SendOutcome, cleanup: std::io::Result<()>) -> SendOutcome {
    if let Err(err) = cleanup {
        warn!(%err, "failed to remove backup scratch directory");
    }
    outcome
}
