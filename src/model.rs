use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;

pub const DEFAULT_TARGET_DATE: (i32, u32, u32) = (2026, 12, 31);

pub fn default_target_date() -> NaiveDate {
    let (year, month, day) = DEFAULT_TARGET_DATE;
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MAX)
}

/// Older files may carry a null or blank target date.
fn target_date_or_default<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(default_target_date()),
        Some(value) => {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(serde::de::Error::custom)
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    #[default]
    Active,
    Paused,
    Completed,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

/// The whole persisted aggregate. Missing sequences deserialize as empty,
/// so a loaded document is always normalized.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub goals: Vec<Goal>,
    #[serde(default, rename = "sub_tasks", alias = "activities")]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub progress_logs: Vec<serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_target_date", deserialize_with = "target_date_or_default")]
    pub target_date: NaiveDate,
    pub created_at: NaiveDate,
    #[serde(default)]
    pub status: GoalStatus,
    #[serde(default)]
    pub progress: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub goal_id: i64,
    /// Title of the parent goal when the activity was logged. Not updated on rename.
    pub goal_title: String,
    pub title: String,
    #[serde(default)]
    pub note: String,
    pub created_at: NaiveDate,
    pub created_time: NaiveTime,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GoalInput {
    pub title: String,
    pub description: String,
    pub target_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GoalChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub status: Option<GoalStatus>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityInput {
    pub title: String,
    pub note: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActivityChanges {
    pub title: Option<String>,
    pub note: Option<String>,
}

impl Document {
    pub fn next_goal_id(&self) -> i64 {
        self.goals.iter().map(|goal| goal.id).max().unwrap_or(0) + 1
    }

    pub fn next_activity_id(&self) -> i64 {
        self.activities
            .iter()
            .map(|activity| activity.id)
            .max()
            .unwrap_or(0)
            + 1
    }

    pub fn goal(&self, id: i64) -> Result<&Goal, AppError> {
        self.goals
            .iter()
            .find(|goal| goal.id == id)
            .ok_or_else(|| AppError::NotFound(format!("goal id {id}")))
    }

    pub fn add_goal(&mut self, input: GoalInput, now: NaiveDateTime) -> Goal {
        let goal = Goal {
            id: self.next_goal_id(),
            title: input.title,
            description: input.description,
            target_date: input.target_date.unwrap_or_else(default_target_date),
            created_at: now.date(),
            status: GoalStatus::Active,
            progress: 0,
        };
        self.goals.push(goal.clone());
        goal
    }

    pub fn update_goal(&mut self, id: i64, changes: GoalChanges) -> Result<Goal, AppError> {
        let goal = self
            .goals
            .iter_mut()
            .find(|goal| goal.id == id)
            .ok_or_else(|| AppError::NotFound(format!("goal id {id}")))?;
        if let Some(title) = changes.title {
            goal.title = title;
        }
        if let Some(description) = changes.description {
            goal.description = description;
        }
        if let Some(target_date) = changes.target_date {
            goal.target_date = target_date;
        }
        if let Some(status) = changes.status {
            goal.status = status;
        }
        Ok(goal.clone())
    }

    /// Removes the goal together with every activity logged against it.
    /// Returns the removed goal and the number of activities dropped.
    pub fn remove_goal(&mut self, id: i64) -> Result<(Goal, usize), AppError> {
        let index = self
            .goals
            .iter()
            .position(|goal| goal.id == id)
            .ok_or_else(|| AppError::NotFound(format!("goal id {id}")))?;
        let goal = self.goals.remove(index);
        let before = self.activities.len();
        self.activities.retain(|activity| activity.goal_id != id);
        Ok((goal, before - self.activities.len()))
    }

    pub fn add_activity(
        &mut self,
        goal_id: i64,
        input: ActivityInput,
        now: NaiveDateTime,
    ) -> Result<Activity, AppError> {
        let goal_title = self.goal(goal_id)?.title.clone();
        let activity = Activity {
            id: self.next_activity_id(),
            goal_id,
            goal_title,
            title: input.title,
            note: input.note,
            created_at: now.date(),
            created_time: truncate_seconds(now.time()),
        };
        self.activities.push(activity.clone());
        Ok(activity)
    }

    pub fn update_activity(
        &mut self,
        id: i64,
        changes: ActivityChanges,
    ) -> Result<Activity, AppError> {
        let activity = self
            .activities
            .iter_mut()
            .find(|activity| activity.id == id)
            .ok_or_else(|| AppError::NotFound(format!("activity id {id}")))?;
        if let Some(title) = changes.title {
            activity.title = title;
        }
        if let Some(note) = changes.note {
            activity.note = note;
        }
        Ok(activity.clone())
    }

    pub fn remove_activity(&mut self, id: i64) -> Result<Activity, AppError> {
        let index = self
            .activities
            .iter()
            .position(|activity| activity.id == id)
            .ok_or_else(|| AppError::NotFound(format!("activity id {id}")))?;
        Ok(self.activities.remove(index))
    }

    /// Activities of one goal, newest first. Same-second entries fall back to id.
    pub fn activities_for_goal(&self, goal_id: i64) -> Vec<Activity> {
        let mut items: Vec<Activity> = self
            .activities
            .iter()
            .filter(|activity| activity.goal_id == goal_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            (b.created_at, b.created_time, b.id).cmp(&(a.created_at, a.created_time, a.id))
        });
        items
    }

    pub fn activity_count_for_goal(&self, goal_id: i64) -> usize {
        self.activities
            .iter()
            .filter(|activity| activity.goal_id == goal_id)
            .count()
    }
}

fn truncate_seconds(time: NaiveTime) -> NaiveTime {
    time.with_nanosecond(0).unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::new(
            NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("date"),
            NaiveTime::parse_from_str(time, "%H:%M:%S%.f").expect("time"),
        )
    }

    fn goal_input(title: &str) -> GoalInput {
        GoalInput {
            title: title.to_string(),
            description: String::new(),
            target_date: None,
        }
    }

    fn activity_input(title: &str) -> ActivityInput {
        ActivityInput {
            title: title.to_string(),
            note: String::new(),
        }
    }

    #[test]
    fn ids_start_at_one_and_follow_the_maximum() {
        let mut doc = Document::default();
        let now = at("2026-03-04", "10:00:00");
        assert_eq!(doc.add_goal(goal_input("A"), now).id, 1);
        assert_eq!(doc.add_goal(goal_input("B"), now).id, 2);
        assert_eq!(doc.add_goal(goal_input("C"), now).id, 3);

        doc.remove_goal(2).expect("remove");
        assert_eq!(doc.next_goal_id(), 4);
        assert_eq!(doc.add_goal(goal_input("D"), now).id, 4);
    }

    #[test]
    fn goal_and_activity_ids_are_independent() {
        let mut doc = Document::default();
        let now = at("2026-03-04", "10:00:00");
        doc.add_goal(goal_input("A"), now);
        doc.add_goal(goal_input("B"), now);
        let activity = doc
            .add_activity(2, activity_input("first"), now)
            .expect("activity");
        assert_eq!(activity.id, 1);
    }

    #[test]
    fn new_goal_gets_defaults() {
        let mut doc = Document::default();
        let goal = doc.add_goal(goal_input("Learn X"), at("2026-03-04", "10:00:00"));
        assert_eq!(goal.status, GoalStatus::Active);
        assert_eq!(goal.target_date, default_target_date());
        assert_eq!(goal.created_at.to_string(), "2026-03-04");
        assert_eq!(goal.progress, 0);
    }

    #[test]
    fn remove_goal_cascades_only_its_activities() {
        let mut doc = Document::default();
        let now = at("2026-03-04", "10:00:00");
        doc.add_goal(goal_input("A"), now);
        doc.add_goal(goal_input("B"), now);
        doc.add_activity(1, activity_input("a1"), now).expect("a1");
        doc.add_activity(2, activity_input("b1"), now).expect("b1");
        doc.add_activity(1, activity_input("a2"), now).expect("a2");

        let (goal, removed) = doc.remove_goal(1).expect("remove");
        assert_eq!(goal.title, "A");
        assert_eq!(removed, 2);
        assert_eq!(doc.activities.len(), 1);
        assert_eq!(doc.activities[0].title, "b1");
    }

    #[test]
    fn add_activity_requires_live_goal() {
        let mut doc = Document::default();
        let err = doc
            .add_activity(7, activity_input("orphan"), at("2026-03-04", "10:00:00"))
            .expect_err("missing goal");
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(doc.activities.is_empty());
    }

    #[test]
    fn goal_title_snapshot_survives_rename() {
        let mut doc = Document::default();
        let now = at("2026-03-04", "10:00:00");
        doc.add_goal(goal_input("Old"), now);
        doc.add_activity(1, activity_input("step"), now).expect("activity");
        doc.update_goal(
            1,
            GoalChanges {
                title: Some("New".to_string()),
                ..Default::default()
            },
        )
        .expect("update");
        assert_eq!(doc.goals[0].title, "New");
        assert_eq!(doc.activities[0].goal_title, "Old");
    }

    #[test]
    fn activity_time_is_whole_seconds() {
        let mut doc = Document::default();
        let now = at("2026-03-04", "10:11:12.987");
        doc.add_goal(goal_input("A"), now);
        let activity = doc.add_activity(1, activity_input("x"), now).expect("activity");
        let json = serde_json::to_value(&activity).expect("json");
        assert_eq!(json["created_time"], "10:11:12");
        assert_eq!(json["created_at"], "2026-03-04");
    }

    #[test]
    fn activities_for_goal_are_newest_first() {
        let mut doc = Document::default();
        doc.add_goal(goal_input("A"), at("2026-03-01", "08:00:00"));
        doc.add_activity(1, activity_input("early"), at("2026-03-02", "09:00:00"))
            .expect("early");
        doc.add_activity(1, activity_input("late"), at("2026-03-02", "18:00:00"))
            .expect("late");
        doc.add_activity(1, activity_input("mid"), at("2026-03-01", "23:00:00"))
            .expect("mid");
        let titles: Vec<_> = doc
            .activities_for_goal(1)
            .into_iter()
            .map(|activity| activity.title)
            .collect();
        assert_eq!(titles, vec!["late", "early", "mid"]);
        assert_eq!(doc.activity_count_for_goal(1), 3);
    }

    #[test]
    fn missing_sequences_normalize_to_empty() {
        let doc: Document = serde_json::from_str(r#"{"goals": []}"#).expect("parse");
        assert!(doc.activities.is_empty());
        assert!(doc.progress_logs.is_empty());
        let json = serde_json::to_value(&doc).expect("json");
        assert!(json["sub_tasks"].is_array());
        assert!(json["progress_logs"].is_array());
    }

    #[test]
    fn blank_or_null_target_dates_read_as_default() {
        let doc: Document = serde_json::from_str(
            r#"{"goals": [
                {"id": 1, "title": "a", "target_date": null, "created_at": "2026-01-02"},
                {"id": 2, "title": "b", "target_date": "", "created_at": "2026-01-02"},
                {"id": 3, "title": "c", "created_at": "2026-01-02"},
                {"id": 4, "title": "d", "target_date": "2026-06-30", "created_at": "2026-01-02"}
            ]}"#,
        )
        .expect("parse");
        let targets: Vec<_> = doc.goals.iter().map(|goal| goal.target_date).collect();
        let june = NaiveDate::from_ymd_opt(2026, 6, 30).expect("date");
        assert_eq!(
            targets,
            vec![default_target_date(), default_target_date(), default_target_date(), june]
        );
        assert!(serde_json::from_str::<Document>(
            r#"{"goals": [{"id": 1, "title": "a", "target_date": "soon", "created_at": "2026-01-02"}]}"#
        )
        .is_err());
    }

    #[test]
    fn activities_key_is_accepted_on_read() {
        let doc: Document = serde_json::from_str(
            r#"{"goals": [], "activities": [{"id": 1, "goal_id": 1, "goal_title": "G",
                "title": "t", "created_at": "2026-01-02", "created_time": "03:04:05"}]}"#,
        )
        .expect("parse");
        assert_eq!(doc.activities.len(), 1);
        assert_eq!(doc.activities[0].note, "");
    }
}
