use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::model::{Activity, Document, Goal, GoalStatus};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GoalGroup {
    pub goal_id: i64,
    pub goal_title: String,
    pub activities: Vec<Activity>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WeekStats {
    pub total_activities: usize,
    pub active_goals: usize,
    pub avg_per_day: f64,
}

/// `completed_goals` counts goals whose status is completed now and which
/// have activity in the window. It is not a record of when they completed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthStats {
    pub total_activities: usize,
    pub active_goals: usize,
    pub days_active: usize,
    pub completed_goals: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WeeklyReport {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub stats: WeekStats,
    pub groups: Vec<GoalGroup>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthlyReport {
    pub month_start: NaiveDate,
    pub today: NaiveDate,
    pub stats: MonthStats,
    pub groups: Vec<GoalGroup>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgressView {
    pub week: WeeklyReport,
    pub month: MonthlyReport,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_goals: usize,
    pub active_goals: usize,
    pub completed_goals: usize,
    pub week_activities: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
}

pub fn week_range(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    (start, start + Duration::days(6))
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn filter_by_date_range(
    activities: &[Activity],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<Activity> {
    activities
        .iter()
        .filter(|activity| start <= activity.created_at && activity.created_at <= end)
        .cloned()
        .collect()
}

pub fn filter_from_date(activities: &[Activity], start: NaiveDate) -> Vec<Activity> {
    activities
        .iter()
        .filter(|activity| activity.created_at >= start)
        .cloned()
        .collect()
}

pub fn group_by_goal(activities: &[Activity]) -> Vec<GoalGroup> {
    let mut index: HashMap<i64, usize> = HashMap::new();
    let mut groups: Vec<GoalGroup> = Vec::new();
    for activity in activities {
        if let Some(idx) = index.get(&activity.goal_id) {
            groups[*idx].activities.push(activity.clone());
        } else {
            index.insert(activity.goal_id, groups.len());
            groups.push(GoalGroup {
                goal_id: activity.goal_id,
                goal_title: activity.goal_title.clone(),
                activities: vec![activity.clone()],
            });
        }
    }
    groups
}

pub fn week_stats(activities: &[Activity]) -> WeekStats {
    let total = activities.len();
    let avg_per_day = if total == 0 {
        0.0
    } else {
        (total as f64 / 7.0 * 10.0).round() / 10.0
    };
    WeekStats {
        total_activities: total,
        active_goals: distinct_goals(activities).len(),
        avg_per_day,
    }
}

pub fn month_stats(goals: &[Goal], activities: &[Activity]) -> MonthStats {
    let goal_ids = distinct_goals(activities);
    let days: HashSet<NaiveDate> = activities.iter().map(|activity| activity.created_at).collect();
    let completed_goals = goals
        .iter()
        .filter(|goal| goal.status == GoalStatus::Completed && goal_ids.contains(&goal.id))
        .count();
    MonthStats {
        total_activities: activities.len(),
        active_goals: goal_ids.len(),
        days_active: days.len(),
        completed_goals,
    }
}

pub fn weekly_report(document: &Document, today: NaiveDate) -> WeeklyReport {
    let (week_start, week_end) = week_range(today);
    let activities = filter_by_date_range(&document.activities, week_start, week_end);
    WeeklyReport {
        week_start,
        week_end,
        stats: week_stats(&activities),
        groups: group_by_goal(&activities),
    }
}

pub fn monthly_report(document: &Document, today: NaiveDate) -> MonthlyReport {
    let start = month_start(today);
    let activities = filter_from_date(&document.activities, start);
    MonthlyReport {
        month_start: start,
        today,
        stats: month_stats(&document.goals, &activities),
        groups: group_by_goal(&activities),
    }
}

pub fn progress(document: &Document, today: NaiveDate) -> ProgressView {
    ProgressView {
        week: weekly_report(document, today),
        month: monthly_report(document, today),
    }
}

pub fn has_report_data(view: &ProgressView) -> bool {
    view.week.stats.total_activities > 0 || view.month.stats.total_activities > 0
}

pub fn dashboard_stats(document: &Document, today: NaiveDate) -> DashboardStats {
    let (week_start, week_end) = week_range(today);
    let count_status = |status: GoalStatus| {
        document
            .goals
            .iter()
            .filter(|goal| goal.status == status)
            .count()
    };
    DashboardStats {
        total_goals: document.goals.len(),
        active_goals: count_status(GoalStatus::Active),
        completed_goals: count_status(GoalStatus::Completed),
        week_activities: filter_by_date_range(&document.activities, week_start, week_end).len(),
    }
}

pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let page = page.max(1);
    let total = items.len();
    let total_pages = if total == 0 {
        1
    } else {
        total.div_ceil(per_page)
    };
    let start = (page - 1).saturating_mul(per_page);
    let items = items.iter().skip(start).take(per_page).cloned().collect();
    Page {
        items,
        page,
        total_pages,
        total,
    }
}

fn distinct_goals(activities: &[Activity]) -> HashSet<i64> {
    activities.iter().map(|activity| activity.goal_id).collect()
}
