use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::app::{Dashboard, GoalDetail};
use crate::report::{GoalGroup, MonthlyReport, ProgressView, WeeklyReport};
use crate::store::BackupInfo;

pub const TEST_MESSAGE: &str =
    "🧪 *Test message from Goal Tracker 2026!*\n\n✅ Connection works!";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackupKind {
    Monthly,
    Manual,
}

fn has_text(value: &str) -> bool {
    !value.trim().is_empty()
}

fn day_month(date: NaiveDate) -> String {
    date.format("%d/%m").to_string()
}

fn activities_label(count: usize) -> String {
    match count {
        1 => "1 activity".to_string(),
        count => format!("{count} activities"),
    }
}

pub fn format_weekly_message(report: &WeeklyReport) -> String {
    let mut message = String::from("📅 *WEEKLY REPORT*\n");
    message.push_str(&format!(
        "_{} - {}_\n\n",
        day_month(report.week_start),
        report.week_end.format("%d/%m/%Y")
    ));
    message.push_str(&format!(
        "✅ *Total: {}*\n\n",
        activities_label(report.stats.total_activities)
    ));
    for (idx, group) in report.groups.iter().enumerate() {
        message.push_str(&format!(
            "*{}. {}* ({})\n",
            idx + 1,
            group.goal_title,
            activities_label(group.activities.len())
        ));
        for activity in &group.activities {
            message.push_str(&format!(
                "   • {} - {}\n",
                activity.title,
                day_month(activity.created_at)
            ));
        }
        message.push('\n');
    }
    message.push_str("💪 Keep pushing next week!");
    message
}

pub fn format_monthly_message(report: &MonthlyReport) -> String {
    let mut message = format!(
        "📊 *MONTHLY REPORT {}/{}*\n\n",
        report.today.month(),
        report.today.year()
    );
    message.push_str(&format!(
        "✅ *Total activities: {}*\n\n",
        report.stats.total_activities
    ));
    for (idx, group) in report.groups.iter().enumerate() {
        message.push_str(&format!("{}. *{}*\n", idx + 1, group.goal_title));
        message.push_str(&format!("   📊 Activities: {}\n\n", group.activities.len()));
    }
    message.push_str("🎯 Here's to reaching your 2026 goals!");
    message
}

pub fn format_backup_caption(kind: BackupKind, now: NaiveDateTime) -> String {
    let stamp = now.format("%d/%m/%Y %H:%M:%S");
    match kind {
        BackupKind::Monthly => format!(
            "📦 Monthly backup {}/{}\n🗓️ {stamp}",
            now.month(),
            now.year()
        ),
        BackupKind::Manual => format!("💾 Manual backup\n🗓️ {stamp}"),
    }
}

pub fn format_goal_detail(detail: &GoalDetail) -> String {
    let goal = &detail.goal;
    let mut output = String::new();
    output.push_str(&format!("Goal ID: {}\n", goal.id));
    output.push_str(&format!("Title: {}\n", goal.title));
    output.push_str(&format!("Status: {}\n", goal.status.as_str()));
    if has_text(&goal.description) {
        output.push_str(&format!("Description: {}\n", goal.description));
    }
    output.push_str(&format!("Target: {}\n", goal.target_date));
    output.push_str(&format!("Created: {}\n", goal.created_at));
    output.push('\n');
    if detail.activities.is_empty() {
        output.push_str("Activities: (none)");
        return output;
    }
    output.push_str(&format!("Activities ({}):\n", detail.activities.len()));
    for activity in &detail.activities {
        output.push_str(&format!(
            "- {} {} {} (activity id {})\n",
            activity.created_at, activity.created_time, activity.title, activity.id
        ));
        if has_text(&activity.note) {
            output.push_str(&format!("  Note: {}\n", activity.note));
        }
    }
    output.trim_end().to_string()
}

pub fn format_dashboard(dashboard: &Dashboard) -> String {
    let stats = &dashboard.stats;
    let mut output = String::new();
    output.push_str(&format!("Goals: {}\n", stats.total_goals));
    output.push_str(&format!("Active: {}\n", stats.active_goals));
    output.push_str(&format!("Completed: {}\n", stats.completed_goals));
    output.push_str(&format!("Activities this week: {}\n", stats.week_activities));
    output.push_str(&format!(
        "Messaging: {}\n",
        if dashboard.messaging_configured {
            "configured"
        } else {
            "not configured"
        }
    ));
    output.push('\n');
    let page = &dashboard.goals;
    if page.items.is_empty() {
        output.push_str(&format!(
            "Goals page {}/{}: (none)",
            page.page, page.total_pages
        ));
        return output;
    }
    output.push_str(&format!("Goals page {}/{}:\n", page.page, page.total_pages));
    for goal in &page.items {
        output.push_str(&format!(
            "- [{}] {} (goal id {}, target {})\n",
            goal.status.as_str(),
            goal.title,
            goal.id,
            goal.target_date
        ));
    }
    output.trim_end().to_string()
}

pub fn format_progress(view: &ProgressView) -> String {
    let week = &view.week;
    let month = &view.month;
    let mut output = String::new();
    output.push_str(&format!("Week {} to {}\n", week.week_start, week.week_end));
    output.push_str(&format!(
        "  Activities: {}, goals: {}, per day: {:.1}\n",
        week.stats.total_activities, week.stats.active_goals, week.stats.avg_per_day
    ));
    push_groups(&mut output, &week.groups);
    output.push('\n');
    output.push_str(&format!("Month {} to {}\n", month.month_start, month.today));
    output.push_str(&format!(
        "  Activities: {}, goals: {}, active days: {}, completed goals: {}\n",
        month.stats.total_activities,
        month.stats.active_goals,
        month.stats.days_active,
        month.stats.completed_goals
    ));
    push_groups(&mut output, &month.groups);
    output.trim_end().to_string()
}

fn push_groups(output: &mut String, groups: &[GoalGroup]) {
    for group in groups {
        output.push_str(&format!(
            "  - {} (goal id {}): {}\n",
            group.goal_title,
            group.goal_id,
            activities_label(group.activities.len())
        ));
        for activity in &group.activities {
            output.push_str(&format!("    {} {}\n", activity.created_at, activity.title));
        }
    }
}

pub fn format_backup_info(info: &BackupInfo) -> String {
    let mut output = String::new();
    if info.primary_exists {
        output.push_str(&format!("Primary: present ({} bytes)\n", info.primary_size));
    } else {
        output.push_str("Primary: missing\n");
    }
    output.push_str(&format!(
        "Mirror: {}\n",
        if info.mirror_enabled { "enabled" } else { "disabled" }
    ));
    if let Some(stamp) = &info.mirror_last_backup {
        output.push_str(&format!("Last mirror backup: {stamp}\n"));
    }
    output.trim_end().to_string()
}
