use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use tracing::warn;

use crate::error::AppError;
use crate::notify::TelegramConfig;
use crate::scheduler::ScheduleConfig;

pub const DEFAULT_DATA_FILE: &str = "data/goals_data.json";
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Clone, Debug)]
pub struct Config {
    pub data_file: PathBuf,
    pub mirror_uri: Option<String>,
    pub mirror_connect_timeout: Duration,
    pub telegram: Option<TelegramConfig>,
    pub http_timeout: Duration,
    pub schedule: ScheduleConfig,
    pub test_on_start: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let telegram = match (env_string("TELEGRAM_BOT_TOKEN"), env_string("TELEGRAM_CHAT_ID")) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig {
                token,
                chat_id,
                thread_id: env_string("TELEGRAM_THREAD_ID"),
                api_base: env_string("TELEGRAM_API_BASE")
                    .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string()),
            }),
            _ => None,
        };

        let schedule = ScheduleConfig {
            weekly_day: env_parsed("WEEKLY_REMINDER_DAY", Weekday::Sun, parse_weekday),
            weekly_time: env_parsed("WEEKLY_REMINDER_TIME", clock(20, 0), parse_clock),
            monthly_day: env_u32("MONTHLY_REVIEW_DAY", 1).clamp(1, 31),
            monthly_time: env_parsed("MONTHLY_REVIEW_TIME", clock(9, 0), parse_clock),
        };

        Ok(Self {
            data_file: env_string("GOALTRACK_DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE)),
            mirror_uri: env_string("GOALTRACK_MIRROR_URI"),
            mirror_connect_timeout: Duration::from_secs(u64::from(env_u32(
                "GOALTRACK_MIRROR_CONNECT_TIMEOUT_SECS",
                3,
            ))),
            telegram,
            http_timeout: Duration::from_secs(u64::from(env_u32("GOALTRACK_HTTP_TIMEOUT_SECS", 30))),
            schedule,
            test_on_start: env_bool("TEST_ON_START", false),
        })
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_u32(name: &str, default: u32) -> u32 {
    env_string(name)
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_parsed<T>(name: &str, default: T, parse: fn(&str) -> Result<T, AppError>) -> T {
    parsed_or(name, env_string(name), default, parse)
}

fn parsed_or<T>(
    name: &str,
    value: Option<String>,
    default: T,
    parse: fn(&str) -> Result<T, AppError>,
) -> T {
    let Some(value) = value else {
        return default;
    };
    match parse(&value) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(name, %err, "ignoring invalid setting, using default");
            default
        }
    }
}

fn clock(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

fn env_bool(name: &str, default: bool) -> bool {
    env_string(name)
        .and_then(|value| match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

pub fn parse_weekday(value: &str) -> Result<Weekday, AppError> {
    value
        .trim()
        .parse::<Weekday>()
        .map_err(|_| AppError::InvalidInput(format!("unknown weekday: {value}")))
}

/// Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_clock(value: &str) -> Result<NaiveTime, AppError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| AppError::InvalidInput(format!("invalid time of day: {value}")))
}
