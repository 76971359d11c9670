use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

const TIMEZONE_CONFIG_FILE: &str = "crewcal-time.toml";
const TIMEZONE_ENV_VAR: &str = "CREWCAL_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str = "CREWCAL_TIME_CONFIG";

/// Calendar-fact violations. Raised at the point of detection and never
/// retried: the same inputs always reproduce the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidDateError {
    #[error("invalid month: {month} (expected 1-12)")]
    InvalidMonth { month: u32 },
    #[error("invalid date: {year:04}-{month:02}-{day:02}")]
    InvalidDay { year: i32, month: u32, day: u32 },
    #[error("interval ends before it starts: {start} > {end}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },
    #[error("progress percentage out of range: {pct}")]
    InvalidProgress { pct: u8 },
}

/// Months are 1-12 everywhere in this crate, matching chrono.
pub fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, InvalidDateError> {
    if !(1..=12).contains(&month) {
        return Err(InvalidDateError::InvalidMonth { month });
    }
    NaiveDate::from_ymd_opt(year, month, 1).ok_or(InvalidDateError::InvalidDay {
        year,
        month,
        day: 1,
    })
}

/// Last day-of-month via "day zero of the next month".
pub fn days_in_month(year: i32, month: u32) -> Result<u32, InvalidDateError> {
    let first = first_of_month(year, month)?;
    let next = if month == 12 {
        first_of_month(year + 1, 1)?
    } else {
        first_of_month(year, month + 1)?
    };
    Ok(next.pred_opt().unwrap_or(first).day())
}

pub fn last_of_month(year: i32, month: u32) -> Result<NaiveDate, InvalidDateError> {
    let first = first_of_month(year, month)?;
    let day = days_in_month(year, month)?;
    Ok(first.with_day(day).unwrap_or(first))
}

pub fn make_date(year: i32, month: u32, day: u32) -> Result<NaiveDate, InvalidDateError> {
    if !(1..=12).contains(&month) {
        return Err(InvalidDateError::InvalidMonth { month });
    }
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(InvalidDateError::InvalidDay { year, month, day })
}

/// 0 = Sunday .. 6 = Saturday.
#[must_use]
pub fn day_of_week(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}

/// Signed whole days, `b - a`.
#[must_use]
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    b.signed_duration_since(a).num_days()
}

#[must_use]
pub fn add_days(date: NaiveDate, n: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(n)).unwrap_or(date)
}

/// The first Monday on or after `date`; `date` itself when it is a Monday.
#[must_use]
pub fn first_monday_on_or_after(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday() as i64;
    add_days(date, (7 - offset) % 7)
}

/// Month arithmetic with year carry; the day component is not involved.
pub fn shift_month(year: i32, month: u32, delta: i32) -> Result<(i32, u32), InvalidDateError> {
    if !(1..=12).contains(&month) {
        return Err(InvalidDateError::InvalidMonth { month });
    }
    let total = month as i32 - 1 + delta;
    let shifted_year = year + total.div_euclid(12);
    let shifted_month = (total.rem_euclid(12) + 1) as u32;
    Ok((shifted_year, shifted_month))
}

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
    timezone: Option<String>,
    time: Option<TimezoneSection>,
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
    timezone: Option<String>,
}

/// The team's office timezone. "Today" on a leave calendar is a civil date
/// in this zone, not whatever the host happens to run in.
pub fn project_timezone() -> &'static Tz {
    static PROJECT_TZ: OnceLock<Tz> = OnceLock::new();
    PROJECT_TZ.get_or_init(resolve_project_timezone)
}

#[must_use]
pub fn to_project_date(dt: DateTime<Utc>) -> NaiveDate {
    dt.with_timezone(project_timezone()).date_naive()
}

/// The injected "today" for every command dispatch. Pure functions never
/// call this; the shell computes it once and passes it down.
#[must_use]
pub fn today() -> NaiveDate {
    to_project_date(Utc::now())
}

fn resolve_project_timezone() -> Tz {
    if let Ok(raw) = std::env::var(TIMEZONE_ENV_VAR) {
        if let Some(tz) = parse_timezone(&raw, TIMEZONE_ENV_VAR) {
            return tz;
        }
    }

    if let Some(path) = timezone_config_path()
        && let Some(tz) = load_timezone_from_file(&path)
    {
        return tz;
    }

    chrono_tz::UTC
}

fn timezone_config_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(TIMEZONE_CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    std::env::current_dir()
        .ok()
        .map(|dir| dir.join(TIMEZONE_CONFIG_FILE))
}

fn load_timezone_from_file(path: &PathBuf) -> Option<Tz> {
    if !path.exists() {
        tracing::info!(file = %path.display(), "timezone config file not found");
        return None;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::error!(file = %path.display(), error = %err, "failed reading timezone config file");
            return None;
        }
    };

    let parsed = match toml::from_str::<TimezoneConfig>(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::error!(file = %path.display(), error = %err, "failed parsing timezone config file");
            return None;
        }
    };

    let timezone = parsed
        .timezone
        .or_else(|| parsed.time.and_then(|section| section.timezone));
    let Some(timezone) = timezone else {
        tracing::warn!(file = %path.display(), "timezone config had no timezone field");
        return None;
    };

    parse_timezone(timezone.as_str(), &format!("file:{}", path.display()))
}

fn parse_timezone(raw: &str, source: &str) -> Option<Tz> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        tracing::warn!(source, "timezone source was empty");
        return None;
    }

    match trimmed.parse::<Tz>() {
        Ok(tz) => {
            tracing::info!(source, timezone = %trimmed, "configured project timezone");
            Some(tz)
        }
        Err(err) => {
            tracing::error!(source, timezone = %trimmed, error = %err, "failed to parse timezone id");
            None
        }
    }
}

#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(input: &str, today: NaiveDate) -> anyhow::Result<NaiveDate> {
    let token = input.trim();
    let lower = token.to_ascii_lowercase();

    match lower.as_str() {
        "today" => return Ok(today),
        "tomorrow" => return Ok(add_days(today, 1)),
        "yesterday" => return Ok(add_days(today, -1)),
        _ => {}
    }

    let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)d$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
    if let Some(caps) = rel_re.captures(&lower) {
        let num: i64 = caps
            .name("num")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative amount"))?
            .parse()
            .context("invalid relative number")?;
        let sign = if caps.name("sign").map(|m| m.as_str()) == Some("-") {
            -1
        } else {
            1
        };
        return Ok(add_days(today, sign * num));
    }

    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return Ok(date);
    }

    Err(anyhow!("unrecognized date expression: {input}"))
        .with_context(|| "supported formats: today/tomorrow/yesterday, +Nd/-Nd, YYYY-MM-DD")
}

/// Resolve a month selector to `(year, month)`. Month names resolve within
/// the current year: a leave calendar is browsed backward as often as
/// forward, so "march" in July means last March, not next year's.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_month_expr(input: &str, today: NaiveDate) -> anyhow::Result<(i32, u32)> {
    let token = input.trim();
    let lower = token.to_ascii_lowercase();

    match lower.as_str() {
        "this" | "current" => return Ok((today.year(), today.month())),
        "next" => return Ok(shift_month(today.year(), today.month(), 1)?),
        "last" | "prev" | "previous" => {
            return Ok(shift_month(today.year(), today.month(), -1)?);
        }
        _ => {}
    }

    let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)m$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
    if let Some(caps) = rel_re.captures(&lower) {
        let num: i32 = caps
            .name("num")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative amount"))?
            .parse()
            .context("invalid relative number")?;
        let delta = if caps.name("sign").map(|m| m.as_str()) == Some("-") {
            -num
        } else {
            num
        };
        return Ok(shift_month(today.year(), today.month(), delta)?);
    }

    if let Some((year_text, month_text)) = token.split_once('-') {
        let year: i32 = year_text.parse().context("invalid year in YYYY-MM")?;
        let month: u32 = month_text.parse().context("invalid month in YYYY-MM")?;
        first_of_month(year, month)?;
        return Ok((year, month));
    }

    if let Some(month) = parse_month_name(&lower) {
        return Ok((today.year(), month));
    }

    Err(anyhow!("unrecognized month expression: {input}")).with_context(|| {
        "supported formats: this/next/last, +Nm/-Nm, YYYY-MM, month names (e.g. march)"
    })
}

fn parse_month_name(token: &str) -> Option<u32> {
    match token.trim() {
        "january" | "jan" => Some(1),
        "february" | "feb" => Some(2),
        "march" | "mar" => Some(3),
        "april" | "apr" => Some(4),
        "may" => Some(5),
        "june" | "jun" => Some(6),
        "july" | "jul" => Some(7),
        "august" | "aug" => Some(8),
        "september" | "sep" | "sept" => Some(9),
        "october" | "oct" => Some(10),
        "november" | "nov" => Some(11),
        "december" | "dec" => Some(12),
        _ => None,
    }
}
