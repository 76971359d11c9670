use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::InvalidDateError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Vacation,
    Sick,
    Personal,
    Holiday,
    Other,
}

impl Category {
    /// One-letter marker shown inside calendar cells.
    #[must_use]
    pub fn marker(self) -> char {
        match self {
            Category::Vacation => 'V',
            Category::Sick => 'S',
            Category::Personal => 'P',
            Category::Holiday => 'H',
            Category::Other => 'O',
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Category::Vacation => "vacation",
            Category::Sick => "sick",
            Category::Personal => "personal",
            Category::Holiday => "holiday",
            Category::Other => "other",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vacation" | "vac" => Ok(Category::Vacation),
            "sick" => Ok(Category::Sick),
            "personal" => Ok(Category::Personal),
            "holiday" | "hol" => Ok(Category::Holiday),
            "other" => Ok(Category::Other),
            other => Err(anyhow::anyhow!(
                "unknown category: {other} (expected vacation, sick, personal, holiday, other)"
            )),
        }
    }
}

/// One leave entry: a labeled closed date range. Built once by the caller
/// and only read by the grid; construction enforces `start_day <= end_day`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interval {
    pub uuid: Uuid,

    #[serde(default)]
    pub id: Option<u64>,

    pub label: String,

    pub start_day: NaiveDate,

    pub end_day: NaiveDate,

    pub category: Category,
}

impl Interval {
    pub fn new(
        label: String,
        start_day: NaiveDate,
        end_day: NaiveDate,
        category: Category,
    ) -> Result<Self, InvalidDateError> {
        if start_day > end_day {
            return Err(InvalidDateError::EmptyRange {
                start: start_day,
                end: end_day,
            });
        }
        Ok(Self {
            uuid: Uuid::new_v4(),
            id: None,
            label,
            start_day,
            end_day,
            category,
        })
    }

    /// Closed-range membership: the overlap predicate of the whole crate.
    #[must_use]
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start_day <= day && day <= self.end_day
    }
}

/// One project phase laid out on the continuous timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase {
    pub uuid: Uuid,

    #[serde(default)]
    pub id: Option<u64>,

    pub label: String,

    pub start_date: NaiveDate,

    pub end_date: NaiveDate,

    pub progress_pct: u8,
}

impl Phase {
    pub fn new(
        label: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
        progress_pct: u8,
    ) -> Result<Self, InvalidDateError> {
        if start_date > end_date {
            return Err(InvalidDateError::EmptyRange {
                start: start_date,
                end: end_date,
            });
        }
        if progress_pct > 100 {
            return Err(InvalidDateError::InvalidProgress { pct: progress_pct });
        }
        Ok(Self {
            uuid: Uuid::new_v4(),
            id: None,
            label,
            start_date,
            end_date,
            progress_pct,
        })
    }
}

/// The import/export and undo unit: everything the store holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub leaves: Vec<Interval>,
    #[serde(default)]
    pub phases: Vec<Phase>,
}
