use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::datetime::{InvalidDateError, day_of_week, days_in_month, first_of_month, make_date};
use crate::model::Interval;
use crate::overlap::overlaps_for;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

impl WeekStart {
    /// Offset of the week's first column in Sunday-based day-of-week terms.
    #[must_use]
    pub fn offset(self) -> u32 {
        match self {
            WeekStart::Sunday => 0,
            WeekStart::Monday => 1,
        }
    }

    #[must_use]
    pub fn column_headers(self) -> [&'static str; 7] {
        match self {
            WeekStart::Sunday => ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"],
            WeekStart::Monday => ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"],
        }
    }
}

impl std::str::FromStr for WeekStart {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sunday" | "sun" => Ok(WeekStart::Sunday),
            "monday" | "mon" => Ok(WeekStart::Monday),
            other => Err(anyhow::anyhow!(
                "invalid week.start: {other} (expected sunday or monday)"
            )),
        }
    }
}

/// One calendar cell. `date == None` is a padding cell outside the month.
/// Mutated only during construction; read-only afterward.
#[derive(Debug, Clone, PartialEq)]
pub struct DayCell {
    pub date: Option<NaiveDate>,
    pub is_today: bool,
    pub overlaps: Vec<Interval>,
}

impl DayCell {
    fn padding() -> Self {
        Self {
            date: None,
            is_today: false,
            overlaps: Vec::new(),
        }
    }
}

/// Exactly 7 cells, first column per the configured week start.
pub type WeekRow = Vec<DayCell>;

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarGrid {
    pub year: i32,
    pub month: u32,
    pub week_start: WeekStart,
    pub weeks: Vec<WeekRow>,
}

impl CalendarGrid {
    pub fn cells(&self) -> impl Iterator<Item = &DayCell> {
        self.weeks.iter().flatten()
    }

    #[must_use]
    pub fn day_cell(&self, day: u32) -> Option<&DayCell> {
        self.cells()
            .find(|cell| cell.date.is_some_and(|date| date.day() == day))
    }
}

/// Build the month grid: leading padding to the week-start column, one cell
/// per day with its overlap set and today marker, trailing padding to a
/// whole number of weeks. Stateless and idempotent for a fixed `today`.
///
/// An out-of-range month is a caller programming error and fails fast;
/// nothing is clamped.
#[tracing::instrument(skip(intervals, today))]
pub fn build(
    year: i32,
    month: u32,
    intervals: &[Interval],
    today: NaiveDate,
    week_start: WeekStart,
) -> Result<CalendarGrid, InvalidDateError> {
    let first = first_of_month(year, month)?;
    let day_count = days_in_month(year, month)?;

    let lead = (day_of_week(first) as i64 - week_start.offset() as i64).rem_euclid(7) as usize;

    let mut cells: Vec<DayCell> = Vec::with_capacity(lead + day_count as usize + 6);
    cells.extend(std::iter::repeat_with(DayCell::padding).take(lead));

    for day in 1..=day_count {
        let date = make_date(year, month, day)?;
        cells.push(DayCell {
            date: Some(date),
            is_today: date == today,
            overlaps: overlaps_for(date, intervals),
        });
    }

    while cells.len() % 7 != 0 {
        cells.push(DayCell::padding());
    }

    let weeks = cells.chunks(7).map(<[DayCell]>::to_vec).collect();

    Ok(CalendarGrid {
        year,
        month,
        week_start,
        weeks,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{WeekStart, build};
    use crate::datetime::{InvalidDateError, days_in_month};
    use crate::model::{Category, Interval};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
    }

    fn leave(label: &str, start: NaiveDate, end: NaiveDate) -> Interval {
        Interval::new(label.to_string(), start, end, Category::Vacation).expect("valid interval")
    }

    #[test]
    fn november_2025_grid_shape_and_overlaps() {
        let entries = vec![leave("x", date(2025, 11, 4), date(2025, 11, 8))];
        let today = date(2025, 11, 14);
        let grid = build(2025, 11, &entries, today, WeekStart::Sunday).expect("build grid");

        // November 2025 starts on a Saturday: six leading padding cells.
        let first_week = &grid.weeks[0];
        assert_eq!(first_week.len(), 7);
        assert!(first_week[..6].iter().all(|cell| cell.date.is_none()));
        assert_eq!(first_week[6].date, Some(date(2025, 11, 1)));

        for day in 4..=8 {
            let cell = grid.day_cell(day).expect("day cell");
            assert_eq!(cell.overlaps.len(), 1, "day {day} should carry the leave");
            assert_eq!(cell.overlaps[0].label, "x");
        }
        assert!(grid.day_cell(3).expect("day 3").overlaps.is_empty());
        assert!(grid.day_cell(9).expect("day 9").overlaps.is_empty());

        assert!(grid.day_cell(14).expect("today cell").is_today);
        assert!(!grid.day_cell(13).expect("other cell").is_today);
    }

    #[test]
    fn grid_is_always_whole_weeks() {
        let today = date(2025, 6, 15);
        for (year, month) in [(2025, 11), (2024, 2), (2023, 2), (2025, 8), (2026, 1)] {
            let grid = build(year, month, &[], today, WeekStart::Sunday).expect("build grid");
            let total: usize = grid.weeks.iter().map(Vec::len).sum();

            assert_eq!(total % 7, 0, "{year}-{month} not whole weeks");
            assert!(grid.weeks.iter().all(|week| week.len() == 7));

            let dated = grid.cells().filter(|cell| cell.date.is_some()).count();
            assert_eq!(dated, days_in_month(year, month).expect("month len") as usize);
        }
    }

    #[test]
    fn build_is_idempotent_for_fixed_today() {
        let entries = vec![leave("x", date(2025, 11, 4), date(2025, 11, 8))];
        let today = date(2025, 11, 14);

        let first = build(2025, 11, &entries, today, WeekStart::Sunday).expect("first build");
        let second = build(2025, 11, &entries, today, WeekStart::Sunday).expect("second build");
        assert_eq!(first, second);
    }

    #[test]
    fn monday_start_shifts_the_padding() {
        let today = date(2025, 11, 14);
        let grid = build(2025, 11, &[], today, WeekStart::Monday).expect("build grid");

        // Saturday is column 5 when weeks start on Monday.
        let first_week = &grid.weeks[0];
        assert!(first_week[..5].iter().all(|cell| cell.date.is_none()));
        assert_eq!(first_week[5].date, Some(date(2025, 11, 1)));
    }

    #[test]
    fn invalid_month_is_an_error_not_a_clamp() {
        let today = date(2025, 11, 14);
        assert_eq!(
            build(2025, 13, &[], today, WeekStart::Sunday).expect_err("month 13"),
            InvalidDateError::InvalidMonth { month: 13 }
        );
    }

    #[test]
    fn cross_month_interval_reaches_into_the_grid() {
        let entries = vec![leave("handover", date(2025, 10, 28), date(2025, 11, 2))];
        let today = date(2025, 11, 14);
        let grid = build(2025, 11, &entries, today, WeekStart::Sunday).expect("build grid");

        assert_eq!(grid.day_cell(1).expect("nov 1").overlaps.len(), 1);
        assert_eq!(grid.day_cell(2).expect("nov 2").overlaps.len(), 1);
        assert!(grid.day_cell(3).expect("nov 3").overlaps.is_empty());
    }
}
