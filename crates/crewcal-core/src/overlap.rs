use chrono::NaiveDate;

use crate::datetime::{InvalidDateError, first_of_month, last_of_month};
use crate::model::Interval;

/// All intervals covering `day`, in input order. A linear scan is the point:
/// a month of leave data is tens of entries, not thousands. Pre-sorting and
/// sweeping would pay off at larger n but is not needed for the observed
/// sizes.
///
/// The scan is clipping-safe: an interval that starts before or ends after
/// the month being rendered still matches every day it actually covers.
#[must_use]
pub fn overlaps_for(day: NaiveDate, intervals: &[Interval]) -> Vec<Interval> {
    intervals
        .iter()
        .filter(|interval| interval.covers(day))
        .cloned()
        .collect()
}

/// Truncate an interval to one month's window, for callers that want the
/// display convention of cutting bars at the month edge. `None` when the
/// interval does not touch the month at all. The index itself never clips.
pub fn clip_to_month(
    interval: &Interval,
    year: i32,
    month: u32,
) -> Result<Option<Interval>, InvalidDateError> {
    let month_start = first_of_month(year, month)?;
    let month_end = last_of_month(year, month)?;

    if interval.end_day < month_start || interval.start_day > month_end {
        return Ok(None);
    }

    let mut clipped = interval.clone();
    clipped.start_day = clipped.start_day.max(month_start);
    clipped.end_day = clipped.end_day.min(month_end);
    Ok(Some(clipped))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{clip_to_month, overlaps_for};
    use crate::model::{Category, Interval};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
    }

    fn leave(label: &str, start: NaiveDate, end: NaiveDate) -> Interval {
        Interval::new(label.to_string(), start, end, Category::Vacation).expect("valid interval")
    }

    #[test]
    fn closed_range_membership() {
        let entries = vec![leave("x", date(2025, 11, 5), date(2025, 11, 8))];

        for day in 5..=8 {
            assert_eq!(overlaps_for(date(2025, 11, day), &entries).len(), 1);
        }
        assert!(overlaps_for(date(2025, 11, 4), &entries).is_empty());
        assert!(overlaps_for(date(2025, 11, 9), &entries).is_empty());
    }

    #[test]
    fn same_day_entries_keep_input_order() {
        let entries = vec![
            leave("second-in-file", date(2025, 11, 3), date(2025, 11, 10)),
            leave("first-by-date", date(2025, 11, 1), date(2025, 11, 5)),
        ];

        let hits = overlaps_for(date(2025, 11, 4), &entries);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].label, "second-in-file");
        assert_eq!(hits[1].label, "first-by-date");
    }

    #[test]
    fn intervals_spanning_out_of_the_month_still_match() {
        let entries = vec![leave("handover", date(2025, 10, 28), date(2025, 11, 2))];

        assert_eq!(overlaps_for(date(2025, 11, 1), &entries).len(), 1);
        assert_eq!(overlaps_for(date(2025, 11, 2), &entries).len(), 1);
        assert!(overlaps_for(date(2025, 11, 3), &entries).is_empty());
    }

    #[test]
    fn clip_truncates_at_month_edges() {
        let spanning = leave("handover", date(2025, 10, 28), date(2025, 11, 2));

        let clipped = clip_to_month(&spanning, 2025, 11)
            .expect("valid month")
            .expect("overlaps november");
        assert_eq!(clipped.start_day, date(2025, 11, 1));
        assert_eq!(clipped.end_day, date(2025, 11, 2));

        assert!(
            clip_to_month(&spanning, 2025, 12)
                .expect("valid month")
                .is_none()
        );
    }
}
