use chrono::NaiveDate;
use thiserror::Error;

use crate::datetime::{add_days, days_between, first_monday_on_or_after};
use crate::model::Phase;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    #[error("no phases to lay out")]
    EmptyTimeline,
    #[error("degenerate timeline window: {total_days} day(s)")]
    DegenerateWindow { total_days: i64 },
}

#[derive(Debug, Clone, Copy)]
pub struct LayoutOptions {
    pub padding_days: i64,
    /// Floor for bar widths so one-day phases stay visible. A deliberate
    /// display-fidelity trade-off: `left_pct + width_pct` may exceed 100
    /// because of it, and callers clip visually rather than treating that
    /// as a data error.
    pub min_width_pct: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            padding_days: 3,
            min_width_pct: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseBar {
    pub phase: Phase,
    pub left_pct: f64,
    pub width_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekTick {
    pub date: NaiveDate,
    pub label: String,
    pub offset_pct: f64,
}

/// Derived, never stored: recomputed from the phase list on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineLayout {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub total_days: i64,
    pub bars: Vec<PhaseBar>,
    pub ticks: Vec<WeekTick>,
}

/// Map phases onto a percentage axis: the window is the padded hull of all
/// phase ranges, each bar's offset and width are proportional day counts,
/// and week ticks run Monday-aligned across the window.
#[tracing::instrument(skip(phases))]
pub fn layout(phases: &[Phase], opts: LayoutOptions) -> Result<TimelineLayout, TimelineError> {
    let Some(earliest) = phases.iter().map(|phase| phase.start_date).min() else {
        return Err(TimelineError::EmptyTimeline);
    };
    let latest = phases
        .iter()
        .map(|phase| phase.end_date)
        .max()
        .unwrap_or(earliest);

    let window_start = add_days(earliest, -opts.padding_days);
    let window_end = add_days(latest, opts.padding_days);
    let total_days = days_between(window_start, window_end);
    if total_days <= 0 {
        return Err(TimelineError::DegenerateWindow { total_days });
    }
    let total = total_days as f64;

    let bars = phases
        .iter()
        .map(|phase| {
            let left_pct = days_between(window_start, phase.start_date) as f64 / total * 100.0;
            let width_pct = (days_between(phase.start_date, phase.end_date) as f64 / total
                * 100.0)
                .max(opts.min_width_pct);
            PhaseBar {
                phase: phase.clone(),
                left_pct,
                width_pct,
            }
        })
        .collect();

    let mut ticks = Vec::new();
    let mut tick = first_monday_on_or_after(window_start);
    while tick <= window_end {
        ticks.push(WeekTick {
            date: tick,
            label: tick.format("%b %-d").to_string(),
            offset_pct: days_between(window_start, tick) as f64 / total * 100.0,
        });
        tick = add_days(tick, 7);
    }

    Ok(TimelineLayout {
        window_start,
        window_end,
        total_days,
        bars,
        ticks,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{LayoutOptions, TimelineError, layout};
    use crate::model::Phase;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
    }

    fn phase(label: &str, start: NaiveDate, end: NaiveDate, progress: u8) -> Phase {
        Phase::new(label.to_string(), start, end, progress).expect("valid phase")
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn two_phase_window_and_proportions() {
        let phases = vec![
            phase("design", date(2025, 10, 14), date(2025, 10, 28), 100),
            phase("rollout", date(2025, 12, 15), date(2025, 12, 22), 0),
        ];

        let out = layout(&phases, LayoutOptions::default()).expect("layout");
        assert_eq!(out.window_start, date(2025, 10, 11));
        assert_eq!(out.window_end, date(2025, 12, 25));
        assert_eq!(out.total_days, 75);

        assert_close(out.bars[0].left_pct, 3.0 / 75.0 * 100.0);
        assert_close(out.bars[0].width_pct, 14.0 / 75.0 * 100.0);
        assert!((out.bars[0].left_pct - 4.0).abs() < 1e-9);
        assert!((out.bars[0].width_pct - 18.7).abs() < 0.05);
    }

    #[test]
    fn week_ticks_are_monday_aligned() {
        let phases = vec![
            phase("design", date(2025, 10, 14), date(2025, 10, 28), 100),
            phase("rollout", date(2025, 12, 15), date(2025, 12, 22), 0),
        ];

        let out = layout(&phases, LayoutOptions::default()).expect("layout");
        // Window opens Saturday 2025-10-11; first Monday is the 13th.
        assert_eq!(out.ticks[0].date, date(2025, 10, 13));
        assert_eq!(out.ticks[0].label, "Oct 13");
        assert_close(out.ticks[0].offset_pct, 2.0 / 75.0 * 100.0);

        let last = out.ticks.last().expect("at least one tick");
        assert_eq!(last.date, date(2025, 12, 22));
        assert_eq!(out.ticks.len(), 11);
        for pair in out.ticks.windows(2) {
            assert_eq!(
                crate::datetime::days_between(pair[0].date, pair[1].date),
                7
            );
        }
    }

    #[test]
    fn zero_length_phase_gets_the_minimum_width() {
        let phases = vec![
            phase("kickoff", date(2025, 11, 3), date(2025, 11, 3), 100),
            phase("build", date(2025, 11, 3), date(2025, 12, 1), 40),
        ];

        let out = layout(&phases, LayoutOptions::default()).expect("layout");
        assert_close(out.bars[0].width_pct, 2.0);
        assert!(out.bars[1].width_pct > 2.0);
    }

    #[test]
    fn degenerate_window_is_rejected_not_divided() {
        let phases = vec![phase("kickoff", date(2025, 11, 3), date(2025, 11, 3), 0)];
        let opts = LayoutOptions {
            padding_days: 0,
            ..LayoutOptions::default()
        };

        assert_eq!(
            layout(&phases, opts).expect_err("zero-day window"),
            TimelineError::DegenerateWindow { total_days: 0 }
        );
    }

    #[test]
    fn empty_phase_list_is_its_own_error() {
        assert_eq!(
            layout(&[], LayoutOptions::default()).expect_err("no phases"),
            TimelineError::EmptyTimeline
        );
    }

    #[test]
    fn layout_is_pure_and_repeatable() {
        let phases = vec![
            phase("design", date(2025, 10, 14), date(2025, 10, 28), 100),
            phase("rollout", date(2025, 12, 15), date(2025, 12, 22), 0),
        ];

        let first = layout(&phases, LayoutOptions::default()).expect("first");
        let second = layout(&phases, LayoutOptions::default()).expect("second");
        assert_eq!(first, second);
    }
}
