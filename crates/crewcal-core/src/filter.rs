use chrono::NaiveDate;
use tracing::trace;

use crate::datetime::{first_of_month, last_of_month, parse_date_expr, parse_month_expr};
use crate::model::{Category, Interval, Phase};

#[derive(Debug, Clone)]
pub enum Pred {
    Id(u64),
    Uuid(uuid::Uuid),
    CategoryEq(Category),
    /// Entry's range touches the given month.
    During { year: i32, month: u32 },
    /// Entry starts on or after the date.
    After(NaiveDate),
    /// Entry ends on or before the date.
    Before(NaiveDate),
    TextContains(String),
}

/// Whitespace-separated terms, implicitly ANDed: every extra term narrows
/// the selection. There is no or/parenthesis grammar.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    preds: Vec<Pred>,
}

impl Filter {
    #[tracing::instrument(skip(terms, today))]
    pub fn parse(terms: &[String], today: NaiveDate) -> anyhow::Result<Self> {
        let mut preds = Vec::with_capacity(terms.len());
        for term in terms {
            preds.push(parse_atom(term, today)?);
        }
        Ok(Self { preds })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.preds.is_empty()
    }

    #[must_use]
    pub fn matches_interval(&self, entry: &Interval) -> bool {
        let ok = self.preds.iter().all(|pred| {
            eval_pred(
                pred,
                entry.id,
                entry.uuid,
                Some(entry.category),
                &entry.label,
                entry.start_day,
                entry.end_day,
            )
        });
        trace!(id = ?entry.id, uuid = %entry.uuid, ok, "interval filter evaluation");
        ok
    }

    #[must_use]
    pub fn matches_phase(&self, entry: &Phase) -> bool {
        let ok = self.preds.iter().all(|pred| {
            eval_pred(
                pred,
                entry.id,
                entry.uuid,
                None,
                &entry.label,
                entry.start_date,
                entry.end_date,
            )
        });
        trace!(id = ?entry.id, uuid = %entry.uuid, ok, "phase filter evaluation");
        ok
    }
}

fn parse_atom(term: &str, today: NaiveDate) -> anyhow::Result<Pred> {
    if let Ok(id) = term.parse::<u64>() {
        return Ok(Pred::Id(id));
    }
    if let Ok(uuid) = uuid::Uuid::parse_str(term) {
        return Ok(Pred::Uuid(uuid));
    }

    if let Some(value) = term.strip_prefix("category:") {
        return Ok(Pred::CategoryEq(value.parse()?));
    }

    if let Some(value) = term.strip_prefix("during:") {
        let (year, month) = parse_month_expr(value, today)?;
        return Ok(Pred::During { year, month });
    }

    if let Some(value) = term.strip_prefix("after:") {
        return Ok(Pred::After(parse_date_expr(value, today)?));
    }

    if let Some(value) = term.strip_prefix("before:") {
        return Ok(Pred::Before(parse_date_expr(value, today)?));
    }

    Ok(Pred::TextContains(term.to_string()))
}

fn eval_pred(
    pred: &Pred,
    id: Option<u64>,
    uuid: uuid::Uuid,
    category: Option<Category>,
    label: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> bool {
    match pred {
        Pred::Id(wanted) => id == Some(*wanted),
        Pred::Uuid(wanted) => uuid == *wanted,
        Pred::CategoryEq(wanted) => category == Some(*wanted),
        Pred::During { year, month } => {
            match (first_of_month(*year, *month), last_of_month(*year, *month)) {
                (Ok(month_start), Ok(month_end)) => start <= month_end && end >= month_start,
                _ => false,
            }
        }
        Pred::After(date) => start >= *date,
        Pred::Before(date) => end <= *date,
        Pred::TextContains(text) => label
            .to_ascii_lowercase()
            .contains(&text.to_ascii_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::Filter;
    use crate::model::{Category, Interval, Phase};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
    }

    fn leave(label: &str, start: NaiveDate, end: NaiveDate, category: Category) -> Interval {
        Interval::new(label.to_string(), start, end, category).expect("valid interval")
    }

    fn parse(terms: &[&str], today: NaiveDate) -> Filter {
        let owned: Vec<String> = terms.iter().map(ToString::to_string).collect();
        Filter::parse(&owned, today).expect("parse filter")
    }

    #[test]
    fn empty_filter_matches_everything() {
        let today = date(2025, 11, 14);
        let entry = leave(
            "alice pto",
            date(2025, 11, 4),
            date(2025, 11, 8),
            Category::Vacation,
        );

        let filter = parse(&[], today);
        assert!(filter.is_empty());
        assert!(filter.matches_interval(&entry));
    }

    #[test]
    fn category_and_text_terms_narrow_together() {
        let today = date(2025, 11, 14);
        let vacation = leave(
            "alice pto",
            date(2025, 11, 4),
            date(2025, 11, 8),
            Category::Vacation,
        );
        let sick = leave(
            "alice out sick",
            date(2025, 11, 10),
            date(2025, 11, 11),
            Category::Sick,
        );

        let filter = parse(&["category:vacation", "alice"], today);
        assert!(filter.matches_interval(&vacation));
        assert!(!filter.matches_interval(&sick));

        let text_only = parse(&["ALICE"], today);
        assert!(text_only.matches_interval(&vacation));
        assert!(text_only.matches_interval(&sick));
    }

    #[test]
    fn during_matches_any_overlap_with_the_month() {
        let today = date(2025, 11, 14);
        let spanning = leave(
            "handover",
            date(2025, 10, 28),
            date(2025, 11, 2),
            Category::Other,
        );
        let elsewhere = leave(
            "summer",
            date(2025, 7, 1),
            date(2025, 7, 14),
            Category::Vacation,
        );

        let filter = parse(&["during:2025-11"], today);
        assert!(filter.matches_interval(&spanning));
        assert!(!filter.matches_interval(&elsewhere));
    }

    #[test]
    fn id_selector_matches_assigned_display_id() {
        let today = date(2025, 11, 14);
        let mut entry = leave(
            "alice pto",
            date(2025, 11, 4),
            date(2025, 11, 8),
            Category::Vacation,
        );
        entry.id = Some(3);

        assert!(parse(&["3"], today).matches_interval(&entry));
        assert!(!parse(&["4"], today).matches_interval(&entry));
    }

    #[test]
    fn after_and_before_bound_the_range() {
        let today = date(2025, 11, 14);
        let entry = leave(
            "alice pto",
            date(2025, 11, 4),
            date(2025, 11, 8),
            Category::Vacation,
        );

        assert!(parse(&["after:2025-11-01"], today).matches_interval(&entry));
        assert!(!parse(&["after:2025-11-05"], today).matches_interval(&entry));
        assert!(parse(&["before:2025-11-08"], today).matches_interval(&entry));
        assert!(!parse(&["before:2025-11-07"], today).matches_interval(&entry));
    }

    #[test]
    fn phases_ignore_category_terms() {
        let today = date(2025, 11, 14);
        let phase = Phase::new(
            "rollout".to_string(),
            date(2025, 12, 15),
            date(2025, 12, 22),
            0,
        )
        .expect("valid phase");

        assert!(parse(&["rollout"], today).matches_phase(&phase));
        assert!(!parse(&["category:vacation"], today).matches_phase(&phase));
        assert!(parse(&["during:2025-12"], today).matches_phase(&phase));
    }
}
