use chrono::NaiveDate;
use crewcal_core::config::Config;
use crewcal_core::datastore::DataStore;
use crewcal_core::filter::Filter;
use crewcal_core::grid::{self, WeekStart};
use crewcal_core::model::{Category, Interval, Phase};
use crewcal_core::timeline::{self, LayoutOptions};
use tempfile::tempdir;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

#[test]
fn datastore_roundtrip_filtering_and_grid() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");

    let today = date(2025, 11, 14);
    let mut entry = Interval::new(
        "Alice in Lisbon".to_string(),
        date(2025, 11, 4),
        date(2025, 11, 8),
        Category::Vacation,
    )
    .expect("valid interval");
    entry.id = Some(store.next_leave_id(&[]));

    store
        .add_leave(vec![], entry)
        .expect("add leave should succeed");

    let leaves = store.load_leaves().expect("load leaves");
    assert_eq!(leaves.len(), 1);
    assert_eq!(leaves[0].id, Some(1));

    let filter =
        Filter::parse(&["category:vacation".to_string()], today).expect("parse filter");
    assert!(filter.matches_interval(&leaves[0]));

    let calendar = grid::build(2025, 11, &leaves, today, WeekStart::Sunday).expect("build grid");
    assert_eq!(calendar.day_cell(6).expect("nov 6").overlaps.len(), 1);
    assert!(calendar.day_cell(9).expect("nov 9").overlaps.is_empty());
}

#[test]
fn undo_restores_the_previous_snapshot() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");

    let before = store.snapshot().expect("empty snapshot");
    assert!(before.leaves.is_empty());

    let mut entry = Interval::new(
        "offsite".to_string(),
        date(2025, 12, 1),
        date(2025, 12, 3),
        Category::Other,
    )
    .expect("valid interval");
    entry.id = Some(store.next_leave_id(&[]));

    store.add_leave(vec![], entry).expect("add leave");
    store.push_undo_snapshot(&before).expect("push undo");
    assert_eq!(store.load_leaves().expect("load").len(), 1);

    let popped = store
        .pop_undo_snapshot()
        .expect("pop undo")
        .expect("one undo entry");
    store.save_leaves(&popped.leaves).expect("restore leaves");
    store.save_phases(&popped.phases).expect("restore phases");

    assert!(store.load_leaves().expect("reload").is_empty());
    assert!(store.pop_undo_snapshot().expect("pop again").is_none());
}

#[test]
fn config_file_and_rc_overrides_layer() {
    let temp = tempdir().expect("tempdir");
    let rc_path = temp.path().join("crewcalrc");
    std::fs::write(&rc_path, "week.start = monday\n# comment\ncolor = off\n").expect("write rc");

    let mut cfg = Config::load(Some(rc_path.as_path())).expect("load config");
    assert_eq!(cfg.get("week.start").as_deref(), Some("monday"));
    assert_eq!(cfg.get("color").as_deref(), Some("off"));
    assert_eq!(cfg.get("default.command").as_deref(), Some("calendar"));

    cfg.apply_overrides(vec![("rc.week.start".to_string(), "sunday".to_string())]);
    assert_eq!(cfg.get("week.start").as_deref(), Some("sunday"));
}

#[test]
fn phases_flow_from_store_into_the_timeline() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");

    let mut design = Phase::new(
        "design".to_string(),
        date(2025, 10, 14),
        date(2025, 10, 28),
        100,
    )
    .expect("valid phase");
    design.id = Some(store.next_phase_id(&[]));
    let phases = store.add_phase(vec![], design).expect("add phase");

    let mut rollout = Phase::new(
        "rollout".to_string(),
        date(2025, 12, 15),
        date(2025, 12, 22),
        0,
    )
    .expect("valid phase");
    rollout.id = Some(store.next_phase_id(&phases));
    store.add_phase(phases, rollout).expect("add phase");

    let stored = store.load_phases().expect("load phases");
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].id, Some(2));

    let layout = timeline::layout(&stored, LayoutOptions::default()).expect("layout");
    assert_eq!(layout.window_start, date(2025, 10, 11));
    assert_eq!(layout.window_end, date(2025, 12, 25));
    assert_eq!(layout.total_days, 75);
    assert_eq!(layout.bars.len(), 2);
}
