use std::io::{self, Read};

use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::{self, InvalidDateError, parse_date_expr, parse_month_expr};
use crate::filter::Filter;
use crate::grid::{self, WeekStart};
use crate::model::{Category, Interval, Phase, Snapshot};
use crate::render::Renderer;
use crate::timeline::{self, LayoutOptions};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "phase",
        "list",
        "phases",
        "calendar",
        "cal",
        "timeline",
        "delete",
        "undo",
        "import",
        "export",
        "_commands",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let today = datetime::today();
    let command = inv.command.as_str();

    debug!(
        command,
        filter = ?inv.filter_terms,
        args = ?inv.command_args,
        %today,
        "dispatching command"
    );

    match command {
        "add" => cmd_add(store, &inv.command_args, today),
        "phase" => cmd_phase(store, &inv.command_args, today),
        "list" => cmd_list(store, renderer, &inv.filter_terms, today),
        "phases" => cmd_phases(store, renderer, &inv.filter_terms, today),
        "calendar" | "cal" => cmd_calendar(
            store,
            cfg,
            renderer,
            &inv.filter_terms,
            &inv.command_args,
            today,
        ),
        "timeline" => cmd_timeline(store, cfg, renderer, &inv.filter_terms, today),
        "delete" => cmd_delete(store, &inv.filter_terms, today),
        "undo" => cmd_undo(store),
        "import" => cmd_import(store),
        "export" => cmd_export(store, &inv.filter_terms, today),
        "_commands" => cmd_commands(),
        "_show" => cmd_show(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(store, args, today))]
fn cmd_add(store: &mut DataStore, args: &[String], today: NaiveDate) -> anyhow::Result<()> {
    info!("command add");

    let leaves = store.load_leaves()?;
    let phases = store.load_phases()?;
    let before = Snapshot {
        leaves: leaves.clone(),
        phases,
    };

    let next_id = store.next_leave_id(&leaves);
    let (label, mods) = parse_label_and_mods(args, today)?;

    let mut start = None;
    let mut end = None;
    let mut category = Category::Vacation;
    for one_mod in mods {
        match one_mod {
            Mod::Start(date) => start = Some(date),
            Mod::End(date) => end = Some(date),
            Mod::Category(value) => category = value,
            Mod::Progress(_) => {
                return Err(anyhow!("progress: only applies to phases"));
            }
        }
    }

    let start = start.ok_or_else(|| anyhow!("add requires start:<date>"))?;
    let end = end.unwrap_or(start);

    let mut entry = Interval::new(label, start, end, category)?;
    entry.id = Some(next_id);

    let leaves = store.add_leave(leaves, entry)?;
    store.push_undo_snapshot(&before)?;

    debug!(leave_count = leaves.len(), "leave entry added");
    println!("Created leave entry {next_id}.");
    Ok(())
}

#[instrument(skip(store, args, today))]
fn cmd_phase(store: &mut DataStore, args: &[String], today: NaiveDate) -> anyhow::Result<()> {
    info!("command phase");

    let leaves = store.load_leaves()?;
    let phases = store.load_phases()?;
    let before = Snapshot {
        leaves,
        phases: phases.clone(),
    };

    let next_id = store.next_phase_id(&phases);
    let (label, mods) = parse_label_and_mods(args, today)?;

    let mut start = None;
    let mut end = None;
    let mut progress = 0_u8;
    for one_mod in mods {
        match one_mod {
            Mod::Start(date) => start = Some(date),
            Mod::End(date) => end = Some(date),
            Mod::Progress(pct) => progress = pct,
            Mod::Category(_) => {
                return Err(anyhow!("category: only applies to leave entries"));
            }
        }
    }

    let start = start.ok_or_else(|| anyhow!("phase requires start:<date>"))?;
    let end = end.unwrap_or(start);

    let mut entry = Phase::new(label, start, end, progress)?;
    entry.id = Some(next_id);

    let phases = store.add_phase(phases, entry)?;
    store.push_undo_snapshot(&before)?;

    debug!(phase_count = phases.len(), "phase added");
    println!("Created phase {next_id}.");
    Ok(())
}

#[instrument(skip(store, renderer, filter_terms, today))]
fn cmd_list(
    store: &mut DataStore,
    renderer: &mut Renderer,
    filter_terms: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command list");

    let filter = Filter::parse(filter_terms, today)?;
    let mut rows: Vec<Interval> = store
        .load_leaves()?
        .into_iter()
        .filter(|entry| filter.matches_interval(entry))
        .collect();

    rows.sort_by_key(|entry| (entry.start_day, entry.id));
    renderer.print_interval_table(&rows)?;
    Ok(())
}

#[instrument(skip(store, renderer, filter_terms, today))]
fn cmd_phases(
    store: &mut DataStore,
    renderer: &mut Renderer,
    filter_terms: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command phases");

    let filter = Filter::parse(filter_terms, today)?;
    let mut rows: Vec<Phase> = store
        .load_phases()?
        .into_iter()
        .filter(|entry| filter.matches_phase(entry))
        .collect();

    rows.sort_by_key(|entry| (entry.start_date, entry.id));
    renderer.print_phase_table(&rows)?;
    Ok(())
}

#[instrument(skip(store, cfg, renderer, filter_terms, args, today))]
fn cmd_calendar(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    filter_terms: &[String],
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command calendar");

    let (year, month) = match args.first() {
        Some(expr) => parse_month_expr(expr, today)?,
        None => (today.year(), today.month()),
    };

    let week_start: WeekStart = cfg
        .get("week.start")
        .map(|raw| raw.parse())
        .transpose()?
        .unwrap_or_default();

    let filter = Filter::parse(filter_terms, today)?;
    let leaves: Vec<Interval> = store
        .load_leaves()?
        .into_iter()
        .filter(|entry| filter.matches_interval(entry))
        .collect();

    let calendar = grid::build(year, month, &leaves, today, week_start)?;
    renderer.print_calendar(&calendar)?;
    Ok(())
}

#[instrument(skip(store, cfg, renderer, filter_terms, today))]
fn cmd_timeline(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    filter_terms: &[String],
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command timeline");

    let filter = Filter::parse(filter_terms, today)?;
    let mut rows: Vec<Phase> = store
        .load_phases()?
        .into_iter()
        .filter(|entry| filter.matches_phase(entry))
        .collect();
    rows.sort_by_key(|entry| (entry.start_date, entry.id));

    if rows.is_empty() {
        println!("No phases to lay out.");
        return Ok(());
    }

    let opts = LayoutOptions {
        padding_days: cfg.get_i64("timeline.padding.days").unwrap_or(3),
        min_width_pct: cfg.get_f64("timeline.minwidth.pct").unwrap_or(2.0),
    };
    let layout = timeline::layout(&rows, opts)?;

    let width = cfg.get_i64("timeline.width").unwrap_or(60).clamp(20, 200) as usize;
    renderer.print_timeline(&layout, width)?;
    Ok(())
}

#[instrument(skip(store, filter_terms, today))]
fn cmd_delete(store: &mut DataStore, filter_terms: &[String], today: NaiveDate) -> anyhow::Result<()> {
    info!("command delete");

    let filter = Filter::parse(filter_terms, today)?;
    if filter.is_empty() {
        return Err(anyhow!("delete requires a filter"));
    }

    let leaves = store.load_leaves()?;
    let phases = store.load_phases()?;
    let before = Snapshot {
        leaves: leaves.clone(),
        phases: phases.clone(),
    };

    let kept_leaves: Vec<Interval> = leaves
        .into_iter()
        .filter(|entry| !filter.matches_interval(entry))
        .collect();
    let kept_phases: Vec<Phase> = phases
        .into_iter()
        .filter(|entry| !filter.matches_phase(entry))
        .collect();

    let removed = (before.leaves.len() - kept_leaves.len()) as u64
        + (before.phases.len() - kept_phases.len()) as u64;

    if removed > 0 {
        store.push_undo_snapshot(&before)?;
        store.save_leaves(&kept_leaves)?;
        store.save_phases(&kept_phases)?;
    }

    println!("Deleted {removed} record(s).");
    Ok(())
}

#[instrument(skip(store))]
fn cmd_undo(store: &mut DataStore) -> anyhow::Result<()> {
    info!("command undo");

    let Some(snapshot) = store.pop_undo_snapshot()? else {
        println!("No undo transactions available.");
        return Ok(());
    };

    store.save_leaves(&snapshot.leaves)?;
    store.save_phases(&snapshot.phases)?;

    println!("Undo completed.");
    Ok(())
}

#[instrument(skip(store))]
fn cmd_import(store: &mut DataStore) -> anyhow::Result<()> {
    info!("command import");

    let mut stdin = String::new();
    io::stdin()
        .read_to_string(&mut stdin)
        .context("failed reading stdin")?;

    let trimmed = stdin.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("import: empty input"));
    }

    // A bare JSON array is taken as leave entries; otherwise a snapshot
    // object with "leaves" and "phases" keys.
    let incoming: Snapshot = if trimmed.starts_with('[') {
        Snapshot {
            leaves: serde_json::from_str(trimmed)
                .context("failed parsing JSON array of leave entries")?,
            phases: vec![],
        }
    } else {
        serde_json::from_str(trimmed).context("failed parsing snapshot JSON")?
    };

    for entry in &incoming.leaves {
        if entry.start_day > entry.end_day {
            return Err(InvalidDateError::EmptyRange {
                start: entry.start_day,
                end: entry.end_day,
            }
            .into());
        }
    }
    for entry in &incoming.phases {
        if entry.start_date > entry.end_date {
            return Err(InvalidDateError::EmptyRange {
                start: entry.start_date,
                end: entry.end_date,
            }
            .into());
        }
        if entry.progress_pct > 100 {
            return Err(InvalidDateError::InvalidProgress {
                pct: entry.progress_pct,
            }
            .into());
        }
    }

    let mut leaves = store.load_leaves()?;
    let mut phases = store.load_phases()?;
    let before = Snapshot {
        leaves: leaves.clone(),
        phases: phases.clone(),
    };

    let mut adds = 0_u64;
    let mut mods = 0_u64;

    for mut entry in incoming.leaves {
        if let Some(existing) = leaves.iter_mut().find(|row| row.uuid == entry.uuid) {
            entry.id = existing.id;
            *existing = entry;
            mods += 1;
        } else {
            entry.id = Some(store.next_leave_id(&leaves));
            leaves.push(entry);
            adds += 1;
        }
    }

    for mut entry in incoming.phases {
        if let Some(existing) = phases.iter_mut().find(|row| row.uuid == entry.uuid) {
            entry.id = existing.id;
            *existing = entry;
            mods += 1;
        } else {
            entry.id = Some(store.next_phase_id(&phases));
            phases.push(entry);
            adds += 1;
        }
    }

    leaves.sort_by_key(|entry| entry.id.unwrap_or(u64::MAX));
    phases.sort_by_key(|entry| entry.id.unwrap_or(u64::MAX));

    let imported = adds + mods;
    if imported > 0 {
        store.push_undo_snapshot(&before)?;
        store.save_leaves(&leaves)?;
        store.save_phases(&phases)?;
    }

    println!("Imported {imported} record(s).");
    Ok(())
}

#[instrument(skip(store, filter_terms, today))]
fn cmd_export(store: &mut DataStore, filter_terms: &[String], today: NaiveDate) -> anyhow::Result<()> {
    info!("command export");

    let filter = Filter::parse(filter_terms, today)?;
    let snapshot = Snapshot {
        leaves: store
            .load_leaves()?
            .into_iter()
            .filter(|entry| filter.matches_interval(entry))
            .collect(),
        phases: store
            .load_phases()?
            .into_iter()
            .filter(|entry| filter.matches_phase(entry))
            .collect(),
    };

    let out = serde_json::to_string(&snapshot)?;
    println!("{out}");
    Ok(())
}

fn cmd_commands() -> anyhow::Result<()> {
    for command in known_command_names() {
        println!("{command}");
    }
    Ok(())
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        println!("{k}={v}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Implemented commands: add, phase, list, phases, calendar/cal, timeline, delete, undo, import, export. Filters go before the command (e.g. `crewcal category:sick list`); add/phase take start:<date>, end:<date>, category:<name> or progress:<pct> modifiers after the command."
    );
    Ok(())
}

#[derive(Debug, Clone)]
enum Mod {
    Start(NaiveDate),
    End(NaiveDate),
    Category(Category),
    Progress(u8),
}

#[instrument(skip(args, today))]
fn parse_label_and_mods(args: &[String], today: NaiveDate) -> anyhow::Result<(String, Vec<Mod>)> {
    let mut label_parts = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg, today)? {
            mods.push(one_mod);
            continue;
        }

        label_parts.push(arg.clone());
    }

    if label_parts.is_empty() {
        return Err(anyhow!("add/phase: label is required"));
    }

    Ok((label_parts.join(" "), mods))
}

fn parse_one_mod(tok: &str, today: NaiveDate) -> anyhow::Result<Option<Mod>> {
    let (key, value) = if let Some((k, v)) = tok.split_once(':') {
        (k, v)
    } else if let Some((k, v)) = tok.split_once('=') {
        (k, v)
    } else {
        return Ok(None);
    };

    let key = key.to_ascii_lowercase();

    match key.as_str() {
        "start" => Ok(Some(Mod::Start(parse_date_expr(value, today)?))),
        "end" => Ok(Some(Mod::End(parse_date_expr(value, today)?))),
        "category" | "cat" => Ok(Some(Mod::Category(value.parse()?))),
        "progress" | "pct" => {
            let pct: u8 = value
                .parse()
                .with_context(|| format!("invalid progress value: {value}"))?;
            Ok(Some(Mod::Progress(pct)))
        }
        _ => Ok(None),
    }
}
