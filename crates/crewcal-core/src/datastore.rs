use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::model::{Interval, Phase, Snapshot};

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub leaves_path: PathBuf,
    pub phases_path: PathBuf,
    pub undo_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let leaves_path = data_dir.join("leaves.data");
        let phases_path = data_dir.join("phases.data");
        let undo_path = data_dir.join("undo.data");

        if !leaves_path.exists() {
            fs::write(&leaves_path, "")?;
        }
        if !phases_path.exists() {
            fs::write(&phases_path, "")?;
        }
        if !undo_path.exists() {
            fs::write(&undo_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            leaves = %leaves_path.display(),
            phases = %phases_path.display(),
            undo = %undo_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            leaves_path,
            phases_path,
            undo_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_leaves(&self) -> anyhow::Result<Vec<Interval>> {
        load_jsonl(&self.leaves_path).context("failed to load leaves.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_phases(&self) -> anyhow::Result<Vec<Phase>> {
        load_jsonl(&self.phases_path).context("failed to load phases.data")
    }

    #[tracing::instrument(skip(self, leaves))]
    pub fn save_leaves(&self, leaves: &[Interval]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.leaves_path, leaves).context("failed to save leaves.data")
    }

    #[tracing::instrument(skip(self, phases))]
    pub fn save_phases(&self, phases: &[Phase]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.phases_path, phases).context("failed to save phases.data")
    }

    pub fn next_leave_id(&self, leaves: &[Interval]) -> u64 {
        leaves.iter().filter_map(|entry| entry.id).max().unwrap_or(0) + 1
    }

    pub fn next_phase_id(&self, phases: &[Phase]) -> u64 {
        phases.iter().filter_map(|entry| entry.id).max().unwrap_or(0) + 1
    }

    #[tracing::instrument(skip(self, leaves, entry), fields(id = ?entry.id, uuid = %entry.uuid))]
    pub fn add_leave(
        &self,
        mut leaves: Vec<Interval>,
        entry: Interval,
    ) -> anyhow::Result<Vec<Interval>> {
        leaves.push(entry);
        leaves.sort_by_key(|entry| entry.id.unwrap_or(u64::MAX));
        self.save_leaves(&leaves)?;
        Ok(leaves)
    }

    #[tracing::instrument(skip(self, phases, entry), fields(id = ?entry.id, uuid = %entry.uuid))]
    pub fn add_phase(&self, mut phases: Vec<Phase>, entry: Phase) -> anyhow::Result<Vec<Phase>> {
        phases.push(entry);
        phases.sort_by_key(|entry| entry.id.unwrap_or(u64::MAX));
        self.save_phases(&phases)?;
        Ok(phases)
    }

    #[tracing::instrument(skip(self, snapshot))]
    pub fn push_undo_snapshot(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let mut entries: Vec<Snapshot> =
            load_jsonl(&self.undo_path).context("failed to load undo.data")?;
        entries.push(snapshot.clone());
        save_jsonl_atomic(&self.undo_path, &entries).context("failed to save undo.data")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn snapshot(&self) -> anyhow::Result<Snapshot> {
        Ok(Snapshot {
            leaves: self.load_leaves()?,
            phases: self.load_phases()?,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn pop_undo_snapshot(&self) -> anyhow::Result<Option<Snapshot>> {
        let mut entries: Vec<Snapshot> =
            load_jsonl(&self.undo_path).context("failed to load undo.data")?;
        let Some(entry) = entries.pop() else {
            return Ok(None);
        };
        save_jsonl_atomic(&self.undo_path, &entries).context("failed to save undo.data")?;
        Ok(Some(entry))
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let row: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(row);
    }

    debug!(count = out.len(), "loaded rows from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, rows))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, rows: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = rows.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for row in rows {
        let serialized = serde_json::to_string(row)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
