use crate::events::EventEnvelope;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use keel_core::types::PackageState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Package status derived from the journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageStatus {
    pub package_name: String,
    pub current_state: PackageState,
    pub last_event_time: DateTime<Utc>,
    pub last_event_id: String,
}

/// Filter criteria for querying the journal
#[derive(Debug, Default)]
pub struct EventFilter {
    /// Filter by package name
    pub package_name: Option<String>,
    /// Filter by event type names (e.g., "deploy_started", "not_ready")
    pub event_types: Option<Vec<String>>,
    /// Only events at or after this timestamp
    pub since: Option<DateTime<Utc>>,
    /// Keep only the most recent N matches
    pub limit: Option<usize>,
}

/// Append-only JSON-lines journal of deployment events
#[derive(Debug, Clone)]
pub struct DeploymentLedger {
    ledger_path: PathBuf,
}

impl DeploymentLedger {
    pub fn new(ledger_path: impl Into<PathBuf>) -> Self {
        Self {
            ledger_path: ledger_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.ledger_path
    }

    /// Append event to the journal (file-locked)
    pub fn append(&self, event: &EventEnvelope) -> Result<()> {
        if let Some(parent) = self.ledger_path.parent() {
            fs::create_dir_all(parent).context("Failed to create ledger parent directory")?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.ledger_path)
            .context("Failed to open ledger file")?;

        // Released on drop
        file.lock_exclusive()
            .context("Failed to acquire exclusive lock on ledger")?;

        let json_line = serde_json::to_string(event).context("Failed to serialize event")?;
        writeln!(file, "{}", json_line).context("Failed to write event to ledger")?;
        file.sync_all().context("Failed to sync ledger file")?;

        Ok(())
    }

    fn read_all(&self) -> Result<Vec<EventEnvelope>> {
        if !self.ledger_path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.ledger_path).context("Failed to open ledger file")?;
        let reader = BufReader::new(file);

        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line.context("Failed to read line from ledger")?;
            if line.trim().is_empty() {
                continue;
            }
            let envelope: EventEnvelope =
                serde_json::from_str(&line).context("Failed to deserialize event from ledger")?;
            events.push(envelope);
        }
        Ok(events)
    }

    /// Matching events in chronological order
    pub fn history(&self, filter: &EventFilter) -> Result<Vec<EventEnvelope>> {
        let mut events: Vec<EventEnvelope> = self
            .read_all()?
            .into_iter()
            .filter(|e| {
                filter
                    .package_name
                    .as_ref()
                    .is_none_or(|name| e.package_name == *name)
            })
            .filter(|e| {
                filter
                    .event_types
                    .as_ref()
                    .is_none_or(|types| types.iter().any(|t| t == e.event.type_name()))
            })
            .filter(|e| filter.since.is_none_or(|since| e.timestamp >= since))
            .collect();

        if let Some(limit) = filter.limit {
            if events.len() > limit {
                events = events.split_off(events.len() - limit);
            }
        }

        Ok(events)
    }

    /// Latest state of every package mentioned in the journal
    pub fn latest_states(&self) -> Result<HashMap<String, PackageStatus>> {
        let mut status_map: HashMap<String, PackageStatus> = HashMap::new();

        for envelope in self.read_all()? {
            status_map
                .entry(envelope.package_name.clone())
                .and_modify(|status| {
                    // Later lines win ties
                    if envelope.timestamp >= status.last_event_time {
                        status.current_state = envelope.state_after;
                        status.last_event_time = envelope.timestamp;
                        status.last_event_id = envelope.event_id.clone();
                    }
                })
                .or_insert_with(|| PackageStatus {
                    package_name: envelope.package_name.clone(),
                    current_state: envelope.state_after,
                    last_event_time: envelope.timestamp,
                    last_event_id: envelope.event_id.clone(),
                });
        }

        Ok(status_map)
    }
}
