//! Append-only run log with file-based persistence.
//!
//! Each run gets `<runs_dir>/<run_id>/` holding `events.jsonl` (one progress
//! event per line, in emission order) and, once the run completes,
//! `article.json` plus `article.md` with the finished content.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::domain::{CompletePayload, ProgressEvent};

/// A progress event as recorded on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub timestamp: DateTime<Utc>,
    pub event: ProgressEvent,
}

/// File-based log for one run
pub struct RunLog {
    run_id: Uuid,
    run_dir: PathBuf,
    events_path: PathBuf,
}

impl RunLog {
    /// Create or open the log of a run
    pub async fn open(runs_dir: &Path, run_id: Uuid) -> Result<Self> {
        let run_dir = runs_dir.join(run_id.to_string());

        fs::create_dir_all(&run_dir)
            .await
            .with_context(|| format!("Failed to create run directory: {}", run_dir.display()))?;

        Ok(Self {
            run_id,
            events_path: run_dir.join("events.jsonl"),
            run_dir,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    /// Append an event to the log
    pub async fn append(&self, event: &ProgressEvent) -> Result<()> {
        let record = RecordedEvent {
            timestamp: Utc::now(),
            event: event.clone(),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)
            .await
            .with_context(|| {
                format!("Failed to open events file: {}", self.events_path.display())
            })?;

        let json = serde_json::to_string(&record).context("Failed to serialize event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event")?;

        Ok(())
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<RecordedEvent>> {
        if !self.events_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.events_path)
            .await
            .with_context(|| format!("Failed to open events file: {}", self.events_path.display()))?;

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let record: RecordedEvent = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse event: {}", line))?;
            events.push(record);
        }

        Ok(events)
    }

    /// Last terminal event, if the run has finished
    pub async fn outcome(&self) -> Result<Option<ProgressEvent>> {
        let events = self.replay().await?;
        Ok(events
            .into_iter()
            .rev()
            .map(|r| r.event)
            .find(ProgressEvent::is_terminal))
    }

    /// Hand the finished article over to durable storage
    pub async fn store_output(&self, payload: &CompletePayload) -> Result<PathBuf> {
        let json_path = self.run_dir.join("article.json");
        let json = serde_json::to_string_pretty(payload).context("Failed to serialize article")?;
        fs::write(&json_path, json)
            .await
            .with_context(|| format!("Failed to write article: {}", json_path.display()))?;

        let md_path = self.run_dir.join("article.md");
        let markdown = format!(
            "# {}\n\n> {}\n\n{}\n",
            payload.content.title, payload.content.summary, payload.content.content_with_images
        );
        fs::write(&md_path, markdown)
            .await
            .with_context(|| format!("Failed to write article: {}", md_path.display()))?;

        Ok(json_path)
    }

    /// Load the stored article, if the run completed
    pub async fn load_output(&self) -> Result<Option<CompletePayload>> {
        let json_path = self.run_dir.join("article.json");
        if !json_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&json_path)
            .await
            .with_context(|| format!("Failed to read article: {}", json_path.display()))?;
        let payload = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse article: {}", json_path.display()))?;

        Ok(Some(payload))
    }

    /// List all run IDs under a runs directory
    pub async fn list_runs(runs_dir: &Path) -> Result<Vec<Uuid>> {
        if !runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        let mut entries = fs::read_dir(runs_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Ok(uuid) = Uuid::parse_str(name) {
                        runs.push(uuid);
                    }
                }
            }
        }

        Ok(runs)
    }
}
