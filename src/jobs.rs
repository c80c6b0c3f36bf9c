//! Persistent job records and the install-in-progress marker
//!
//! Long running work started on behalf of the web layer (app installs) is
//! tracked as a JSON record per job under `<state_dir>/jobs`, so its state
//! survives the process that started it. The install marker is a plain file
//! written by the installer; its presence means an install is running.

use crate::config_store::write_atomic;
use crate::file_lock;
use crate::error::{PioneerError, PioneerResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_finished(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    fn can_move_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Pending, JobState::Failed)
                | (JobState::Pending, JobState::Succeeded)
                | (JobState::Running, JobState::Succeeded)
                | (JobState::Running, JobState::Failed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    /// e.g. "install"
    pub kind: String,
    /// What the job acts on, e.g. an app name
    pub subject: String,
    pub state: JobState,
    #[serde(default)]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct JobStore {
    dir: PathBuf,
}

impl JobStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join("jobs"),
        }
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    pub async fn create(&self, kind: &str, subject: &str) -> PioneerResult<JobRecord> {
        let now = Utc::now();
        let record = JobRecord {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            subject: subject.to_string(),
            state: JobState::Pending,
            message: None,
            created_at: now,
            updated_at: now,
        };
        self.write(&record).await?;
        info!("Job {} created ({} {})", record.id, kind, subject);
        Ok(record)
    }

    pub async fn start(&self, id: Uuid) -> PioneerResult<JobRecord> {
        self.transition(id, JobState::Running, None).await
    }

    pub async fn succeed(&self, id: Uuid, message: Option<String>) -> PioneerResult<JobRecord> {
        self.transition(id, JobState::Succeeded, message).await
    }

    pub async fn fail(&self, id: Uuid, message: String) -> PioneerResult<JobRecord> {
        self.transition(id, JobState::Failed, Some(message)).await
    }

    pub async fn get(&self, id: Uuid) -> PioneerResult<JobRecord> {
        let path = self.record_path(id);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(PioneerError::NotFound(format!("job {}", id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All jobs, oldest first; unreadable records are skipped
    pub async fn list(&self) -> PioneerResult<Vec<JobRecord>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut jobs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .await
                .map_err(PioneerError::from)
                .and_then(|content| serde_json::from_str::<JobRecord>(&content).map_err(PioneerError::from));
            match parsed {
                Ok(job) => jobs.push(job),
                Err(e) => warn!("Skipping unreadable job record {}: {}", path.display(), e),
            }
        }

        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    /// Read, check and write under the store lock, so two racing
    /// transitions see each other's result
    async fn transition(&self, id: Uuid, next: JobState, message: Option<String>) -> PioneerResult<JobRecord> {
        let _lock = file_lock::lock(&self.dir).await?;

        let mut record = self.get(id).await?;
        if !record.state.can_move_to(next) {
            return Err(PioneerError::InvalidState(format!(
                "job {} cannot move from {:?} to {:?}",
                id, record.state, next
            )));
        }

        record.state = next;
        if message.is_some() {
            record.message = message;
        }
        record.updated_at = Utc::now();
        self.write(&record).await?;
        debug!("Job {} is now {:?}", id, next);
        Ok(record)
    }

    async fn write(&self, record: &JobRecord) -> PioneerResult<()> {
        let content = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.record_path(record.id), &content).await
    }
}

/// Contents of the install marker file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallMarker {
    pub app: String,
    pub started_at: DateTime<Utc>,
}

impl InstallMarker {
    fn path(state_dir: &Path) -> PathBuf {
        state_dir.join("install.marker")
    }

    /// Record that `app` is being installed
    pub async fn begin(state_dir: &Path, app: &str) -> PioneerResult<Self> {
        let marker = Self {
            app: app.to_string(),
            started_at: Utc::now(),
        };
        write_atomic(&Self::path(state_dir), &serde_json::to_vec(&marker)?).await?;
        info!("Install of {} marked in progress", app);
        Ok(marker)
    }

    pub async fn clear(state_dir: &Path) -> PioneerResult<()> {
        match fs::remove_file(Self::path(state_dir)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// The running install, if any
    pub async fn current(state_dir: &Path) -> PioneerResult<Option<Self>> {
        match fs::read_to_string(Self::path(state_dir)).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_job_lifecycle() {
        let dir = TempDir::new().unwrap();
        let store = JobStore::new(dir.path());

        let job = store.create("install", "jellyfin").await.unwrap();
        assert_eq!(job.state, JobState::Pending);

        let job = store.start(job.id).await.unwrap();
        assert_eq!(job.state, JobState::Running);

        let job = store.succeed(job.id, Some("installed".to_string())).await.unwrap();
        assert_eq!(job.state, JobState::Succeeded);
        assert!(job.state.is_finished());

        let reloaded = store.get(job.id).await.unwrap();
        assert_eq!(reloaded, job);
        assert_eq!(reloaded.message.as_deref(), Some("installed"));
    }

    #[tokio::test]
    async fn test_finished_job_cannot_restart() {
        let dir = TempDir::new().unwrap();
        let store = JobStore::new(dir.path());

        let job = store.create("install", "pihole").await.unwrap();
        store.fail(job.id, "image pull failed".to_string()).await.unwrap();

        assert!(matches!(store.start(job.id).await, Err(PioneerError::InvalidState(_))));
        assert!(matches!(
            store.get(Uuid::new_v4()).await,
            Err(PioneerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_sorted_and_skips_garbage() {
        let dir = TempDir::new().unwrap();
        let store = JobStore::new(dir.path());
        assert!(store.list().await.unwrap().is_empty());

        let first = store.create("install", "a").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let second = store.create("install", "b").await.unwrap();
        std::fs::write(dir.path().join("jobs").join("broken.json"), "{").unwrap();

        let jobs = store.list().await.unwrap();
        let ids: Vec<_> = jobs.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_install_marker() {
        let dir = TempDir::new().unwrap();
        assert!(InstallMarker::current(dir.path()).await.unwrap().is_none());

        InstallMarker::begin(dir.path(), "nextcloud").await.unwrap();
        let marker = InstallMarker::current(dir.path()).await.unwrap().unwrap();
        assert_eq!(marker.app, "nextcloud");

        InstallMarker::clear(dir.path()).await.unwrap();
        InstallMarker::clear(dir.path()).await.unwrap();
        assert!(InstallMarker::current(dir.path()).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_transitions_stay_consistent() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(JobStore::new(dir.path()));

        for _ in 0..8 {
            let job = store.create("install", "syncthing").await.unwrap();

            let starter = {
                let store = store.clone();
                tokio::spawn(async move { store.start(job.id).await })
            };
            let failer = {
                let store = store.clone();
                tokio::spawn(async move { store.fail(job.id, "disk full".to_string()).await })
            };

            let started = starter.await.unwrap();
            // Pending and Running can both fail, so fail always lands
            let failed = failer.await.unwrap().unwrap();
            assert_eq!(failed.state, JobState::Failed);

            if let Err(e) = started {
                assert!(matches!(e, PioneerError::InvalidState(_)));
            }

            let stored = store.get(job.id).await.unwrap();
            assert_eq!(stored.state, JobState::Failed);
            assert_eq!(stored, failed);
        }
    }
}
