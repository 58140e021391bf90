use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub type JobId = String;
pub type EntityId = String;

/// Subject names as they appear on the wire.
pub mod subject {
    pub const SCHEDULED: &str = "scrape:scheduled";
    pub const STARTED: &str = "scrape:started";
    pub const PROGRESS: &str = "scrape:progress";
    pub const COMPLETED: &str = "scrape:completed";
    pub const FAILED: &str = "scrape:failed";
    pub const ADDED: &str = "competitor:added";
    pub const PROFILE_READY: &str = "competitor:profile-ready";
    pub const SYNC_FAILED: &str = "competitor:sync-failed";
}

pub const MAX_PROGRESS: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobScheduled {
    pub job_id: JobId,
    pub target_id: EntityId,
    pub target_name: String,
    pub delay_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStarted {
    pub job_id: JobId,
    pub target_id: EntityId,
    pub target_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressed {
    pub job_id: JobId,
    #[serde(deserialize_with = "percent")]
    pub progress: u8,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCompleted {
    pub job_id: JobId,
    pub target_id: EntityId,
    pub posts_scraped: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailed {
    pub job_id: JobId,
    pub target_id: EntityId,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityAdded {
    pub entity_id: EntityId,
    pub name: String,
    pub syncing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityProfileReady {
    pub entity_id: EntityId,
    pub name: String,
    pub profile_picture_url: Option<String>,
    pub followers: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySyncFailed {
    pub entity_id: EntityId,
    pub name: String,
    pub error: String,
}

/// A job or entity notification pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Scheduled(JobScheduled),
    Started(JobStarted),
    Progress(JobProgressed),
    Completed(JobCompleted),
    Failed(JobFailed),
    Added(EntityAdded),
    ProfileReady(EntityProfileReady),
    SyncFailed(EntitySyncFailed),
}

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("malformed `{subject}` payload: {source}")]
    Malformed {
        subject: String,
        #[source]
        source: serde_json::Error,
    },
}

impl InboundEvent {
    /// Parse a raw message by subject name.
    ///
    /// Unknown subjects yield `Ok(None)` so that newer servers can add
    /// subjects without breaking older clients.
    pub fn parse(subject_name: &str, data: &str) -> Result<Option<Self>, EventParseError> {
        let event = match subject_name {
            subject::SCHEDULED => Self::Scheduled(decode(subject_name, data)?),
            subject::STARTED => Self::Started(decode(subject_name, data)?),
            subject::PROGRESS => Self::Progress(decode(subject_name, data)?),
            subject::COMPLETED => Self::Completed(decode(subject_name, data)?),
            subject::FAILED => Self::Failed(decode(subject_name, data)?),
            subject::ADDED => Self::Added(decode(subject_name, data)?),
            subject::PROFILE_READY => Self::ProfileReady(decode(subject_name, data)?),
            subject::SYNC_FAILED => Self::SyncFailed(decode(subject_name, data)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Self::Scheduled(_) => subject::SCHEDULED,
            Self::Started(_) => subject::STARTED,
            Self::Progress(_) => subject::PROGRESS,
            Self::Completed(_) => subject::COMPLETED,
            Self::Failed(_) => subject::FAILED,
            Self::Added(_) => subject::ADDED,
            Self::ProfileReady(_) => subject::PROFILE_READY,
            Self::SyncFailed(_) => subject::SYNC_FAILED,
        }
    }

    /// The job this event belongs to, if it is a job lifecycle event.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::Scheduled(e) => Some(&e.job_id),
            Self::Started(e) => Some(&e.job_id),
            Self::Progress(e) => Some(&e.job_id),
            Self::Completed(e) => Some(&e.job_id),
            Self::Failed(e) => Some(&e.job_id),
            Self::Added(_) | Self::ProfileReady(_) | Self::SyncFailed(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }
}

/// Accepts any finite JSON number and clamps it into `0..=100`.
fn percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() {
        return Err(D::Error::custom("progress is not a finite number"));
    }
    Ok(raw.clamp(0.0, f64::from(MAX_PROGRESS)).round() as u8)
}

fn decode<T: serde::de::DeserializeOwned>(
    subject_name: &str,
    data: &str,
) -> Result<T, EventParseError> {
    serde_json::from_str(data).map_err(|source| EventParseError::Malformed {
        subject: subject_name.to_string(),
        source,
    })
}
