use std::collections::BTreeMap;

use crate::event::{InboundEvent, JobId};

pub const STARTING_MESSAGE: &str = "Starting…";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgressRecord {
    pub job_id: JobId,
    pub progress: u8,
    pub message: String,
}

/// Last-known progress of every in-flight job.
///
/// Records exist only between a job's first `started`/`progress` event and
/// its terminal event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobProgressTracker {
    jobs: BTreeMap<JobId, JobProgressRecord>,
}

impl JobProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the tracked set changed.
    pub fn apply(&mut self, event: &InboundEvent) -> bool {
        match event {
            InboundEvent::Started(started) => {
                self.jobs.insert(
                    started.job_id.clone(),
                    JobProgressRecord {
                        job_id: started.job_id.clone(),
                        progress: 0,
                        message: STARTING_MESSAGE.to_string(),
                    },
                );
                true
            }
            InboundEvent::Progress(update) => {
                // A missed `started` (reconnect gap) must not lose progress.
                let record = self
                    .jobs
                    .entry(update.job_id.clone())
                    .or_insert_with(|| JobProgressRecord {
                        job_id: update.job_id.clone(),
                        progress: 0,
                        message: String::new(),
                    });
                record.progress = update.progress;
                record.message = update.message.clone();
                true
            }
            InboundEvent::Completed(done) => self.jobs.remove(&done.job_id).is_some(),
            InboundEvent::Failed(failed) => self.jobs.remove(&failed.job_id).is_some(),
            InboundEvent::Scheduled(_)
            | InboundEvent::Added(_)
            | InboundEvent::ProfileReady(_)
            | InboundEvent::SyncFailed(_) => false,
        }
    }

    pub fn get(&self, job_id: &str) -> Option<JobProgressRecord> {
        self.jobs.get(job_id).cloned()
    }

    /// Records ordered by job id.
    pub fn snapshot(&self) -> Vec<JobProgressRecord> {
        self.jobs.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Forget everything, e.g. when the session ends.
    pub fn clear(&mut self) {
        self.jobs.clear();
    }
}
