use std::collections::HashMap;
use std::time::Duration;

use crate::cache::CacheKey;
use crate::event::{InboundEvent, JobId};
use crate::notification::{NewNotification, NotificationId, NotificationPatch, NotificationStore};
use crate::Effect;

pub const INFO_DISMISS: Duration = Duration::from_secs(5);
pub const SUCCESS_DISMISS: Duration = Duration::from_secs(5);
pub const ERROR_DISMISS: Duration = Duration::from_secs(8);
pub const FAILED_TITLE: &str = "Scrape failed";

/// Maps job and entity events onto notifications and cache invalidations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPolicy {
    tenant_id: String,
    correlation: HashMap<JobId, NotificationId>,
}

impl SyncPolicy {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            correlation: HashMap::new(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Notification currently tracking `job_id`, if any.
    pub fn correlated(&self, job_id: &str) -> Option<NotificationId> {
        self.correlation.get(job_id).copied()
    }

    pub fn correlation_len(&self) -> usize {
        self.correlation.len()
    }

    /// Applies one event to the notification store and returns the cache effects.
    pub fn update(
        &mut self,
        event: &InboundEvent,
        notifications: &mut NotificationStore,
    ) -> Vec<Effect> {
        match event {
            InboundEvent::Scheduled(scheduled) => {
                notifications.create(
                    NewNotification::info(format!(
                        "{}: fetch scheduled in {}s",
                        scheduled.target_name, scheduled.delay_seconds
                    ))
                    .dismiss_after(INFO_DISMISS),
                );
                Vec::new()
            }
            InboundEvent::Started(started) => {
                let title = format!("Scraping {}", started.target_name);
                let patch = NotificationPatch {
                    title: Some(title.clone()),
                    message: None,
                    progress: Some(0),
                };
                // A duplicate start resets the existing notification in place.
                let reused = match self.correlation.get(&started.job_id) {
                    Some(id) => notifications.update(*id, patch),
                    None => false,
                };
                if !reused {
                    let id = notifications.create(NewNotification::progress(title, 0));
                    self.correlation.insert(started.job_id.clone(), id);
                }
                Vec::new()
            }
            InboundEvent::Progress(update) => {
                if let Some(id) = self.correlation.get(&update.job_id) {
                    notifications.update(
                        *id,
                        NotificationPatch {
                            title: Some(update.message.clone()),
                            message: None,
                            progress: Some(update.progress),
                        },
                    );
                }
                Vec::new()
            }
            InboundEvent::Completed(done) => {
                self.release(&done.job_id, notifications);
                notifications.create(
                    NewNotification::success(format!("{} posts imported", done.posts_scraped))
                        .dismiss_after(SUCCESS_DISMISS),
                );
                vec![
                    Effect::InvalidateQuery(CacheKey::entity_list(self.tenant_id.clone())),
                    Effect::InvalidateQuery(CacheKey::entity_detail(done.target_id.clone())),
                ]
            }
            InboundEvent::Failed(failed) => {
                self.release(&failed.job_id, notifications);
                notifications.create(
                    NewNotification::error(FAILED_TITLE)
                        .with_message(failed.error.clone())
                        .dismiss_after(ERROR_DISMISS),
                );
                Vec::new()
            }
            InboundEvent::ProfileReady(_) => {
                vec![Effect::InvalidateQuery(CacheKey::entity_list(
                    self.tenant_id.clone(),
                ))]
            }
            InboundEvent::Added(_) | InboundEvent::SyncFailed(_) => Vec::new(),
        }
    }

    /// Drops the correlation for `job_id` and removes its progress notification.
    fn release(&mut self, job_id: &str, notifications: &mut NotificationStore) {
        if let Some(id) = self.correlation.remove(job_id) {
            notifications.remove(id);
        }
    }
}
