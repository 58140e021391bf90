//! Sync core: event types, progress tracking, notifications and the
//! event-to-action policy. No I/O lives here.
mod cache;
mod effect;
mod event;
mod notification;
mod policy;
mod tracker;

pub use cache::{CacheKey, QueryCache, ENTITY_DETAIL, ENTITY_LIST};
pub use effect::Effect;
pub use event::{
    subject, EntityAdded, EntityId, EntityProfileReady, EntitySyncFailed, EventParseError,
    InboundEvent, JobCompleted, JobFailed, JobId, JobProgressed, JobScheduled, JobStarted,
    MAX_PROGRESS,
};
pub use notification::{
    NewNotification, Notification, NotificationId, NotificationKind, NotificationPatch,
    NotificationStore,
};
pub use policy::{SyncPolicy, ERROR_DISMISS, FAILED_TITLE, INFO_DISMISS, SUCCESS_DISMISS};
pub use tracker::{JobProgressRecord, JobProgressTracker, STARTING_MESSAGE};
