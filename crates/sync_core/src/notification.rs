//! Process-wide list of transient user-facing notifications.

use std::time::{Duration, Instant};

pub type NotificationId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Info,
    Success,
    Error,
    Progress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: Option<String>,
    /// Only meaningful for [`NotificationKind::Progress`].
    pub progress: Option<u8>,
    pub auto_dismiss: Option<Duration>,
    pub created_at: Instant,
}

impl Notification {
    fn is_expired(&self, now: Instant) -> bool {
        match self.auto_dismiss {
            Some(after) => now.saturating_duration_since(self.created_at) >= after,
            None => false,
        }
    }
}

/// Everything needed to create a notification; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: Option<String>,
    pub progress: Option<u8>,
    pub auto_dismiss: Option<Duration>,
}

impl NewNotification {
    pub fn info(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, title)
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, title)
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title)
    }

    pub fn progress(title: impl Into<String>, progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::new(NotificationKind::Progress, title)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn dismiss_after(mut self, after: Duration) -> Self {
        self.auto_dismiss = Some(after);
        self
    }

    fn new(kind: NotificationKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: None,
            progress: None,
            auto_dismiss: None,
        }
    }
}

/// Partial update applied by [`NotificationStore::update`]; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationPatch {
    pub title: Option<String>,
    pub message: Option<String>,
    pub progress: Option<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationStore {
    items: Vec<Notification>,
    next_id: NotificationId,
    version: u64,
    dirty: bool,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, new: NewNotification) -> NotificationId {
        self.create_at(new, Instant::now())
    }

    /// Same as [`create`](Self::create) with an explicit creation time.
    pub fn create_at(&mut self, new: NewNotification, now: Instant) -> NotificationId {
        self.next_id += 1;
        let id = self.next_id;
        // Progress notifications are only ever removed explicitly.
        let auto_dismiss = match new.kind {
            NotificationKind::Progress => None,
            _ => new.auto_dismiss,
        };
        self.items.push(Notification {
            id,
            kind: new.kind,
            title: new.title,
            message: new.message,
            progress: new.progress,
            auto_dismiss,
            created_at: now,
        });
        self.touch();
        id
    }

    /// Returns false when no notification has this id.
    pub fn update(&mut self, id: NotificationId, patch: NotificationPatch) -> bool {
        let Some(item) = self.items.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if let Some(title) = patch.title {
            item.title = title;
        }
        if let Some(message) = patch.message {
            item.message = Some(message);
        }
        if let Some(progress) = patch.progress {
            item.progress = Some(progress);
        }
        self.touch();
        true
    }

    pub fn remove(&mut self, id: NotificationId) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        let removed = self.items.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.items.is_empty() {
            self.items.clear();
            self.touch();
        }
    }

    /// Drops every auto-dismissable notification whose time is up.
    pub fn dismiss_expired(&mut self, now: Instant) -> usize {
        let before = self.items.len();
        self.items.retain(|n| !n.is_expired(now));
        let dismissed = before - self.items.len();
        if dismissed > 0 {
            self.touch();
        }
        dismissed
    }

    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    /// Notifications in creation order.
    pub fn list(&self) -> &[Notification] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Incremented on every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn touch(&mut self) {
        self.version += 1;
        self.dirty = true;
    }
}
