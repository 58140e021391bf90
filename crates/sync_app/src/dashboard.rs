use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Local;
use serde_json::json;
use sync_core::{
    CacheKey, EntityAdded, EntityProfileReady, EntitySyncFailed, InboundEvent,
    JobProgressTracker, NotificationStore, QueryCache, SyncPolicy,
};
use sync_engine::{ChannelClient, EventHandler, HandlerSet};
use sync_logging::{sync_info, sync_warn};

use crate::cache::InMemoryQueryCache;
use crate::config::{AppConfig, ENV_SESSION_TOKEN, ENV_TENANT_ID};
use crate::effects::EffectRunner;
use crate::render;

const TICK: Duration = Duration::from_millis(75);

/// Everything the dashboard shows, owned by the main thread.
pub struct Dashboard {
    pub notifications: NotificationStore,
    pub jobs: JobProgressTracker,
    pub cache: InMemoryQueryCache,
    policy: SyncPolicy,
    jobs_dirty: bool,
}

impl Dashboard {
    pub fn new(tenant_id: &str) -> Self {
        let mut cache = InMemoryQueryCache::new();
        cache.observe(CacheKey::entity_list(tenant_id));
        Self {
            notifications: NotificationStore::new(),
            jobs: JobProgressTracker::new(),
            cache,
            policy: SyncPolicy::new(tenant_id),
            jobs_dirty: false,
        }
    }

    pub fn apply(&mut self, event: &InboundEvent) {
        self.jobs_dirty |= self.jobs.apply(event);
        let effects = self.policy.update(event, &mut self.notifications);
        EffectRunner::new(&mut self.cache).run(effects);
    }

    /// Expires notifications and returns a fresh frame when anything changed.
    pub fn tick(&mut self, now: Instant) -> Option<Vec<String>> {
        self.notifications.dismiss_expired(now);
        let notifications_dirty = self.notifications.consume_dirty();
        let jobs_dirty = std::mem::take(&mut self.jobs_dirty);
        if !(notifications_dirty || jobs_dirty) {
            return None;
        }
        Some(render::render(
            Local::now(),
            self.notifications.list(),
            &self.jobs.snapshot(),
        ))
    }
}

/// Feeds scrape-job events into the tracker, the policy and the cache.
pub struct DashboardHandler {
    dashboard: Rc<RefCell<Dashboard>>,
}

impl DashboardHandler {
    pub fn new(dashboard: Rc<RefCell<Dashboard>>) -> Self {
        Self { dashboard }
    }
}

impl EventHandler for DashboardHandler {
    fn on_inbound(&mut self, event: &InboundEvent) {
        self.dashboard.borrow_mut().apply(event);
    }

    fn on_connected(&mut self) {
        sync_info!("Live updates connected");
    }

    fn on_disconnected(&mut self, reason: &str) {
        sync_warn!("Live updates interrupted: {}", reason);
    }

    fn on_reconnect_failed(&mut self, attempts: u32) {
        sync_warn!("Gave up reconnecting after {} attempts", attempts);
    }
}

/// Competitor lifecycle events the policy leaves to the caller.
pub struct EntityFeedHandler {
    dashboard: Rc<RefCell<Dashboard>>,
}

impl EntityFeedHandler {
    pub fn new(dashboard: Rc<RefCell<Dashboard>>) -> Self {
        Self { dashboard }
    }
}

impl EventHandler for EntityFeedHandler {
    fn on_added(&mut self, event: &EntityAdded) {
        sync_info!(
            "Competitor added id={} name={} syncing={}",
            event.entity_id,
            event.name,
            event.syncing
        );
    }

    fn on_profile_ready(&mut self, event: &EntityProfileReady) {
        let profile = json!({
            "name": event.name,
            "profilePictureUrl": event.profile_picture_url,
            "followers": event.followers,
        });
        self.dashboard
            .borrow_mut()
            .cache
            .overwrite(&CacheKey::entity_detail(event.entity_id.clone()), profile);
    }

    fn on_sync_failed(&mut self, event: &EntitySyncFailed) {
        sync_warn!(
            "Competitor sync failed id={} name={} error={}",
            event.entity_id,
            event.name,
            event.error
        );
    }
}

pub fn run(config: AppConfig) -> anyhow::Result<()> {
    let Some(credentials) = config.credentials.clone() else {
        sync_warn!(
            "No session; set {} and {} to watch live updates",
            ENV_SESSION_TOKEN,
            ENV_TENANT_ID
        );
        return Ok(());
    };

    let dashboard = Rc::new(RefCell::new(Dashboard::new(&credentials.tenant_id)));
    let mut client =
        ChannelClient::new(config.channel.clone()).context("starting the channel worker")?;
    sync_info!("Watching {}", config.channel.events_url());

    let handlers = HandlerSet::new()
        .with(DashboardHandler::new(dashboard.clone()))
        .with(EntityFeedHandler::new(dashboard.clone()));
    client.connect(Some(credentials), handlers);

    let started = Instant::now();
    loop {
        client.dispatch_pending();

        let frame = dashboard.borrow_mut().tick(Instant::now());
        if let Some(lines) = frame {
            for line in lines {
                println!("{line}");
            }
        }
        for key in dashboard.borrow_mut().cache.take_refetches() {
            sync_info!("Would refetch {}", key);
        }

        if config.watch_for.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        thread::sleep(TICK);
    }

    client.disconnect();
    Ok(())
}
