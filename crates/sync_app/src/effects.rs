use sync_core::{Effect, QueryCache};
use sync_logging::sync_debug;

/// Executes the side effects requested by the sync policy.
pub struct EffectRunner<'a> {
    cache: &'a mut dyn QueryCache,
}

impl<'a> EffectRunner<'a> {
    pub fn new(cache: &'a mut dyn QueryCache) -> Self {
        Self { cache }
    }

    pub fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::InvalidateQuery(key) => {
                    sync_debug!("InvalidateQuery key={}", key);
                    self.cache.invalidate(&key);
                }
            }
        }
    }
}
