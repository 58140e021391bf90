use crate::cache::CacheKey;

/// Side effects requested by the policy, executed by the composition root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    InvalidateQuery(CacheKey),
}
