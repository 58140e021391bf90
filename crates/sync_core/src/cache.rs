use std::fmt;

use crate::event::EntityId;

pub const ENTITY_LIST: &str = "entity-list";
pub const ENTITY_DETAIL: &str = "entity-detail";

/// Key families of the query cache this layer keeps consistent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    /// `["entity-list", tenantId]`
    EntityList { tenant_id: String },
    /// `["entity-detail", entityId]`; entity ids are globally unique, so no tenant.
    EntityDetail { entity_id: EntityId },
}

impl CacheKey {
    pub fn entity_list(tenant_id: impl Into<String>) -> Self {
        Self::EntityList {
            tenant_id: tenant_id.into(),
        }
    }

    pub fn entity_detail(entity_id: impl Into<EntityId>) -> Self {
        Self::EntityDetail {
            entity_id: entity_id.into(),
        }
    }

    pub fn segments(&self) -> [&str; 2] {
        match self {
            Self::EntityList { tenant_id } => [ENTITY_LIST, tenant_id],
            Self::EntityDetail { entity_id } => [ENTITY_DETAIL, entity_id],
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [family, id] = self.segments();
        write!(f, "[\"{family}\",\"{id}\"]")
    }
}

/// The reactive query cache, owned elsewhere.
pub trait QueryCache {
    /// Mark the entry stale; an observed entry refetches in the background.
    fn invalidate(&mut self, key: &CacheKey);

    /// Replace the cached value directly.
    fn overwrite(&mut self, key: &CacheKey, value: serde_json::Value);
}
