//! Self-link and paging-link construction.
//!
//! Links are derived from the currently configured base path at response
//! time, never persisted. Redeploying under a different base path therefore
//! never requires a data migration: the same entity serialized under two
//! configurations carries two different self-links.

use crate::ids::{EntityId, EntityType};

/// Context for link construction: the externally visible base path,
/// e.g. `https://host/v1`. Trailing slashes are stripped at construction.
#[derive(Debug, Clone)]
pub struct LinkContext {
    base_path: String,
}

impl LinkContext {
    pub fn new(base_path: impl Into<String>) -> Self {
        let mut base_path = base_path.into();
        while base_path.ends_with('/') {
            base_path.pop();
        }
        Self { base_path }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// `{basePath}/{EntityType}({id})`
    pub fn self_link(&self, entity_type: EntityType, id: EntityId) -> String {
        format!("{}/{}({})", self.base_path, entity_type.collection(), id)
    }

    /// `{basePath}/{EntityType}({id})/{RelatedCollection}`
    pub fn navigation_link(
        &self,
        entity_type: EntityType,
        id: EntityId,
        related: EntityType,
    ) -> String {
        format!(
            "{}/{}({})/{}",
            self.base_path,
            entity_type.collection(),
            id,
            related.collection()
        )
    }

    /// Link to the next page of a collection, or `None` when the current
    /// page was not full.
    pub fn next_link(
        &self,
        collection_path: &str,
        top: usize,
        skip: usize,
        returned: usize,
    ) -> Option<String> {
        if returned < top {
            return None;
        }
        Some(format!(
            "{}/{}?$top={}&$skip={}",
            self.base_path,
            collection_path,
            top,
            skip + returned
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_link_shape() {
        let ctx = LinkContext::new("https://sensors.example/v1/");
        assert_eq!(
            ctx.self_link(EntityType::Thing, EntityId(7)),
            "https://sensors.example/v1/Things(7)"
        );
    }

    #[test]
    fn test_links_follow_reconfigured_base_path() {
        // Same entity, two configurations: the link must track the config.
        let a = LinkContext::new("https://old.example/v1");
        let b = LinkContext::new("https://new.example/api");
        assert_eq!(
            a.self_link(EntityType::Observation, EntityId(3)),
            "https://old.example/v1/Observations(3)"
        );
        assert_eq!(
            b.self_link(EntityType::Observation, EntityId(3)),
            "https://new.example/api/Observations(3)"
        );
    }

    #[test]
    fn test_next_link() {
        let ctx = LinkContext::new("http://localhost:8090/v1");
        assert_eq!(
            ctx.next_link("Observations", 100, 0, 100).as_deref(),
            Some("http://localhost:8090/v1/Observations?$top=100&$skip=100")
        );
        assert!(ctx.next_link("Observations", 100, 0, 40).is_none());
    }
}
