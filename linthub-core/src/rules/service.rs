//! Rule configuration management over the persistent store.
//!
//! One configuration row is active at a time and all reads and writes go
//! through it. The stored XML is authoritative: structured reads parse
//! it, structured writes render it fresh, and raw-document writes keep
//! the caller's bytes verbatim once they prove parseable.

use std::fmt;
use std::sync::Arc;

use linthub_model::{ActiveRules, RuleSet, RuleSetPatch};
use tracing::info;

use crate::error::Result;
use crate::persistence::ports::{RuleConfigRepository, StoredConfig};
use crate::rules::xml::{parse_config, render_config};

pub const DEFAULT_CONFIG_NAME: &str = "default";

pub struct RulesService {
    store: Arc<dyn RuleConfigRepository>,
}

impl RulesService {
    pub fn new(store: Arc<dyn RuleConfigRepository>) -> Self {
        Self { store }
    }

    /// Make sure an active configuration exists, creating the default one
    /// when the store is empty. Called once at startup and again lazily
    /// by every read.
    pub async fn ensure_default(&self) -> Result<ActiveRules> {
        self.active().await
    }

    /// The active configuration in structured form.
    pub async fn active(&self) -> Result<ActiveRules> {
        let stored = self.active_stored().await?;
        Self::to_active(stored)
    }

    /// The active configuration document exactly as stored.
    pub async fn active_xml(&self) -> Result<String> {
        Ok(self.active_stored().await?.xml_content)
    }

    /// Replace the active rules wholesale and re-render the document.
    pub async fn update_rules(&self, rules: RuleSet) -> Result<ActiveRules> {
        let current = self.active_stored().await?;
        let updated = self
            .store
            .update_content(current.id, &render_config(&rules))
            .await?;
        Self::to_active(updated)
    }

    /// Merge a partial update over the active rules. An empty patch does
    /// not touch the store.
    pub async fn merge_patch(
        &self,
        patch: RuleSetPatch,
    ) -> Result<ActiveRules> {
        let current = self.active_stored().await?;
        if patch.is_empty() {
            return Self::to_active(current);
        }

        let mut rules = parse_config(&current.xml_content)?;
        patch.apply_to(&mut rules);
        let updated = self
            .store
            .update_content(current.id, &render_config(&rules))
            .await?;
        Self::to_active(updated)
    }

    /// Restore the documented defaults on the active row, keeping its
    /// identity.
    pub async fn reset(&self) -> Result<ActiveRules> {
        let current = self.active_stored().await?;
        let updated = self
            .store
            .update_content(current.id, &render_config(&RuleSet::default()))
            .await?;
        Self::to_active(updated)
    }

    /// Store a caller-supplied document verbatim. The document must parse
    /// as a rule configuration; unmanaged content in it survives storage
    /// untouched.
    pub async fn set_active_xml(&self, xml: &str) -> Result<ActiveRules> {
        parse_config(xml)?;
        let current = self.active_stored().await?;
        let updated = self.store.update_content(current.id, xml).await?;
        Self::to_active(updated)
    }

    async fn active_stored(&self) -> Result<StoredConfig> {
        if let Some(stored) = self.store.get_active().await? {
            return Ok(stored);
        }

        let fresh = StoredConfig::new_active(
            DEFAULT_CONFIG_NAME,
            render_config(&RuleSet::default()),
        );
        match self.store.insert(&fresh).await {
            Ok(()) => {
                info!(config = DEFAULT_CONFIG_NAME, "created rule configuration");
                Ok(fresh)
            }
            // Lost the race against another writer; theirs is the active
            // row now.
            Err(insert_err) => match self.store.get_active().await? {
                Some(stored) => Ok(stored),
                None => Err(insert_err),
            },
        }
    }

    fn to_active(stored: StoredConfig) -> Result<ActiveRules> {
        let rules = parse_config(&stored.xml_content)?;
        Ok(ActiveRules {
            rules,
            id: stored.id,
            config_name: stored.config_name,
            is_active: stored.is_active,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }
}

impl fmt::Debug for RulesService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RulesService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use uuid::Uuid;

    use crate::error::AnalysisError;

    #[derive(Default)]
    struct MemoryConfigs {
        row: Mutex<Option<StoredConfig>>,
    }

    #[async_trait]
    impl RuleConfigRepository for MemoryConfigs {
        async fn get_active(&self) -> Result<Option<StoredConfig>> {
            Ok(self.row.lock().unwrap().clone())
        }

        async fn insert(&self, config: &StoredConfig) -> Result<()> {
            let mut row = self.row.lock().unwrap();
            if row.is_some() && config.is_active {
                return Err(AnalysisError::Internal(
                    "duplicate active configuration".to_string(),
                ));
            }
            *row = Some(config.clone());
            Ok(())
        }

        async fn update_content(
            &self,
            id: Uuid,
            xml_content: &str,
        ) -> Result<StoredConfig> {
            let mut row = self.row.lock().unwrap();
            let stored = row
                .as_mut()
                .filter(|stored| stored.id == id)
                .ok_or_else(|| {
                    AnalysisError::NotFound(format!("rule configuration {id}"))
                })?;
            stored.xml_content = xml_content.to_string();
            stored.updated_at = Utc::now();
            Ok(stored.clone())
        }
    }

    fn service() -> (RulesService, Arc<MemoryConfigs>) {
        let store = Arc::new(MemoryConfigs::default());
        (RulesService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn first_read_creates_the_default_configuration() {
        let (service, store) = service();

        let active = service.active().await.unwrap();
        assert_eq!(active.config_name, "default");
        assert!(active.is_active);
        assert_eq!(active.rules, RuleSet::default());
        assert!(store.row.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn updates_replace_the_document_in_place() {
        let (service, _) = service();
        let original = service.active().await.unwrap();

        let rules = RuleSet {
            line_length: 100,
            final_class: false,
            ..RuleSet::default()
        };
        let updated = service.update_rules(rules.clone()).await.unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.rules, rules);
    }

    #[tokio::test]
    async fn patches_merge_over_the_active_rules() {
        let (service, _) = service();

        let patch = RuleSetPatch {
            need_braces: Some(false),
            line_length: Some(80),
            ..RuleSetPatch::default()
        };
        let patched = service.merge_patch(patch).await.unwrap();

        assert!(!patched.rules.need_braces);
        assert_eq!(patched.rules.line_length, 80);
        assert!(patched.rules.left_curly);
    }

    #[tokio::test]
    async fn empty_patches_do_not_touch_the_store() {
        let (service, _) = service();
        let before = service.active().await.unwrap();

        let unchanged =
            service.merge_patch(RuleSetPatch::default()).await.unwrap();

        assert_eq!(unchanged.updated_at, before.updated_at);
        assert_eq!(unchanged.rules, before.rules);
    }

    #[tokio::test]
    async fn reset_restores_defaults_without_a_new_row() {
        let (service, _) = service();
        let original = service.active().await.unwrap();

        service
            .update_rules(RuleSet {
                line_length: 200,
                ..RuleSet::default()
            })
            .await
            .unwrap();
        let reset = service.reset().await.unwrap();

        assert_eq!(reset.id, original.id);
        assert_eq!(reset.rules, RuleSet::default());
    }

    #[tokio::test]
    async fn raw_documents_are_stored_verbatim() {
        let (service, store) = service();
        service.active().await.unwrap();

        let xml = "<?xml version=\"1.0\"?>\n<module name=\"Checker\">\n    \
                   <module name=\"TreeWalker\">\n        \
                   <module name=\"NeedBraces\"/>\n        \
                   <module name=\"SomeCustomCheck\"/>\n    </module>\n\
                   </module>";
        let active = service.set_active_xml(xml).await.unwrap();

        assert!(active.rules.need_braces);
        assert!(!active.rules.left_curly);
        let stored = store.row.lock().unwrap().clone().unwrap();
        assert_eq!(stored.xml_content, xml);
    }

    #[tokio::test]
    async fn unparseable_raw_documents_are_rejected() {
        let (service, store) = service();
        let before = service.active_xml().await.unwrap();

        let result = service.set_active_xml("<module name=\"Checker\">").await;
        assert!(matches!(result, Err(AnalysisError::ConfigParse(_))));
        assert_eq!(service.active_xml().await.unwrap(), before);
        assert!(store.row.lock().unwrap().is_some());
    }
}
