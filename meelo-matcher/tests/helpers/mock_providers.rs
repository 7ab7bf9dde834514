//! Providers and bridge built through the real feature registry

use async_trait::async_trait;
use meelo_common::models::{EntityType, ProviderId};
use meelo_matcher::bridge::{RelationBridge, WikidataRelations};
use meelo_matcher::error::{ProviderError, ProviderResult};
use meelo_matcher::providers::{FeatureName, FeatureOutput, Provider, ProviderBuilder};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Feature calls made against mock providers, as `label:feature`
#[derive(Debug, Default)]
pub struct CallLog(Mutex<Vec<String>>);

impl CallLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn called(&self, label: &str, feature: FeatureName) -> bool {
        let entry = format!("{}:{}", label, feature);
        self.entries().contains(&entry)
    }

    pub fn count(&self, label: &str, feature: FeatureName) -> usize {
        let entry = format!("{}:{}", label, feature);
        self.entries().iter().filter(|e| **e == entry).count()
    }
}

/// Fluent wrapper over [`ProviderBuilder`] that logs every recorded call
pub struct MockProvider {
    builder: ProviderBuilder,
    label: String,
    log: Arc<CallLog>,
}

impl MockProvider {
    pub fn new(id: ProviderId, name: &str, log: &Arc<CallLog>) -> Self {
        Self {
            builder: Provider::builder(id, name),
            label: name.to_string(),
            log: Arc::clone(log),
        }
    }

    pub fn anchor(mut self) -> Self {
        self.builder = self.builder.anchor();
        self
    }

    /// Answer `feature` with `output` and log the call
    pub fn respond(mut self, feature: FeatureName, output: FeatureOutput) -> Self {
        let entry = format!("{}:{}", self.label, feature);
        self.builder = self.builder.handle(feature, Arc::clone(&self.log), move |log, _| {
            let entry = entry.clone();
            let output = output.clone();
            async move {
                log.record(entry);
                let result: ProviderResult<Option<FeatureOutput>> = Ok(Some(output));
                result
            }
        });
        self
    }

    /// Fail `feature` with a network error and log the call
    pub fn fail(mut self, feature: FeatureName) -> Self {
        let entry = format!("{}:{}", self.label, feature);
        self.builder = self.builder.handle(feature, Arc::clone(&self.log), move |log, _| {
            let entry = entry.clone();
            async move {
                log.record(entry);
                let result: ProviderResult<Option<FeatureOutput>> =
                    Err(ProviderError::Network("connection reset".to_string()));
                result
            }
        });
        self
    }

    /// URLs are `base` followed by the id
    pub fn urls(mut self, kind: EntityType, base: &'static str) -> Self {
        self.builder = self
            .builder
            .sync(FeatureName::UrlFromId(kind), move |input| {
                Ok(Some(FeatureOutput::Text(format!("{}{}", base, input.into_text()?))))
            })
            .sync(FeatureName::IdFromUrl(kind), move |input| {
                let url = input.into_text()?;
                Ok(url
                    .strip_prefix(base)
                    .filter(|id| !id.is_empty())
                    .map(|id| FeatureOutput::Text(id.to_string())))
            });
        self
    }

    /// Claim anchor relations pointing at `host`
    pub fn recognizes(mut self, host: &'static str) -> Self {
        self.builder = self.builder.sync(FeatureName::IsAnchorRelation, move |input| {
            let relation = input.into_relation()?;
            Ok(Some(FeatureOutput::Flag(relation.url.contains(host))))
        });
        self
    }

    pub fn build(self) -> Provider {
        self.builder.build()
    }
}

/// Bridge answering from a fixed table
#[derive(Debug, Default)]
pub struct MockBridge {
    items: HashMap<String, WikidataRelations>,
    calls: Mutex<Vec<String>>,
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, bridge_id: &str, relations: WikidataRelations) -> Self {
        self.items.insert(bridge_id.to_string(), relations);
        self
    }
}

#[async_trait]
impl RelationBridge for MockBridge {
    async fn relations(&self, bridge_id: &str) -> ProviderResult<Option<WikidataRelations>> {
        self.calls.lock().unwrap().push(bridge_id.to_string());
        Ok(self.items.get(bridge_id).cloned())
    }
}
