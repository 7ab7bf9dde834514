//! External metadata providers
//!
//! A [`Provider`] is an identity plus a registry of feature handlers. The
//! engine never assumes a capability: it asks [`Provider::has_feature`] or
//! calls [`Provider::invoke`], which yields `Ok(None)` for features the
//! provider does not implement.

pub mod features;
pub mod http;
pub mod links;
pub mod lrclib;
pub mod musicbrainz;
pub mod text;
pub mod wikipedia;

use futures::future::BoxFuture;
use meelo_common::models::{EntityType, ProviderId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
pub use features::{
    AnchorRelation, EntityQuery, FeatureInput, FeatureName, FeatureOutput, FromFeatureOutput,
    NativeObject, SearchResult, SyncedLyrics,
};

/// Type-erased feature implementation
pub type FeatureHandler = Arc<
    dyn Fn(FeatureInput) -> BoxFuture<'static, ProviderResult<Option<FeatureOutput>>>
        + Send
        + Sync,
>;

/// One external source behind the feature registry
pub struct Provider {
    id: ProviderId,
    name: String,
    anchor: bool,
    features: HashMap<FeatureName, FeatureHandler>,
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.features.keys().map(|n| n.to_string()).collect();
        names.sort();
        f.debug_struct("Provider")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("anchor", &self.anchor)
            .field("features", &names)
            .finish()
    }
}

impl Provider {
    pub fn builder(id: ProviderId, name: impl Into<String>) -> ProviderBuilder {
        ProviderBuilder {
            id,
            name: name.into(),
            anchor: false,
            features: HashMap::new(),
        }
    }

    pub fn id(&self) -> ProviderId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this provider is the identity anchor (MusicBrainz)
    pub fn is_anchor(&self) -> bool {
        self.anchor
    }

    pub fn has_feature(&self, name: FeatureName) -> bool {
        self.features.contains_key(&name)
    }

    /// Same provider with another id (ids are assigned by the catalog)
    pub fn with_id(self, id: ProviderId) -> Self {
        Self { id, ..self }
    }

    /// Invoke a feature; unsupported features yield `Ok(None)`
    pub async fn invoke(
        &self,
        name: FeatureName,
        input: FeatureInput,
    ) -> ProviderResult<Option<FeatureOutput>> {
        match self.features.get(&name) {
            Some(handler) => handler(input).await,
            None => {
                debug!(provider = %self.name, feature = %name, "Feature not supported");
                Ok(None)
            }
        }
    }

    /// Invoke a feature and extract a typed output
    pub async fn call<T: FromFeatureOutput>(
        &self,
        name: FeatureName,
        input: FeatureInput,
    ) -> ProviderResult<Option<T>> {
        match self.invoke(name, input).await? {
            None => Ok(None),
            Some(output) => T::from_output(output)
                .map(Some)
                .map_err(|other| ProviderError::Contract {
                    feature: name.to_string(),
                    expected: T::EXPECTED,
                    actual: other.kind(),
                }),
        }
    }

    pub async fn search(&self, query: &EntityQuery) -> ProviderResult<Option<SearchResult>> {
        self.call(
            FeatureName::Search(query.entity_type()),
            FeatureInput::Query(query.clone()),
        )
        .await
    }

    pub async fn get(&self, kind: EntityType, id: &str) -> ProviderResult<Option<NativeObject>> {
        self.call(FeatureName::Get(kind), FeatureInput::Id(id.to_string()))
            .await
    }

    pub async fn url_from_id(&self, kind: EntityType, id: &str) -> ProviderResult<Option<String>> {
        self.call(FeatureName::UrlFromId(kind), FeatureInput::Id(id.to_string()))
            .await
    }

    pub async fn id_from_url(&self, kind: EntityType, url: &str) -> ProviderResult<Option<String>> {
        self.call(FeatureName::IdFromUrl(kind), FeatureInput::Url(url.to_string()))
            .await
    }

    pub async fn wikidata_relation_key(&self, kind: EntityType) -> ProviderResult<Option<String>> {
        self.call(FeatureName::WikidataRelationKey(kind), FeatureInput::None)
            .await
    }

    pub async fn anchor_relation_key(&self) -> ProviderResult<Option<String>> {
        self.call(FeatureName::AnchorRelationKey, FeatureInput::None)
            .await
    }

    pub async fn is_anchor_relation(&self, relation: &AnchorRelation) -> ProviderResult<bool> {
        Ok(self
            .call(
                FeatureName::IsAnchorRelation,
                FeatureInput::Relation(relation.clone()),
            )
            .await?
            .unwrap_or(false))
    }

    pub async fn anchor_relations(
        &self,
        kind: EntityType,
        object: &NativeObject,
    ) -> ProviderResult<Vec<AnchorRelation>> {
        Ok(self
            .call(
                FeatureName::AnchorRelations(kind),
                FeatureInput::Entity(object.clone()),
            )
            .await?
            .unwrap_or_default())
    }

    pub async fn search_song_with_acoustid(
        &self,
        fingerprint: &str,
        duration: u32,
        song_name: &str,
    ) -> ProviderResult<Option<SearchResult>> {
        self.call(
            FeatureName::SearchSongWithAcoustId,
            FeatureInput::Fingerprint {
                fingerprint: fingerprint.to_string(),
                duration,
                song_name: song_name.to_string(),
            },
        )
        .await
    }
}

/// Populates a provider's feature map
pub struct ProviderBuilder {
    id: ProviderId,
    name: String,
    anchor: bool,
    features: HashMap<FeatureName, FeatureHandler>,
}

impl ProviderBuilder {
    /// Mark the provider as the identity anchor
    pub fn anchor(mut self) -> Self {
        self.anchor = true;
        self
    }

    /// Register an async handler sharing `ctx` (client, limiter, cache)
    pub fn handle<C, F, Fut>(mut self, name: FeatureName, ctx: Arc<C>, f: F) -> Self
    where
        C: Send + Sync + 'static,
        F: Fn(Arc<C>, FeatureInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProviderResult<Option<FeatureOutput>>> + Send + 'static,
    {
        let handler: FeatureHandler = Arc::new(move |input| {
            let fut = f(Arc::clone(&ctx), input);
            Box::pin(fut)
        });
        self.features.insert(name, handler);
        self
    }

    /// Register a synchronous handler
    pub fn sync<F>(mut self, name: FeatureName, f: F) -> Self
    where
        F: Fn(FeatureInput) -> ProviderResult<Option<FeatureOutput>> + Send + Sync + 'static,
    {
        let handler: FeatureHandler = Arc::new(move |input| {
            let result = f(input);
            Box::pin(async move { result })
        });
        self.features.insert(name, handler);
        self
    }

    /// Register a feature that always yields the same value
    pub fn constant(self, name: FeatureName, output: FeatureOutput) -> Self {
        self.sync(name, move |_| Ok(Some(output.clone())))
    }

    pub fn build(self) -> Provider {
        Provider {
            id: self.id,
            name: self.name,
            anchor: self.anchor,
            features: self.features,
        }
    }
}

/// The providers enabled for this process
#[derive(Debug, Clone, Default)]
pub struct ProviderSet {
    providers: Vec<Arc<Provider>>,
}

impl ProviderSet {
    pub fn new(providers: Vec<Provider>) -> Self {
        Self {
            providers: providers.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn all(&self) -> &[Arc<Provider>] {
        &self.providers
    }

    pub fn get(&self, id: ProviderId) -> Option<&Arc<Provider>> {
        self.providers.iter().find(|p| p.id() == id)
    }

    pub fn anchor(&self) -> Option<&Arc<Provider>> {
        self.providers.iter().find(|p| p.is_anchor())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
