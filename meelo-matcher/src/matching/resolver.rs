//! Source Resolver
//!
//! Finds which provider records describe the entity being matched:
//!
//! 1. search the anchor provider and read the links on its record
//! 2. hand each link to the first provider that claims it
//! 3. look the remaining providers up in the Wikidata item, if linked
//!
//! Providers still unresolved after that search for themselves during the
//! fetch stage, unless the match reuses stored sources.

use meelo_common::models::{EntityType, ExternalSource, ProviderId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::bridge::{bridge_id_from_url, RelationBridge, WikidataRelations};
use crate::error::ProviderResult;
use crate::providers::{
    AnchorRelation, EntityQuery, FeatureName, Provider, ProviderSet, SearchResult,
};

/// Relation type the anchor uses for the Wikidata item
pub const BRIDGE_RELATION_KEY: &str = "wikidata";

/// Sources known before fetching
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub sources: Vec<ExternalSource>,
    /// Providers without a source may search for the entity
    pub search_allowed: bool,
    /// Providers already searched during resolution
    pub searched: HashSet<ProviderId>,
}

impl Resolution {
    /// Stored sources, used as-is
    pub fn reuse(sources: Vec<ExternalSource>) -> Self {
        Self {
            sources,
            search_allowed: false,
            searched: HashSet::new(),
        }
    }

    pub fn source_for(&self, provider_id: ProviderId) -> Option<&ExternalSource> {
        self.sources.iter().find(|s| s.provider_id == provider_id)
    }

    fn push(&mut self, source: ExternalSource) -> bool {
        if self.source_for(source.provider_id).is_some() {
            return false;
        }
        self.sources.push(source);
        true
    }
}

pub struct SourceResolver<'a> {
    providers: &'a ProviderSet,
    bridge: &'a dyn RelationBridge,
}

impl<'a> SourceResolver<'a> {
    pub fn new(providers: &'a ProviderSet, bridge: &'a dyn RelationBridge) -> Self {
        Self { providers, bridge }
    }

    /// Resolve sources for `query`; `known` switches to reuse mode
    pub async fn resolve(
        &self,
        query: &EntityQuery,
        known: Option<Vec<ExternalSource>>,
    ) -> Resolution {
        if let Some(known) = known {
            debug!(sources = known.len(), "Reusing stored sources");
            return Resolution::reuse(known);
        }

        let kind = query.entity_type();
        let mut resolution = Resolution {
            search_allowed: true,
            ..Default::default()
        };
        let mut remaining: Vec<Arc<Provider>> = self
            .providers
            .all()
            .iter()
            .filter(|p| !p.is_anchor())
            .cloned()
            .collect();

        let Some(anchor) = self.providers.anchor() else {
            return resolution;
        };
        resolution.searched.insert(anchor.id());

        let relations = match self.anchor_tier(anchor, query, &mut resolution).await {
            Ok(relations) => relations,
            Err(e) => {
                warn!(provider = %anchor.name(), error = %e, "Anchor lookup failed");
                Vec::new()
            }
        };

        let bridge_id = self
            .relation_tier(kind, &relations, &mut remaining, &mut resolution)
            .await;

        if let Some(bridge_id) = bridge_id {
            if !remaining.is_empty() {
                self.bridge_tier(kind, &bridge_id, &mut remaining, &mut resolution)
                    .await;
            }
        }

        info!(
            kind = %kind,
            name = %query.name(),
            sources = resolution.sources.len(),
            unresolved = remaining.len(),
            "Sources resolved"
        );
        resolution
    }

    /// Search the anchor, record its source and return its relations
    async fn anchor_tier(
        &self,
        anchor: &Provider,
        query: &EntityQuery,
        resolution: &mut Resolution,
    ) -> ProviderResult<Vec<AnchorRelation>> {
        let kind = query.entity_type();
        let Some(found) = search_anchor(anchor, query).await? else {
            debug!(provider = %anchor.name(), "Anchor search found nothing");
            return Ok(Vec::new());
        };
        if let Some(url) = anchor.url_from_id(kind, &found.id).await? {
            resolution.push(ExternalSource::new(url, anchor.id()));
        }

        let object = match found.object {
            Some(object) => Some(object),
            None => anchor.get(kind, &found.id).await?,
        };
        match object {
            Some(object) => anchor.anchor_relations(kind, &object).await,
            None => Ok(Vec::new()),
        }
    }

    /// Assign relations to providers; returns the bridge id if linked
    async fn relation_tier(
        &self,
        kind: EntityType,
        relations: &[AnchorRelation],
        remaining: &mut Vec<Arc<Provider>>,
        resolution: &mut Resolution,
    ) -> Option<String> {
        let mut bridge_id = None;

        for relation in relations {
            if relation.relation_type == BRIDGE_RELATION_KEY {
                if bridge_id.is_none() {
                    bridge_id = bridge_id_from_url(&relation.url);
                }
                continue;
            }
            if remaining.is_empty() {
                continue;
            }
            let Some(index) = claiming_provider(remaining, relation).await else {
                continue;
            };
            let provider = &remaining[index];

            if provider.has_feature(FeatureName::IdFromUrl(kind)) {
                match provider.id_from_url(kind, &relation.url).await {
                    Ok(Some(_)) => {}
                    Ok(None) | Err(_) => {
                        debug!(
                            provider = %provider.name(),
                            url = %relation.url,
                            "Discarding relation with unexpected URL"
                        );
                        continue;
                    }
                }
            }

            resolution.push(ExternalSource::new(relation.url.clone(), provider.id()));
            remaining.remove(index);
        }

        bridge_id
    }

    async fn bridge_tier(
        &self,
        kind: EntityType,
        bridge_id: &str,
        remaining: &mut Vec<Arc<Provider>>,
        resolution: &mut Resolution,
    ) {
        let relations = match self.bridge.relations(bridge_id).await {
            Ok(Some(relations)) => relations,
            Ok(None) => return,
            Err(e) => {
                warn!(bridge_id = %bridge_id, error = %e, "Wikidata lookup failed");
                return;
            }
        };

        let mut resolved = Vec::new();
        for provider in remaining.iter() {
            match bridge_source(provider, kind, &relations).await {
                Ok(Some(source)) => {
                    if resolution.push(source) {
                        resolved.push(provider.id());
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(provider = %provider.name(), error = %e, "Bridge resolution failed")
                }
            }
        }
        remaining.retain(|p| !resolved.contains(&p.id()));
    }
}

/// Songs are looked up by fingerprint when the catalog has one
async fn search_anchor(
    anchor: &Provider,
    query: &EntityQuery,
) -> ProviderResult<Option<SearchResult>> {
    if let EntityQuery::Song {
        name,
        fingerprint: Some(fingerprint),
        duration: Some(duration),
        ..
    } = query
    {
        if anchor.has_feature(FeatureName::SearchSongWithAcoustId) {
            return anchor
                .search_song_with_acoustid(fingerprint, *duration, name)
                .await;
        }
    }
    anchor.search(query).await
}

/// Index of the provider claiming `relation`: exact relation key first,
/// then the providers' own recognizers
async fn claiming_provider(
    providers: &[Arc<Provider>],
    relation: &AnchorRelation,
) -> Option<usize> {
    for (index, provider) in providers.iter().enumerate() {
        if let Ok(Some(key)) = provider.anchor_relation_key().await {
            if key == relation.relation_type {
                return Some(index);
            }
        }
    }
    for (index, provider) in providers.iter().enumerate() {
        if provider.is_anchor_relation(relation).await.unwrap_or(false) {
            return Some(index);
        }
    }
    None
}

async fn bridge_source(
    provider: &Provider,
    kind: EntityType,
    relations: &WikidataRelations,
) -> ProviderResult<Option<ExternalSource>> {
    let Some(key) = provider.wikidata_relation_key(kind).await? else {
        return Ok(None);
    };
    let Some(identifier) = relations.get(&key) else {
        return Ok(None);
    };
    Ok(provider
        .url_from_id(kind, identifier)
        .await?
        .map(|url| ExternalSource::new(url, provider.id())))
}
