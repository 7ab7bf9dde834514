//! Fetch/Merge Orchestrator
//!
//! One task per provider, all running concurrently. A task confirms (or
//! searches for) the provider's record, then runs the field features the
//! provider supports and merges their values into the shared accumulator.
//! A field whose guard is already satisfied when the task reaches it is
//! not fetched again.

use chrono::NaiveDate;
use futures::future::BoxFuture;
use futures::FutureExt;
use meelo_common::models::{AlbumType, EntityType, ExternalSource};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::resolver::Resolution;
use super::result::{
    Accumulator, AlbumMatchResult, ArtistMatchResult, MatchResult, SongMatchResult,
};
use crate::providers::{
    EntityQuery, FeatureInput, FeatureName, FromFeatureOutput, NativeObject, Provider,
    ProviderSet, SyncedLyrics,
};

/// Per-match switches for the field guards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRules {
    /// Collect genres from every provider
    pub push_genres: bool,
    /// The stored album type may be replaced
    pub resolve_album_type: bool,
}

/// Field features of one entity kind
pub trait FieldBinding: MatchResult {
    const KIND: EntityType;

    fn bind_fields(
        provider: Arc<Provider>,
        object: NativeObject,
        acc: Accumulator<Self>,
        rules: FieldRules,
    ) -> BoxFuture<'static, ()>;
}

/// Run one field feature: check support, check the guard under the lock,
/// call the provider without the lock, merge under the lock
pub async fn bind_feature<R, T, G, M>(
    acc: &Accumulator<R>,
    provider: &Provider,
    feature: FeatureName,
    object: &NativeObject,
    guard: G,
    merge: M,
) where
    R: MatchResult,
    T: FromFeatureOutput,
    G: FnOnce(&R) -> bool,
    M: FnOnce(&mut R, T),
{
    if !provider.has_feature(feature) {
        return;
    }
    if !acc.with(|result| guard(result)) {
        debug!(provider = %provider.name(), feature = %feature, "Field already resolved");
        return;
    }
    match provider
        .call::<T>(feature, FeatureInput::Entity(object.clone()))
        .await
    {
        Ok(Some(value)) => acc.with(|result| merge(result, value)),
        Ok(None) => {}
        Err(e) => warn!(
            provider = %provider.name(),
            feature = %feature,
            error = %e,
            "Feature failed"
        ),
    }
}

impl FieldBinding for ArtistMatchResult {
    const KIND: EntityType = EntityType::Artist;

    fn bind_fields(
        provider: Arc<Provider>,
        object: NativeObject,
        acc: Accumulator<Self>,
        _rules: FieldRules,
    ) -> BoxFuture<'static, ()> {
        async move {
            let description = bind_feature(
                &acc,
                &provider,
                FeatureName::Description(Self::KIND),
                &object,
                |r: &Self| r.metadata.description.is_none(),
                |r: &mut Self, value: String| {
                    r.metadata.set_description_if_none(value);
                },
            );
            let illustration = bind_feature(
                &acc,
                &provider,
                FeatureName::ArtistIllustrationUrl,
                &object,
                |r: &Self| r.illustration_url.is_none(),
                |r: &mut Self, value: String| {
                    super::result::set_if_none(&mut r.illustration_url, value);
                },
            );
            futures::join!(description, illustration);
        }
        .boxed()
    }
}

impl FieldBinding for AlbumMatchResult {
    const KIND: EntityType = EntityType::Album;

    fn bind_fields(
        provider: Arc<Provider>,
        object: NativeObject,
        acc: Accumulator<Self>,
        rules: FieldRules,
    ) -> BoxFuture<'static, ()> {
        async move {
            let description = bind_feature(
                &acc,
                &provider,
                FeatureName::Description(Self::KIND),
                &object,
                |r: &Self| r.metadata.description.is_none(),
                |r: &mut Self, value: String| {
                    r.metadata.set_description_if_none(value);
                },
            );
            let release_date = bind_feature(
                &acc,
                &provider,
                FeatureName::AlbumReleaseDate,
                &object,
                |r: &Self| r.release_date.is_none(),
                |r: &mut Self, value: NaiveDate| {
                    super::result::set_if_none(&mut r.release_date, value);
                },
            );
            let rating = bind_feature(
                &acc,
                &provider,
                FeatureName::AlbumRating,
                &object,
                |r: &Self| r.metadata.rating.is_none(),
                |r: &mut Self, value: u8| {
                    r.metadata.set_rating_if_none(value);
                },
            );
            let album_type = bind_feature(
                &acc,
                &provider,
                FeatureName::AlbumType,
                &object,
                |r: &Self| rules.resolve_album_type && r.album_type.is_none(),
                |r: &mut Self, value: AlbumType| {
                    super::result::set_if_none(&mut r.album_type, value);
                },
            );
            let genres = bind_feature(
                &acc,
                &provider,
                FeatureName::Genres(Self::KIND),
                &object,
                |_: &Self| rules.push_genres,
                |r: &mut Self, value: Vec<String>| r.metadata.push_genres(value),
            );
            futures::join!(description, release_date, rating, album_type, genres);
        }
        .boxed()
    }
}

impl FieldBinding for SongMatchResult {
    const KIND: EntityType = EntityType::Song;

    fn bind_fields(
        provider: Arc<Provider>,
        object: NativeObject,
        acc: Accumulator<Self>,
        rules: FieldRules,
    ) -> BoxFuture<'static, ()> {
        async move {
            let description = bind_feature(
                &acc,
                &provider,
                FeatureName::Description(Self::KIND),
                &object,
                |r: &Self| r.metadata.description.is_none(),
                |r: &mut Self, value: String| {
                    r.metadata.set_description_if_none(value);
                },
            );
            let genres = bind_feature(
                &acc,
                &provider,
                FeatureName::Genres(Self::KIND),
                &object,
                |_: &Self| rules.push_genres,
                |r: &mut Self, value: Vec<String>| r.metadata.push_genres(value),
            );
            let synced = bind_feature(
                &acc,
                &provider,
                FeatureName::SyncedLyrics,
                &object,
                |r: &Self| r.lyrics.synced.is_none(),
                |r: &mut Self, value: SyncedLyrics| {
                    super::result::set_if_none(&mut r.lyrics.synced, value);
                },
            );
            let plain = bind_feature(
                &acc,
                &provider,
                FeatureName::PlainLyrics,
                &object,
                |r: &Self| r.lyrics.plain.is_none(),
                |r: &mut Self, value: String| {
                    super::result::set_if_none(&mut r.lyrics.plain, value);
                },
            );
            futures::join!(description, genres, synced, plain);
        }
        .boxed()
    }
}

pub struct Orchestrator {
    providers: ProviderSet,
}

impl Orchestrator {
    pub fn new(providers: ProviderSet) -> Self {
        Self { providers }
    }

    /// Fetch and merge every provider's contribution
    pub async fn run<R: FieldBinding>(
        &self,
        query: EntityQuery,
        resolution: Resolution,
        rules: FieldRules,
    ) -> R {
        let acc = Accumulator::new(R::default());
        let query = Arc::new(query);
        let mut tasks = JoinSet::new();

        for provider in self.providers.all() {
            let known = resolution.source_for(provider.id()).cloned();
            let may_search =
                resolution.search_allowed && !resolution.searched.contains(&provider.id());
            if known.is_none() && !may_search {
                continue;
            }
            tasks.spawn(provider_task::<R>(
                Arc::clone(provider),
                Arc::clone(&query),
                known,
                may_search,
                acc.clone(),
                rules,
            ));
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Provider task aborted");
            }
        }

        let mut result = acc.snapshot();
        let order: Vec<_> = self.providers.all().iter().map(|p| p.id()).collect();
        result
            .metadata_mut()
            .sources
            .sort_by_key(|s| order.iter().position(|id| *id == s.provider_id));
        result.finish();
        result
    }
}

async fn provider_task<R: FieldBinding>(
    provider: Arc<Provider>,
    query: Arc<EntityQuery>,
    known: Option<ExternalSource>,
    may_search: bool,
    acc: Accumulator<R>,
    rules: FieldRules,
) {
    let kind = R::KIND;
    let mut source = None;
    let mut object = None;

    if let Some(known) = known {
        if provider.has_feature(FeatureName::Get(kind)) {
            if let Some(fetched) = fetch_known(&provider, kind, &known.url).await {
                source = Some(known);
                object = Some(fetched);
            }
        } else {
            source = Some(known);
        }
    }

    if source.is_none() && may_search {
        if let Some((found, fetched)) = search(&provider, &query).await {
            source = Some(found);
            object = fetched;
        }
    }

    if let Some(source) = source {
        acc.with(|result| result.metadata_mut().push_source(source));
    }
    let Some(object) = object else {
        return;
    };
    R::bind_fields(provider, object, acc, rules).await;
}

async fn fetch_known(provider: &Provider, kind: EntityType, url: &str) -> Option<NativeObject> {
    let id = match provider.id_from_url(kind, url).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            debug!(provider = %provider.name(), url = %url, "Source URL not recognized");
            return None;
        }
        Err(e) => {
            warn!(provider = %provider.name(), error = %e, "Source URL parsing failed");
            return None;
        }
    };
    match provider.get(kind, &id).await {
        Ok(object) => object,
        Err(e) => {
            warn!(provider = %provider.name(), id = %id, error = %e, "Fetch failed");
            None
        }
    }
}

/// Search fallback: a new source, plus the record when available
async fn search(
    provider: &Provider,
    query: &EntityQuery,
) -> Option<(ExternalSource, Option<NativeObject>)> {
    let kind = query.entity_type();
    if !provider.has_feature(FeatureName::Search(kind)) {
        return None;
    }
    let found = match provider.search(query).await {
        Ok(Some(found)) => found,
        Ok(None) => return None,
        Err(e) => {
            warn!(provider = %provider.name(), error = %e, "Search failed");
            return None;
        }
    };
    let url = match provider.url_from_id(kind, &found.id).await {
        Ok(Some(url)) => url,
        Ok(None) => return None,
        Err(e) => {
            warn!(provider = %provider.name(), error = %e, "URL building failed");
            return None;
        }
    };
    let object = match found.object {
        Some(object) => Some(object),
        None => provider.get(kind, &found.id).await.unwrap_or_else(|e| {
            warn!(provider = %provider.name(), error = %e, "Fetch failed");
            None
        }),
    };
    debug!(provider = %provider.name(), url = %url, "Found by search");
    Some((ExternalSource::new(url, provider.id()), object))
}
