//! Match Coordinator
//!
//! Entry point of the engine. Matches run one at a time: a match reads the
//! entity from the catalog, resolves its sources, fetches and merges
//! provider data, then posts what passes the post rules.

use futures::FutureExt;
use meelo_common::models::{
    AlbumUpdate, EntityId, EntityRef, EntityType, SongLyrics,
};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::orchestrator::{FieldRules, Orchestrator};
use super::policy::{album_type_update, check_release_date, ReleaseDateDecision};
use super::resolver::{Resolution, SourceResolver};
use super::result::{AlbumMatchResult, ArtistMatchResult, SongMatchResult};
use super::MatchTask;
use crate::bridge::RelationBridge;
use crate::catalog::Catalog;
use crate::config::MatcherSettings;
use crate::error::MatchError;
use crate::providers::{EntityQuery, ProviderSet};
use crate::tasks::TaskSource;

/// Entity being matched right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InProgress {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub id: EntityId,
}

/// Snapshot served by the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatcherStatus {
    pub pending_count: usize,
    pub processed_count: u64,
    pub in_progress: Option<InProgress>,
}

/// Everything a match needs: catalog, providers, bridge and settings
pub struct MatchEngine {
    catalog: Arc<dyn Catalog>,
    providers: ProviderSet,
    bridge: Arc<dyn RelationBridge>,
    settings: MatcherSettings,
    orchestrator: Orchestrator,
}

impl MatchEngine {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        providers: ProviderSet,
        bridge: Arc<dyn RelationBridge>,
        settings: MatcherSettings,
    ) -> Self {
        let orchestrator = Orchestrator::new(providers.clone());
        Self {
            catalog,
            providers,
            bridge,
            settings,
            orchestrator,
        }
    }

    /// Match one entity and post the results
    pub async fn run(&self, task: &MatchTask) -> Result<(), MatchError> {
        match task.entity_type {
            EntityType::Artist => self.match_artist(task).await,
            EntityType::Album => self.match_album(task).await,
            EntityType::Song => self.match_song(task).await,
        }
    }

    async fn resolve(
        &self,
        query: &EntityQuery,
        entity: EntityRef,
        reuse: bool,
    ) -> Result<Resolution, MatchError> {
        let known = if reuse {
            let stored = self.catalog.get_external_metadata(entity).await?;
            Some(stored.map(|m| m.sources).unwrap_or_default())
        } else {
            None
        };
        let resolver = SourceResolver::new(&self.providers, self.bridge.as_ref());
        Ok(resolver.resolve(query, known).await)
    }

    fn rules(&self, resolve_album_type: bool) -> FieldRules {
        FieldRules {
            push_genres: self.settings.push_genres,
            resolve_album_type,
        }
    }

    async fn match_artist(&self, task: &MatchTask) -> Result<(), MatchError> {
        let artist = self.catalog.get_artist(task.entity_id).await?;
        let entity = EntityRef::Artist(artist.id);
        let query = EntityQuery::Artist {
            name: artist.name.clone(),
        };
        let resolution = self.resolve(&query, entity, task.reuse_known_sources).await?;
        let result: ArtistMatchResult = self
            .orchestrator
            .run(query, resolution, self.rules(false))
            .await;

        let metadata = &result.metadata;
        if !metadata.sources.is_empty() || metadata.description.is_some() {
            info!(
                artist = %artist.name,
                sources = metadata.sources.len(),
                "Matched artist"
            );
            self.catalog
                .post_external_metadata(&metadata.to_external_metadata(entity))
                .await?;
        }
        if let Some(url) = &result.illustration_url {
            info!(artist = %artist.name, "Found artist illustration");
            self.catalog.post_artist_illustration(artist.id, url).await?;
        }
        Ok(())
    }

    async fn match_album(&self, task: &MatchTask) -> Result<(), MatchError> {
        let album = self.catalog.get_album(task.entity_id).await?;
        let entity = EntityRef::Album(album.id);
        let query = EntityQuery::Album {
            name: album.name.clone(),
            artist: album.artist.as_ref().map(|a| a.name.clone()),
        };
        let resolvable = self.settings.is_album_type_resolvable(album.album_type);
        let resolution = self.resolve(&query, entity, task.reuse_known_sources).await?;
        let result: AlbumMatchResult = self
            .orchestrator
            .run(query, resolution, self.rules(resolvable))
            .await;

        info!(
            album = %album.name,
            sources = result.metadata.sources.len(),
            "Matched album"
        );
        self.catalog
            .post_external_metadata(&result.metadata.to_external_metadata(entity))
            .await?;

        let release_date = result.release_date.and_then(|resolved| {
            match check_release_date(
                album.release_date,
                resolved,
                self.settings.release_date_tolerance_years,
            ) {
                ReleaseDateDecision::Keep(date) => Some(date),
                decision => {
                    debug!(album = %album.name, ?decision, "Resolved release date discarded");
                    None
                }
            }
        });
        let genres = &result.metadata.genres;
        let update = AlbumUpdate {
            release_date,
            genres: (!genres.is_empty()).then(|| genres.clone()),
            album_type: album_type_update(album.album_type, result.album_type, resolvable),
        };

        if update.is_empty() {
            return Ok(());
        }
        if let Some(album_type) = update.album_type {
            info!(album = %album.name, %album_type, "Found album type");
        }
        self.catalog.post_album_update(album.id, &update).await?;
        Ok(())
    }

    async fn match_song(&self, task: &MatchTask) -> Result<(), MatchError> {
        let song = self.catalog.get_song(task.entity_id).await?;
        let entity = EntityRef::Song(song.id);
        let master = song.master.as_ref();
        let fingerprint = match master.and_then(|m| m.source_file_id) {
            Some(file_id) => self.catalog.get_file(file_id).await?.fingerprint,
            None => None,
        };
        let query = EntityQuery::Song {
            name: song.name.clone(),
            artist: song.artist.name.clone(),
            featuring: song.featuring.iter().map(|a| a.name.clone()).collect(),
            duration: master.and_then(|m| m.duration),
            fingerprint,
        };
        let resolution = self.resolve(&query, entity, task.reuse_known_sources).await?;
        let result: SongMatchResult = self
            .orchestrator
            .run(query, resolution, self.rules(false))
            .await;

        info!(
            song = %song.name,
            sources = result.metadata.sources.len(),
            "Matched song"
        );
        self.catalog
            .post_external_metadata(&result.metadata.to_external_metadata(entity))
            .await?;

        if let Some(plain) = result.lyrics.plain.clone() {
            info!(
                song = %song.name,
                synced = result.lyrics.synced.is_some(),
                "Found lyrics"
            );
            let lyrics = SongLyrics {
                plain,
                synced: result.lyrics.synced.clone(),
            };
            self.catalog.post_song_lyrics(song.id, &lyrics).await?;
        }
        if !result.metadata.genres.is_empty() {
            self.catalog
                .post_song_genres(song.id, &result.metadata.genres)
                .await?;
        }
        Ok(())
    }
}

/// Single-flight front of the [`MatchEngine`]
pub struct MatchCoordinator {
    engine: MatchEngine,
    tasks: Arc<dyn TaskSource>,
    lock: Mutex<()>,
    processed: AtomicU64,
    /// The task source had nothing pending when the last match ended
    drained: AtomicBool,
    in_progress: RwLock<Option<InProgress>>,
}

impl MatchCoordinator {
    pub fn new(engine: MatchEngine, tasks: Arc<dyn TaskSource>) -> Self {
        Self {
            engine,
            tasks,
            lock: Mutex::new(()),
            processed: AtomicU64::new(0),
            drained: AtomicBool::new(true),
            in_progress: RwLock::new(None),
        }
    }

    /// Match one entity, waiting for any match already running
    ///
    /// Provider failures never surface here; catalog failures and panics do.
    /// The processed counter covers the tasks handled since the task source
    /// was last empty.
    pub async fn match_entity(&self, task: &MatchTask) -> Result<(), MatchError> {
        let _single_flight = self.lock.lock().await;

        if self.drained.load(Ordering::SeqCst) {
            self.processed.store(0, Ordering::SeqCst);
        }
        self.set_in_progress(Some(InProgress {
            name: task.entity_name.clone(),
            entity_type: task.entity_type,
            id: task.entity_id,
        }));
        info!(
            entity_type = %task.entity_type,
            entity_id = task.entity_id,
            name = %task.entity_name,
            reuse = task.reuse_known_sources,
            "Matching"
        );

        let outcome = AssertUnwindSafe(self.engine.run(task))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(MatchError::Aborted("match panicked".to_string())));

        self.set_in_progress(None);
        self.processed.fetch_add(1, Ordering::SeqCst);
        self.drained.store(self.tasks.pending_count() == 0, Ordering::SeqCst);

        if let Err(e) = &outcome {
            error!(
                entity_type = %task.entity_type,
                entity_id = task.entity_id,
                error = %e,
                "Match failed"
            );
        }
        outcome
    }

    pub fn status(&self) -> MatcherStatus {
        MatcherStatus {
            pending_count: self.tasks.pending_count(),
            processed_count: self.processed.load(Ordering::SeqCst),
            in_progress: self
                .in_progress
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    fn set_in_progress(&self, value: Option<InProgress>) {
        *self
            .in_progress
            .write()
            .unwrap_or_else(PoisonError::into_inner) = value;
    }
}
