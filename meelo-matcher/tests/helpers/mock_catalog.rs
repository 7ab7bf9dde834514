//! In-memory catalog recording every write

use async_trait::async_trait;
use meelo_common::models::{
    Album, AlbumType, AlbumUpdate, Artist, ArtistRef, EntityId, EntityRef, ExternalMetadata,
    ProviderId, ProviderRecord, Song, SongLyrics, SongMaster, SourceFile,
};
use meelo_matcher::catalog::Catalog;
use meelo_matcher::error::{CatalogError, CatalogResult};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A write the matcher sent to the catalog
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogCall {
    ExternalMetadata(ExternalMetadata),
    ArtistIllustration { artist_id: EntityId, url: String },
    AlbumUpdate { album_id: EntityId, update: AlbumUpdate },
    SongLyrics { song_id: EntityId, lyrics: SongLyrics },
    SongGenres { song_id: EntityId, genres: Vec<String> },
    Provider(String),
    ProviderIcon(ProviderId),
}

#[derive(Default)]
pub struct MockCatalog {
    artists: HashMap<EntityId, Artist>,
    albums: HashMap<EntityId, Album>,
    songs: HashMap<EntityId, Song>,
    files: HashMap<EntityId, SourceFile>,
    stored: HashMap<EntityRef, ExternalMetadata>,
    read_delay: Duration,
    providers: Mutex<Vec<ProviderRecord>>,
    calls: Mutex<Vec<CatalogCall>>,
    active_reads: AtomicUsize,
    max_active_reads: AtomicUsize,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artist(mut self, id: EntityId, name: &str) -> Self {
        self.artists.insert(
            id,
            Artist {
                id,
                name: name.to_string(),
            },
        );
        self
    }

    pub fn with_album(
        mut self,
        id: EntityId,
        name: &str,
        album_type: AlbumType,
        release_date: Option<NaiveDate>,
    ) -> Self {
        self.albums.insert(
            id,
            Album {
                id,
                name: name.to_string(),
                album_type,
                release_date,
                artist: Some(ArtistRef {
                    id: 1,
                    name: "Madonna".to_string(),
                }),
            },
        );
        self
    }

    pub fn with_song(mut self, id: EntityId, name: &str, master: Option<SongMaster>) -> Self {
        self.songs.insert(
            id,
            Song {
                id,
                name: name.to_string(),
                artist: ArtistRef {
                    id: 1,
                    name: "Madonna".to_string(),
                },
                featuring: Vec::new(),
                master,
            },
        );
        self
    }

    pub fn with_file(mut self, id: EntityId, fingerprint: &str) -> Self {
        self.files.insert(
            id,
            SourceFile {
                id,
                fingerprint: Some(fingerprint.to_string()),
            },
        );
        self
    }

    pub fn with_stored(mut self, entity: EntityRef, metadata: ExternalMetadata) -> Self {
        self.stored.insert(entity, metadata);
        self
    }

    pub fn with_provider_record(self, id: ProviderId, name: &str) -> Self {
        if let Ok(mut providers) = self.providers.lock() {
            providers.push(ProviderRecord {
                id,
                name: name.to_string(),
            });
        }
        self
    }

    /// Every entity read takes `delay`
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<CatalogCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn posted_metadata(&self) -> Vec<ExternalMetadata> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                CatalogCall::ExternalMetadata(metadata) => Some(metadata),
                _ => None,
            })
            .collect()
    }

    pub fn album_updates(&self) -> Vec<AlbumUpdate> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                CatalogCall::AlbumUpdate { update, .. } => Some(update),
                _ => None,
            })
            .collect()
    }

    /// Highest number of entity reads seen in flight at once
    pub fn max_active_reads(&self) -> usize {
        self.max_active_reads.load(Ordering::SeqCst)
    }

    fn record(&self, call: CatalogCall) {
        self.calls.lock().unwrap().push(call);
    }

    async fn read<T: Clone>(
        &self,
        map: &HashMap<EntityId, T>,
        route: &str,
        id: EntityId,
    ) -> CatalogResult<T> {
        let active = self.active_reads.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_reads.fetch_max(active, Ordering::SeqCst);
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }
        self.active_reads.fetch_sub(1, Ordering::SeqCst);

        map.get(&id).cloned().ok_or_else(|| CatalogError::Status {
            route: format!("/{}/{}", route, id),
            status: 404,
            body: "Not found".to_string(),
        })
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn get_artist(&self, id: EntityId) -> CatalogResult<Artist> {
        self.read(&self.artists, "artists", id).await
    }

    async fn get_album(&self, id: EntityId) -> CatalogResult<Album> {
        self.read(&self.albums, "albums", id).await
    }

    async fn get_song(&self, id: EntityId) -> CatalogResult<Song> {
        self.read(&self.songs, "songs", id).await
    }

    async fn get_file(&self, id: EntityId) -> CatalogResult<SourceFile> {
        self.read(&self.files, "files", id).await
    }

    async fn get_external_metadata(
        &self,
        entity: EntityRef,
    ) -> CatalogResult<Option<ExternalMetadata>> {
        Ok(self.stored.get(&entity).cloned())
    }

    async fn post_external_metadata(&self, metadata: &ExternalMetadata) -> CatalogResult<()> {
        self.record(CatalogCall::ExternalMetadata(metadata.clone()));
        Ok(())
    }

    async fn post_artist_illustration(&self, artist_id: EntityId, url: &str) -> CatalogResult<()> {
        self.record(CatalogCall::ArtistIllustration {
            artist_id,
            url: url.to_string(),
        });
        Ok(())
    }

    async fn post_album_update(
        &self,
        album_id: EntityId,
        update: &AlbumUpdate,
    ) -> CatalogResult<()> {
        self.record(CatalogCall::AlbumUpdate {
            album_id,
            update: update.clone(),
        });
        Ok(())
    }

    async fn post_song_lyrics(&self, song_id: EntityId, lyrics: &SongLyrics) -> CatalogResult<()> {
        self.record(CatalogCall::SongLyrics {
            song_id,
            lyrics: lyrics.clone(),
        });
        Ok(())
    }

    async fn post_song_genres(&self, song_id: EntityId, genres: &[String]) -> CatalogResult<()> {
        self.record(CatalogCall::SongGenres {
            song_id,
            genres: genres.to_vec(),
        });
        Ok(())
    }

    async fn get_providers(&self) -> CatalogResult<Vec<ProviderRecord>> {
        Ok(self.providers.lock().unwrap().clone())
    }

    async fn post_provider(&self, name: &str) -> CatalogResult<ProviderRecord> {
        self.record(CatalogCall::Provider(name.to_string()));
        let mut providers = self.providers.lock().unwrap();
        let record = ProviderRecord {
            id: providers.iter().map(|p| p.id).max().unwrap_or(0) + 1,
            name: name.to_string(),
        };
        providers.push(record.clone());
        Ok(record)
    }

    async fn post_provider_icon(&self, provider_id: ProviderId, _icon: &Path) -> CatalogResult<()> {
        self.record(CatalogCall::ProviderIcon(provider_id));
        Ok(())
    }
}
