//! Catalog interface
//!
//! The catalog owns the entities; the matcher reads them and posts what it
//! found. [`ApiCatalog`] talks to the catalog REST API.

mod api_client;

pub use api_client::ApiCatalog;

use async_trait::async_trait;
use meelo_common::models::{
    Album, AlbumUpdate, Artist, EntityId, EntityRef, ExternalMetadata, ProviderId,
    ProviderRecord, Song, SongLyrics, SourceFile,
};
use std::path::Path;

use crate::error::CatalogResult;

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_artist(&self, id: EntityId) -> CatalogResult<Artist>;
    async fn get_album(&self, id: EntityId) -> CatalogResult<Album>;
    async fn get_song(&self, id: EntityId) -> CatalogResult<Song>;
    async fn get_file(&self, id: EntityId) -> CatalogResult<SourceFile>;

    /// Stored external metadata, `None` when the entity has none yet
    async fn get_external_metadata(
        &self,
        entity: EntityRef,
    ) -> CatalogResult<Option<ExternalMetadata>>;

    async fn post_external_metadata(&self, metadata: &ExternalMetadata) -> CatalogResult<()>;
    async fn post_artist_illustration(&self, artist_id: EntityId, url: &str) -> CatalogResult<()>;
    async fn post_album_update(&self, album_id: EntityId, update: &AlbumUpdate)
        -> CatalogResult<()>;
    async fn post_song_lyrics(&self, song_id: EntityId, lyrics: &SongLyrics) -> CatalogResult<()>;
    async fn post_song_genres(&self, song_id: EntityId, genres: &[String]) -> CatalogResult<()>;

    async fn get_providers(&self) -> CatalogResult<Vec<ProviderRecord>>;
    async fn post_provider(&self, name: &str) -> CatalogResult<ProviderRecord>;
    async fn post_provider_icon(&self, provider_id: ProviderId, icon: &Path) -> CatalogResult<()>;
}
