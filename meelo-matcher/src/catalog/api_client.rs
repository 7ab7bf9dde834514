//! REST client for the catalog API

use async_trait::async_trait;
use meelo_common::models::{
    Album, AlbumUpdate, Artist, EntityId, EntityRef, ExternalMetadata, Page, ProviderId,
    ProviderRecord, Song, SongLyrics, SourceFile,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::Catalog;
use crate::error::{CatalogError, CatalogResult};

const API_KEY_HEADER: &str = "x-api-key";

pub struct ApiCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl ApiCatalog {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> CatalogResult<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|e| CatalogError::Network(format!("Invalid API key header: {}", e)))?;
        headers.insert(API_KEY_HEADER, key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    /// Send a request and turn non-2xx answers into [`CatalogError::Status`]
    async fn send(&self, request: RequestBuilder, route: &str) -> CatalogResult<Response> {
        debug!(route = %route, "Catalog request");
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CatalogError::Status {
            route: route.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        route: &str,
        query: &[(&str, &str)],
    ) -> CatalogResult<T> {
        let request = self.client.get(self.url(route)).query(query);
        let response = self.send(request, route).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }
}

fn entity_filter(entity: EntityRef) -> (&'static str, String) {
    (entity.entity_type().as_str(), entity.id().to_string())
}

#[async_trait]
impl Catalog for ApiCatalog {
    async fn get_artist(&self, id: EntityId) -> CatalogResult<Artist> {
        self.get(&format!("/artists/{}", id), &[]).await
    }

    async fn get_album(&self, id: EntityId) -> CatalogResult<Album> {
        self.get(&format!("/albums/{}", id), &[("with", "artist")]).await
    }

    async fn get_song(&self, id: EntityId) -> CatalogResult<Song> {
        self.get(&format!("/songs/{}", id), &[("with", "artist,featuring,master")])
            .await
    }

    async fn get_file(&self, id: EntityId) -> CatalogResult<SourceFile> {
        self.get(&format!("/files/{}", id), &[]).await
    }

    async fn get_external_metadata(
        &self,
        entity: EntityRef,
    ) -> CatalogResult<Option<ExternalMetadata>> {
        let (key, value) = entity_filter(entity);
        match self.get("/external-metadata", &[(key, value.as_str())]).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(CatalogError::Status { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn post_external_metadata(&self, metadata: &ExternalMetadata) -> CatalogResult<()> {
        let route = "/external-metadata";
        self.send(self.client.post(self.url(route)).json(metadata), route)
            .await?;
        Ok(())
    }

    async fn post_artist_illustration(&self, artist_id: EntityId, url: &str) -> CatalogResult<()> {
        let route = "/illustrations/url";
        let body = json!({ "url": url, "artistId": artist_id });
        self.send(self.client.post(self.url(route)).json(&body), route)
            .await?;
        Ok(())
    }

    async fn post_album_update(
        &self,
        album_id: EntityId,
        update: &AlbumUpdate,
    ) -> CatalogResult<()> {
        let route = format!("/albums/{}", album_id);
        self.send(self.client.put(self.url(&route)).json(update), &route)
            .await?;
        Ok(())
    }

    async fn post_song_lyrics(&self, song_id: EntityId, lyrics: &SongLyrics) -> CatalogResult<()> {
        let route = format!("/songs/{}/lyrics", song_id);
        self.send(self.client.post(self.url(&route)).json(lyrics), &route)
            .await?;
        Ok(())
    }

    async fn post_song_genres(&self, song_id: EntityId, genres: &[String]) -> CatalogResult<()> {
        let route = format!("/songs/{}", song_id);
        let body = json!({ "genres": genres });
        self.send(self.client.put(self.url(&route)).json(&body), &route)
            .await?;
        Ok(())
    }

    async fn get_providers(&self) -> CatalogResult<Vec<ProviderRecord>> {
        let page: Page<ProviderRecord> = self.get("/external-providers", &[("take", "100")]).await?;
        Ok(page.items)
    }

    async fn post_provider(&self, name: &str) -> CatalogResult<ProviderRecord> {
        let route = "/external-providers";
        let response = self
            .send(
                self.client.post(self.url(route)).json(&json!({ "name": name })),
                route,
            )
            .await?;
        response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    async fn post_provider_icon(&self, provider_id: ProviderId, icon: &Path) -> CatalogResult<()> {
        let route = format!("/external-providers/{}/icon", provider_id);
        let bytes = tokio::fs::read(icon).await?;
        let file_name = icon
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "icon.png".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new().part("file", part);
        self.send(self.client.post(self.url(&route)).multipart(form), &route)
            .await?;
        Ok(())
    }
}
