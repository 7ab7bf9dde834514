//! MusicBrainz provider
//!
//! The identity anchor: every match starts with a MusicBrainz search, and
//! the URL relations listed on the MusicBrainz record seed the other
//! providers. MusicBrainz allows one request per second per client, so all
//! calls that miss the response cache wait on a token bucket first.

use chrono::NaiveDate;
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use meelo_common::models::{AlbumType, EntityType, ProviderId};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use super::http::{build_client, get_json, last_path_segment};
use super::text::{names_match, similarity, strip_release_suffix, title_case};
use super::{
    AnchorRelation, EntityQuery, FeatureInput, FeatureName, FeatureOutput, Provider,
    SearchResult,
};
use crate::error::ProviderResult;

pub const NAME: &str = "MusicBrainz";

const API_URL: &str = "https://musicbrainz.org/ws/2";
const WEB_URL: &str = "https://musicbrainz.org";
const ACOUSTID_URL: &str = "https://api.acoustid.org/v2/lookup";
const CACHE_CAPACITY: usize = 256;
const SEARCH_LIMIT: &str = "10";
/// Tolerated gap between a recording length and the catalog duration
const DURATION_TOLERANCE_SECS: i64 = 5;

const KINDS: [EntityType; 3] = [EntityType::Artist, EntityType::Album, EntityType::Song];

/// Settings of the MusicBrainz provider
#[derive(Debug, Clone)]
pub struct MusicBrainzConfig {
    pub requests_per_second: u32,
    pub timeout: Duration,
    pub acoustid_api_key: Option<String>,
    pub api_url: String,
}

impl Default for MusicBrainzConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 1,
            timeout: Duration::from_secs(30),
            acoustid_api_key: None,
            api_url: API_URL.to_string(),
        }
    }
}

/// MusicBrainz resource path segment for an entity kind
fn resource(kind: EntityType) -> &'static str {
    match kind {
        EntityType::Artist => "artist",
        EntityType::Album => "release-group",
        EntityType::Song => "recording",
    }
}

/// Wikidata property holding MusicBrainz ids
fn wikidata_property(kind: EntityType) -> &'static str {
    match kind {
        EntityType::Artist => "P434",
        EntityType::Album => "P436",
        EntityType::Song => "P4404",
    }
}

/// Bounded FIFO cache of raw API responses
#[derive(Debug, Default)]
struct ResponseCache {
    entries: HashMap<String, Value>,
    order: VecDeque<String>,
}

impl ResponseCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, value: Value) {
        if self.entries.contains_key(&key) {
            return;
        }
        if self.order.len() >= CACHE_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value);
    }
}

#[derive(Debug, Deserialize)]
struct ArtistSearch {
    #[serde(default)]
    artists: Vec<NamedCandidate>,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroupSearch {
    #[serde(default, rename = "release-groups")]
    release_groups: Vec<ReleaseGroupCandidate>,
}

#[derive(Debug, Deserialize)]
struct RecordingSearch {
    #[serde(default)]
    recordings: Vec<RecordingCandidate>,
}

#[derive(Debug, Deserialize)]
struct NamedCandidate {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroupCandidate {
    id: String,
    title: String,
    #[serde(default, rename = "primary-type")]
    primary_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordingCandidate {
    id: String,
    title: String,
    /// Milliseconds
    #[serde(default)]
    length: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AcoustIdResponse {
    #[serde(default)]
    results: Vec<AcoustIdResult>,
}

#[derive(Debug, Deserialize)]
struct AcoustIdResult {
    score: f64,
    #[serde(default)]
    recordings: Vec<AcoustIdRecording>,
}

#[derive(Debug, Deserialize)]
struct AcoustIdRecording {
    id: String,
    #[serde(default)]
    title: Option<String>,
}

/// Shared state of the provider's feature handlers
pub struct MusicBrainzClient {
    client: reqwest::Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    cache: Mutex<ResponseCache>,
    api_url: String,
    acoustid_api_key: Option<String>,
}

impl MusicBrainzClient {
    pub fn new(config: &MusicBrainzConfig) -> ProviderResult<Self> {
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        Ok(Self {
            client: build_client(config.timeout)?,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
            cache: Mutex::new(ResponseCache::default()),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            acoustid_api_key: config.acoustid_api_key.clone(),
        })
    }

    /// Rate-limited, cached GET against the MusicBrainz API
    async fn fetch(&self, path: &str, query: &[(&str, &str)]) -> ProviderResult<Option<Value>> {
        let key = cache_key(path, query);
        if let Some(hit) = self.cache.lock().ok().and_then(|cache| cache.get(&key)) {
            debug!(key = %key, "MusicBrainz cache hit");
            return Ok(Some(hit));
        }

        self.rate_limiter.until_ready().await;

        let url = format!("{}/{}", self.api_url, path);
        let mut params: Vec<(&str, &str)> = query.to_vec();
        params.push(("fmt", "json"));
        let value: Option<Value> = get_json(&self.client, &url, &params).await?;

        if let (Some(value), Ok(mut cache)) = (&value, self.cache.lock()) {
            cache.insert(key, value.clone());
        }
        Ok(value)
    }

    pub async fn search(&self, query: &EntityQuery) -> ProviderResult<Option<SearchResult>> {
        match query {
            EntityQuery::Artist { name } => self.search_artist(name).await,
            EntityQuery::Album { name, artist } => {
                self.search_album(name, artist.as_deref()).await
            }
            EntityQuery::Song {
                name,
                artist,
                duration,
                ..
            } => self.search_song(name, artist, *duration).await,
        }
    }

    async fn search_artist(&self, name: &str) -> ProviderResult<Option<SearchResult>> {
        let lucene = format!("artist:\"{}\"", escape_lucene(name));
        let Some(raw) = self
            .fetch("artist", &[("query", &lucene), ("limit", SEARCH_LIMIT)])
            .await?
        else {
            return Ok(None);
        };
        let found: ArtistSearch = parse(raw)?;
        Ok(found
            .artists
            .into_iter()
            .find(|candidate| names_match(&candidate.name, name))
            .map(|candidate| SearchResult::new(candidate.id)))
    }

    async fn search_album(
        &self,
        name: &str,
        artist: Option<&str>,
    ) -> ProviderResult<Option<SearchResult>> {
        let title = strip_release_suffix(name);
        let wants_single = title.len() != name.len();
        let mut lucene = format!("releasegroup:\"{}\"", escape_lucene(title));
        if let Some(artist) = artist {
            lucene.push_str(&format!(" AND artist:\"{}\"", escape_lucene(artist)));
        }
        let Some(raw) = self
            .fetch("release-group", &[("query", &lucene), ("limit", SEARCH_LIMIT)])
            .await?
        else {
            return Ok(None);
        };
        let found: ReleaseGroupSearch = parse(raw)?;

        let mut candidates: Vec<ReleaseGroupCandidate> = found
            .release_groups
            .into_iter()
            .filter(|candidate| names_match(&candidate.title, title))
            .collect();
        // Same titles exist as album and single; keep the one the name asks for
        candidates.sort_by_key(|candidate| {
            let is_single = candidate.primary_type.as_deref() == Some("Single");
            is_single != wants_single
        });
        Ok(candidates
            .into_iter()
            .next()
            .map(|candidate| SearchResult::new(candidate.id)))
    }

    async fn search_song(
        &self,
        name: &str,
        artist: &str,
        duration: Option<u32>,
    ) -> ProviderResult<Option<SearchResult>> {
        let lucene = format!(
            "recording:\"{}\" AND artist:\"{}\"",
            escape_lucene(name),
            escape_lucene(artist)
        );
        let Some(raw) = self
            .fetch("recording", &[("query", &lucene), ("limit", SEARCH_LIMIT)])
            .await?
        else {
            return Ok(None);
        };
        let found: RecordingSearch = parse(raw)?;
        Ok(found
            .recordings
            .into_iter()
            .filter(|candidate| names_match(&candidate.title, name))
            .find(|candidate| match (duration, candidate.length) {
                (Some(expected), Some(length_ms)) => {
                    (length_ms as i64 / 1000 - expected as i64).abs() <= DURATION_TOLERANCE_SECS
                }
                _ => true,
            })
            .map(|candidate| SearchResult::new(candidate.id)))
    }

    pub async fn search_with_acoustid(
        &self,
        fingerprint: &str,
        duration: u32,
        song_name: &str,
    ) -> ProviderResult<Option<SearchResult>> {
        let Some(api_key) = self.acoustid_api_key.as_deref() else {
            return Ok(None);
        };
        let duration = duration.to_string();
        let response: Option<AcoustIdResponse> = get_json(
            &self.client,
            ACOUSTID_URL,
            &[
                ("client", api_key),
                ("meta", "recordings"),
                ("duration", &duration),
                ("fingerprint", fingerprint),
            ],
        )
        .await?;

        let Some(mut response) = response else {
            return Ok(None);
        };
        response
            .results
            .sort_by(|a, b| b.score.total_cmp(&a.score));
        let recordings: Vec<AcoustIdRecording> = response
            .results
            .into_iter()
            .flat_map(|result| result.recordings)
            .collect();

        // Prefer the recording whose title is closest to the catalog name
        let best = recordings
            .iter()
            .filter(|r| r.title.as_deref().is_some_and(|t| names_match(t, song_name)))
            .max_by(|a, b| {
                let sa = similarity(a.title.as_deref().unwrap_or_default(), song_name);
                let sb = similarity(b.title.as_deref().unwrap_or_default(), song_name);
                sa.total_cmp(&sb)
            })
            .or_else(|| recordings.first());
        Ok(best.map(|recording| SearchResult::new(recording.id.clone())))
    }

    pub async fn get(&self, kind: EntityType, id: &str) -> ProviderResult<Option<Value>> {
        if uuid::Uuid::parse_str(id).is_err() {
            debug!(id = %id, "Not a MusicBrainz id");
            return Ok(None);
        }
        let includes = match kind {
            EntityType::Artist => "url-rels+genres",
            EntityType::Album => "url-rels+genres+ratings",
            EntityType::Song => "url-rels+genres",
        };
        self.fetch(&format!("{}/{}", resource(kind), id), &[("inc", includes)])
            .await
    }
}

fn parse<T: serde::de::DeserializeOwned>(raw: Value) -> ProviderResult<T> {
    serde_json::from_value(raw).map_err(|e| crate::error::ProviderError::Parse(e.to_string()))
}

fn cache_key(path: &str, query: &[(&str, &str)]) -> String {
    let params: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}?{}", path, params.join("&"))
}

fn escape_lucene(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

pub fn url_from_id(kind: EntityType, id: &str) -> String {
    format!("{}/{}/{}", WEB_URL, resource(kind), id)
}

pub fn id_from_url(url: &str) -> Option<String> {
    last_path_segment(url).filter(|segment| uuid::Uuid::parse_str(segment).is_ok())
}

/// URL relations listed on a record
pub fn relations(object: &Value) -> Vec<AnchorRelation> {
    object
        .get("relations")
        .and_then(Value::as_array)
        .map(|relations| {
            relations
                .iter()
                .filter_map(|relation| {
                    let kind = relation.get("type")?.as_str()?;
                    let url = relation.get("url")?.get("resource")?.as_str()?;
                    Some(AnchorRelation::new(kind, url))
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn genres(object: &Value) -> Option<Vec<String>> {
    let genres: Vec<String> = object
        .get("genres")?
        .as_array()?
        .iter()
        .filter_map(|genre| genre.get("name")?.as_str())
        .map(title_case)
        .collect();
    (!genres.is_empty()).then_some(genres)
}

/// `first-release-date` of a release group: `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
pub fn release_date(object: &Value) -> Option<NaiveDate> {
    let raw = object.get("first-release-date")?.as_str()?;
    let mut parts = raw.split('-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next().map(str::parse).transpose().ok()?.unwrap_or(1);
    let day: u32 = parts.next().map(str::parse).transpose().ok()?.unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn album_type(object: &Value) -> Option<AlbumType> {
    let primary = object.get("primary-type").and_then(Value::as_str);
    let secondary: Vec<&str> = object
        .get("secondary-types")
        .and_then(Value::as_array)
        .map(|types| types.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let has = |name: &str| secondary.iter().any(|t| t.eq_ignore_ascii_case(name));
    if has("Live") {
        return Some(AlbumType::LiveRecording);
    }
    if has("Soundtrack") {
        return Some(AlbumType::Soundtrack);
    }
    if has("Remix") || has("DJ-mix") {
        return Some(AlbumType::RemixAlbum);
    }
    if has("Compilation") {
        return Some(AlbumType::Compilation);
    }
    match primary? {
        "Album" => Some(AlbumType::StudioRecording),
        "Single" => Some(AlbumType::Single),
        "EP" => Some(AlbumType::EP),
        _ => None,
    }
}

/// Rating out of 100 (MusicBrainz rates out of 5)
pub fn rating(object: &Value) -> Option<u8> {
    let value = object.get("rating")?.get("value")?.as_f64()?;
    Some((value * 20.0).round().clamp(0.0, 100.0) as u8)
}

/// Build the MusicBrainz provider
pub fn provider(id: ProviderId, config: &MusicBrainzConfig) -> ProviderResult<Provider> {
    let client = Arc::new(MusicBrainzClient::new(config)?);
    let mut builder = Provider::builder(id, NAME).anchor();

    for kind in KINDS {
        builder = builder
            .handle(FeatureName::Search(kind), Arc::clone(&client), |client, input| async move {
                let query = input.into_query()?;
                Ok(client.search(&query).await?.map(FeatureOutput::Search))
            })
            .handle(FeatureName::Get(kind), Arc::clone(&client), move |client, input| async move {
                let id = input.into_text()?;
                Ok(client.get(kind, &id).await?.map(FeatureOutput::Entity))
            })
            .sync(FeatureName::UrlFromId(kind), move |input| {
                Ok(Some(FeatureOutput::Text(url_from_id(kind, &input.into_text()?))))
            })
            .sync(FeatureName::IdFromUrl(kind), |input| {
                Ok(id_from_url(&input.into_text()?).map(FeatureOutput::Text))
            })
            .constant(
                FeatureName::WikidataRelationKey(kind),
                FeatureOutput::Text(wikidata_property(kind).to_string()),
            )
            .sync(FeatureName::AnchorRelations(kind), |input| {
                Ok(Some(FeatureOutput::Relations(relations(&input.into_entity()?))))
            });
    }

    builder = builder
        .sync(FeatureName::Genres(EntityType::Album), |input| {
            Ok(genres(&input.into_entity()?).map(FeatureOutput::Genres))
        })
        .sync(FeatureName::Genres(EntityType::Song), |input| {
            Ok(genres(&input.into_entity()?).map(FeatureOutput::Genres))
        })
        .sync(FeatureName::AlbumReleaseDate, |input| {
            Ok(release_date(&input.into_entity()?).map(FeatureOutput::Date))
        })
        .sync(FeatureName::AlbumType, |input| {
            Ok(album_type(&input.into_entity()?).map(FeatureOutput::AlbumType))
        })
        .sync(FeatureName::AlbumRating, |input| {
            Ok(rating(&input.into_entity()?).map(FeatureOutput::Rating))
        });

    if config.acoustid_api_key.is_some() {
        builder = builder.handle(
            FeatureName::SearchSongWithAcoustId,
            Arc::clone(&client),
            |client, input| async move {
                let FeatureInput::Fingerprint {
                    fingerprint,
                    duration,
                    song_name,
                } = input
                else {
                    return Ok(None);
                };
                Ok(client
                    .search_with_acoustid(&fingerprint, duration, &song_name)
                    .await?
                    .map(FeatureOutput::Search))
            },
        );
    }

    Ok(builder.build())
}
