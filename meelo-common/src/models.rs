//! Catalog data transfer types
//!
//! Shapes exchanged with the catalog REST API. Field names follow the API's
//! camelCase JSON convention.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Identifier of an entity in the catalog
pub type EntityId = i64;

/// Identifier of an external provider, as registered in the catalog
pub type ProviderId = i64;

/// Kind of catalog entity a match targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Artist,
    Album,
    Song,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Artist => "artist",
            EntityType::Album => "album",
            EntityType::Song => "song",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "artist" => Ok(EntityType::Artist),
            "album" => Ok(EntityType::Album),
            "song" => Ok(EntityType::Song),
            other => Err(Error::InvalidInput(format!("Unknown entity type: {}", other))),
        }
    }
}

/// Album type as stored in the catalog
///
/// `Other` doubles as the "needs resolution" sentinel: the catalog could not
/// infer a type from the files it scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlbumType {
    StudioRecording,
    LiveRecording,
    Compilation,
    Soundtrack,
    RemixAlbum,
    VideoAlbum,
    Single,
    EP,
    Other,
}

impl fmt::Display for AlbumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlbumType::StudioRecording => "StudioRecording",
            AlbumType::LiveRecording => "LiveRecording",
            AlbumType::Compilation => "Compilation",
            AlbumType::Soundtrack => "Soundtrack",
            AlbumType::RemixAlbum => "RemixAlbum",
            AlbumType::VideoAlbum => "VideoAlbum",
            AlbumType::Single => "Single",
            AlbumType::EP => "EP",
            AlbumType::Other => "Other",
        };
        f.write_str(name)
    }
}

/// A confirmed link between a catalog entity and one provider's record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSource {
    pub url: String,
    pub provider_id: ProviderId,
}

impl ExternalSource {
    pub fn new(url: impl Into<String>, provider_id: ProviderId) -> Self {
        Self {
            url: url.into(),
            provider_id,
        }
    }
}

/// Reference to the catalog entity some metadata belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Artist(EntityId),
    Album(EntityId),
    Song(EntityId),
}

impl EntityRef {
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityRef::Artist(_) => EntityType::Artist,
            EntityRef::Album(_) => EntityType::Album,
            EntityRef::Song(_) => EntityType::Song,
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            EntityRef::Artist(id) | EntityRef::Album(id) | EntityRef::Song(id) => *id,
        }
    }
}

/// External metadata record, as posted to and read from the catalog
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMetadata {
    pub description: Option<String>,
    /// Rating out of 100
    pub rating: Option<u8>,
    #[serde(default)]
    pub sources: Vec<ExternalSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_id: Option<EntityId>,
}

impl ExternalMetadata {
    /// Empty metadata record attached to an entity
    pub fn for_entity(entity: EntityRef) -> Self {
        let mut metadata = Self::default();
        match entity {
            EntityRef::Artist(id) => metadata.artist_id = Some(id),
            EntityRef::Album(id) => metadata.album_id = Some(id),
            EntityRef::Song(id) => metadata.song_id = Some(id),
        }
        metadata
    }
}

/// Minimal artist reference embedded in other entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: EntityId,
    pub name: String,
}

/// Artist as returned by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: EntityId,
    pub name: String,
}

/// Album as returned by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: EntityId,
    pub name: String,
    #[serde(rename = "type")]
    pub album_type: AlbumType,
    #[serde(default, deserialize_with = "deserialize_lenient_date")]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub artist: Option<ArtistRef>,
}

/// Master track of a song: the catalog's reference recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongMaster {
    /// Duration in seconds
    pub duration: Option<u32>,
    pub source_file_id: Option<EntityId>,
}

/// Song as returned by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: EntityId,
    pub name: String,
    pub artist: ArtistRef,
    #[serde(default)]
    pub featuring: Vec<ArtistRef>,
    #[serde(default)]
    pub master: Option<SongMaster>,
}

/// Audio file as returned by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub id: EntityId,
    /// AcoustID fingerprint, when the scanner computed one
    #[serde(default)]
    pub fingerprint: Option<String>,
}

/// Update payload for an album
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<String>>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub album_type: Option<AlbumType>,
}

impl AlbumUpdate {
    pub fn is_empty(&self) -> bool {
        self.release_date.is_none() && self.genres.is_none() && self.album_type.is_none()
    }
}

/// One line of time-synchronised lyrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedLyricsLine {
    /// Offset from the start of the song, in seconds
    pub timestamp: f64,
    pub content: String,
}

/// Lyrics payload for a song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongLyrics {
    pub plain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synced: Option<Vec<SyncedLyricsLine>>,
}

/// Provider record registered in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: ProviderId,
    pub name: String,
}

/// Page of items returned by list endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
}

/// Accepts `YYYY-MM-DD` as well as full ISO-8601 timestamps
fn deserialize_lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| parse_lenient_date(&value)))
}

/// Parse the date part of a `YYYY-MM-DD...` string
pub fn parse_lenient_date(value: &str) -> Option<NaiveDate> {
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
