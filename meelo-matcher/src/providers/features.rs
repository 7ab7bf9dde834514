//! Feature names and the values flowing in and out of feature handlers
//!
//! The set of features is closed: every capability a provider may expose is
//! a [`FeatureName`] variant, and handlers exchange [`FeatureInput`] and
//! [`FeatureOutput`] values. Typed access goes through
//! [`FromFeatureOutput`].

use chrono::NaiveDate;
use meelo_common::models::{AlbumType, EntityType, SyncedLyricsLine};
use std::fmt;

use crate::error::{ProviderError, ProviderResult};

/// Provider-native representation of an entity (raw API payload)
pub type NativeObject = serde_json::Value;

/// Time-synchronised lyrics, ordered by timestamp
pub type SyncedLyrics = Vec<SyncedLyricsLine>;

/// Named capability a provider may implement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureName {
    /// Search by name, returns a [`SearchResult`]
    Search(EntityType),
    /// Fetch the native object from a provider-local id
    Get(EntityType),
    /// Build the public URL of a provider-local id
    UrlFromId(EntityType),
    /// Extract the provider-local id from a URL
    IdFromUrl(EntityType),
    /// Wikidata property (or sitelink key) holding this provider's id
    WikidataRelationKey(EntityType),
    /// Relation type the anchor uses when linking to this provider
    AnchorRelationKey,
    /// Fallback recognizer for anchor relations pointing at this provider
    IsAnchorRelation,
    /// Links listed on a native object (anchor only)
    AnchorRelations(EntityType),
    /// Song search from an AcoustID fingerprint
    SearchSongWithAcoustId,
    Description(EntityType),
    ArtistIllustrationUrl,
    AlbumRating,
    Genres(EntityType),
    AlbumType,
    AlbumReleaseDate,
    PlainLyrics,
    SyncedLyrics,
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureName::Search(kind) => write!(f, "search-{}", kind),
            FeatureName::Get(kind) => write!(f, "get-{}", kind),
            FeatureName::UrlFromId(kind) => write!(f, "{}-url-from-id", kind),
            FeatureName::IdFromUrl(kind) => write!(f, "{}-id-from-url", kind),
            FeatureName::WikidataRelationKey(kind) => write!(f, "wikidata-{}-relation-key", kind),
            FeatureName::AnchorRelationKey => f.write_str("anchor-relation-key"),
            FeatureName::IsAnchorRelation => f.write_str("is-anchor-relation"),
            FeatureName::AnchorRelations(kind) => write!(f, "{}-anchor-relations", kind),
            FeatureName::SearchSongWithAcoustId => f.write_str("search-song-with-acoustid"),
            FeatureName::Description(kind) => write!(f, "get-{}-description", kind),
            FeatureName::ArtistIllustrationUrl => f.write_str("get-artist-illustration-url"),
            FeatureName::AlbumRating => f.write_str("get-album-rating"),
            FeatureName::Genres(kind) => write!(f, "get-{}-genres", kind),
            FeatureName::AlbumType => f.write_str("get-album-type"),
            FeatureName::AlbumReleaseDate => f.write_str("get-album-release-date"),
            FeatureName::PlainLyrics => f.write_str("get-plain-lyrics"),
            FeatureName::SyncedLyrics => f.write_str("get-synced-lyrics"),
        }
    }
}

/// What a search found: the provider-local id, and the object when the
/// search payload already carries it
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub object: Option<NativeObject>,
}

impl SearchResult {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: None,
        }
    }

    pub fn with_object(id: impl Into<String>, object: NativeObject) -> Self {
        Self {
            id: id.into(),
            object: Some(object),
        }
    }
}

/// One link listed by the anchor provider on a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorRelation {
    /// Relation type, e.g. `wikidata`, `discogs`, `allmusic`
    pub relation_type: String,
    /// Target URL
    pub url: String,
}

impl AnchorRelation {
    pub fn new(relation_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            relation_type: relation_type.into(),
            url: url.into(),
        }
    }

    /// Host of the target URL, without a leading `www.`
    pub fn host(&self) -> Option<String> {
        let parsed = reqwest::Url::parse(&self.url).ok()?;
        let host = parsed.host_str()?;
        Some(host.strip_prefix("www.").unwrap_or(host).to_ascii_lowercase())
    }
}

/// Identity of the entity being matched, as providers search for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityQuery {
    Artist {
        name: String,
    },
    Album {
        name: String,
        artist: Option<String>,
    },
    Song {
        name: String,
        artist: String,
        featuring: Vec<String>,
        /// Duration in seconds
        duration: Option<u32>,
        /// AcoustID fingerprint of the master file
        fingerprint: Option<String>,
    },
}

impl EntityQuery {
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityQuery::Artist { .. } => EntityType::Artist,
            EntityQuery::Album { .. } => EntityType::Album,
            EntityQuery::Song { .. } => EntityType::Song,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EntityQuery::Artist { name }
            | EntityQuery::Album { name, .. }
            | EntityQuery::Song { name, .. } => name,
        }
    }
}

/// Argument passed to a feature handler
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureInput {
    None,
    Query(EntityQuery),
    Id(String),
    Url(String),
    Entity(NativeObject),
    Relation(AnchorRelation),
    Fingerprint {
        fingerprint: String,
        duration: u32,
        song_name: String,
    },
}

impl FeatureInput {
    fn kind(&self) -> &'static str {
        match self {
            FeatureInput::None => "none",
            FeatureInput::Query(_) => "query",
            FeatureInput::Id(_) => "id",
            FeatureInput::Url(_) => "url",
            FeatureInput::Entity(_) => "entity",
            FeatureInput::Relation(_) => "relation",
            FeatureInput::Fingerprint { .. } => "fingerprint",
        }
    }

    fn mismatch(&self, expected: &'static str) -> ProviderError {
        ProviderError::Contract {
            feature: "input".to_string(),
            expected,
            actual: self.kind(),
        }
    }

    /// Id or URL argument
    pub fn into_text(self) -> ProviderResult<String> {
        match self {
            FeatureInput::Id(text) | FeatureInput::Url(text) => Ok(text),
            other => Err(other.mismatch("id or url")),
        }
    }

    pub fn into_entity(self) -> ProviderResult<NativeObject> {
        match self {
            FeatureInput::Entity(object) => Ok(object),
            other => Err(other.mismatch("entity")),
        }
    }

    pub fn into_query(self) -> ProviderResult<EntityQuery> {
        match self {
            FeatureInput::Query(query) => Ok(query),
            other => Err(other.mismatch("query")),
        }
    }

    pub fn into_relation(self) -> ProviderResult<AnchorRelation> {
        match self {
            FeatureInput::Relation(relation) => Ok(relation),
            other => Err(other.mismatch("relation")),
        }
    }
}

/// Value returned by a feature handler
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureOutput {
    Flag(bool),
    Text(String),
    Search(SearchResult),
    Entity(NativeObject),
    Relations(Vec<AnchorRelation>),
    /// Rating out of 100
    Rating(u8),
    Genres(Vec<String>),
    AlbumType(AlbumType),
    Date(NaiveDate),
    SyncedLyrics(SyncedLyrics),
}

impl FeatureOutput {
    pub fn kind(&self) -> &'static str {
        match self {
            FeatureOutput::Flag(_) => "flag",
            FeatureOutput::Text(_) => "text",
            FeatureOutput::Search(_) => "search result",
            FeatureOutput::Entity(_) => "entity",
            FeatureOutput::Relations(_) => "relations",
            FeatureOutput::Rating(_) => "rating",
            FeatureOutput::Genres(_) => "genres",
            FeatureOutput::AlbumType(_) => "album type",
            FeatureOutput::Date(_) => "date",
            FeatureOutput::SyncedLyrics(_) => "synced lyrics",
        }
    }
}

/// Typed extraction of a [`FeatureOutput`]
pub trait FromFeatureOutput: Sized {
    const EXPECTED: &'static str;

    /// Returns the output back when it has another shape
    fn from_output(output: FeatureOutput) -> Result<Self, FeatureOutput>;
}

macro_rules! feature_output_conversion {
    ($variant:ident, $ty:ty, $label:literal) => {
        impl FromFeatureOutput for $ty {
            const EXPECTED: &'static str = $label;

            fn from_output(output: FeatureOutput) -> Result<Self, FeatureOutput> {
                match output {
                    FeatureOutput::$variant(value) => Ok(value),
                    other => Err(other),
                }
            }
        }
    };
}

feature_output_conversion!(Flag, bool, "flag");
feature_output_conversion!(Text, String, "text");
feature_output_conversion!(Search, SearchResult, "search result");
feature_output_conversion!(Entity, NativeObject, "entity");
feature_output_conversion!(Relations, Vec<AnchorRelation>, "relations");
feature_output_conversion!(Rating, u8, "rating");
feature_output_conversion!(Genres, Vec<String>, "genres");
feature_output_conversion!(AlbumType, AlbumType, "album type");
feature_output_conversion!(Date, NaiveDate, "date");
feature_output_conversion!(SyncedLyrics, SyncedLyrics, "synced lyrics");
