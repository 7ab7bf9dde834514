//! Match results and their merge laws
//!
//! - scalar fields: the first non-empty value wins
//! - sources: one per provider, the first one wins
//! - genres: union, compared case-insensitively, first spelling kept

use chrono::NaiveDate;
use meelo_common::models::{AlbumType, EntityRef, ExternalMetadata, ExternalSource, ProviderId};
use std::sync::{Arc, Mutex, PoisonError};

use crate::providers::SyncedLyrics;

/// Set `slot` when it is still empty; returns whether it was set
pub fn set_if_none<T>(slot: &mut Option<T>, value: T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}

/// Fields every entity kind collects
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchMetadata {
    pub description: Option<String>,
    /// Rating out of 100
    pub rating: Option<u8>,
    pub genres: Vec<String>,
    pub sources: Vec<ExternalSource>,
}

impl MatchMetadata {
    pub fn set_description_if_none(&mut self, description: String) -> bool {
        set_if_none(&mut self.description, description)
    }

    pub fn set_rating_if_none(&mut self, rating: u8) -> bool {
        set_if_none(&mut self.rating, rating.min(100))
    }

    /// Append `source` unless its provider already has one
    pub fn push_source(&mut self, source: ExternalSource) -> bool {
        if self.has_source_from(source.provider_id) {
            return false;
        }
        self.sources.push(source);
        true
    }

    pub fn has_source_from(&self, provider_id: ProviderId) -> bool {
        self.sources.iter().any(|s| s.provider_id == provider_id)
    }

    /// Union genres, ignoring case and surrounding whitespace
    pub fn push_genres<I>(&mut self, genres: I)
    where
        I: IntoIterator<Item = String>,
    {
        for genre in genres {
            let genre = genre.trim();
            if genre.is_empty() {
                continue;
            }
            let known = self
                .genres
                .iter()
                .any(|existing| existing.to_lowercase() == genre.to_lowercase());
            if !known {
                self.genres.push(genre.to_string());
            }
        }
    }

    pub fn to_external_metadata(&self, entity: EntityRef) -> ExternalMetadata {
        let mut metadata = ExternalMetadata::for_entity(entity);
        metadata.description = self.description.clone();
        metadata.rating = self.rating;
        metadata.sources = self.sources.clone();
        metadata
    }
}

/// Accumulator content of one entity kind
pub trait MatchResult: Clone + Default + Send + 'static {
    fn metadata(&self) -> &MatchMetadata;
    fn metadata_mut(&mut self) -> &mut MatchMetadata;

    /// Derivations applied once every provider is done
    fn finish(&mut self) {}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtistMatchResult {
    pub metadata: MatchMetadata,
    pub illustration_url: Option<String>,
}

impl MatchResult for ArtistMatchResult {
    fn metadata(&self) -> &MatchMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut MatchMetadata {
        &mut self.metadata
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlbumMatchResult {
    pub metadata: MatchMetadata,
    pub release_date: Option<NaiveDate>,
    pub album_type: Option<AlbumType>,
}

impl MatchResult for AlbumMatchResult {
    fn metadata(&self) -> &MatchMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut MatchMetadata {
        &mut self.metadata
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricsMatch {
    pub plain: Option<String>,
    pub synced: Option<SyncedLyrics>,
}

impl LyricsMatch {
    pub fn is_empty(&self) -> bool {
        self.plain.is_none() && self.synced.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongMatchResult {
    pub metadata: MatchMetadata,
    pub lyrics: LyricsMatch,
}

impl MatchResult for SongMatchResult {
    fn metadata(&self) -> &MatchMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut MatchMetadata {
        &mut self.metadata
    }

    /// Plain lyrics fall back to the text of the synced lines
    fn finish(&mut self) {
        if self.lyrics.plain.is_some() {
            return;
        }
        if let Some(synced) = &self.lyrics.synced {
            let plain: Vec<&str> = synced.iter().map(|line| line.content.as_str()).collect();
            self.lyrics.plain = Some(plain.join("\n"));
        }
    }
}

/// Result shared by the provider tasks of one match
///
/// The lock is held for the duration of a guard check or a merge, never
/// across a provider call.
#[derive(Debug)]
pub struct Accumulator<R> {
    inner: Arc<Mutex<R>>,
}

impl<R> Clone for Accumulator<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: MatchResult> Accumulator<R> {
    pub fn new(result: R) -> Self {
        Self {
            inner: Arc::new(Mutex::new(result)),
        }
    }

    /// Run `f` under the lock
    pub fn with<T>(&self, f: impl FnOnce(&mut R) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn snapshot(&self) -> R {
        self.with(|result| result.clone())
    }
}
