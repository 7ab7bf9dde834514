//! LrcLib provider: plain and synced song lyrics

use meelo_common::models::{EntityType, ProviderId, SyncedLyricsLine};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::http::{build_client, get_json, last_path_segment, url_has_host};
use super::text::names_match;
use super::{EntityQuery, FeatureName, FeatureOutput, Provider, SearchResult, SyncedLyrics};
use crate::error::ProviderResult;

pub const NAME: &str = "LrcLib";

const HOST: &str = "lrclib.net";
const API_URL: &str = "https://lrclib.net/api";
/// Tolerated gap between the record duration and the catalog duration
const DURATION_TOLERANCE_SECS: f64 = 2.0;

pub struct LrcLibClient {
    client: reqwest::Client,
}

impl LrcLibClient {
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }

    pub async fn search(&self, query: &EntityQuery) -> ProviderResult<Option<SearchResult>> {
        let EntityQuery::Song {
            name,
            artist,
            duration,
            ..
        } = query
        else {
            return Ok(None);
        };
        let records: Option<Vec<Value>> = get_json(
            &self.client,
            &format!("{}/search", API_URL),
            &[("track_name", name.as_str()), ("artist_name", artist.as_str())],
        )
        .await?;

        Ok(records
            .unwrap_or_default()
            .into_iter()
            .filter(|record| is_candidate(record, name, artist, *duration))
            .max_by_key(|record| has_synced_lyrics(record))
            .and_then(|record| {
                let id = record.get("id")?.as_i64()?;
                Some(SearchResult::with_object(id.to_string(), record))
            }))
    }

    pub async fn get(&self, id: &str) -> ProviderResult<Option<Value>> {
        if id.parse::<u64>().is_err() {
            return Ok(None);
        }
        get_json(&self.client, &format!("{}/get/{}", API_URL, id), &[]).await
    }
}

fn is_candidate(record: &Value, name: &str, artist: &str, duration: Option<u32>) -> bool {
    let field = |key: &str| record.get(key).and_then(Value::as_str).unwrap_or_default();
    if !names_match(field("trackName"), name) || !names_match(field("artistName"), artist) {
        return false;
    }
    match (duration, record.get("duration").and_then(Value::as_f64)) {
        (Some(expected), Some(actual)) => {
            (actual - expected as f64).abs() <= DURATION_TOLERANCE_SECS
        }
        _ => true,
    }
}

fn has_synced_lyrics(record: &Value) -> bool {
    record
        .get("syncedLyrics")
        .and_then(Value::as_str)
        .is_some_and(|lyrics| !lyrics.trim().is_empty())
}

fn is_instrumental(record: &Value) -> bool {
    record
        .get("instrumental")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

pub fn url_from_id(id: &str) -> String {
    format!("{}/get/{}", API_URL, id)
}

pub fn id_from_url(url: &str) -> Option<String> {
    if !url_has_host(url, HOST) {
        return None;
    }
    last_path_segment(url).filter(|segment| segment.parse::<u64>().is_ok())
}

pub fn plain_lyrics(record: &Value) -> Option<String> {
    if is_instrumental(record) {
        return None;
    }
    record
        .get("plainLyrics")
        .and_then(Value::as_str)
        .filter(|lyrics| !lyrics.trim().is_empty())
        .map(str::to_string)
}

pub fn synced_lyrics(record: &Value) -> Option<SyncedLyrics> {
    if is_instrumental(record) {
        return None;
    }
    let lines = parse_lrc(record.get("syncedLyrics")?.as_str()?);
    (!lines.is_empty()).then_some(lines)
}

/// Parse LRC text (`[mm:ss.xx] line`), ordered by timestamp
///
/// Lines may carry several timestamps; tag lines such as `[ar:...]` are
/// skipped.
pub fn parse_lrc(lrc: &str) -> SyncedLyrics {
    let mut lines = Vec::new();
    for raw in lrc.lines() {
        let mut rest = raw.trim();
        let mut stamps = Vec::new();
        while let Some(tail) = rest.strip_prefix('[') {
            let Some(end) = tail.find(']') else { break };
            match parse_timestamp(&tail[..end]) {
                Some(seconds) => stamps.push(seconds),
                None => break,
            }
            rest = &tail[end + 1..];
        }
        let content = rest.trim();
        for timestamp in stamps {
            lines.push(SyncedLyricsLine {
                timestamp,
                content: content.to_string(),
            });
        }
    }
    lines.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    lines
}

fn parse_timestamp(stamp: &str) -> Option<f64> {
    let (minutes, seconds) = stamp.split_once(':')?;
    let minutes: u32 = minutes.trim().parse().ok()?;
    let seconds: f64 = seconds.trim().parse().ok()?;
    let total = minutes as f64 * 60.0 + seconds;
    Some((total * 100.0).round() / 100.0)
}

pub fn provider(id: ProviderId, timeout: Duration) -> ProviderResult<Provider> {
    let client = Arc::new(LrcLibClient::new(timeout)?);
    let provider = Provider::builder(id, NAME)
        .handle(
            FeatureName::Search(EntityType::Song),
            Arc::clone(&client),
            |client, input| async move {
                let query = input.into_query()?;
                Ok(client.search(&query).await?.map(FeatureOutput::Search))
            },
        )
        .handle(
            FeatureName::Get(EntityType::Song),
            Arc::clone(&client),
            |client, input| async move {
                let id = input.into_text()?;
                Ok(client.get(&id).await?.map(FeatureOutput::Entity))
            },
        )
        .sync(FeatureName::UrlFromId(EntityType::Song), |input| {
            Ok(Some(FeatureOutput::Text(url_from_id(&input.into_text()?))))
        })
        .sync(FeatureName::IdFromUrl(EntityType::Song), |input| {
            Ok(id_from_url(&input.into_text()?).map(FeatureOutput::Text))
        })
        .sync(FeatureName::PlainLyrics, |input| {
            Ok(plain_lyrics(&input.into_entity()?).map(FeatureOutput::Text))
        })
        .sync(FeatureName::SyncedLyrics, |input| {
            Ok(synced_lyrics(&input.into_entity()?).map(FeatureOutput::SyncedLyrics))
        })
        .build();
    Ok(provider)
}
