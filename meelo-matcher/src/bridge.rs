//! Wikidata cross-reference bridge
//!
//! A Wikidata item lists the identifiers many music sites use for the same
//! artist, album or song. The resolver fetches the item once per match and
//! looks up each unresolved provider's property in it.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::error::ProviderResult;
use crate::providers::http::{build_client, get_json, last_path_segment};

const ENTITY_DATA_URL: &str = "https://www.wikidata.org/wiki/Special:EntityData";

/// Relation key → external identifier, for one Wikidata item
///
/// Claims are keyed by property id (`P434`), sitelinks as
/// `sitelink:<site>` (`sitelink:enwiki`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WikidataRelations {
    values: HashMap<String, String>,
}

impl WikidataRelations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Collect string claims and sitelinks from a Wikidata entity document
    pub fn from_entity(entity: &Value) -> Self {
        let mut relations = Self::new();

        if let Some(claims) = entity.get("claims").and_then(Value::as_object) {
            for (property, statements) in claims {
                let first = statements
                    .as_array()
                    .into_iter()
                    .flatten()
                    .find_map(|statement| {
                        statement
                            .get("mainsnak")?
                            .get("datavalue")?
                            .get("value")?
                            .as_str()
                    });
                if let Some(value) = first {
                    relations.insert(property.clone(), value);
                }
            }
        }

        if let Some(sitelinks) = entity.get("sitelinks").and_then(Value::as_object) {
            for (site, link) in sitelinks {
                if let Some(title) = link.get("title").and_then(Value::as_str) {
                    relations.insert(format!("sitelink:{}", site), title);
                }
            }
        }

        relations
    }
}

/// Extract the item id (`Q1744`) from a Wikidata URL
pub fn bridge_id_from_url(url: &str) -> Option<String> {
    let segment = last_path_segment(url)?;
    let is_item = segment.len() > 1
        && segment.starts_with('Q')
        && segment[1..].chars().all(|c| c.is_ascii_digit());
    is_item.then_some(segment)
}

/// Source of cross-reference relations
#[async_trait]
pub trait RelationBridge: Send + Sync {
    /// Relations of one item; `Ok(None)` when the item does not exist
    async fn relations(&self, bridge_id: &str) -> ProviderResult<Option<WikidataRelations>>;
}

/// Bridge backed by the Wikidata entity data endpoint
pub struct WikidataClient {
    client: reqwest::Client,
    base_url: String,
}

impl WikidataClient {
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: ENTITY_DATA_URL.to_string(),
        })
    }
}

#[async_trait]
impl RelationBridge for WikidataClient {
    async fn relations(&self, bridge_id: &str) -> ProviderResult<Option<WikidataRelations>> {
        let url = format!("{}/{}.json", self.base_url, bridge_id);
        let document: Option<Value> = get_json(&self.client, &url, &[]).await?;
        let relations = document
            .as_ref()
            .and_then(|doc| doc.get("entities"))
            .and_then(Value::as_object)
            .and_then(|entities| entities.values().next())
            .map(WikidataRelations::from_entity);
        debug!(
            bridge_id = %bridge_id,
            relations = relations.as_ref().map(WikidataRelations::len).unwrap_or(0),
            "Wikidata relations fetched"
        );
        Ok(relations)
    }
}
