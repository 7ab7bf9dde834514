//! Wikipedia provider: descriptions and artist illustrations
//!
//! Pages are found through the English Wikipedia sitelink of the Wikidata
//! item, or through a Wikipedia link listed on the MusicBrainz record.

use meelo_common::models::{EntityType, ProviderId};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::http::{build_client, get_json, last_path_segment, url_has_host};
use super::{FeatureName, FeatureOutput, Provider};
use crate::error::ProviderResult;

pub const NAME: &str = "Wikipedia";

const HOST: &str = "wikipedia.org";
const PAGE_URL: &str = "https://en.wikipedia.org/wiki";
const SUMMARY_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";
pub const SITELINK_KEY: &str = "sitelink:enwiki";

const KINDS: [EntityType; 3] = [EntityType::Artist, EntityType::Album, EntityType::Song];

pub struct WikipediaClient {
    client: reqwest::Client,
}

impl WikipediaClient {
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }

    /// Page summary; disambiguation pages count as missing
    pub async fn summary(&self, title: &str) -> ProviderResult<Option<Value>> {
        let url = format!("{}/{}", SUMMARY_URL, urlencoding::encode(&page_title(title)));
        let summary: Option<Value> = get_json(&self.client, &url, &[]).await?;
        Ok(summary.filter(|page| {
            page.get("type").and_then(Value::as_str) != Some("disambiguation")
        }))
    }
}

/// Titles use underscores in URLs and spaces in sitelinks
fn page_title(title: &str) -> String {
    title.trim().replace(' ', "_")
}

pub fn url_from_id(title: &str) -> String {
    format!("{}/{}", PAGE_URL, urlencoding::encode(&page_title(title)))
}

pub fn id_from_url(url: &str) -> Option<String> {
    if !url_has_host(url, HOST) {
        return None;
    }
    let segment = last_path_segment(url)?;
    let title = urlencoding::decode(&segment).ok()?.into_owned();
    Some(page_title(&title))
}

pub fn description(page: &Value) -> Option<String> {
    page.get("extract")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|extract| !extract.is_empty())
        .map(str::to_string)
}

pub fn illustration_url(page: &Value) -> Option<String> {
    page.get("originalimage")?
        .get("source")?
        .as_str()
        .map(str::to_string)
}

pub fn provider(id: ProviderId, timeout: Duration) -> ProviderResult<Provider> {
    let client = Arc::new(WikipediaClient::new(timeout)?);
    let mut builder = Provider::builder(id, NAME)
        .constant(
            FeatureName::AnchorRelationKey,
            FeatureOutput::Text("wikipedia".to_string()),
        )
        .sync(FeatureName::IsAnchorRelation, |input| {
            let relation = input.into_relation()?;
            Ok(Some(FeatureOutput::Flag(url_has_host(&relation.url, HOST))))
        })
        .sync(FeatureName::ArtistIllustrationUrl, |input| {
            Ok(illustration_url(&input.into_entity()?).map(FeatureOutput::Text))
        });

    for kind in KINDS {
        builder = builder
            .constant(
                FeatureName::WikidataRelationKey(kind),
                FeatureOutput::Text(SITELINK_KEY.to_string()),
            )
            .sync(FeatureName::UrlFromId(kind), |input| {
                Ok(Some(FeatureOutput::Text(url_from_id(&input.into_text()?))))
            })
            .sync(FeatureName::IdFromUrl(kind), |input| {
                Ok(id_from_url(&input.into_text()?).map(FeatureOutput::Text))
            })
            .handle(FeatureName::Get(kind), Arc::clone(&client), |client, input| async move {
                let title = input.into_text()?;
                Ok(client.summary(&title).await?.map(FeatureOutput::Entity))
            })
            .sync(FeatureName::Description(kind), |input| {
                Ok(description(&input.into_entity()?).map(FeatureOutput::Text))
            });
    }

    Ok(builder.build())
}
