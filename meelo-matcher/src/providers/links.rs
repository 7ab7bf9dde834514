//! Link-only providers
//!
//! These sources only contribute external links: their identifiers are
//! resolved from MusicBrainz relations or Wikidata claims, and no field data
//! is fetched from them.

use meelo_common::models::{EntityType, ProviderId};

use super::http::url_has_host;
use super::{FeatureName, FeatureOutput, Provider};

/// URL shape of one entity kind on a link-only site
#[derive(Debug, Clone, Copy)]
pub struct LinkTarget {
    pub kind: EntityType,
    /// URL with a single `{}` placeholder for the identifier
    pub template: &'static str,
    /// Number of path segments the identifier spans
    pub segments: usize,
    /// Wikidata property holding the identifier
    pub wikidata_property: Option<&'static str>,
}

/// Table entry describing a link-only site
#[derive(Debug, Clone, Copy)]
pub struct LinkSite {
    pub name: &'static str,
    pub host: &'static str,
    /// Relation type MusicBrainz uses for this site, when it has its own
    pub anchor_relation_key: Option<&'static str>,
    pub targets: &'static [LinkTarget],
}

pub const DISCOGS: LinkSite = LinkSite {
    name: "Discogs",
    host: "discogs.com",
    anchor_relation_key: Some("discogs"),
    targets: &[
        LinkTarget {
            kind: EntityType::Artist,
            template: "https://www.discogs.com/artist/{}",
            segments: 1,
            wikidata_property: Some("P1953"),
        },
        LinkTarget {
            kind: EntityType::Album,
            template: "https://www.discogs.com/master/{}",
            segments: 1,
            wikidata_property: Some("P1954"),
        },
    ],
};

pub const ALLMUSIC: LinkSite = LinkSite {
    name: "AllMusic",
    host: "allmusic.com",
    anchor_relation_key: Some("allmusic"),
    targets: &[
        LinkTarget {
            kind: EntityType::Artist,
            template: "https://www.allmusic.com/artist/{}",
            segments: 1,
            wikidata_property: Some("P1728"),
        },
        LinkTarget {
            kind: EntityType::Album,
            template: "https://www.allmusic.com/album/{}",
            segments: 1,
            wikidata_property: Some("P1729"),
        },
        LinkTarget {
            kind: EntityType::Song,
            template: "https://www.allmusic.com/song/{}",
            segments: 1,
            wikidata_property: None,
        },
    ],
};

pub const GENIUS: LinkSite = LinkSite {
    name: "Genius",
    host: "genius.com",
    anchor_relation_key: None,
    targets: &[
        LinkTarget {
            kind: EntityType::Artist,
            template: "https://genius.com/artists/{}",
            segments: 1,
            wikidata_property: Some("P2373"),
        },
        LinkTarget {
            kind: EntityType::Album,
            template: "https://genius.com/albums/{}",
            segments: 2,
            wikidata_property: Some("P6217"),
        },
        LinkTarget {
            kind: EntityType::Song,
            template: "https://genius.com/{}",
            segments: 1,
            wikidata_property: Some("P6218"),
        },
    ],
};

pub const METACRITIC: LinkSite = LinkSite {
    name: "Metacritic",
    host: "metacritic.com",
    anchor_relation_key: None,
    targets: &[LinkTarget {
        kind: EntityType::Album,
        template: "https://www.metacritic.com/music/{}",
        segments: 2,
        wikidata_property: Some("P1712"),
    }],
};

/// Every link-only site shipped with the matcher
pub const SITES: [LinkSite; 4] = [DISCOGS, ALLMUSIC, GENIUS, METACRITIC];

impl LinkTarget {
    pub fn url_from_id(&self, id: &str) -> String {
        self.template.replace("{}", id.trim_matches('/'))
    }

    /// Identifier part of `url`, when it has this target's shape
    pub fn id_from_url(&self, host: &str, url: &str) -> Option<String> {
        if !url_has_host(url, host) {
            return None;
        }
        let parsed = reqwest::Url::parse(url).ok()?;
        let base = reqwest::Url::parse(self.template.trim_end_matches("{}")).ok()?;
        let prefix: Vec<&str> = base.path_segments()?.filter(|s| !s.is_empty()).collect();
        let path: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();

        if path.len() != prefix.len() + self.segments || !path.starts_with(&prefix) {
            return None;
        }
        Some(path[prefix.len()..].join("/"))
    }
}

pub fn provider(id: ProviderId, site: LinkSite) -> Provider {
    let host = site.host;
    let mut builder =
        Provider::builder(id, site.name).sync(FeatureName::IsAnchorRelation, move |input| {
            let relation = input.into_relation()?;
            Ok(Some(FeatureOutput::Flag(url_has_host(&relation.url, host))))
        });

    if let Some(key) = site.anchor_relation_key {
        builder = builder.constant(
            FeatureName::AnchorRelationKey,
            FeatureOutput::Text(key.to_string()),
        );
    }

    for target in site.targets.iter().copied() {
        builder = builder
            .sync(FeatureName::UrlFromId(target.kind), move |input| {
                Ok(Some(FeatureOutput::Text(target.url_from_id(&input.into_text()?))))
            })
            .sync(FeatureName::IdFromUrl(target.kind), move |input| {
                Ok(target
                    .id_from_url(host, &input.into_text()?)
                    .map(FeatureOutput::Text))
            });
        if let Some(property) = target.wikidata_property {
            builder = builder.constant(
                FeatureName::WikidataRelationKey(target.kind),
                FeatureOutput::Text(property.to_string()),
            );
        }
    }

    builder.build()
}
