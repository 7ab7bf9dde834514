//! Provider set construction and catalog registration
//!
//! Providers are built with placeholder ids, then matched by name against
//! the catalog's provider records. Missing records are created and get
//! their icon uploaded.

use meelo_common::models::{ProviderId, ProviderRecord};
use std::path::Path;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::MatcherSettings;
use crate::error::{CatalogResult, ProviderResult};
use crate::providers::musicbrainz::{self, MusicBrainzConfig};
use crate::providers::{links, lrclib, wikipedia, Provider, ProviderSet};

const UNREGISTERED: ProviderId = 0;

/// Build every enabled provider, anchor first
pub fn build_providers(settings: &MatcherSettings) -> ProviderResult<Vec<Provider>> {
    let timeout = settings.http_timeout();
    let anchor_config = MusicBrainzConfig {
        requests_per_second: settings.anchor_requests_per_second,
        timeout,
        acoustid_api_key: settings.acoustid_api_key.clone(),
        ..Default::default()
    };

    let mut providers = vec![
        musicbrainz::provider(UNREGISTERED, &anchor_config)?,
        wikipedia::provider(UNREGISTERED, timeout)?,
    ];
    providers.extend(
        links::SITES
            .iter()
            .copied()
            .map(|site| links::provider(UNREGISTERED, site)),
    );
    providers.push(lrclib::provider(UNREGISTERED, timeout)?);

    let (enabled, disabled): (Vec<_>, Vec<_>) = providers
        .into_iter()
        .partition(|p| settings.is_provider_enabled(p.name()));
    for provider in &disabled {
        info!(provider = %provider.name(), "Provider disabled");
    }
    Ok(enabled)
}

/// Give each provider its catalog id, registering the unknown ones
pub async fn register_providers(
    catalog: &dyn Catalog,
    providers: Vec<Provider>,
    icons_dir: Option<&Path>,
) -> CatalogResult<ProviderSet> {
    let mut known = catalog.get_providers().await?;
    let mut registered = Vec::with_capacity(providers.len());

    for provider in providers {
        let record = match find_record(&known, provider.name()) {
            Some(record) => record.clone(),
            None => {
                let record = catalog.post_provider(provider.name()).await?;
                info!(provider = %record.name, id = record.id, "Provider registered");
                if let Some(dir) = icons_dir {
                    upload_icon(catalog, &record, dir).await;
                }
                known.push(record.clone());
                record
            }
        };
        registered.push(provider.with_id(record.id));
    }

    Ok(ProviderSet::new(registered))
}

fn find_record<'a>(records: &'a [ProviderRecord], name: &str) -> Option<&'a ProviderRecord> {
    records.iter().find(|r| r.name.eq_ignore_ascii_case(name))
}

async fn upload_icon(catalog: &dyn Catalog, record: &ProviderRecord, dir: &Path) {
    let icon = dir.join(format!("{}.png", record.name));
    if !icon.is_file() {
        warn!(provider = %record.name, path = %icon.display(), "Provider icon not found");
        return;
    }
    if let Err(e) = catalog.post_provider_icon(record.id, &icon).await {
        warn!(provider = %record.name, error = %e, "Provider icon upload failed");
    }
}
