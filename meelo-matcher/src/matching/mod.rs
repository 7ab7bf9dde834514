//! Match Engine: resolve sources, fetch and merge, post results

pub mod coordinator;
pub mod orchestrator;
pub mod policy;
pub mod resolver;
pub mod result;

use meelo_common::models::{EntityId, EntityType};
use meelo_common::{Error, Result};
use serde::{Deserialize, Serialize};

pub use coordinator::{InProgress, MatchCoordinator, MatchEngine, MatcherStatus};
pub use orchestrator::{FieldRules, Orchestrator};
pub use resolver::{Resolution, SourceResolver};
pub use result::{
    Accumulator, AlbumMatchResult, ArtistMatchResult, MatchMetadata, MatchResult,
    SongMatchResult,
};

/// Highest task priority accepted
pub const MAX_PRIORITY: u8 = 5;

/// Request to match one catalog entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchTask {
    #[serde(rename = "type", alias = "entityType")]
    pub entity_type: EntityType,
    #[serde(alias = "id")]
    pub entity_id: EntityId,
    #[serde(alias = "name")]
    pub entity_name: String,
    /// Reuse the sources the catalog already stores instead of resolving
    #[serde(default, alias = "reuseSources")]
    pub reuse_known_sources: bool,
    #[serde(default)]
    pub priority: u8,
}

impl MatchTask {
    pub fn new(
        entity_type: EntityType,
        entity_id: EntityId,
        entity_name: impl Into<String>,
    ) -> Self {
        Self {
            entity_type,
            entity_id,
            entity_name: entity_name.into(),
            reuse_known_sources: false,
            priority: 0,
        }
    }

    pub fn reusing_sources(mut self) -> Self {
        self.reuse_known_sources = true;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.priority > MAX_PRIORITY {
            return Err(Error::InvalidInput(format!(
                "Priority must be between 0 and {}, got {}",
                MAX_PRIORITY, self.priority
            )));
        }
        Ok(())
    }
}
