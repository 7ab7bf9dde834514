//! Test Helper Utilities
//!
//! Shared fixtures for meelo-matcher integration tests

#![allow(dead_code)]

pub mod mock_catalog;
pub mod mock_providers;

pub use mock_catalog::{CatalogCall, MockCatalog};
pub use mock_providers::{CallLog, MockBridge, MockProvider};

use meelo_matcher::config::MatcherSettings;
use meelo_matcher::matching::{MatchCoordinator, MatchEngine};
use meelo_matcher::providers::ProviderSet;
use meelo_matcher::tasks::{MemoryQueue, TaskSource};
use std::sync::Arc;

/// Coordinator over mocks, with the queue it reads its pending count from
pub fn coordinator(
    catalog: Arc<MockCatalog>,
    providers: ProviderSet,
    bridge: MockBridge,
    settings: MatcherSettings,
) -> (Arc<MatchCoordinator>, Arc<MemoryQueue>) {
    let queue = Arc::new(MemoryQueue::new());
    let tasks: Arc<dyn TaskSource> = queue.clone();
    let engine = MatchEngine::new(catalog, providers, Arc::new(bridge), settings);
    (Arc::new(MatchCoordinator::new(engine, tasks)), queue)
}
