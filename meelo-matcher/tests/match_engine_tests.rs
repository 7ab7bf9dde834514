//! Match engine integration tests
//!
//! Whole matches over a mock catalog, mock providers and a mock bridge.

mod helpers;

use chrono::NaiveDate;
use helpers::{coordinator, CallLog, CatalogCall, MockBridge, MockCatalog, MockProvider};
use meelo_common::models::{
    AlbumType, AlbumUpdate, EntityRef, EntityType, ExternalMetadata, ExternalSource, SongMaster,
};
use meelo_matcher::bridge::WikidataRelations;
use meelo_matcher::config::MatcherSettings;
use meelo_matcher::error::MatchError;
use meelo_matcher::matching::MatchTask;
use meelo_matcher::providers::{
    AnchorRelation, FeatureName, FeatureOutput, ProviderSet, SearchResult,
};
use meelo_matcher::tasks::{TaskRunner, TaskSource};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn found(id: &str) -> FeatureOutput {
    FeatureOutput::Search(SearchResult::with_object(id, json!({ "id": id })))
}

fn entity() -> FeatureOutput {
    FeatureOutput::Entity(json!({}))
}

fn stored(entity: EntityRef, sources: Vec<ExternalSource>) -> ExternalMetadata {
    let mut metadata = ExternalMetadata::for_entity(entity);
    metadata.sources = sources;
    metadata
}

/// Anchor finding every album as `rg-1`, answering `album_type` when given
fn album_anchor(log: &Arc<CallLog>) -> MockProvider {
    MockProvider::new(1, "Anchor", log)
        .anchor()
        .respond(FeatureName::Search(EntityType::Album), found("rg-1"))
        .urls(EntityType::Album, "https://anchor.test/release-group/")
        .respond(FeatureName::Get(EntityType::Album), entity())
}

async fn match_album(
    catalog: MockCatalog,
    anchor: MockProvider,
    settings: MatcherSettings,
) -> Arc<MockCatalog> {
    let catalog = Arc::new(catalog);
    let providers = ProviderSet::new(vec![anchor.build()]);
    let (coordinator, _queue) =
        coordinator(catalog.clone(), providers, MockBridge::new(), settings);
    coordinator
        .match_entity(&MatchTask::new(EntityType::Album, 10, "Ray of Light"))
        .await
        .unwrap();
    catalog
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_artist_sources_from_anchor_relations_and_bridge() {
    let log = CallLog::new();
    let anchor = MockProvider::new(1, "Anchor", &log)
        .anchor()
        .respond(FeatureName::Search(EntityType::Artist), found("mb-1"))
        .urls(EntityType::Artist, "https://anchor.test/artist/")
        .respond(FeatureName::Get(EntityType::Artist), entity())
        .respond(
            FeatureName::AnchorRelations(EntityType::Artist),
            FeatureOutput::Relations(vec![
                AnchorRelation::new("wikidata", "https://www.wikidata.org/wiki/Q1744"),
                AnchorRelation::new("discogs", "https://www.discogs.com/artist/8760"),
                AnchorRelation::new("allmusic", "https://www.allmusic.com/artist/mn0000237205"),
            ]),
        );
    let discogs = MockProvider::new(2, "Discogs", &log)
        .respond(FeatureName::AnchorRelationKey, FeatureOutput::Text("discogs".into()))
        .urls(EntityType::Artist, "https://www.discogs.com/artist/");
    let allmusic = MockProvider::new(3, "AllMusic", &log)
        .recognizes("allmusic.com")
        .urls(EntityType::Artist, "https://www.allmusic.com/artist/");
    let wikipedia = MockProvider::new(4, "Wikipedia", &log)
        .respond(
            FeatureName::WikidataRelationKey(EntityType::Artist),
            FeatureOutput::Text("sitelink:enwiki".into()),
        )
        .urls(EntityType::Artist, "https://en.wikipedia.org/wiki/")
        .respond(FeatureName::Get(EntityType::Artist), entity())
        .respond(
            FeatureName::Description(EntityType::Artist),
            FeatureOutput::Text("American singer and songwriter".into()),
        )
        .respond(
            FeatureName::ArtistIllustrationUrl,
            FeatureOutput::Text("https://upload.test/madonna.jpg".into()),
        );
    let bridge = MockBridge::new().with_item(
        "Q1744",
        WikidataRelations::new().with("sitelink:enwiki", "Madonna"),
    );

    let catalog = Arc::new(MockCatalog::new().with_artist(1, "Madonna"));
    let providers = ProviderSet::new(vec![
        anchor.build(),
        discogs.build(),
        allmusic.build(),
        wikipedia.build(),
    ]);
    let (coordinator, _queue) =
        coordinator(catalog.clone(), providers, bridge, MatcherSettings::default());

    coordinator
        .match_entity(&MatchTask::new(EntityType::Artist, 1, "Madonna"))
        .await
        .unwrap();

    let posted = catalog.posted_metadata();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].artist_id, Some(1));
    assert_eq!(
        posted[0].sources,
        vec![
            ExternalSource::new("https://anchor.test/artist/mb-1", 1),
            ExternalSource::new("https://www.discogs.com/artist/8760", 2),
            ExternalSource::new("https://www.allmusic.com/artist/mn0000237205", 3),
            ExternalSource::new("https://en.wikipedia.org/wiki/Madonna", 4),
        ]
    );
    assert_eq!(
        posted[0].description.as_deref(),
        Some("American singer and songwriter")
    );

    let illustrations: Vec<_> = catalog
        .calls()
        .into_iter()
        .filter(|c| matches!(c, CatalogCall::ArtistIllustration { .. }))
        .collect();
    assert_eq!(
        illustrations,
        vec![CatalogCall::ArtistIllustration {
            artist_id: 1,
            url: "https://upload.test/madonna.jpg".into(),
        }]
    );
}

#[tokio::test]
async fn test_other_album_type_is_overridden() {
    let log = CallLog::new();
    let anchor = album_anchor(&log).respond(
        FeatureName::AlbumType,
        FeatureOutput::AlbumType(AlbumType::StudioRecording),
    );
    let catalog = MockCatalog::new().with_album(10, "Ray of Light", AlbumType::Other, None);

    let catalog = match_album(catalog, anchor, MatcherSettings::default()).await;

    assert_eq!(
        catalog.album_updates(),
        vec![AlbumUpdate {
            album_type: Some(AlbumType::StudioRecording),
            ..Default::default()
        }]
    );
}

#[tokio::test]
async fn test_resolved_other_is_never_posted() {
    let log = CallLog::new();
    let anchor = album_anchor(&log)
        .respond(FeatureName::AlbumType, FeatureOutput::AlbumType(AlbumType::Other));
    let catalog = MockCatalog::new().with_album(10, "Ray of Light", AlbumType::Other, None);

    let catalog = match_album(catalog, anchor, MatcherSettings::default()).await;

    assert!(catalog.album_updates().is_empty());
    assert_eq!(catalog.posted_metadata().len(), 1);
}

#[tokio::test]
async fn test_live_recording_is_overridable() {
    let log = CallLog::new();
    let anchor = album_anchor(&log).respond(
        FeatureName::AlbumType,
        FeatureOutput::AlbumType(AlbumType::StudioRecording),
    );
    let catalog =
        MockCatalog::new().with_album(10, "Ray of Light", AlbumType::LiveRecording, None);

    let catalog = match_album(catalog, anchor, MatcherSettings::default()).await;

    assert_eq!(
        catalog.album_updates()[0].album_type,
        Some(AlbumType::StudioRecording)
    );
}

#[tokio::test]
async fn test_fixed_album_type_is_not_fetched() {
    let log = CallLog::new();
    let anchor = album_anchor(&log).respond(
        FeatureName::AlbumType,
        FeatureOutput::AlbumType(AlbumType::StudioRecording),
    );
    let catalog = MockCatalog::new().with_album(10, "Ray of Light", AlbumType::Compilation, None);

    let catalog = match_album(catalog, anchor, MatcherSettings::default()).await;

    assert!(!log.called("Anchor", FeatureName::AlbumType));
    assert!(catalog.album_updates().is_empty());
}

#[tokio::test]
async fn test_song_reuse_fetches_only_known_provider() {
    let log = CallLog::new();
    let anchor = MockProvider::new(1, "Anchor", &log)
        .anchor()
        .respond(FeatureName::Search(EntityType::Song), found("rec-1"))
        .urls(EntityType::Song, "https://anchor.test/recording/");
    let other = MockProvider::new(2, "Other", &log)
        .respond(FeatureName::Search(EntityType::Song), found("x"))
        .urls(EntityType::Song, "https://other.test/")
        .respond(FeatureName::Get(EntityType::Song), entity());
    let lyrics = MockProvider::new(3, "Lyrics", &log)
        .urls(EntityType::Song, "https://lyrics.test/")
        .respond(FeatureName::Get(EntityType::Song), entity())
        .respond(
            FeatureName::PlainLyrics,
            FeatureOutput::Text("You only see what your eyes want to see".into()),
        );

    let known = vec![ExternalSource::new("https://lyrics.test/77", 3)];
    let catalog = Arc::new(
        MockCatalog::new()
            .with_song(20, "Frozen", None)
            .with_stored(EntityRef::Song(20), stored(EntityRef::Song(20), known.clone())),
    );
    let providers = ProviderSet::new(vec![anchor.build(), other.build(), lyrics.build()]);
    let (coordinator, _queue) = coordinator(
        catalog.clone(),
        providers,
        MockBridge::new(),
        MatcherSettings::default(),
    );

    coordinator
        .match_entity(&MatchTask::new(EntityType::Song, 20, "Frozen").reusing_sources())
        .await
        .unwrap();

    assert!(!log.called("Anchor", FeatureName::Search(EntityType::Song)));
    assert!(!log.called("Other", FeatureName::Search(EntityType::Song)));
    assert!(!log.called("Other", FeatureName::Get(EntityType::Song)));
    assert_eq!(log.count("Lyrics", FeatureName::Get(EntityType::Song)), 1);

    assert_eq!(catalog.posted_metadata()[0].sources, known);
    assert!(catalog.calls().iter().any(|c| matches!(
        c,
        CatalogCall::SongLyrics { song_id: 20, lyrics } if lyrics.plain.starts_with("You only see")
    )));
}

#[tokio::test]
async fn test_placeholder_release_date_is_replaced() {
    let log = CallLog::new();
    let anchor = album_anchor(&log)
        .respond(FeatureName::AlbumReleaseDate, FeatureOutput::Date(date(1998, 3, 2)));
    let catalog = MockCatalog::new().with_album(
        10,
        "Ray of Light",
        AlbumType::Compilation,
        Some(date(1998, 1, 1)),
    );

    let catalog = match_album(catalog, anchor, MatcherSettings::default()).await;

    assert_eq!(
        catalog.album_updates(),
        vec![AlbumUpdate {
            release_date: Some(date(1998, 3, 2)),
            ..Default::default()
        }]
    );
}

// ============================================================================
// Post rules
// ============================================================================

#[tokio::test]
async fn test_precise_release_date_is_kept() {
    let log = CallLog::new();
    let anchor = album_anchor(&log)
        .respond(FeatureName::AlbumReleaseDate, FeatureOutput::Date(date(1998, 3, 2)));
    let catalog = MockCatalog::new().with_album(
        10,
        "Ray of Light",
        AlbumType::Compilation,
        Some(date(1998, 5, 12)),
    );

    let catalog = match_album(catalog, anchor, MatcherSettings::default()).await;

    assert!(catalog.album_updates().is_empty());
}

#[tokio::test]
async fn test_distant_release_date_is_discarded() {
    let log = CallLog::new();
    let anchor = album_anchor(&log)
        .respond(FeatureName::AlbumReleaseDate, FeatureOutput::Date(date(1998, 3, 2)));
    let catalog = MockCatalog::new().with_album(
        10,
        "Ray of Light",
        AlbumType::Compilation,
        Some(date(1990, 1, 1)),
    );

    let catalog = match_album(catalog, anchor, MatcherSettings::default()).await;

    assert!(catalog.album_updates().is_empty());
}

#[tokio::test]
async fn test_album_genres_follow_push_genres() {
    let genres = FeatureOutput::Genres(vec!["Electronica".into(), "Pop".into()]);

    let log = CallLog::new();
    let anchor = album_anchor(&log).respond(FeatureName::Genres(EntityType::Album), genres.clone());
    let catalog = MockCatalog::new().with_album(10, "Ray of Light", AlbumType::Compilation, None);
    let catalog = match_album(catalog, anchor, MatcherSettings::default()).await;
    assert_eq!(
        catalog.album_updates()[0].genres,
        Some(vec!["Electronica".to_string(), "Pop".to_string()])
    );

    let log = CallLog::new();
    let anchor = album_anchor(&log).respond(FeatureName::Genres(EntityType::Album), genres);
    let catalog = MockCatalog::new().with_album(10, "Ray of Light", AlbumType::Compilation, None);
    let settings = MatcherSettings {
        push_genres: false,
        ..Default::default()
    };
    let catalog = match_album(catalog, anchor, settings).await;
    assert!(!log.called("Anchor", FeatureName::Genres(EntityType::Album)));
    assert!(catalog.album_updates().is_empty());
}

#[tokio::test]
async fn test_artist_without_data_posts_nothing() {
    let catalog = Arc::new(MockCatalog::new().with_artist(1, "Nobody"));
    let (coordinator, _queue) = coordinator(
        catalog.clone(),
        ProviderSet::default(),
        MockBridge::new(),
        MatcherSettings::default(),
    );

    coordinator
        .match_entity(&MatchTask::new(EntityType::Artist, 1, "Nobody"))
        .await
        .unwrap();

    assert!(catalog.calls().is_empty());
}

#[tokio::test]
async fn test_song_with_fingerprint_searches_by_acoustid() {
    let log = CallLog::new();
    let anchor = MockProvider::new(1, "Anchor", &log)
        .anchor()
        .respond(FeatureName::Search(EntityType::Song), found("by-name"))
        .respond(FeatureName::SearchSongWithAcoustId, found("by-print"))
        .urls(EntityType::Song, "https://anchor.test/recording/");
    let catalog = Arc::new(
        MockCatalog::new()
            .with_song(
                20,
                "Frozen",
                Some(SongMaster {
                    duration: Some(372),
                    source_file_id: Some(7),
                }),
            )
            .with_file(7, "AQADtEmUaEkSRZEG"),
    );
    let (coordinator, _queue) = coordinator(
        catalog.clone(),
        ProviderSet::new(vec![anchor.build()]),
        MockBridge::new(),
        MatcherSettings::default(),
    );

    coordinator
        .match_entity(&MatchTask::new(EntityType::Song, 20, "Frozen"))
        .await
        .unwrap();

    assert!(log.called("Anchor", FeatureName::SearchSongWithAcoustId));
    assert!(!log.called("Anchor", FeatureName::Search(EntityType::Song)));
    assert_eq!(
        catalog.posted_metadata()[0].sources,
        vec![ExternalSource::new("https://anchor.test/recording/by-print", 1)]
    );
}

// ============================================================================
// Merge laws
// ============================================================================

#[tokio::test]
async fn test_song_genres_are_unioned_ignoring_case() {
    let log = CallLog::new();
    let first = MockProvider::new(5, "First", &log)
        .respond(FeatureName::Search(EntityType::Song), found("a"))
        .urls(EntityType::Song, "https://first.test/")
        .respond(
            FeatureName::Genres(EntityType::Song),
            FeatureOutput::Genres(vec!["Pop".into(), "Dance".into()]),
        );
    let second = MockProvider::new(6, "Second", &log)
        .respond(FeatureName::Search(EntityType::Song), found("b"))
        .urls(EntityType::Song, "https://second.test/")
        .respond(
            FeatureName::Genres(EntityType::Song),
            FeatureOutput::Genres(vec!["pop".into(), " Electronic ".into(), "DANCE".into()]),
        );
    let catalog = Arc::new(MockCatalog::new().with_song(20, "Frozen", None));
    let (coordinator, _queue) = coordinator(
        catalog.clone(),
        ProviderSet::new(vec![first.build(), second.build()]),
        MockBridge::new(),
        MatcherSettings::default(),
    );

    coordinator
        .match_entity(&MatchTask::new(EntityType::Song, 20, "Frozen"))
        .await
        .unwrap();

    let genres = catalog
        .calls()
        .into_iter()
        .find_map(|c| match c {
            CatalogCall::SongGenres { genres, .. } => Some(genres),
            _ => None,
        })
        .unwrap();
    let mut normalized: Vec<String> = genres.iter().map(|g| g.to_lowercase()).collect();
    normalized.sort();
    assert_eq!(normalized, vec!["dance", "electronic", "pop"]);

    // Sources follow provider order regardless of completion order
    assert_eq!(
        catalog.posted_metadata()[0].sources,
        vec![
            ExternalSource::new("https://first.test/a", 5),
            ExternalSource::new("https://second.test/b", 6),
        ]
    );
}

#[tokio::test]
async fn test_one_source_per_provider() {
    let log = CallLog::new();
    let lyrics = MockProvider::new(3, "Lyrics", &log)
        .urls(EntityType::Song, "https://lyrics.test/")
        .respond(FeatureName::Get(EntityType::Song), entity());
    let known = vec![
        ExternalSource::new("https://lyrics.test/77", 3),
        ExternalSource::new("https://lyrics.test/78", 3),
    ];
    let catalog = Arc::new(
        MockCatalog::new()
            .with_song(20, "Frozen", None)
            .with_stored(EntityRef::Song(20), stored(EntityRef::Song(20), known)),
    );
    let (coordinator, _queue) = coordinator(
        catalog.clone(),
        ProviderSet::new(vec![lyrics.build()]),
        MockBridge::new(),
        MatcherSettings::default(),
    );

    coordinator
        .match_entity(&MatchTask::new(EntityType::Song, 20, "Frozen").reusing_sources())
        .await
        .unwrap();

    assert_eq!(
        catalog.posted_metadata()[0].sources,
        vec![ExternalSource::new("https://lyrics.test/77", 3)]
    );
}

#[tokio::test]
async fn test_reuse_is_deterministic() {
    let log = CallLog::new();
    let wiki = MockProvider::new(4, "Wikipedia", &log)
        .urls(EntityType::Artist, "https://en.wikipedia.org/wiki/")
        .respond(FeatureName::Get(EntityType::Artist), entity())
        .respond(
            FeatureName::Description(EntityType::Artist),
            FeatureOutput::Text("Queen of Pop".into()),
        );
    let discogs = MockProvider::new(2, "Discogs", &log)
        .urls(EntityType::Artist, "https://www.discogs.com/artist/");
    let known = vec![
        ExternalSource::new("https://en.wikipedia.org/wiki/Madonna", 4),
        ExternalSource::new("https://www.discogs.com/artist/8760", 2),
    ];
    let catalog = Arc::new(
        MockCatalog::new()
            .with_artist(1, "Madonna")
            .with_stored(EntityRef::Artist(1), stored(EntityRef::Artist(1), known)),
    );
    let (coordinator, _queue) = coordinator(
        catalog.clone(),
        ProviderSet::new(vec![discogs.build(), wiki.build()]),
        MockBridge::new(),
        MatcherSettings::default(),
    );

    let task = MatchTask::new(EntityType::Artist, 1, "Madonna").reusing_sources();
    coordinator.match_entity(&task).await.unwrap();
    coordinator.match_entity(&task).await.unwrap();

    let posted = catalog.posted_metadata();
    assert_eq!(posted.len(), 2);
    assert_eq!(posted[0], posted[1]);
    assert_eq!(posted[0].description.as_deref(), Some("Queen of Pop"));
}

#[tokio::test]
async fn test_failing_provider_degrades_to_no_data() {
    let log = CallLog::new();
    let broken = MockProvider::new(3, "Broken", &log)
        .urls(EntityType::Song, "https://broken.test/")
        .fail(FeatureName::Get(EntityType::Song));
    let known = vec![ExternalSource::new("https://broken.test/1", 3)];
    let catalog = Arc::new(
        MockCatalog::new()
            .with_song(20, "Frozen", None)
            .with_stored(EntityRef::Song(20), stored(EntityRef::Song(20), known)),
    );
    let (coordinator, _queue) = coordinator(
        catalog.clone(),
        ProviderSet::new(vec![broken.build()]),
        MockBridge::new(),
        MatcherSettings::default(),
    );

    coordinator
        .match_entity(&MatchTask::new(EntityType::Song, 20, "Frozen").reusing_sources())
        .await
        .unwrap();

    assert!(log.called("Broken", FeatureName::Get(EntityType::Song)));
    assert!(catalog.posted_metadata()[0].sources.is_empty());
}

// ============================================================================
// Coordinator
// ============================================================================

#[tokio::test]
async fn test_matches_run_one_at_a_time() {
    let catalog = Arc::new(
        MockCatalog::new()
            .with_artist(1, "Madonna")
            .with_artist(2, "Björk")
            .with_artist(3, "Prince")
            .with_read_delay(Duration::from_millis(25)),
    );
    let (coordinator, _queue) = coordinator(
        catalog.clone(),
        ProviderSet::default(),
        MockBridge::new(),
        MatcherSettings::default(),
    );

    let handles: Vec<_> = (1..=3)
        .map(|id| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .match_entity(&MatchTask::new(EntityType::Artist, id, "artist"))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(catalog.max_active_reads(), 1);
}

#[tokio::test]
async fn test_status_reports_match_in_progress() {
    let catalog = Arc::new(
        MockCatalog::new()
            .with_artist(1, "Madonna")
            .with_read_delay(Duration::from_millis(100)),
    );
    let (coordinator, _queue) = coordinator(
        catalog,
        ProviderSet::default(),
        MockBridge::new(),
        MatcherSettings::default(),
    );

    let running = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            coordinator
                .match_entity(&MatchTask::new(EntityType::Artist, 1, "Madonna"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let status = coordinator.status();
    let in_progress = status.in_progress.unwrap();
    assert_eq!(in_progress.name, "Madonna");
    assert_eq!(in_progress.entity_type, EntityType::Artist);
    assert_eq!(in_progress.id, 1);

    running.await.unwrap().unwrap();
    let status = coordinator.status();
    assert!(status.in_progress.is_none());
    assert_eq!(status.processed_count, 1);
}

#[tokio::test]
async fn test_processed_count_resets_when_queue_is_empty() {
    let catalog = Arc::new(MockCatalog::new().with_artist(1, "Madonna"));
    let (coordinator, queue) = coordinator(
        catalog,
        ProviderSet::default(),
        MockBridge::new(),
        MatcherSettings::default(),
    );
    let task = MatchTask::new(EntityType::Artist, 1, "Madonna");

    queue.push(task.clone()).unwrap();
    coordinator.match_entity(&task).await.unwrap();
    coordinator.match_entity(&task).await.unwrap();
    assert_eq!(coordinator.status().processed_count, 2);
    assert_eq!(coordinator.status().pending_count, 1);

    // Taken from the queue but not started: still pending
    let delivery = queue.next().await.unwrap();
    assert_eq!(coordinator.status().pending_count, 1);
    queue.start(&delivery);
    coordinator.match_entity(&delivery.task).await.unwrap();
    queue.ack(&delivery).await;
    assert_eq!(coordinator.status().processed_count, 3);
    assert_eq!(coordinator.status().pending_count, 0);

    // The queue emptied, so the next match starts a new count
    coordinator.match_entity(&task).await.unwrap();
    assert_eq!(coordinator.status().processed_count, 1);
}

#[tokio::test]
async fn test_catalog_failure_fails_the_match() {
    let catalog = Arc::new(MockCatalog::new());
    let (coordinator, _queue) = coordinator(
        catalog,
        ProviderSet::default(),
        MockBridge::new(),
        MatcherSettings::default(),
    );

    let result = coordinator
        .match_entity(&MatchTask::new(EntityType::Album, 404, "Missing"))
        .await;

    assert!(matches!(result, Err(MatchError::CatalogUnavailable(_))));
    let status = coordinator.status();
    assert!(status.in_progress.is_none());
    assert_eq!(status.processed_count, 1);
}

#[tokio::test]
async fn test_runner_drains_and_acknowledges_queue() {
    let catalog = Arc::new(
        MockCatalog::new()
            .with_album(10, "Ray of Light", AlbumType::Compilation, None)
            .with_album(11, "Music", AlbumType::Compilation, None)
            .with_album(12, "Missing", AlbumType::Compilation, None),
    );
    let (coordinator, queue) = coordinator(
        catalog.clone(),
        ProviderSet::default(),
        MockBridge::new(),
        MatcherSettings::default(),
    );
    queue
        .push(MatchTask::new(EntityType::Album, 10, "Ray of Light"))
        .unwrap();
    queue.push(MatchTask::new(EntityType::Album, 11, "Music")).unwrap();
    // Unknown entity: fails, still acknowledged
    queue.push(MatchTask::new(EntityType::Album, 99, "Gone")).unwrap();
    queue.close();

    TaskRunner::new(queue.clone(), coordinator, 2).run().await;

    assert_eq!(queue.pending_count(), 0);
    assert_eq!(queue.unacked_count(), 0);
    assert_eq!(catalog.posted_metadata().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_runner_counts_whole_batch_with_prefetch() {
    let mut catalog = MockCatalog::new();
    for id in 20..25 {
        catalog = catalog.with_album(id, "Like a Prayer", AlbumType::Compilation, None);
    }
    let catalog = Arc::new(catalog.with_read_delay(Duration::from_millis(10)));
    let (coordinator, queue) = coordinator(
        catalog.clone(),
        ProviderSet::default(),
        MockBridge::new(),
        MatcherSettings::default(),
    );
    for id in 20..25 {
        queue.push(MatchTask::new(EntityType::Album, id, "Like a Prayer")).unwrap();
    }
    queue.close();

    TaskRunner::new(queue.clone(), Arc::clone(&coordinator), 2).run().await;

    let status = coordinator.status();
    assert_eq!(status.processed_count, 5);
    assert_eq!(status.pending_count, 0);
    assert_eq!(catalog.posted_metadata().len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_runner_matches_in_delivery_order() {
    let mut catalog = MockCatalog::new();
    for id in 30..36 {
        catalog = catalog.with_album(id, "Erotica", AlbumType::Compilation, None);
    }
    let catalog = Arc::new(catalog.with_read_delay(Duration::from_millis(10)));
    let (coordinator, queue) = coordinator(
        catalog.clone(),
        ProviderSet::default(),
        MockBridge::new(),
        MatcherSettings::default(),
    );
    for (id, priority) in [(30, 0), (31, 5), (32, 3), (33, 0), (34, 5), (35, 1)] {
        let task = MatchTask::new(EntityType::Album, id, "Erotica").with_priority(priority);
        queue.push(task).unwrap();
    }
    queue.close();

    TaskRunner::new(queue.clone(), coordinator, 4).run().await;

    let order: Vec<_> = catalog
        .posted_metadata()
        .into_iter()
        .filter_map(|metadata| metadata.album_id)
        .collect();
    assert_eq!(order, vec![31, 34, 32, 35, 30, 33]);
}
