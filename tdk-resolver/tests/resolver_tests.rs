//! Integration tests for the resolution pipeline

mod helpers;

use helpers::{chapter, episode, FailingCacheStore, Harness, MockManga, MockStream, MANGA, STREAM};
use std::sync::Arc;
use std::time::Duration;
use tdk_common::events::{ResolutionSource, TsundokuEvent};
use tdk_resolver::cache::{Bucket, BucketKey, CacheStore, ContentKind};
use tdk_resolver::mapping::{ManualMapping, MappingStore};
use tdk_resolver::providers::{SearchResult, VolumeDetails};
use tdk_resolver::{ContainerRequest, ProviderError, ResolveError};
use tokio::task::JoinSet;

fn request(media_id: i64, titles: &[&str]) -> ContainerRequest {
    ContainerRequest::new(MANGA, media_id).with_titles(titles.iter().copied())
}

fn berserk() -> MockManga {
    MockManga::new()
        .with_results("Berserk", vec![SearchResult::new("bsk", "Berserk")])
        .with_chapters("bsk", vec![chapter("1", 0), chapter("2", 1)])
}

#[tokio::test]
async fn test_warm_cache_skips_provider() {
    let harness = Harness::new(berserk());
    let req = request(1, &["Berserk"]);

    let first = harness.resolver.get_chapter_container(&req).await.unwrap();
    let second = harness.resolver.get_chapter_container(&req).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
    assert_eq!(harness.manga.searches(), 1);
    assert_eq!(harness.manga.fetches(), 1);
}

#[tokio::test]
async fn test_items_relabelled_with_requesting_provider() {
    let harness = Harness::new(berserk());
    let container = harness
        .resolver
        .get_chapter_container(&request(1, &["Berserk"]))
        .await
        .unwrap();

    assert_eq!(container.provider, MANGA);
    assert_eq!(container.media_id, 1);
    assert!(container.items.iter().all(|c| c.provider == MANGA));
}

#[tokio::test]
async fn test_manual_mapping_bypasses_search() {
    let manga = berserk().with_chapters("mapped-id", vec![chapter("99", 0)]);
    let harness = Harness::new(manga);
    harness
        .mappings
        .upsert(&ManualMapping {
            provider: MANGA.to_string(),
            media_id: 7,
            external_id: "mapped-id".to_string(),
        })
        .await
        .unwrap();

    let container = harness
        .resolver
        .get_chapter_container(&request(7, &["Berserk"]))
        .await
        .unwrap();

    assert_eq!(container.items[0].chapter, "99");
    assert_eq!(harness.manga.searches(), 0);
    assert_eq!(harness.manga.fetched_ids(), vec!["mapped-id".to_string()]);
}

#[tokio::test]
async fn test_empty_fetch_is_not_cached() {
    let manga = MockManga::new()
        .with_results("Berserk", vec![SearchResult::new("bsk", "Berserk")])
        .with_chapters("bsk", Vec::new());
    let harness = Harness::new(manga);
    let req = request(1, &["Berserk"]);

    let first = harness.resolver.get_chapter_container(&req).await.unwrap();
    assert!(first.is_empty());

    let names = harness.cache.bucket_names("manga_").await.unwrap();
    assert!(names.is_empty());

    harness.manga.set_chapters("bsk", vec![chapter("1", 0)]);
    let second = harness.resolver.get_chapter_container(&req).await.unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(harness.manga.fetches(), 2);
}

#[tokio::test]
async fn test_highest_rated_result_across_titles_wins() {
    let manga = MockManga::new()
        .with_results(
            "Attack on Titan",
            vec![SearchResult::new("aot-1", "Attack on Titan: Junior High").with_rating(0.6)],
        )
        .with_results(
            "Shingeki no Kyojin",
            vec![SearchResult::new("aot-2", "Shingeki no Kyojin").with_rating(0.95)],
        )
        .with_chapters("aot-1", vec![chapter("1", 0)])
        .with_chapters("aot-2", vec![chapter("139", 0)]);
    let harness = Harness::new(manga);

    let container = harness
        .resolver
        .get_chapter_container(&request(16498, &["Attack on Titan", "Shingeki no Kyojin"]))
        .await
        .unwrap();

    assert_eq!(harness.manga.fetched_ids(), vec!["aot-2".to_string()]);
    assert_eq!(container.items[0].chapter, "139");
    assert_eq!(harness.manga.searches(), 2);
}

#[tokio::test]
async fn test_partial_search_failure_uses_remaining_titles() {
    let manga = berserk().with_search_error("Berserk: The Black Swordsman", || {
        ProviderError::Request("503 Service Unavailable".to_string())
    });
    let harness = Harness::new(manga);

    let container = harness
        .resolver
        .get_chapter_container(&request(1, &["Berserk: The Black Swordsman", "Berserk"]))
        .await
        .unwrap();
    assert_eq!(container.items.len(), 2);
    assert_eq!(harness.manga.searches(), 2);
}

#[tokio::test]
async fn test_total_search_failure_wraps_last_error() {
    let manga = MockManga::new()
        .with_search_error("Berserk", || ProviderError::Request("503".to_string()));
    let harness = Harness::new(manga);

    let err = harness
        .resolver
        .get_chapter_container(&request(1, &["Berserk"]))
        .await
        .unwrap_err();
    match err {
        ResolveError::NoResults { last_error } => {
            assert!(matches!(last_error, Some(ProviderError::Request(_))))
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_search_timeouts_surface_as_timeout() {
    let manga = MockManga::new()
        .with_search_error("Berserk", || ProviderError::still_indexing(4, 10));
    let harness = Harness::new(manga);

    let err = harness
        .resolver
        .get_chapter_container(&request(1, &["Berserk"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::SearchTimeout(_)));
    assert!(err.to_string().contains("40%"));
}

#[tokio::test]
async fn test_missing_titles_and_no_results() {
    let harness = Harness::new(berserk());

    let err = harness
        .resolver
        .get_chapter_container(&request(1, &["", "   "]))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NoTitlesProvided));

    let err = harness
        .resolver
        .get_chapter_container(&request(1, &["Vagabond"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NoResults { last_error: None }));
    assert_eq!(harness.manga.fetches(), 0);
}

#[tokio::test]
async fn test_fetch_failure_maps_to_content_kind() {
    let manga = MockManga::new().with_results("Berserk", vec![SearchResult::new("gone", "Berserk")]);
    let harness = Harness::new(manga);

    let err = harness
        .resolver
        .get_chapter_container(&request(1, &["Berserk"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NoChapters(ProviderError::NotFound(_))));

    let err = harness
        .resolver
        .get_volume_container(&request(1, &["Berserk"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NoVolumes(_)));
}

#[tokio::test]
async fn test_unknown_provider_and_capability_mismatch() {
    let harness = Harness::new(berserk());

    let err = harness
        .resolver
        .get_chapter_container(&ContainerRequest::new("nobody", 1).with_titles(["Berserk"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::ProviderNotFound(_)));

    let err = harness
        .resolver
        .get_chapter_container(&ContainerRequest::new(STREAM, 1).with_titles(["Berserk"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::InvalidExtensionType { .. }));
}

#[tokio::test]
async fn test_volume_container_cached_separately() {
    let volume = VolumeDetails {
        provider: "mislabelled".to_string(),
        id: "001".to_string(),
        number: "001".to_string(),
        title: "Volume 001".to_string(),
        chapters: vec![chapter("1", 0)],
    };
    let harness = Harness::new(berserk().with_volumes("bsk", vec![volume]));
    let req = request(1, &["Berserk"]);

    harness.resolver.get_chapter_container(&req).await.unwrap();
    let volumes = harness.resolver.get_volume_container(&req).await.unwrap();

    assert_eq!(volumes.items.len(), 1);
    assert_eq!(volumes.items[0].provider, MANGA);
    assert_eq!(volumes.items[0].chapters[0].provider, MANGA);

    let names = harness.cache.bucket_names("manga_").await.unwrap();
    assert_eq!(
        names,
        vec![
            "manga_provA_chapters_1".to_string(),
            "manga_provA_volumes_1".to_string()
        ]
    );
}

#[tokio::test]
async fn test_dubbed_episodes_use_their_own_bucket() {
    let stream = MockStream::new()
        .with_results("Frieren", vec![SearchResult::new("frieren", "Frieren")])
        .with_episodes("frieren", vec![episode(1), episode(2)]);
    let harness = Harness::with_stream(stream);

    let sub = ContainerRequest::new(STREAM, 154587).with_titles(["Frieren"]);
    let dub = sub.clone().dubbed(true);

    let episodes = harness.resolver.get_episode_container(&sub).await.unwrap();
    assert_eq!(episodes.items.len(), 2);
    assert!(episodes.items.iter().all(|e| e.provider == STREAM));

    harness.resolver.get_episode_container(&dub).await.unwrap();
    harness.resolver.get_episode_container(&dub).await.unwrap();

    assert_eq!(harness.stream.fetches(), 2);
    assert_eq!(harness.stream.dubbed_searches(), 1);

    let names = harness.cache.bucket_names("onlinestream_").await.unwrap();
    assert_eq!(
        names,
        vec![
            "onlinestream_streamA_episodes-dub_154587".to_string(),
            "onlinestream_streamA_episodes_154587".to_string()
        ]
    );
}

#[tokio::test]
async fn test_episode_error_kinds() {
    let stream = MockStream::new()
        .with_results("Frieren", vec![SearchResult::new("frieren", "Frieren")]);
    let harness = Harness::with_stream(stream);

    let err = harness
        .resolver
        .get_episode_container(&ContainerRequest::new(STREAM, 1).with_titles(["Frieren"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NoEpisodes { source: None }));

    let err = harness
        .resolver
        .get_episode_container(&ContainerRequest::new(STREAM, 1).with_titles(["Unknown"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NoAnimeFound { .. }));
}

#[tokio::test]
async fn test_concurrent_requests_share_one_fetch() {
    let harness = Harness::new(berserk().with_fetch_delay(Duration::from_millis(50)));
    let mut join_set = JoinSet::new();

    for _ in 0..8 {
        let resolver = harness.resolver.clone();
        join_set.spawn(async move {
            resolver
                .get_chapter_container(&request(1, &["Berserk"]))
                .await
                .unwrap()
        });
    }

    let mut containers = Vec::new();
    while let Some(result) = join_set.join_next().await {
        containers.push(result.unwrap());
    }

    assert_eq!(containers.len(), 8);
    assert!(containers.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(harness.manga.fetches(), 1);
}

#[tokio::test]
async fn test_resolution_events_report_source() {
    let harness = Harness::new(berserk());
    let mut rx = harness.resolver.events().subscribe();
    let req = request(1, &["Berserk"]);

    harness.resolver.get_chapter_container(&req).await.unwrap();
    harness.resolver.get_chapter_container(&req).await.unwrap();

    let mut sources = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let TsundokuEvent::ContainerResolved { source, item_count, .. } = event {
            assert_eq!(item_count, 2);
            sources.push(source);
        }
    }
    assert_eq!(sources, vec![ResolutionSource::Search, ResolutionSource::Cache]);
}

#[tokio::test]
async fn test_empty_cache_forces_refetch() {
    let harness = Harness::new(berserk());
    let req = request(1, &["Berserk"]);
    let other = request(11, &["Berserk"]);

    harness.resolver.get_chapter_container(&req).await.unwrap();
    harness.resolver.get_chapter_container(&other).await.unwrap();

    let removed = harness.resolver.empty_cache(1).await.unwrap();
    assert_eq!(removed, 1);

    // Media 11 is untouched even though its ID contains "1"
    let bucket = Bucket::for_key(
        &BucketKey::new(MANGA, ContentKind::Chapters, 11),
        chrono::Duration::days(7),
    );
    assert!(harness
        .cache
        .get(&bucket, &format!("{}$11", MANGA))
        .await
        .unwrap()
        .is_some());

    harness.resolver.get_chapter_container(&req).await.unwrap();
    assert_eq!(harness.manga.fetches(), 3);
}

#[tokio::test]
async fn test_sqlite_backed_resolution_round_trip() {
    let harness = Harness::sqlite(berserk()).await;
    let req = request(5, &["Berserk"]);

    let first = harness.resolver.get_chapter_container(&req).await.unwrap();
    let second = harness.resolver.get_chapter_container(&req).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(harness.manga.fetches(), 1);
    assert_eq!(
        harness.cache.bucket_names("manga_").await.unwrap(),
        vec!["manga_provA_chapters_5".to_string()]
    );
}

#[tokio::test]
async fn test_unavailable_cache_degrades_to_provider() {
    let cache = Arc::new(FailingCacheStore::new());
    let harness = Harness::with_cache(berserk(), cache.clone());
    let req = request(1, &["Berserk"]);

    let first = harness.resolver.get_chapter_container(&req).await.unwrap();
    assert_eq!(first.items.len(), 2);
    assert_eq!(harness.manga.fetches(), 1);
    assert_eq!(cache.sets(), 1);

    // Nothing was stored, so the next call goes back to the provider
    let second = harness.resolver.get_chapter_container(&req).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(harness.manga.fetches(), 2);
    assert!(cache.gets() >= 2);
}

#[tokio::test]
async fn test_corrupt_cached_payload_is_a_miss() {
    let cache = Arc::new(FailingCacheStore::corrupt());
    let harness = Harness::with_cache(berserk(), cache.clone());
    let req = request(1, &["Berserk"]);

    let container = harness.resolver.get_chapter_container(&req).await.unwrap();
    assert_eq!(container.items.len(), 2);
    assert_eq!(harness.manga.searches(), 1);
    assert_eq!(harness.manga.fetches(), 1);

    harness.resolver.get_chapter_container(&req).await.unwrap();
    assert_eq!(harness.manga.fetches(), 2);
}

#[tokio::test]
async fn test_dubbed_lookup_needs_dub_support() {
    let stream = MockStream::new()
        .with_results("Frieren", vec![SearchResult::new("frieren", "Frieren")])
        .with_episodes("frieren", vec![episode(1)])
        .subbed_only();
    let harness = Harness::with_stream(stream);
    let sub = ContainerRequest::new(STREAM, 154587).with_titles(["Frieren"]);

    let err = harness
        .resolver
        .get_episode_container(&sub.clone().dubbed(true))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ResolveError::NoAnimeFound {
            last_error: Some(ProviderError::Unsupported(_))
        }
    ));
    assert_eq!(harness.stream.dubbed_searches(), 0);

    let episodes = harness.resolver.get_episode_container(&sub).await.unwrap();
    assert_eq!(episodes.items.len(), 1);
}
