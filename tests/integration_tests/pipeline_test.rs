//! Pipeline integration tests
//!
//! Tests the complete navigation → listing → detail flow:
//! 1. Category scope (first vs all)
//! 2. Deduplication and idempotent re-crawls
//! 3. Item cap, screenshots and name sources
//! 4. Retries at the renderer boundary

use tdcrawl::config::{CategoryScope, NameSource, RetryConfig, SettleConfig, SettleMode};
use tdcrawl::crawler::{Pipeline, Stage};
use tdcrawl::models::{ItemIdentifier, ItemRecord};
use tdcrawl::renderer::RenderSession;
use tokio::sync::watch;

use crate::common::{
    crawl, detail_url, listing_url, test_config, two_category_site, ScriptedRenderer, SiteBuilder,
};

fn identifiers(records: &[ItemRecord]) -> Vec<u64> {
    records.iter().map(|r| r.identifier.value()).collect()
}

// ============================================================================
// Category scope
// ============================================================================

#[tokio::test]
async fn test_first_category_scope_never_visits_second() {
    let renderer = two_category_site().build();
    let config = test_config();

    let run = crawl(&renderer, &config).await;

    assert!(run.report.is_success(), "{:?}", run.report.error);
    assert_eq!(identifiers(&run.emitted), vec![5, 70074]);
    assert_eq!(
        run.results
            .get(ItemIdentifier::new(70074))
            .map(|r| r.name.as_str()),
        Some("Complement Component C3c")
    );

    let visits = renderer.visits().await;
    assert!(visits.contains(&listing_url("/a")));
    assert!(!visits.contains(&listing_url("/b")));
    assert!(!visits.contains(&detail_url(900)));

    let stats = &run.report.stats;
    assert_eq!(stats.categories, 2);
    assert_eq!(stats.categories_visited, 1);
    assert_eq!(stats.cards_seen, 4);
    assert_eq!(stats.cards_skipped, 2);
    assert_eq!(stats.items_visited, 2);
    assert_eq!(stats.records, 2);
    assert!(stats.finished_at.is_some());
}

#[tokio::test]
async fn test_all_categories_scope() {
    let renderer = two_category_site().build();
    let mut config = test_config();
    config.crawl.category_scope = CategoryScope::All;

    let run = crawl(&renderer, &config).await;

    assert!(run.report.is_success());
    assert_eq!(identifiers(&run.emitted), vec![5, 900, 70074]);
    assert!(renderer.visits().await.contains(&listing_url("/b")));
}

// ============================================================================
// Deduplication
// ============================================================================

#[tokio::test]
async fn test_duplicate_cards_are_merged() {
    let renderer = SiteBuilder::new()
        .category("/a", &["MASTER5", "MASTER7", "MASTER5"])
        .category("/b", &["MASTER7"])
        .item(5, "Ferritin")
        .item(7, "Iron, Total")
        .build();
    let mut config = test_config();
    config.crawl.category_scope = CategoryScope::All;

    let run = crawl(&renderer, &config).await;

    assert_eq!(run.results.len(), 2);
    assert_eq!(run.report.stats.cards_seen, 4);
    assert_eq!(run.report.stats.items_visited, 2);
    let detail_visits = renderer
        .visits()
        .await
        .into_iter()
        .filter(|url| url == &detail_url(7))
        .count();
    assert_eq!(detail_visits, 1);
}

#[tokio::test]
async fn test_recrawl_is_idempotent() {
    let renderer = two_category_site().build();
    let config = test_config();

    let first = crawl(&renderer, &config).await;
    let second = crawl(&renderer, &config).await;

    assert_eq!(first.results, second.results);
    assert_eq!(first.emitted, second.emitted);
}

// ============================================================================
// Detail stage options
// ============================================================================

#[tokio::test]
async fn test_max_items_caps_detail_pages() {
    let renderer = two_category_site().build();
    let mut config = test_config();
    config.crawl.max_items = Some(1);

    let run = crawl(&renderer, &config).await;

    assert_eq!(identifiers(&run.emitted), vec![5]);
    let visits = renderer.visits().await;
    assert!(visits.contains(&detail_url(5)));
    assert!(!visits.contains(&detail_url(70074)));
}

#[tokio::test]
async fn test_last_screenshot_is_kept() {
    let renderer = ScriptedRenderer::new(two_category_site().build()).with_screenshots();
    let mut config = test_config();
    config.crawl.screenshot = true;

    let run = crawl(&renderer, &config).await;

    assert!(run.report.is_success());
    assert_eq!(run.report.screenshot, Some(detail_url(70074).into_bytes()));
}

#[tokio::test]
async fn test_screenshot_failure_does_not_affect_extraction() {
    // The offline renderer cannot rasterize
    let renderer = two_category_site().build();
    let mut config = test_config();
    config.crawl.screenshot = true;

    let run = crawl(&renderer, &config).await;

    assert!(run.report.is_success());
    assert_eq!(run.results.len(), 2);
    assert!(run.report.screenshot.is_none());
}

#[tokio::test]
async fn test_first_element_name_source() {
    let renderer = two_category_site().build();
    let mut config = test_config();
    config.crawl.name_source = NameSource::FirstElement;

    let run = crawl(&renderer, &config).await;

    assert!(run.emitted.iter().all(|record| record.name == "science"));
}

// ============================================================================
// Retries
// ============================================================================

#[tokio::test]
async fn test_transient_navigation_failure_is_retried() {
    let renderer =
        ScriptedRenderer::new(two_category_site().build()).fail_navigation(listing_url("/a"), 1);
    let mut config = test_config();
    config.retry = RetryConfig::with_delays(2, 1, 1);

    let run = crawl(&renderer, &config).await;

    assert!(run.report.is_success(), "{:?}", run.report.error);
    assert_eq!(run.results.len(), 2);
    let listing_visits = renderer
        .inner()
        .visits()
        .await
        .into_iter()
        .filter(|url| url == &listing_url("/a"))
        .count();
    assert_eq!(listing_visits, 1);
}

#[tokio::test]
async fn test_waits_for_navigation_entries_to_render() {
    let mut config = test_config();
    config.settle = SettleConfig {
        mode: SettleMode::Poll,
        timeout_ms: 2_000,
        poll_interval_ms: 1,
        max_poll_interval_ms: 2,
        ..SettleConfig::default()
    };
    // The container is present from the start; its entries are not
    let renderer = ScriptedRenderer::new(two_category_site().build())
        .reveal_after(config.site.navigation_selector.clone(), 2);

    let run = crawl(&renderer, &config).await;

    assert!(run.report.is_success(), "{:?}", run.report.error);
    assert_eq!(run.report.stats.categories, 2);
    assert_eq!(identifiers(&run.emitted), vec![5, 70074]);
}

// ============================================================================
// Stage progression
// ============================================================================

#[tokio::test]
async fn test_stage_by_stage_accumulators() {
    let renderer = two_category_site().build();
    let config = test_config();
    let (_tx, rx) = watch::channel(false);
    let session = RenderSession::new(&renderer, config.retry.clone(), config.settle.clone(), rx);
    let mut pipeline = Pipeline::new(&session, &config);
    let mut sink: Vec<ItemRecord> = Vec::new();

    assert_eq!(pipeline.stage(), Stage::Start);
    assert_eq!(pipeline.step(&mut sink).await, Stage::EnumerateCategories);

    assert_eq!(pipeline.step(&mut sink).await, Stage::EnumerateItems);
    let hrefs: Vec<&str> = pipeline.categories().iter().map(|c| c.as_str()).collect();
    assert_eq!(hrefs, vec!["/a", "/b"]);
    assert!(pipeline.index().is_empty());

    assert_eq!(pipeline.step(&mut sink).await, Stage::ExtractDetails);
    assert_eq!(
        pipeline.index().identifiers(),
        vec![ItemIdentifier::new(5), ItemIdentifier::new(70074)]
    );
    assert!(pipeline.results().is_empty());

    assert_eq!(pipeline.step(&mut sink).await, Stage::Done);
    assert_eq!(pipeline.results().len(), 2);
    assert_eq!(sink.len(), 2);
}
