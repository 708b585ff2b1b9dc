//! Error scenario integration tests
//!
//! Tests various failure modes and error handling:
//! 1. Detail page failures (isolate vs abort)
//! 2. Title resolution problems
//! 3. Navigation tree and category failures
//! 4. Interrupts

use tdcrawl::config::{CategoryScope, FailurePolicy};
use tdcrawl::crawler::Pipeline;
use tdcrawl::error::Error;
use tdcrawl::models::{ItemIdentifier, ItemRecord};
use tdcrawl::renderer::RenderSession;
use tdcrawl::storage::JsonLinesWriter;
use tdcrawl::utils::error::RendererError;
use tokio::sync::watch;

use crate::common::{
    crawl, crawl_with_shutdown, detail_page_with_titles, detail_url, listing_url, test_config,
    two_category_site, ScriptedRenderer, SiteBuilder, ROOT_URL,
};

fn three_item_site() -> SiteBuilder {
    SiteBuilder::new()
        .category("/a", &["MASTER1", "MASTER2", "MASTER3"])
        .item(1, "Albumin")
        .item(2, "Bilirubin, Total")
        .item(3, "Calcium")
}

// ============================================================================
// Detail failures
// ============================================================================

#[tokio::test]
async fn test_detail_failure_is_isolated() {
    let renderer =
        ScriptedRenderer::new(two_category_site().build()).fail_navigation_always(detail_url(5));
    let config = test_config();

    let run = crawl(&renderer, &config).await;

    assert_eq!(run.results.len(), 1);
    assert!(run.results.contains(ItemIdentifier::new(70074)));
    assert_eq!(run.report.stats.item_failures, 1);

    let error = run.report.error.expect("detail failure should be reported");
    assert_eq!(error.len(), 1);
    let first = error.iter().next();
    match first {
        Some(Error::Item { identifier, source }) => {
            assert_eq!(*identifier, ItemIdentifier::new(5));
            assert!(matches!(
                **source,
                Error::Renderer(RendererError::Navigation { .. })
            ));
        }
        other => panic!("Expected item error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_detail_failure_aborts_remaining_items() {
    let renderer =
        ScriptedRenderer::new(two_category_site().build()).fail_navigation_always(detail_url(5));
    let mut config = test_config();
    config.crawl.failure_policy = FailurePolicy::Abort;

    let run = crawl(&renderer, &config).await;

    assert!(run.results.is_empty());
    assert!(run.report.error.is_some());
    assert!(!run.report.interrupted);
    assert!(!renderer.inner().visits().await.contains(&detail_url(70074)));
}

// ============================================================================
// Title resolution
// ============================================================================

#[tokio::test]
async fn test_title_resolution_failures_continue() {
    let renderer = SiteBuilder::new()
        .category("/a", &["MASTER1", "MASTER2", "MASTER3"])
        .detail(1, detail_page_with_titles(0))
        .detail(2, detail_page_with_titles(2))
        .item(3, "Calcium")
        .build();
    let config = test_config();

    let run = crawl(&renderer, &config).await;

    assert!(run.report.is_success(), "{:?}", run.report.error);
    assert_eq!(run.emitted, vec![ItemRecord::new(ItemIdentifier::new(3), "Calcium")]);
    assert_eq!(run.report.stats.title_failures, 2);
    assert_eq!(run.report.stats.items_visited, 3);
}

#[tokio::test]
async fn test_title_without_text_is_omitted() {
    let page = r#"<html><body>
      <h1 class="qd-header__title-mobile ng-binding"><span class="badge"></span></h1>
    </body></html>"#;
    let renderer = SiteBuilder::new()
        .category("/a", &["MASTER1", "MASTER3"])
        .detail(1, page.to_string())
        .item(3, "Calcium")
        .build();

    let run = crawl(&renderer, &test_config()).await;

    assert!(run.report.is_success());
    assert!(!run.results.contains(ItemIdentifier::new(1)));
    assert!(run.results.contains(ItemIdentifier::new(3)));
    assert_eq!(run.report.stats.title_failures, 0);
}

// ============================================================================
// Navigation tree and categories
// ============================================================================

#[tokio::test]
async fn test_expansion_failure_keeps_other_entries() {
    // Expand call 0 is the first navigation entry
    let renderer = ScriptedRenderer::new(two_category_site().build()).fail_expansion(0);
    let config = test_config();

    let run = crawl(&renderer, &config).await;

    assert_eq!(run.report.stats.categories, 1);
    assert_eq!(
        run.emitted,
        vec![ItemRecord::new(ItemIdentifier::new(900), "Vitamin D, 25-Hydroxy")]
    );

    let error = run.report.error.expect("expansion failure should be reported");
    assert_eq!(error.len(), 1);
    assert!(matches!(
        error.iter().next(),
        Some(Error::Renderer(RendererError::Expansion { .. }))
    ));
}

#[tokio::test]
async fn test_every_expansion_failure_is_reported() {
    let renderer = ScriptedRenderer::new(two_category_site().build())
        .fail_expansion(0)
        .fail_expansion(1);
    let config = test_config();

    let run = crawl(&renderer, &config).await;

    assert!(run.results.is_empty());
    assert_eq!(run.report.stats.categories, 0);
    assert!(!run.report.interrupted);

    let error = run.report.error.expect("expansion failures should be reported");
    assert_eq!(error.len(), 2);
    assert!(error
        .iter()
        .all(|e| matches!(e, Error::Renderer(RendererError::Expansion { .. }))));
}

#[tokio::test]
async fn test_category_failure_keeps_identity() {
    let renderer = ScriptedRenderer::new(two_category_site().build())
        .fail_navigation_always(listing_url("/a"));
    let mut config = test_config();
    config.crawl.category_scope = CategoryScope::All;

    let run = crawl(&renderer, &config).await;

    assert_eq!(
        run.emitted,
        vec![ItemRecord::new(ItemIdentifier::new(900), "Vitamin D, 25-Hydroxy")]
    );
    let error = run.report.error.expect("category failure should be reported");
    let first = error.iter().next();
    match first {
        Some(Error::Category { url, .. }) => assert_eq!(url, &listing_url("/a")),
        other => panic!("Expected category error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_first_category_failure_ends_enumeration() {
    let renderer = ScriptedRenderer::new(two_category_site().build())
        .fail_navigation_always(listing_url("/a"));
    let config = test_config();

    let run = crawl(&renderer, &config).await;

    assert!(run.results.is_empty());
    assert_eq!(run.report.stats.categories_visited, 1);
    assert!(!renderer.inner().visits().await.contains(&listing_url("/b")));
}

#[tokio::test]
async fn test_root_failure_still_reaches_done() {
    let renderer =
        ScriptedRenderer::new(two_category_site().build()).fail_navigation_always(ROOT_URL);
    let config = test_config();

    let run = crawl(&renderer, &config).await;

    assert!(run.results.is_empty());
    assert!(!run.report.interrupted);
    assert_eq!(run.report.error.map(|e| e.len()), Some(1));
    assert!(renderer.inner().visits().await.is_empty());
}

// ============================================================================
// Interrupts
// ============================================================================

#[tokio::test]
async fn test_interrupt_keeps_completed_records() {
    let (tx, rx) = watch::channel(false);
    let renderer =
        ScriptedRenderer::new(three_item_site().build()).interrupt_on("/test-detail/", 3, tx);
    let config = test_config();

    let run = crawl_with_shutdown(&renderer, &config, rx).await;

    assert!(run.report.interrupted);
    assert!(run.report.error.is_none());
    assert_eq!(run.results.len(), 2);
    assert_eq!(
        run.emitted,
        vec![
            ItemRecord::new(ItemIdentifier::new(1), "Albumin"),
            ItemRecord::new(ItemIdentifier::new(2), "Bilirubin, Total"),
        ]
    );
}

#[tokio::test]
async fn test_interrupt_leaves_well_formed_output() {
    let (tx, rx) = watch::channel(false);
    let renderer =
        ScriptedRenderer::new(three_item_site().build()).interrupt_on("/test-detail/", 2, tx);
    let config = test_config();
    let session = RenderSession::new(&renderer, config.retry.clone(), config.settle.clone(), rx);

    let mut writer = JsonLinesWriter::new(Vec::new());
    let report = Pipeline::new(&session, &config).run(&mut writer).await;

    assert!(report.interrupted);
    let output = String::from_utf8(writer.into_inner()).unwrap();
    let records: Vec<ItemRecord> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records, vec![ItemRecord::new(ItemIdentifier::new(1), "Albumin")]);
    assert!(output.ends_with('\n'));
}

#[tokio::test]
async fn test_interrupt_before_start() {
    let renderer = two_category_site().build();
    let config = test_config();
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let run = crawl_with_shutdown(&renderer, &config, rx).await;

    assert!(run.report.interrupted);
    assert!(run.results.is_empty());
    assert!(renderer.visits().await.is_empty());
}
