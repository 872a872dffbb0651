//! End-to-end runs of the sync engine against a scripted supplier site.

mod common;

use std::sync::{Arc, OnceLock};

use chrono::{Duration, Utc};

use common::{
    detail_page, in_stock_page, listing_page, orchestrator, out_of_stock_page, test_database,
    FakeSite, BASE_URL,
};
use wholesale_sync_lib::application::SyncOrchestrator;
use wholesale_sync_lib::domain::product::CatalogRecord;
use wholesale_sync_lib::domain::settings::SyncSettings;
use wholesale_sync_lib::domain::sync_log::{SyncStatus, SyncType};
use wholesale_sync_lib::infrastructure::catalog_repository::CatalogRepository;
use wholesale_sync_lib::infrastructure::settings_repository::SettingsRepository;

fn seed_record(sku: &str, hours_stale: i64) -> CatalogRecord {
    CatalogRecord {
        sku: sku.to_string(),
        name: format!("Product {sku}"),
        brand: String::new(),
        category: String::new(),
        wholesale_price: 10.0,
        retail_price: 14.0,
        margin_percent: 40.0,
        description: None,
        images: Vec::new(),
        in_stock: true,
        stock_quantity: None,
        flavours: None,
        strengths: None,
        ingredients: None,
        allergens: None,
        active: true,
        excluded: false,
        source_url: format!("{BASE_URL}/products/{sku}"),
        last_synced_at: Utc::now() - Duration::hours(hours_stale),
    }
}

#[tokio::test]
async fn full_sync_dedupes_across_collections_and_follows_pagination() {
    let mut site = FakeSite::new();
    site.page(
        "/collections/disposables",
        listing_page(
            &[
                ("Ghost Mango", "£10.00", "/products/ghost-mango"),
                ("Ghost Apple", "£9.00", "/products/ghost-apple"),
            ],
            Some("/collections/disposables?page=2"),
        ),
    );
    site.page(
        "/collections/disposables?page=2",
        listing_page(&[("Ghost Grape", "£11.00", "/products/ghost-grape")], None),
    );
    // The shared product appears again in a second collection.
    site.page(
        "/collections/nic-salts",
        listing_page(
            &[
                ("Ghost Mango", "£10.00", "/products/ghost-mango"),
                ("Salt Berry", "£7.50", "/products/salt-berry"),
            ],
            None,
        ),
    );

    let (_dir, pool) = test_database().await;
    let orch = orchestrator(
        &site,
        pool.clone(),
        &["/collections/disposables", "/collections/nic-salts"],
    );

    let entry = orch.run(SyncType::Full).await.unwrap();
    assert_eq!(entry.status, SyncStatus::Completed);
    assert_eq!(entry.products_processed, 4);
    assert_eq!(entry.products_created, 4);
    assert!(entry.errors.is_empty());

    let catalog = CatalogRepository::new(pool);
    assert_eq!(catalog.count().await.unwrap(), 4);

    // Category comes from the collection the product was first seen in.
    let mango = catalog.find_by_sku("ghost-mango").await.unwrap().unwrap();
    assert_eq!(mango.category, "Disposables");
    let berry = catalog.find_by_sku("salt-berry").await.unwrap().unwrap();
    assert_eq!(berry.category, "Nic Salts");

    // Both pages of the first collection were walked.
    let visited = site.visited_urls();
    assert!(visited.contains(&format!("{BASE_URL}/collections/disposables?page=2")));
}

#[tokio::test]
async fn full_sync_stops_at_the_product_cap() {
    let mut site = FakeSite::new();
    site.page(
        "/collections/all",
        listing_page(
            &[
                ("One", "£1.00", "/products/one"),
                ("Two", "£2.00", "/products/two"),
                ("Three", "£3.00", "/products/three"),
                ("Four", "£4.00", "/products/four"),
            ],
            None,
        ),
    );

    let (_dir, pool) = test_database().await;
    let settings_repo = SettingsRepository::new(pool.clone());
    let mut settings = SyncSettings::default();
    settings.max_products = 2;
    settings_repo.save(&settings).await.unwrap();

    let orch = orchestrator(&site, pool.clone(), &["/collections/all"]);
    let entry = orch.run(SyncType::Full).await.unwrap();

    assert_eq!(entry.status, SyncStatus::Completed);
    assert_eq!(entry.products_processed, 2);
    assert_eq!(CatalogRepository::new(pool).count().await.unwrap(), 2);
}

#[tokio::test]
async fn full_sync_with_zero_cap_collects_nothing() {
    let mut site = FakeSite::new();
    site.page(
        "/collections/all",
        listing_page(
            &[
                ("One", "£1.00", "/products/one"),
                ("Two", "£2.00", "/products/two"),
            ],
            None,
        ),
    );

    let (_dir, pool) = test_database().await;
    let settings_repo = SettingsRepository::new(pool.clone());
    let mut settings = SyncSettings::default();
    settings.max_products = 0;
    settings_repo.save(&settings).await.unwrap();

    let orch = orchestrator(&site, pool.clone(), &["/collections/all"]);
    let entry = orch.run(SyncType::Full).await.unwrap();

    assert_eq!(entry.status, SyncStatus::Completed);
    assert_eq!(entry.products_processed, 0);
    assert_eq!(entry.products_created, 0);
    assert_eq!(CatalogRepository::new(pool).count().await.unwrap(), 0);

    // No listing page is even fetched with a zero cap.
    let visited = site.visited_urls();
    assert!(!visited.iter().any(|url| url.contains("/collections/")));
}

#[tokio::test]
async fn cancelled_run_finalizes_as_failed_and_closes_the_session() {
    let mut site = FakeSite::new();
    site.page(
        "/collections/all",
        listing_page(
            &[("One", "£1.00", "/products/one")],
            Some("/collections/all?page=2"),
        ),
    );
    site.page(
        "/collections/all?page=2",
        listing_page(&[("Two", "£2.00", "/products/two")], None),
    );

    // The orchestrator exists only after the site is wired up, so the hook
    // reaches it through a slot filled in just before the run.
    let slot: Arc<OnceLock<Arc<SyncOrchestrator>>> = Arc::new(OnceLock::new());
    let hook_slot = slot.clone();
    site.on_goto(Arc::new(move |url: &str| {
        if url.ends_with("page=2") {
            if let Some(orch) = hook_slot.get() {
                orch.cancel();
            }
        }
    }));

    let (_dir, pool) = test_database().await;
    let orch = Arc::new(orchestrator(&site, pool.clone(), &["/collections/all"]));
    assert!(slot.set(orch.clone()).is_ok());

    let entry = orch.run(SyncType::Full).await.unwrap();
    assert_eq!(entry.status, SyncStatus::Failed);
    assert!(entry.completed_at.is_some());
    assert_eq!(entry.errors.len(), 1);
    assert!(entry.errors[0].message.contains("cancelled"));

    // The session is still torn down and nothing reached the catalog.
    assert!(site.close_count() >= 1);
    assert_eq!(CatalogRepository::new(pool).count().await.unwrap(), 0);
}

#[tokio::test]
async fn excluded_record_survives_a_resync() {
    let mut site = FakeSite::new();
    site.page(
        "/collections/all",
        listing_page(
            &[
                ("Ghost Mango", "£10.00", "/products/ghost-mango"),
                ("Salt Berry", "£7.50", "/products/salt-berry"),
            ],
            None,
        ),
    );

    let (_dir, pool) = test_database().await;
    let orch = orchestrator(&site, pool.clone(), &["/collections/all"]);
    let first = orch.run(SyncType::Full).await.unwrap();
    assert_eq!(first.products_created, 2);

    let catalog = CatalogRepository::new(pool.clone());
    catalog.set_excluded("ghost-mango", true).await.unwrap();
    let before = catalog.find_by_sku("ghost-mango").await.unwrap().unwrap();

    let second = orch.run(SyncType::Full).await.unwrap();
    assert_eq!(second.status, SyncStatus::Completed);
    assert_eq!(second.products_created, 0);
    assert_eq!(second.products_updated, 1);
    assert_eq!(second.products_skipped, 1);

    let after = catalog.find_by_sku("ghost-mango").await.unwrap().unwrap();
    assert!(after.excluded);
    assert_eq!(after.last_synced_at, before.last_synced_at);
}

#[tokio::test]
async fn incremental_sync_contains_per_item_failures() {
    let mut site = FakeSite::new();
    for sku in ["p1", "p2", "p3", "p4"] {
        site.page(
            &format!("/products/{sku}"),
            detail_page(&format!("Product {sku}"), "£12.00", "refreshed"),
        );
    }
    // The fifth record's page is unreachable.
    site.fail("/products/p5");

    let (_dir, pool) = test_database().await;
    let catalog = CatalogRepository::new(pool.clone());
    for sku in ["p1", "p2", "p3", "p4", "p5"] {
        catalog.insert(&seed_record(sku, 48)).await.unwrap();
    }

    let orch = orchestrator(&site, pool.clone(), &["/collections/all"]);
    let entry = orch.run(SyncType::Incremental).await.unwrap();

    assert_eq!(entry.status, SyncStatus::Completed);
    assert_eq!(entry.products_processed, 5);
    assert_eq!(entry.products_updated, 4);
    assert_eq!(entry.errors.len(), 1);
    assert_eq!(entry.errors[0].sku, "p5");

    // The reachable records picked up the new wholesale price.
    let p1 = catalog.find_by_sku("p1").await.unwrap().unwrap();
    assert!((p1.wholesale_price - 12.0).abs() < 1e-9);
    // The unreachable one kept its old state.
    let p5 = catalog.find_by_sku("p5").await.unwrap().unwrap();
    assert!((p5.wholesale_price - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn incremental_sync_ignores_fresh_records() {
    let site = FakeSite::new();
    let (_dir, pool) = test_database().await;
    let catalog = CatalogRepository::new(pool.clone());
    catalog.insert(&seed_record("fresh", 1)).await.unwrap();

    let orch = orchestrator(&site, pool, &["/collections/all"]);
    let entry = orch.run(SyncType::Incremental).await.unwrap();

    assert_eq!(entry.status, SyncStatus::Completed);
    assert_eq!(entry.products_processed, 0);
}

#[tokio::test]
async fn stock_check_is_gated_by_the_update_stock_toggle() {
    let mut site = FakeSite::new();
    site.page("/products/p1", out_of_stock_page("Product p1", "£12.00"));
    site.page("/products/p2", in_stock_page("Product p2", "£12.00", 7));

    let (_dir, pool) = test_database().await;
    let catalog = CatalogRepository::new(pool.clone());
    catalog.insert(&seed_record("p1", 1)).await.unwrap();
    catalog.insert(&seed_record("p2", 1)).await.unwrap();

    let settings_repo = SettingsRepository::new(pool.clone());
    let mut settings = SyncSettings::default();
    settings.update_stock = false;
    settings_repo.save(&settings).await.unwrap();

    let orch = orchestrator(&site, pool.clone(), &["/collections/all"]);
    let entry = orch.run(SyncType::StockCheck).await.unwrap();
    assert_eq!(entry.status, SyncStatus::Completed);
    assert_eq!(entry.products_skipped, 2);
    assert!(catalog.find_by_sku("p1").await.unwrap().unwrap().in_stock);

    settings.update_stock = true;
    settings_repo.save(&settings).await.unwrap();

    let entry = orch.run(SyncType::StockCheck).await.unwrap();
    assert_eq!(entry.status, SyncStatus::Completed);

    let p1 = catalog.find_by_sku("p1").await.unwrap().unwrap();
    assert!(!p1.in_stock);
    assert_eq!(p1.stock_quantity, Some(0));
    let p2 = catalog.find_by_sku("p2").await.unwrap().unwrap();
    assert!(p2.in_stock);
    assert_eq!(p2.stock_quantity, Some(7));
}

#[tokio::test]
async fn stock_check_never_fetches_excluded_records() {
    let mut site = FakeSite::new();
    site.page("/products/kept", in_stock_page("Kept", "£12.00", 3));

    let (_dir, pool) = test_database().await;
    let catalog = CatalogRepository::new(pool.clone());
    catalog.insert(&seed_record("kept", 1)).await.unwrap();
    catalog.insert(&seed_record("shunned", 1)).await.unwrap();
    catalog.set_excluded("shunned", true).await.unwrap();

    let orch = orchestrator(&site, pool, &["/collections/all"]);
    let entry = orch.run(SyncType::StockCheck).await.unwrap();

    assert_eq!(entry.status, SyncStatus::Completed);
    assert_eq!(entry.products_processed, 2);
    assert_eq!(entry.products_skipped, 1);

    let visited = site.visited_urls();
    assert!(!visited.iter().any(|url| url.contains("shunned")));
}

#[tokio::test]
async fn session_is_closed_even_when_authentication_fails() {
    let mut site = FakeSite::new();
    // Replace the login page with one carrying no form at all.
    site.page(
        "/account/login",
        "<html><body><p>Down for maintenance</p></body></html>".to_string(),
    );

    let (_dir, pool) = test_database().await;
    let orch = orchestrator(&site, pool, &["/collections/all"]);

    let entry = orch.run(SyncType::Full).await.unwrap();
    assert_eq!(entry.status, SyncStatus::Failed);
    assert_eq!(entry.errors.len(), 1);
    assert!(entry.completed_at.is_some());
    assert!(site.close_count() >= 1);
}

#[tokio::test]
async fn runs_are_audited_newest_first() {
    let mut site = FakeSite::new();
    site.page("/collections/all", listing_page(&[], None));

    let (_dir, pool) = test_database().await;
    let orch = orchestrator(&site, pool.clone(), &["/collections/all"]);

    orch.run(SyncType::Full).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    orch.run(SyncType::StockCheck).await.unwrap();

    let logs =
        wholesale_sync_lib::infrastructure::sync_log_repository::SyncLogRepository::new(pool);
    let recent = logs.recent(10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].sync_type, SyncType::StockCheck);
    assert_eq!(recent[1].sync_type, SyncType::Full);
}
