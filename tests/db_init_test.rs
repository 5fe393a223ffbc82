mod helpers;

use std::sync::Arc;

use helpers::{test_config, FakeEmbedder, FakeLlm, TEST_DIMS};
use memu_bridge::db;
use memu_bridge::memory::types::MemoryType;
use memu_bridge::memory::{LocalMemoryService, MemoryBackend};

fn open_service(path: &std::path::Path) -> LocalMemoryService {
    let mut config = test_config();
    config.storage.db_path = path.to_string_lossy().into_owned();
    LocalMemoryService::open(
        Arc::new(config),
        Arc::new(FakeLlm::echo()),
        Arc::new(FakeEmbedder),
    )
    .unwrap()
}

#[tokio::test]
async fn items_persist_across_reopen() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("nested").join("memu.sqlite");

    let id = {
        let service = open_service(&path);
        service
            .create_memory_item(MemoryType::Profile, "User's name is Elrien", &["User Profile".into()], None)
            .await
            .unwrap()
            .id
    };

    let service = open_service(&path);
    let items = service.list_memory_items().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, id);
    assert_eq!(items[0].categories, vec!["User Profile".to_string()]);

    // Seeding is idempotent.
    assert_eq!(service.list_memory_categories().await.unwrap().len(), 4);
}

#[test]
fn fresh_database_is_at_current_version_with_model_recorded() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("memu.sqlite");
    drop(open_service(&path));

    let conn = db::open_database(&path, TEST_DIMS).unwrap();
    assert_eq!(
        db::migrations::get_schema_version(&conn).unwrap(),
        db::migrations::CURRENT_SCHEMA_VERSION
    );
    assert_eq!(
        db::migrations::get_embedding_model(&conn).unwrap().as_deref(),
        Some("fake-bag-of-words")
    );
    assert_eq!(
        db::migrations::get_embedding_dimensions(&conn).unwrap(),
        Some(TEST_DIMS)
    );
}

#[test]
fn changed_dimensions_are_rejected() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("memu.sqlite");
    drop(db::open_database(&path, TEST_DIMS).unwrap());

    let err = db::open_database(&path, 768).unwrap_err();
    assert!(err.to_string().contains("embedding dimensions changed"));
}
