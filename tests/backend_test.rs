mod helpers;

use std::sync::Arc;

use helpers::{default_response, test_config, test_service, FakeLlm};
use memu_bridge::memory::types::{MemoryType, Modality};
use memu_bridge::memory::MemoryBackend;

#[tokio::test]
async fn create_then_list_oldest_first_with_categories() {
    let service = test_service(test_config(), Arc::new(FakeLlm::echo()));

    let first = service
        .create_memory_item(MemoryType::Profile, "User's dog is named Moka", &["User Profile".into()], None)
        .await
        .unwrap();
    let second = service
        .create_memory_item(MemoryType::Preference, "User prefers green tea", &[], Some("u1"))
        .await
        .unwrap();

    let items = service.list_memory_items().await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, first.id);
    assert_eq!(items[0].categories, vec!["User Profile".to_string()]);
    assert_eq!(items[1].id, second.id);
    assert_eq!(items[1].user_id.as_deref(), Some("u1"));
}

#[tokio::test]
async fn empty_content_is_rejected() {
    let service = test_service(test_config(), Arc::new(FakeLlm::echo()));
    assert!(service
        .create_memory_item(MemoryType::Fact, "   ", &[], None)
        .await
        .is_err());
}

#[tokio::test]
async fn retrieve_ranks_matching_item_first() {
    let service = test_service(test_config(), Arc::new(FakeLlm::echo()));
    let dog = service
        .create_memory_item(MemoryType::Profile, "User's dog Moka is a poodle", &[], None)
        .await
        .unwrap();
    service
        .create_memory_item(MemoryType::Preference, "User prefers green tea in the morning", &[], None)
        .await
        .unwrap();

    let result = service.retrieve("Moka poodle").await.unwrap();
    assert_eq!(result.items[0].id, dog.id);
    assert!(result.rewritten_query.is_none());
}

#[tokio::test]
async fn identical_summary_is_reinforced_not_duplicated() {
    let service = test_service(test_config(), Arc::new(FakeLlm::echo()));
    let a = service
        .create_memory_item(MemoryType::Fact, "User works at a bakery", &["Facts".into()], None)
        .await
        .unwrap();
    let b = service
        .create_memory_item(MemoryType::Fact, "user works at a  bakery", &["Events".into()], None)
        .await
        .unwrap();

    assert_eq!(a.id, b.id);
    assert_eq!(b.reinforcement_count(), 2);
    assert_eq!(b.categories, vec!["Facts".to_string(), "Events".to_string()]);
    assert_eq!(service.list_memory_items().await.unwrap().len(), 1);
}

#[tokio::test]
async fn reinforcement_can_be_disabled() {
    let mut config = test_config();
    config.memorize.enable_item_reinforcement = false;
    let service = test_service(config, Arc::new(FakeLlm::echo()));

    for _ in 0..2 {
        service
            .create_memory_item(MemoryType::Fact, "User works at a bakery", &[], None)
            .await
            .unwrap();
    }
    assert_eq!(service.list_memory_items().await.unwrap().len(), 2);
}

#[tokio::test]
async fn delete_removes_item_and_missing_id_errors() {
    let service = test_service(test_config(), Arc::new(FakeLlm::echo()));
    let item = service
        .create_memory_item(MemoryType::Event, "User moved to Busan in May", &[], None)
        .await
        .unwrap();

    service.delete_memory_item(&item.id).await.unwrap();
    assert!(service.list_memory_items().await.unwrap().is_empty());
    assert!(service.retrieve("Busan").await.unwrap().items.is_empty());

    let err = service.delete_memory_item(&item.id).await.unwrap_err();
    assert!(err.to_string().contains("memory item not found"));
}

#[tokio::test]
async fn configured_categories_are_seeded_in_order() {
    let service = test_service(test_config(), Arc::new(FakeLlm::echo()));
    let names: Vec<String> = service
        .list_memory_categories()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, ["User Profile", "Preferences", "Facts", "Events"]);
}

#[tokio::test]
async fn routing_can_skip_or_rewrite_retrieval() {
    let mut config = test_config();
    config.retrieve.route_intention = true;

    let llm = Arc::new(FakeLlm::new(|prompt| {
        if prompt.contains("Query: hello") {
            Ok("NO_RETRIEVE".into())
        } else if prompt.contains("You route queries") {
            Ok("RETRIEVE\nMoka poodle".into())
        } else {
            default_response(prompt)
        }
    }));
    let service = test_service(config, llm);
    service
        .create_memory_item(MemoryType::Profile, "User's dog Moka is a poodle", &[], None)
        .await
        .unwrap();

    let skipped = service.retrieve("hello").await.unwrap();
    assert!(skipped.items.is_empty());

    let rewritten = service.retrieve("what breed is my dog").await.unwrap();
    assert_eq!(rewritten.rewritten_query.as_deref(), Some("Moka poodle"));
    assert_eq!(rewritten.items.len(), 1);
}

#[tokio::test]
async fn insufficient_rewrite_widens_with_raw_query() {
    let mut config = test_config();
    config.retrieve.route_intention = true;
    config.retrieve.sufficiency_check = true;

    let llm = Arc::new(FakeLlm::new(|prompt| {
        if prompt.contains("You route queries") {
            Ok("RETRIEVE\nunrelated words".into())
        } else if prompt.contains("SUFFICIENT or INSUFFICIENT") {
            Ok("INSUFFICIENT".into())
        } else {
            default_response(prompt)
        }
    }));
    let service = test_service(config, Arc::clone(&llm));
    let tea = service
        .create_memory_item(MemoryType::Preference, "User drinks green tea", &[], None)
        .await
        .unwrap();

    let result = service.retrieve("green tea").await.unwrap();
    assert!(result.items.iter().any(|i| i.id == tea.id));
    assert!(llm
        .recorded()
        .iter()
        .any(|p| p.contains("SUFFICIENT or INSUFFICIENT")));
}

#[tokio::test]
async fn memorize_text_file_extracts_items() {
    let llm = Arc::new(FakeLlm::new(|prompt| {
        if prompt.starts_with("Extract the facts") {
            assert!(prompt.contains("I adopted a poodle named Moka"));
            Ok("```json\n[{\"type\": \"event\", \"summary\": \"User adopted a poodle named Moka\"},\
                {\"type\": \"preference\", \"summary\": \"User likes long walks\"}]\n```"
                .into())
        } else {
            default_response(prompt)
        }
    }));
    let service = test_service(test_config(), llm);

    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("journal.txt");
    std::fs::write(&path, "I adopted a poodle named Moka. I like long walks.").unwrap();

    let result = service
        .memorize(path.to_str().unwrap(), Modality::Text, Some("u1"))
        .await
        .unwrap();

    assert_eq!(result.resource.modality, Modality::Text);
    assert_eq!(result.items.len(), 2);
    assert_eq!(result.items[0].memory_type, MemoryType::Event);
    assert_eq!(result.items[1].memory_type, MemoryType::Preference);
    assert!(result
        .items
        .iter()
        .all(|i| i.resource_id.as_deref() == Some(result.resource.id.as_str())));
    assert_eq!(service.list_memory_items().await.unwrap().len(), 2);
}

#[tokio::test]
async fn memorize_image_extracts_from_caption() {
    let llm = FakeLlm::new(|prompt| {
        if prompt.starts_with("Extract the facts") {
            assert!(prompt.contains("A brown poodle"));
            Ok(r#"[{"type": "fact", "summary": "User owns a brown poodle"}]"#.into())
        } else {
            default_response(prompt)
        }
    })
    .with_vision("A brown poodle sitting on a red sofa");
    let service = test_service(test_config(), Arc::new(llm));

    let result = service
        .memorize("/photos/moka.jpg", Modality::Image, None)
        .await
        .unwrap();
    assert_eq!(
        result.resource.caption.as_deref(),
        Some("A brown poodle sitting on a red sofa")
    );
    assert_eq!(result.items.len(), 1);
}

#[tokio::test]
async fn memorize_missing_file_errors() {
    let service = test_service(test_config(), Arc::new(FakeLlm::echo()));
    assert!(service
        .memorize("/nonexistent/notes.txt", Modality::Document, None)
        .await
        .is_err());
}
