mod common;

use common::{config, manager, twenty_paragraphs};
use longctx_retrieval::{
    AugmentOptions, BackendKind, ContextOptions, ManagerConfig, Metadata, RetrievalStrategy,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let original = manager(config(dir.path()), None);
    let mut metadata = Metadata::new();
    metadata.insert("title".to_string(), "Archive".to_string());
    original
        .add_document("archive", &twenty_paragraphs(), metadata, true)
        .await
        .unwrap();
    original
        .retrieve_context("paragraph 5", &ContextOptions::new(2))
        .await
        .unwrap();
    original.save().await.unwrap();

    assert!(dir.path().join("documents.json").exists());
    assert!(dir.path().join("test.meta").exists());
    assert!(dir.path().join("test.chunks").exists());
    assert!(dir.path().join("test.docids").exists());
    assert!(dir.path().join("test.flat").exists());

    let restored = manager(config(dir.path()), None);
    restored.load().await.unwrap();

    assert_eq!(restored.documents().await, original.documents().await);
    let stats = restored.stats().await;
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.chunks, 10);
    assert_eq!(stats.backend, BackendKind::Flat);
    assert_eq!(stats.history_depth, 0);
    assert!(!stats.has_active_context);

    let result = restored
        .retrieve_context("paragraph 5", &ContextOptions::new(3))
        .await
        .unwrap();
    assert!(result.texts().iter().any(|text| text.contains("Paragraph 5")));
}

#[tokio::test]
async fn test_ids_continue_after_load() {
    let dir = TempDir::new().unwrap();
    let first = manager(config(dir.path()), None);
    let ids = first
        .add_document("one", "Paragraph 1 alone.", Metadata::new(), true)
        .await
        .unwrap();
    first.save().await.unwrap();

    let second = manager(config(dir.path()), None);
    second.load().await.unwrap();
    let more = second
        .add_document("two", "Paragraph 2 alone.", Metadata::new(), true)
        .await
        .unwrap();

    assert_eq!(ids, vec![0]);
    assert_eq!(more, vec![1]);
    assert_eq!(second.documents().await.len(), 2);
}

#[tokio::test]
async fn test_load_from_unsaved_directory_starts_empty() {
    let dir = TempDir::new().unwrap();
    let manager = manager(config(&dir.path().join("never-saved")), None);

    manager.load().await.unwrap();

    let stats = manager.stats().await;
    assert_eq!(stats.documents, 0);
    assert_eq!(stats.chunks, 0);
    let result = manager
        .retrieve_context(
            "paragraph 5",
            &ContextOptions::new(3).with_strategy(RetrievalStrategy::Keyword),
        )
        .await
        .unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_memory_backend_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut config = config(dir.path());
    config.index.backend = BackendKind::Memory;

    let original = manager(config.clone(), None);
    original
        .add_document("archive", &twenty_paragraphs(), Metadata::new(), true)
        .await
        .unwrap();
    original.save().await.unwrap();
    assert!(dir.path().join("test.mem").exists());

    let restored = manager(config, None);
    restored.load().await.unwrap();
    assert_eq!(restored.stats().await.backend, BackendKind::Memory);
    assert_eq!(restored.stats().await.chunks, 10);
}

#[tokio::test]
async fn test_manager_from_toml_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("longctx.toml");
    std::fs::write(
        &path,
        format!(
            r#"
            storage_dir = "{}"
            max_context_tokens = 1000
            history_size = 1

            [index]
            name = "test"
            dimension = 22
            backend = "tree"

            [chunker]
            strategy = "paragraph"
            chunk_size = 1000
            chunk_overlap = 200
            "#,
            dir.path().display()
        ),
    )
    .unwrap();

    let config = ManagerConfig::from_toml_file(&path).unwrap();
    let manager = manager(config, None);
    manager
        .add_document("archive", &twenty_paragraphs(), Metadata::new(), true)
        .await
        .unwrap();
    for query in ["paragraph 1", "paragraph 2", "paragraph 3"] {
        manager
            .retrieve_context(query, &ContextOptions::new(2))
            .await
            .unwrap();
    }

    let stats = manager.stats().await;
    assert_eq!(stats.backend, BackendKind::Tree);
    assert_eq!(stats.history_depth, 1);

    manager.save().await.unwrap();
    assert!(dir.path().join("test.tree").exists());
}

#[tokio::test]
async fn test_toml_default_k_sizes_unspecified_retrievals() {
    let dir = TempDir::new().unwrap();
    let config = ManagerConfig::from_toml_str(&format!(
        r#"
        storage_dir = "{}"

        [index]
        name = "test"
        dimension = 22

        [chunker]
        strategy = "paragraph"
        chunk_size = 1000
        chunk_overlap = 200

        [retriever]
        default_k = 2
        "#,
        dir.path().display()
    ))
    .unwrap();
    assert_eq!(config.retriever.default_k, 2);

    let manager = manager(config, None);
    manager
        .add_document("archive", &twenty_paragraphs(), Metadata::new(), true)
        .await
        .unwrap();

    let result = manager
        .retrieve_context("paragraph 5", &ContextOptions::default())
        .await
        .unwrap();
    assert_eq!(result.len(), 2);

    let result = manager
        .retrieve_context("paragraph 5", &ContextOptions::new(4))
        .await
        .unwrap();
    assert_eq!(result.len(), 4);

    manager
        .augment_prompt("paragraph 9", &AugmentOptions::default())
        .await
        .unwrap();
    assert_eq!(manager.active_context().await.unwrap().result.len(), 2);
}
