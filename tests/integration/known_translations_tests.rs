/*!
 * Integration tests for few-shot history built from a known translations corpus
 */

use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

use codeferry::app_config::{Config, KnownTranslationsConfig};
use codeferry::backends::Role;
use codeferry::backends::mock::MockBackend;
use codeferry::source::StructuralUnit;
use codeferry::translation::extract::{ExtractionMode, ResponseExtractor};
use codeferry::translation::memory::{HashingEmbedder, TranslationMemory};
use codeferry::translation::orchestrator::Orchestrator;
use codeferry::translation::prompts::PromptLibrary;
use codeferry::Controller;
use crate::common;

const CORPUS: &str = r#"
translations:
  - source: "Debug.Log(message);"
    target: "print(message)"
  - source: "transform.position = new Vector3(x, y, z);"
    target: "position = Vector3(x, y, z)"
  - source: "Destroy(gameObject);"
    target: "queue_free()"
"#;

fn memory_config(path: std::path::PathBuf) -> KnownTranslationsConfig {
    KnownTranslationsConfig {
        path,
        result_count: 1,
        user_request: "${SOURCE} => ${TARGET}".to_string(),
        assistant_response: "!OK!".to_string(),
        ..KnownTranslationsConfig::default()
    }
}

/// Test that every call carries the nearest known translation as history
#[tokio::test]
async fn test_translate_withMemory_shouldSendNearestPairAsHistory() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let corpus_path = common::create_test_file(temp_dir.path(), "known.yaml", CORPUS)?;

    let memory = TranslationMemory::with_embedder(memory_config(corpus_path), Arc::new(HashingEmbedder::default()));
    memory.initialize()?;
    assert_eq!(memory.len(), 3);

    let backend = Arc::new(MockBackend::echo());
    let prompts = PromptLibrary::new(BTreeMap::from([("full".to_string(), "${CODE}".to_string())]));
    let orchestrator = Orchestrator::new(backend.clone(), Arc::new(prompts), ResponseExtractor::default())
        .with_memory(Arc::new(memory));

    let unit = StructuralUnit::new("Destroy(gameObject);", "", Vec::new());
    orchestrator.translate(&unit, ExtractionMode::Single).await?;

    let history = &backend.requests()[0].history;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "Destroy(gameObject); => queue_free()");
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "!OK!");
    Ok(())
}

/// Test that a missing corpus does not prevent a migration
#[tokio::test]
async fn test_run_withMissingCorpus_shouldMigrateWithoutHistory() -> Result<()> {
    let workspace = common::create_temp_dir()?;
    common::create_unity_project(
        &workspace.path().join("project"),
        &[("Player.cs", "class Player { void Jump() { } }")],
    )?;

    let config = Config {
        known_translations: Some(memory_config(workspace.path().join("missing.yaml"))),
        ..Config::default()
    };

    let controller = Controller::with_config(config)?.without_progress();
    let report = controller
        .run(&workspace.path().join("project"), &workspace.path().join("out"))
        .await?;

    assert!(report.is_success());
    assert!(workspace.path().join("out/Assets/Player.gd").exists());
    Ok(())
}

/// Test that a malformed corpus stops the run before any file is migrated
#[tokio::test]
async fn test_run_withMalformedCorpus_shouldFailToStart() -> Result<()> {
    let workspace = common::create_temp_dir()?;
    common::create_unity_project(&workspace.path().join("project"), &[("Player.cs", "class Player { }")])?;
    let corpus_path = common::create_test_file(workspace.path(), "known.yaml", "translations: [ {")?;

    let config = Config {
        known_translations: Some(memory_config(corpus_path)),
        ..Config::default()
    };

    let controller = Controller::with_config(config)?.without_progress();
    let error = controller
        .run(&workspace.path().join("project"), &workspace.path().join("out"))
        .await
        .unwrap_err();

    assert_eq!(error.exit_code(), 70);
    assert!(!workspace.path().join("out/Assets").exists());
    Ok(())
}
