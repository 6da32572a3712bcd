/*!
 * Tests for application configuration functionality
 */

use anyhow::Result;
use codeferry::app_config::{BackendConfig, Config, LogLevel, StrategyKind};
use codeferry::backends::mock::MockBehavior;
use crate::common;

/// Test loading a configuration with every section set
#[test]
fn test_loadOrCreate_withFullConfig_shouldReadEverySection() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config_path = common::create_test_file(
        temp_dir.path(),
        "godot.json",
        r#"{
            "backend": {
                "class": "pooled",
                "inner": { "class": "ollama", "model": "codellama:13b", "max_tokens": 8000 },
                "pool": { "num_workers": 2, "query_timeout_secs": 30 }
            },
            "prompts": { "full": "Translate ${CODE}" },
            "source": {
                "ignore_locations": ["Library"],
                "strategies": { ".cs": "header_implementation" }
            },
            "target": { "header_extension": ".hpp", "convert_filename_to_snake_case": true },
            "known_translations": { "path": "known.yaml", "result_count": 1, "embedding_function": "sentence-transformers/all-MiniLM-L6-v2" },
            "concurrency": { "execute_strategy_workers": 8 },
            "log_level": "debug"
        }"#,
    )?;

    let config = Config::load_or_create(&config_path)?;
    config.validate()?;

    match &config.backend {
        BackendConfig::Pooled { inner, pool } => {
            assert_eq!(pool.num_workers, 2);
            assert_eq!(pool.query_timeout_secs, 30);
            assert!(pool.worker_program.is_none());
            match inner.as_ref() {
                BackendConfig::Ollama(ollama) => {
                    assert_eq!(ollama.model, "codellama:13b");
                    assert_eq!(ollama.max_tokens, 8000);
                    assert_eq!(ollama.endpoint, "http://localhost:11434");
                }
                other => panic!("unexpected inner backend {:?}", other),
            }
        }
        other => panic!("unexpected backend {:?}", other),
    }

    assert_eq!(config.prompts.len(), 1);
    assert_eq!(config.source.ignore_locations, vec!["Library".to_string()]);
    assert_eq!(config.source.required_entries, vec!["Assets".to_string(), "ProjectSettings".to_string()]);
    assert_eq!(config.source.strategies.get(".cs"), Some(&StrategyKind::HeaderImplementation));
    assert_eq!(config.target.header_extension, ".hpp");
    assert_eq!(config.target.implementation_extension, ".cpp");
    assert!(config.target.convert_filename_to_snake_case);

    let known = config.known_translations.as_ref().unwrap();
    assert_eq!(known.result_count, 1);
    assert_eq!(known.embedding_function, "sentence-transformers/all-MiniLM-L6-v2");
    assert!(known.cache_dir.is_none());
    assert!(known.user_request.contains("${SOURCE}"));

    assert_eq!(config.concurrency.execute_strategy_workers, 8);
    assert_eq!(config.log_level, LogLevel::Debug);
    Ok(())
}

/// Test the mock backend declaration used by the worker tests
#[test]
fn test_mockBackend_declaration_shouldDeserializeBehaviour() -> Result<()> {
    let backend: BackendConfig = serde_json::from_str(
        r#"{ "class": "mock", "behavior": { "mode": "slow", "delay_ms": 250 }, "capacity": 64 }"#,
    )?;

    match backend {
        BackendConfig::Mock(mock) => {
            assert_eq!(mock.behavior, MockBehavior::Slow { delay_ms: 250 });
            assert_eq!(mock.capacity, Some(64));
        }
        other => panic!("unexpected backend {:?}", other),
    }
    Ok(())
}

/// Test that unknown backend classes are rejected at load time
#[test]
fn test_loadOrCreate_withUnknownBackend_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config_path = common::create_test_file(
        temp_dir.path(),
        "broken.json",
        r#"{ "backend": { "class": "huggingface" } }"#,
    )?;

    let error = Config::load_or_create(&config_path).unwrap_err();
    assert!(format!("{:#}", error).contains("Failed to parse config file"));
    Ok(())
}

/// Test that a pooled backend cannot host another pooled backend
#[test]
fn test_validate_withPoolInsidePool_shouldNameTheBackend() {
    let config = Config {
        backend: common::pooled(common::pooled(BackendConfig::Trivial, 1, 1), 1, 1),
        ..Config::default()
    };

    let error = config.validate().unwrap_err();
    assert!(error.to_string().contains("'pooled'"));
}
