/*!
 * Integration tests for project migration, from configuration to written files
 */

use anyhow::Result;
use std::fs;
use std::path::Path;
use std::process::Command;

use codeferry::app_config::{BackendConfig, Config, StrategyKind};
use codeferry::backends::mock::{MockBehavior, MockConfig};
use codeferry::Controller;
use crate::common;

fn project_with_fixtures(dir: &Path) -> Result<()> {
    common::create_unity_project(
        dir,
        &[
            ("Scripts/AdRevenue.cs", &common::load_resource("ShortClassWithNamespace.cs")),
            ("Scripts/Sdk/AdjustAdRevenue.cs", &common::load_resource("ShortClassNoNamespace.cs")),
            ("Scripts/AdRevenue.cs.meta", "guid: 0123"),
        ],
    )?;
    common::create_test_file(dir, "Library/Cache/Ignored.cs", "class Ignored {}")?;
    Ok(())
}

/// Test a full migration with the echoing backend
#[tokio::test]
async fn test_run_withTrivialBackend_shouldMirrorProjectLayout() -> Result<()> {
    common::init_logging();
    let source = common::create_temp_dir()?;
    let destination = common::create_temp_dir()?;
    project_with_fixtures(source.path())?;

    let mut config = Config::default();
    config.target.lower_folder_names = true;
    config.target.convert_filename_to_snake_case = true;

    let controller = Controller::with_config(config)?.without_progress();
    let report = controller.run(source.path(), destination.path()).await?;

    assert!(report.is_success(), "failures: {:?}", report.failed);
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(report.skipped, 1);

    // The echoed prompt holds the code in a fence, so extraction returns the source itself
    let migrated = fs::read_to_string(destination.path().join("assets/scripts/ad_revenue.gd"))?;
    assert_eq!(migrated, common::load_resource("ShortClassWithNamespace.cs").trim());
    assert!(destination.path().join("assets/scripts/sdk/adjust_ad_revenue.gd").exists());
    assert!(!destination.path().join("library").exists());
    Ok(())
}

/// Test the header/implementation strategy writes both streams
#[tokio::test]
async fn test_run_withHeaderStrategy_shouldWriteHeaderAndImplementation() -> Result<()> {
    let source = common::create_temp_dir()?;
    let destination = common::create_temp_dir()?;
    project_with_fixtures(source.path())?;

    let mut config = Config::default();
    config
        .source
        .strategies
        .insert(".cs".to_string(), StrategyKind::HeaderImplementation);

    let controller = Controller::with_config(config)?.without_progress();
    let report = controller.run(source.path(), destination.path()).await?;

    assert!(report.is_success(), "failures: {:?}", report.failed);
    assert_eq!(report.succeeded[0].1.len(), 2);
    assert!(destination.path().join("Assets/Scripts/AdRevenue.h").exists());
    assert!(destination.path().join("Assets/Scripts/AdRevenue.cpp").exists());
    assert!(!destination.path().join("Assets/Scripts/AdRevenue.gd").exists());
    Ok(())
}

/// Test that backend failures are reported per file without writing anything
#[tokio::test]
async fn test_run_withFailingBackend_shouldReportEveryFile() -> Result<()> {
    let source = common::create_temp_dir()?;
    let destination = common::create_temp_dir()?;
    project_with_fixtures(source.path())?;

    let config = Config {
        backend: BackendConfig::Mock(MockConfig {
            behavior: MockBehavior::Failing,
            capacity: None,
        }),
        ..Config::default()
    };

    let controller = Controller::with_config(config)?.without_progress();
    let report = controller.run(source.path(), destination.path()).await?;

    assert!(!report.is_success());
    assert!(report.succeeded.is_empty());
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed.iter().all(|(_, reason)| reason.contains("Simulated backend failure")));
    assert!(!destination.path().join("Assets").exists());
    Ok(())
}

/// Test a migration whose backend calls run in worker processes
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_withPooledBackend_shouldMigrateThroughWorkers() -> Result<()> {
    common::init_logging();
    let source = common::create_temp_dir()?;
    let destination = common::create_temp_dir()?;
    project_with_fixtures(source.path())?;

    let config = Config {
        backend: common::pooled(BackendConfig::Trivial, 2, 60),
        ..Config::default()
    };

    let controller = Controller::with_config(config)?.without_progress();
    let report = controller.run(source.path(), destination.path()).await?;

    assert!(report.is_success(), "failures: {:?}", report.failed);
    let migrated = fs::read_to_string(destination.path().join("Assets/Scripts/Sdk/AdjustAdRevenue.gd"))?;
    assert!(migrated.contains("public void setAdRevenueNetwork(string adRevenueNetwork)"));
    Ok(())
}

/// Test the command line exit codes
#[test]
fn test_cli_exitCodes_shouldFollowSysexits() -> Result<()> {
    let workspace = common::create_temp_dir()?;
    let config_path = workspace.path().join("codeferry.json");
    project_with_fixtures(&workspace.path().join("project"))?;
    common::create_test_file(workspace.path(), "blocker", "not a folder")?;

    let run = |source: &Path, destination: &Path| {
        Command::new(common::worker_program())
            .arg("-c")
            .arg(&config_path)
            .arg("-s")
            .arg(source)
            .arg("-d")
            .arg(destination)
            .output()
            .unwrap()
    };

    // Missing source folder, the default configuration gets written on the way
    let output = run(&workspace.path().join("missing"), &workspace.path().join("out"));
    assert_eq!(output.status.code(), Some(78));
    assert!(config_path.exists());

    // Destination below a regular file cannot be created
    let output = run(&workspace.path().join("project"), &workspace.path().join("blocker/out"));
    assert_eq!(output.status.code(), Some(74));

    let output = run(&workspace.path().join("project"), &workspace.path().join("out"));
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(workspace.path().join("out/Assets/Scripts/AdRevenue.gd").exists());
    Ok(())
}

/// Test that a broken configuration file is a configuration error
#[test]
fn test_cli_withBrokenConfig_shouldExitWithConfigError() -> Result<()> {
    let workspace = common::create_temp_dir()?;
    let config_path = common::create_test_file(workspace.path(), "broken.json", "{ not json")?;

    let output = Command::new(common::worker_program())
        .arg("migrate")
        .arg("--config")
        .arg(&config_path)
        .arg("--source")
        .arg(workspace.path())
        .arg("--destination")
        .arg(workspace.path().join("out"))
        .output()?;

    assert_eq!(output.status.code(), Some(78));
    Ok(())
}
