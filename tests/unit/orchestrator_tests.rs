/*!
 * Tests for chunked translation of real source files
 */

use std::collections::BTreeMap;
use std::sync::Arc;

use codeferry::backends::mock::MockBackend;
use codeferry::source::csharp::CSharpParser;
use codeferry::translation::extract::{ExtractionMode, ResponseExtractor};
use codeferry::translation::orchestrator::{Orchestrator, TranslatedOutput};
use codeferry::translation::prompts::PromptLibrary;
use crate::common;

fn prompts() -> Arc<PromptLibrary> {
    Arc::new(PromptLibrary::new(BTreeMap::from([
        ("full".to_string(), "FULL\n${CODE}".to_string()),
        ("class_only".to_string(), "CLASS\n${CODE}".to_string()),
        ("methods_only".to_string(), "METHODS\n${CODE}".to_string()),
    ])))
}

/// Answers like a model would: skeleton with a placeholder, one `func` line per method
fn responder(prompt: &str) -> String {
    if prompt.starts_with("CLASS") {
        return "Here you go:\n```gdscript\nclass_name AdjustAdRevenue\n${METHODS}\n```\nEnjoy".to_string();
    }

    let functions: Vec<String> = prompt
        .lines()
        .filter_map(|line| line.trim().strip_prefix("public void "))
        .filter_map(|signature| signature.split('(').next())
        .map(|name| format!("func {}():", name))
        .collect();
    format!("```\n{}\n```", functions.join("\n"))
}

#[tokio::test]
async fn test_translate_withSmallCapacity_shouldReassembleEveryMethodInOrder() {
    let unit = CSharpParser::new(true)
        .parse_file(&common::test_resource_path("ShortClassWithNamespace.cs"))
        .unwrap();

    let backend = Arc::new(MockBackend::echo().with_capacity(400).with_responder(responder));
    let orchestrator = Orchestrator::new(backend.clone(), prompts(), ResponseExtractor::default());

    let output = orchestrator.translate(&unit, ExtractionMode::Single).await.unwrap();
    let TranslatedOutput::Single(code) = output else {
        panic!("expected a single output");
    };

    assert!(code.starts_with("class_name AdjustAdRevenue\n"));
    let functions: Vec<&str> = code.lines().filter(|line| line.starts_with("func ")).collect();
    assert_eq!(
        functions,
        vec![
            "func setRevenue():",
            "func setAdImpressionsCount():",
            "func setAdRevenueNetwork():",
            "func setAdRevenueUnit():",
            "func setAdRevenuePlacement():",
            "func addCallbackParameter():",
            "func addPartnerParameter():",
        ]
    );
    assert!(!code.contains("${METHODS}"));

    // One skeleton call plus several member chunks, sent strictly in order
    let requests = backend.requests();
    assert!(requests.len() > 2);
    assert!(requests[0].prompt.starts_with("CLASS"));
    assert!(requests[1..].iter().all(|r| r.prompt.starts_with("METHODS")));
}

#[tokio::test]
async fn test_translate_withLargeCapacity_shouldTranslateWholeFile() {
    let unit = CSharpParser::new(true)
        .parse_file(&common::test_resource_path("ShortClassNoNamespace.cs"))
        .unwrap();

    let backend = Arc::new(MockBackend::echo().with_capacity(100_000));
    let orchestrator = Orchestrator::new(backend.clone(), prompts(), ResponseExtractor::default());

    let output = orchestrator.translate(&unit, ExtractionMode::Single).await.unwrap();
    assert_eq!(backend.request_count(), 1);
    assert!(backend.requests()[0].prompt.starts_with("FULL\n"));
    assert_eq!(
        output,
        TranslatedOutput::Single(format!("FULL\n{}", unit.source_text()).trim().to_string())
    );
}
