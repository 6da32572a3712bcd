/*!
 * Tests for the C# structural parser on real Unity scripts
 */

use codeferry::backends::mock::MockBackend;
use codeferry::source::csharp::CSharpParser;
use codeferry::translation::chunker::Chunker;
use crate::common;

/// Normalizes whitespace so layout differences do not matter
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[test]
fn test_parseFile_withShortClassNoNamespace_shouldExtractMethods() {
    let parser = CSharpParser::new(true);
    let unit = parser
        .parse_file(&common::test_resource_path("ShortClassNoNamespace.cs"))
        .unwrap();

    let members: Vec<String> = unit.members().iter().map(|m| normalize(m)).collect();
    assert_eq!(
        members,
        vec![
            "public void setRevenue(double amount, string currency) { this.revenue = amount; this.currency = currency; }",
            "public void setAdImpressionsCount(int adImpressionsCount) { this.adImpressionsCount = adImpressionsCount; }",
            "public void setAdRevenueNetwork(string adRevenueNetwork) { this.adRevenueNetwork = adRevenueNetwork; }",
        ]
    );
}

#[test]
fn test_parseFile_withShortClassNoNamespace_shouldKeepSkeleton() {
    let parser = CSharpParser::new(true);
    let unit = parser
        .parse_file(&common::test_resource_path("ShortClassNoNamespace.cs"))
        .unwrap();

    let skeleton = unit.skeleton();
    assert!(skeleton.contains("using System.Collections.Generic;\n"));
    assert!(skeleton.contains("internal string source;\n"));
    assert!(skeleton.contains("internal List<string> callbackList;\n"));
    assert!(skeleton.contains("public AdjustAdRevenue(string source)"));
    assert!(skeleton.contains("// #if UNITY_EDITOR"));
    assert!(skeleton.contains("// #region Revenue"));
    assert!(!skeleton.contains("setRevenue"));
    assert!(!skeleton.contains("setAdRevenueNetwork"));
}

#[test]
fn test_parseFile_withNamespace_shouldRecurseIntoIt() {
    let parser = CSharpParser::new(true);
    let unit = parser
        .parse_file(&common::test_resource_path("ShortClassWithNamespace.cs"))
        .unwrap();

    assert_eq!(unit.members().len(), 7);
    assert!(unit.members()[0].starts_with("public void setRevenue"));
    assert!(unit.members()[6].starts_with("public void addPartnerParameter"));

    let skeleton = normalize(unit.skeleton());
    assert!(skeleton.contains("namespace com.adjust.sdk { public class AdjustAdRevenue {"));
    assert!(skeleton.contains("internal string adRevenuePlacement;"));
    assert!(!skeleton.contains("addCallbackParameter"));
    assert!(skeleton.ends_with("} }"));
}

#[test]
fn test_parseFile_withoutMacroConversion_shouldKeepSourceText() {
    let source = common::load_resource("ShortClassWithNamespace.cs");
    let unit = CSharpParser::new(false)
        .parse_file(&common::test_resource_path("ShortClassWithNamespace.cs"))
        .unwrap();

    assert_eq!(unit.source_text(), source);
}

#[test]
fn test_parseFile_withLongClass_shouldSplitIntoManyChunks() {
    let parser = CSharpParser::new(true);
    let unit = parser
        .parse_file(&common::test_resource_path("LongClassWithNamespace.cs"))
        .unwrap();

    assert!(unit.members().len() >= 40, "only {} members", unit.members().len());
    assert!(unit
        .members()
        .iter()
        .any(|m| m.starts_with("public static void trackEvent(AdjustEvent adjustEvent)")));
    assert!(unit.skeleton().contains("public class Adjust : MonoBehaviour"));
    assert!(unit.skeleton().contains("private const string errorMsgEditor"));
    assert!(!unit.skeleton().contains("public static void trackEvent"));
    assert!(unit.skeleton().len() < unit.source_text().len());

    let backend = MockBackend::echo().with_capacity(2000);
    let chunks = Chunker::new(&backend).chunk_members(unit.members());
    assert!(chunks.len() > 1);
    assert_eq!(
        chunks.iter().map(|c| c.member_count).sum::<usize>(),
        unit.members().len()
    );
    for chunk in chunks.iter().filter(|c| c.member_count >= 2) {
        assert!(chunk.size < 2000);
    }
}
