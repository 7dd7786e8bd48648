//! Scenario file tests: loading by extension, plans and assembled rows.

use std::io::Write;

use strata_cli::*;
use tempfile::NamedTempFile;

const OUTER_YAML: &str = r#"
streams:
  - name: R
  - name: A
    parent: R
  - name: B
    parent: A
    optional: true

passes:
  - root: [R]
    matches:
      - stream: A
        parent: R
        events: [a1, a2]
"#;

const PRODUCT_TOML: &str = r#"
[[streams]]
name = "Order"

[[streams]]
name = "Payment"
parent = "Order"

[[streams]]
name = "Shipment"
parent = "Order"
optional = true

[logging]
level = "warn"

[[passes]]
root = ["o1"]

[[passes.matches]]
stream = "Payment"
parent = "o1"
events = ["p1", "p2"]

[[passes.matches]]
stream = "Shipment"
parent = "o1"
events = ["s1"]

[[passes]]
root = ["o2"]

[[passes.matches]]
stream = "Payment"
parent = "o2"
events = ["p3"]
"#;

fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create temp file");
    file.write_all(content.as_bytes()).expect("write temp file");
    file
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn load_yaml_by_extension() {
    let file = write_temp(".yaml", OUTER_YAML);
    let scenario = Scenario::load(file.path()).unwrap();
    assert_eq!(scenario.streams.len(), 3);
    assert_eq!(scenario.passes.len(), 1);
}

#[test]
fn load_toml_by_extension() {
    let file = write_temp(".toml", PRODUCT_TOML);
    let scenario = Scenario::load(file.path()).unwrap();
    assert_eq!(scenario.streams.len(), 3);
    assert_eq!(scenario.logging.level, "warn");
    assert_eq!(scenario.passes.len(), 2);
}

#[test]
fn load_unknown_extension_falls_back_to_toml() {
    let file = write_temp(".scenario", PRODUCT_TOML);
    let scenario = Scenario::load(file.path()).unwrap();
    assert_eq!(scenario.passes[1].root, ["o2"]);
}

#[test]
fn load_unknown_extension_reports_both_parse_errors() {
    let file = write_temp(".scenario", "streams: {not: [a list");
    let err = Scenario::load(file.path()).unwrap_err();
    match &err {
        ScenarioError::UnknownFormat { yaml, toml } => {
            assert!(!yaml.is_empty());
            assert!(!toml.is_empty());
        }
        other => panic!("expected UnknownFormat, got {:?}", other),
    }
    let message = err.to_string();
    assert!(message.contains("YAML"));
    assert!(message.contains("TOML"));
}

#[test]
fn load_missing_file() {
    let err = Scenario::load("/nonexistent/scenario.yaml").unwrap_err();
    assert!(matches!(err, ScenarioError::Io(..)));
    assert!(err.to_string().contains("/nonexistent/scenario.yaml"));
}

#[test]
fn load_malformed_yaml() {
    let file = write_temp(".yml", "streams: {not: [a list");
    assert!(matches!(
        Scenario::load(file.path()),
        Err(ScenarioError::Parse(_))
    ));
}

// =============================================================================
// Plans
// =============================================================================

#[test]
fn plan_of_outer_chain() {
    let file = write_temp(".yaml", OUTER_YAML);
    assert_eq!(
        plan_file(file.path()).unwrap(),
        "required-branch stream=0 (R)\n  optional-branch stream=1 (A)\n    leaf stream=2 (B) optional\n"
    );
}

#[test]
fn plan_of_product() {
    let file = write_temp(".toml", PRODUCT_TOML);
    assert_eq!(
        plan_file(file.path()).unwrap(),
        "product stream=0 (Order)\n  leaf stream=1 (Payment)\n  leaf stream=2 (Shipment) optional\n"
    );
}

#[test]
fn plan_rejects_invalid_join() {
    let file = write_temp(
        ".yaml",
        "streams:\n  - name: R\n  - name: A\n    parent: R\n  - name: R\n",
    );
    let err = plan_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("more than once"));
}

// =============================================================================
// Runs
// =============================================================================

#[test]
fn run_outer_chain() {
    let scenario = Scenario::from_yaml(OUTER_YAML).unwrap();
    assert_eq!(
        run_scenario(&scenario).unwrap(),
        ["[R, a1, null]", "[R, a2, null]"]
    );
}

#[test]
fn run_product_passes() {
    let scenario = Scenario::from_toml(PRODUCT_TOML).unwrap();
    assert_eq!(
        run_scenario(&scenario).unwrap(),
        ["[o1, p1, s1]", "[o1, p2, s1]", "[o2, p3, null]"]
    );
}

#[test]
fn run_with_fast_path_disabled() {
    let mut scenario = Scenario::from_yaml(OUTER_YAML).unwrap();
    scenario.assembly.single_result_fast_path = false;
    assert_eq!(
        run_scenario(&scenario).unwrap(),
        ["[R, a1, null]", "[R, a2, null]"]
    );
}

#[test]
fn run_partitions_keep_their_own_passes() {
    let yaml = r#"
streams:
  - name: Tick
  - name: Quote
    parent: Tick
    optional: true
passes:
  - partition: BTC
    root: [t1]
    matches:
      - stream: Quote
        parent: t1
        events: [q1]
  - partition: ETH
    root: [t2]
  - partition: BTC
    root: [t3]
"#;
    let scenario = Scenario::from_yaml(yaml).unwrap();
    let mut runner = ScenarioRunner::new(&scenario).unwrap();
    let results = runner.run_all(&scenario).unwrap();

    let rendered: Vec<Vec<String>> = results
        .iter()
        .map(|rows| rows.iter().map(|row| row.to_string()).collect())
        .collect();
    assert_eq!(
        rendered,
        [
            vec!["[t1, q1]".to_string()],
            vec!["[t2, null]".to_string()],
            vec!["[t3, null]".to_string()],
        ]
    );
    assert_eq!(runner.partitions(), 2);
}

#[test]
fn run_reports_failing_pass() {
    let yaml = r#"
streams:
  - name: R
  - name: A
    parent: R
passes:
  - root: [R]
  - root: [R]
    matches:
      - stream: A
        parent: missing
        events: [a1]
"#;
    let scenario = Scenario::from_yaml(yaml).unwrap();
    let err = run_scenario(&scenario).unwrap_err();
    let err = err.downcast::<ScenarioError>().unwrap();
    assert!(matches!(
        err,
        ScenarioError::UnmatchedParent { pass: 2, .. }
    ));
}
