//! Deployment plan tests: dependency order, failure propagation and
//! loading plans from disk.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ton_cell::{AddressFlags, BagOfCells, Cell, CellBuilder, RawAddress};
use ton_contract::{
    derive_address, BocArtifactLoader, CodeCompiler, CompileError, ContractError,
    ContractOutcome, ContractSpec, DeploymentPlan, FieldSource, InitField, InitValue, PlanConfig,
};

const H1: &str = "e9d1434427b13098bccdda7d67c0e67f8a201bb7b40ee19db844a13a9ed9ef14";
const H2: &str = "cfb795aed66d81e2a4b9c5cfb6942c58b703ff716966cd613d7b902938de96a9";
const ICO: &str = "96b2d51d4c6e82f6e4fdefb6bd8da1111b97d1f98c1f0996c979c4b162a9ecf5";
const GOV: &str = "942d6cd6758dc23e07e375a45954b5c1f48d9235542537dcea0f3ea6e0b1d8b8";

fn code(suffix: &[u8]) -> Cell {
    let mut builder = CellBuilder::new();
    builder
        .store_bytes(&[0xFF, 0x00, 0xF4, 0xA4, 0x13, 0xF4, 0xBC, 0xF2, 0xC8, 0x0B])
        .unwrap();
    builder.store_bytes(suffix).unwrap();
    builder.build().unwrap()
}

/// Serves code cells by file name; unknown names fail to compile.
#[derive(Default)]
struct FixedCodes {
    codes: HashMap<String, Arc<Cell>>,
}

impl FixedCodes {
    fn token_suite() -> Self {
        let mut codes = FixedCodes::default();
        codes.insert("main.boc", code(&[]));
        codes.insert("log.boc", code(&[0x01]));
        codes.insert("ico.boc", code(&[0x02]));
        codes.insert("governance.boc", code(&[0x03]));
        codes
    }

    fn insert(&mut self, file: &str, cell: Cell) {
        self.codes.insert(file.to_string(), Arc::new(cell));
    }

    fn remove(&mut self, file: &str) {
        self.codes.remove(file);
    }
}

impl CodeCompiler for FixedCodes {
    fn compile(&self, sources: &[PathBuf]) -> Result<Arc<Cell>, CompileError> {
        let file = sources
            .first()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .ok_or(CompileError::NoSources)?;
        self.codes
            .get(file)
            .cloned()
            .ok_or_else(|| CompileError::Failed(format!("{}: syntax error", file)))
    }
}

fn token_plan() -> DeploymentPlan {
    DeploymentPlan::token_suite(
        0,
        RawAddress::new(0, [0x11; 32]),
        RawAddress::new(0, [0x22; 32]),
        Path::new("build"),
    )
}

fn hash_hex(report: &ton_contract::PlanReport, name: &str) -> String {
    hex::encode(report.address(name).unwrap().address().hash_part())
}

#[test]
fn test_token_suite_golden_addresses() {
    let report = token_plan().derive_all(&FixedCodes::token_suite()).unwrap();

    assert!(report.is_complete());
    assert_eq!(report.failures().count(), 0);
    assert_eq!(hash_hex(&report, "der_master"), H1);
    assert_eq!(hash_hex(&report, "transaction_log"), H2);
    assert_eq!(hash_hex(&report, "ico"), ICO);
    assert_eq!(hash_hex(&report, "governance"), GOV);

    let names: Vec<&str> = report.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["der_master", "transaction_log", "ico", "governance"]);
    assert_eq!(
        report.address("der_master").unwrap().to_string(),
        "UQDp0UNEJ7EwmLzN2n1nwOZ_iiAbt7QO4Z24RKE6ntnvFF4-"
    );
}

#[test]
fn test_plan_flags_apply_to_every_address() {
    let plan = token_plan().with_flags(AddressFlags::new(true, false));
    let report = plan.derive_all(&FixedCodes::token_suite()).unwrap();
    assert_eq!(
        report.address("der_master").unwrap().to_string(),
        "EQDp0UNEJ7EwmLzN2n1nwOZ_iiAbt7QO4Z24RKE6ntnvFAP7"
    );
    for entry in report.entries() {
        match &entry.outcome {
            ContractOutcome::Derived(address) => assert!(address.flags().bounceable),
            other => panic!("{} not derived: {:?}", entry.name, other),
        }
    }
}

#[test]
fn test_failure_skips_dependents_only() {
    let mut codes = FixedCodes::token_suite();
    codes.remove("main.boc");
    let report = token_plan().derive_all(&codes).unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failures().count(), 4);
    assert!(matches!(
        report.entries()[0].outcome,
        ContractOutcome::Failed(ContractError::Compile(CompileError::Failed(_)))
    ));
    for entry in &report.entries()[1..] {
        match &entry.outcome {
            ContractOutcome::Skipped { blocked_by } => assert_eq!(blocked_by, "der_master"),
            other => panic!("{} should be skipped: {:?}", entry.name, other),
        }
    }
}

#[test]
fn test_leaf_failure_leaves_siblings_intact() {
    let mut codes = FixedCodes::token_suite();
    codes.remove("ico.boc");
    let report = token_plan().derive_all(&codes).unwrap();

    let failed: Vec<&str> = report.failures().map(|e| e.name.as_str()).collect();
    assert_eq!(failed, ["ico"]);
    assert_eq!(hash_hex(&report, "der_master"), H1);
    assert_eq!(hash_hex(&report, "transaction_log"), H2);
    assert_eq!(hash_hex(&report, "governance"), GOV);
    assert!(report.address("ico").is_none());
}

#[test]
fn test_skip_propagates_transitively() {
    let mut codes = FixedCodes::default();
    codes.insert("b.boc", code(&[0x0B]));
    codes.insert("c.boc", code(&[0x0C]));
    codes.insert("d.boc", code(&[0x0D]));

    let mut plan = DeploymentPlan::new(0);
    plan.add_account("owner", RawAddress::new(0, [0x11; 32]));
    let spec = |name: &str| ContractSpec::new(name, vec![PathBuf::from(format!("{}.boc", name))]);
    plan.add_contract(spec("a").field("owner", FieldSource::Account("owner".into())))
        .unwrap();
    plan.add_contract(spec("b").field("parent", FieldSource::Contract("a".into())))
        .unwrap();
    plan.add_contract(spec("c").field("parent", FieldSource::Contract("b".into())))
        .unwrap();
    plan.add_contract(spec("d").field("owner", FieldSource::Account("owner".into())))
        .unwrap();

    let report = plan.derive_all(&codes).unwrap();
    let outcome = |name: &str| {
        &report
            .entries()
            .iter()
            .find(|e| e.name == name)
            .unwrap()
            .outcome
    };
    assert!(matches!(outcome("a"), ContractOutcome::Failed(_)));
    assert!(matches!(outcome("b"), ContractOutcome::Skipped { blocked_by } if blocked_by == "a"));
    assert!(matches!(outcome("c"), ContractOutcome::Skipped { blocked_by } if blocked_by == "a"));
    assert!(matches!(outcome("d"), ContractOutcome::Derived(_)));
}

#[test]
fn test_invalid_field_value_fails_contract() {
    let mut codes = FixedCodes::default();
    codes.insert("a.boc", code(&[]));

    let mut plan = DeploymentPlan::new(0);
    plan.add_contract(
        ContractSpec::new("a", vec![PathBuf::from("a.boc")]).field(
            "small",
            FieldSource::Value(InitValue::Uint {
                value: 300,
                bits: 8,
            }),
        ),
    )
    .unwrap();

    let report = plan.derive_all(&codes).unwrap();
    assert!(matches!(
        report.entries()[0].outcome,
        ContractOutcome::Failed(ContractError::Cell(_))
    ));
}

#[test]
fn test_literal_values_match_direct_derivation() {
    let mut codes = FixedCodes::default();
    codes.insert("a.boc", code(&[]));

    let mut plan = DeploymentPlan::new(-1);
    plan.add_contract(
        ContractSpec::new("a", vec![PathBuf::from("a.boc")])
            .field("id", FieldSource::Value(InitValue::Uint { value: 42, bits: 32 }))
            .field("active", FieldSource::Value(InitValue::Bool(true))),
    )
    .unwrap();
    let report = plan.derive_all(&codes).unwrap();

    let direct = derive_address(
        -1,
        Arc::new(code(&[])),
        &[
            InitField::new("id", InitValue::Uint { value: 42, bits: 32 }),
            InitField::new("active", InitValue::Bool(true)),
        ],
    )
    .unwrap();
    assert_eq!(report.address("a"), Some(direct));
}

#[test]
fn test_structural_errors_abort_before_deriving() {
    let mut plan = DeploymentPlan::new(0);
    plan.add_contract(
        ContractSpec::new("a", vec![PathBuf::from("a.boc")])
            .field("x", FieldSource::Contract("b".into())),
    )
    .unwrap();
    plan.add_contract(
        ContractSpec::new("b", vec![PathBuf::from("b.boc")])
            .field("x", FieldSource::Contract("a".into())),
    )
    .unwrap();

    assert!(matches!(
        plan.derive_all(&FixedCodes::default()),
        Err(ContractError::DependencyCycle(_))
    ));
}

#[test]
fn test_plan_file_with_boc_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let contracts = dir.path().join("contracts");
    fs::create_dir(&contracts).unwrap();
    for (file, suffix) in [
        ("main.boc", &[][..]),
        ("log.boc", &[0x01][..]),
        ("ico.boc", &[0x02][..]),
        ("governance.boc", &[0x03][..]),
    ] {
        let bytes = BagOfCells::from_root(code(suffix)).serialize().unwrap();
        fs::write(contracts.join(file), bytes).unwrap();
    }

    let plan_path = dir.path().join("plan.json");
    fs::write(
        &plan_path,
        PlanConfig::token_suite_template().to_json_pretty().unwrap(),
    )
    .unwrap();

    let plan = PlanConfig::load_plan(&plan_path).unwrap();
    let report = plan.derive_all(&BocArtifactLoader::new()).unwrap();
    assert!(report.is_complete());
    assert_eq!(hash_hex(&report, "der_master"), H1);
    assert_eq!(hash_hex(&report, "transaction_log"), H2);
    assert_eq!(hash_hex(&report, "ico"), ICO);
    assert_eq!(hash_hex(&report, "governance"), GOV);
}

#[test]
fn test_plan_file_missing_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let plan_path = dir.path().join("plan.json");
    fs::write(
        &plan_path,
        PlanConfig::token_suite_template().to_json_pretty().unwrap(),
    )
    .unwrap();

    let report = PlanConfig::load_plan(&plan_path)
        .unwrap()
        .derive_all(&BocArtifactLoader::new())
        .unwrap();
    assert!(matches!(
        report.entries()[0].outcome,
        ContractOutcome::Failed(ContractError::Compile(CompileError::Io { .. }))
    ));
    assert_eq!(report.failures().count(), 4);
}
