//! JSON plan files.
//!
//! ```json
//! {
//!   "chain_id": 0,
//!   "bounceable": false,
//!   "test_only": false,
//!   "accounts": { "owner": "0:1111...1111" },
//!   "contracts": [
//!     {
//!       "name": "der_master",
//!       "sources": ["contracts/main.boc"],
//!       "fields": [{ "name": "owner", "value": { "account": "owner" } }]
//!     }
//!   ]
//! }
//! ```
//!
//! Addresses may be written in raw (`0:<hex>`) or user-friendly form.
//! Relative source paths are resolved against the directory of the plan
//! file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use ton_cell::{AddressFlags, RawAddress};

use crate::error::{ContractError, ContractResult};
use crate::fields::InitValue;
use crate::plan::{ContractSpec, DeploymentPlan, FieldSource};

/// A deployment plan as written on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConfig {
    #[serde(default)]
    pub chain_id: i8,
    #[serde(default)]
    pub bounceable: bool,
    #[serde(default)]
    pub test_only: bool,
    #[serde(default)]
    pub accounts: BTreeMap<String, String>,
    pub contracts: Vec<ContractConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    pub name: String,
    pub sources: Vec<PathBuf>,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    pub value: FieldValueConfig,
}

/// Field value forms accepted in plan files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValueConfig {
    Account(String),
    Contract(String),
    Address(String),
    Uint { value: u64, bits: usize },
    Int { value: i64, bits: usize },
    Bool(bool),
    Coins(u64),
    Hex(String),
}

impl PlanConfig {
    pub fn from_json(json: &str) -> ContractResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> ContractResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a plan file.
    pub fn from_file(path: &Path) -> ContractResult<Self> {
        let json = fs::read_to_string(path).map_err(|source| ContractError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("loaded plan config from {}", path.display());
        Self::from_json(&json)
    }

    /// Read a plan file and build the plan, resolving relative source
    /// paths against the file's directory.
    pub fn load_plan(path: &Path) -> ContractResult<DeploymentPlan> {
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_file(path)?.into_plan(base_dir)
    }

    /// The layout of [`DeploymentPlan::token_suite`] with placeholder
    /// owner and treasury accounts.
    pub fn token_suite_template() -> Self {
        let account = |name: &str| FieldValueConfig::Account(name.to_string());
        let contract = |name: &str| FieldValueConfig::Contract(name.to_string());
        let field = |name: &str, value| FieldConfig {
            name: name.to_string(),
            value,
        };
        let entry = |name: &str, artifact: &str, fields| ContractConfig {
            name: name.to_string(),
            sources: vec![PathBuf::from("contracts").join(artifact)],
            fields,
        };

        let mut accounts = BTreeMap::new();
        accounts.insert("owner".to_string(), RawAddress::new(0, [0x11; 32]).to_string());
        accounts.insert("treasury".to_string(), RawAddress::new(0, [0x22; 32]).to_string());

        PlanConfig {
            chain_id: 0,
            bounceable: false,
            test_only: false,
            accounts,
            contracts: vec![
                entry("der_master", "main.boc", vec![field("owner", account("owner"))]),
                entry(
                    "transaction_log",
                    "log.boc",
                    vec![field("owner", contract("der_master"))],
                ),
                entry(
                    "ico",
                    "ico.boc",
                    vec![
                        field("owner", account("owner")),
                        field("treasury", account("treasury")),
                        field("token_master", contract("der_master")),
                    ],
                ),
                entry(
                    "governance",
                    "governance.boc",
                    vec![
                        field("owner", account("owner")),
                        field("token_master", contract("der_master")),
                    ],
                ),
            ],
        }
    }

    /// Convert into a plan. Relative source paths are joined onto `base_dir`.
    pub fn into_plan(self, base_dir: &Path) -> ContractResult<DeploymentPlan> {
        let flags = AddressFlags::new(self.bounceable, self.test_only);
        let mut plan = DeploymentPlan::new(self.chain_id).with_flags(flags);

        for (name, address) in self.accounts {
            let address = parse_address(&address)
                .map_err(|e| ContractError::InvalidConfig(format!("account '{}': {}", name, e)))?;
            plan.add_account(name, address);
        }

        for contract in self.contracts {
            let sources = contract
                .sources
                .into_iter()
                .map(|p| if p.is_absolute() { p } else { base_dir.join(p) })
                .collect();
            let mut spec = ContractSpec::new(contract.name.clone(), sources);
            for field in contract.fields {
                let source = field.value.into_source().map_err(|e| {
                    ContractError::InvalidConfig(format!(
                        "{}.{}: {}",
                        contract.name, field.name, e
                    ))
                })?;
                spec = spec.field(field.name, source);
            }
            plan.add_contract(spec)?;
        }

        Ok(plan)
    }
}

impl FieldValueConfig {
    fn into_source(self) -> Result<FieldSource, String> {
        let value = match self {
            FieldValueConfig::Account(name) => return Ok(FieldSource::Account(name)),
            FieldValueConfig::Contract(name) => return Ok(FieldSource::Contract(name)),
            FieldValueConfig::Address(text) => InitValue::Address(parse_address(&text)?),
            FieldValueConfig::Uint { value, bits } => InitValue::Uint { value, bits },
            FieldValueConfig::Int { value, bits } => InitValue::Int { value, bits },
            FieldValueConfig::Bool(value) => InitValue::Bool(value),
            FieldValueConfig::Coins(value) => InitValue::Coins(value as u128),
            FieldValueConfig::Hex(text) => {
                InitValue::Bytes(hex::decode(text.trim()).map_err(|e| e.to_string())?)
            }
        };
        Ok(FieldSource::Value(value))
    }
}

fn parse_address(text: &str) -> Result<RawAddress, String> {
    text.trim().parse::<RawAddress>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_matches_token_suite() {
        let plan = PlanConfig::token_suite_template()
            .into_plan(Path::new("/deploy"))
            .unwrap();
        let expected = DeploymentPlan::token_suite(
            0,
            RawAddress::new(0, [0x11; 32]),
            RawAddress::new(0, [0x22; 32]),
            Path::new("/deploy/contracts"),
        );
        assert_eq!(plan, expected);
    }

    #[test]
    fn test_template_json_roundtrip() {
        let template = PlanConfig::token_suite_template();
        let json = template.to_json_pretty().unwrap();
        assert!(json.contains("\"account\": \"owner\""));
        assert_eq!(PlanConfig::from_json(&json).unwrap(), template);
    }

    #[test]
    fn test_value_forms() {
        let json = r#"{
            "chain_id": -1,
            "bounceable": true,
            "accounts": { "owner": "EQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAM9c" },
            "contracts": [{
                "name": "vault",
                "sources": ["/abs/vault.boc"],
                "fields": [
                    { "name": "owner", "value": { "account": "owner" } },
                    { "name": "peer", "value": { "address": "0:2222222222222222222222222222222222222222222222222222222222222222" } },
                    { "name": "limit", "value": { "uint": { "value": 10, "bits": 16 } } },
                    { "name": "delta", "value": { "int": { "value": -1, "bits": 8 } } },
                    { "name": "open", "value": { "bool": true } },
                    { "name": "fee", "value": { "coins": 5000 } },
                    { "name": "salt", "value": { "hex": "cafe" } }
                ]
            }]
        }"#;
        let plan = PlanConfig::from_json(json)
            .unwrap()
            .into_plan(Path::new("/ignored"))
            .unwrap();

        assert_eq!(plan.chain_id(), -1);
        assert!(plan.flags().bounceable);
        assert!(!plan.flags().test_only);
        assert_eq!(plan.accounts()["owner"], RawAddress::new(0, [0; 32]));

        let vault = &plan.contracts()[0];
        assert_eq!(vault.sources(), &[PathBuf::from("/abs/vault.boc")]);
        let sources: Vec<&FieldSource> = vault.fields().iter().map(|f| &f.source).collect();
        assert_eq!(sources[0], &FieldSource::Account("owner".into()));
        assert_eq!(
            sources[1],
            &FieldSource::Value(InitValue::Address(RawAddress::new(0, [0x22; 32])))
        );
        assert_eq!(
            sources[2],
            &FieldSource::Value(InitValue::Uint { value: 10, bits: 16 })
        );
        assert_eq!(
            sources[3],
            &FieldSource::Value(InitValue::Int { value: -1, bits: 8 })
        );
        assert_eq!(sources[4], &FieldSource::Value(InitValue::Bool(true)));
        assert_eq!(sources[5], &FieldSource::Value(InitValue::Coins(5000)));
        assert_eq!(
            sources[6],
            &FieldSource::Value(InitValue::Bytes(vec![0xCA, 0xFE]))
        );
    }

    #[test]
    fn test_bad_account_address() {
        let json = r#"{ "accounts": { "owner": "not-an-address" }, "contracts": [] }"#;
        let err = PlanConfig::from_json(json)
            .unwrap()
            .into_plan(Path::new("."))
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidConfig(msg) if msg.contains("owner")));
    }

    #[test]
    fn test_bad_hex_field() {
        let json = r#"{ "contracts": [{
            "name": "a", "sources": ["a.boc"],
            "fields": [{ "name": "salt", "value": { "hex": "xyz" } }]
        }] }"#;
        let err = PlanConfig::from_json(json)
            .unwrap()
            .into_plan(Path::new("."))
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidConfig(msg) if msg.starts_with("a.salt")));
    }

    #[test]
    fn test_unknown_value_kind() {
        let json = r#"{ "contracts": [{
            "name": "a", "sources": ["a.boc"],
            "fields": [{ "name": "x", "value": { "float": 1.5 } }]
        }] }"#;
        assert!(matches!(
            PlanConfig::from_json(json),
            Err(ContractError::Json(_))
        ));
    }

    #[test]
    fn test_load_plan_resolves_relative_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        fs::write(
            &path,
            PlanConfig::token_suite_template().to_json_pretty().unwrap(),
        )
        .unwrap();

        let plan = PlanConfig::load_plan(&path).unwrap();
        assert_eq!(
            plan.contracts()[0].sources(),
            &[dir.path().join("contracts").join("main.boc")]
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            PlanConfig::from_file(&dir.path().join("absent.json")),
            Err(ContractError::Io { .. })
        ));
    }
}
