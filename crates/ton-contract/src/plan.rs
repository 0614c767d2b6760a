//! Deployment plans: several contracts whose init data reference each
//! other's future addresses.
//!
//! A plan is a DAG. Contract `B` depends on contract `A` when one of `B`'s
//! init fields is `A`'s address, so `A` must be derived first. Derivation
//! runs in topological order; if a contract fails, everything that
//! transitively depends on it is skipped, while unrelated contracts are
//! still derived.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use ton_cell::{AddressFlags, FormattedAddress, RawAddress};

use crate::compiler::CodeCompiler;
use crate::deriver::derive_address_with_flags;
use crate::error::{ContractError, ContractResult};
use crate::fields::{InitField, InitValue};

/// Where an init field's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// A named external account of the plan.
    Account(String),
    /// The derived address of another contract of the plan.
    Contract(String),
    /// A literal value.
    Value(InitValue),
}

/// One init field of a planned contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedField {
    pub name: String,
    pub source: FieldSource,
}

/// A contract to derive: its code sources and ordered init fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSpec {
    name: String,
    sources: Vec<PathBuf>,
    fields: Vec<PlannedField>,
}

impl ContractSpec {
    pub fn new(name: impl Into<String>, sources: Vec<PathBuf>) -> Self {
        ContractSpec {
            name: name.into(),
            sources,
            fields: Vec::new(),
        }
    }

    /// Append an init field. Fields are stored in the order they are added.
    pub fn field(mut self, name: impl Into<String>, source: FieldSource) -> Self {
        self.fields.push(PlannedField {
            name: name.into(),
            source,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn fields(&self) -> &[PlannedField] {
        &self.fields
    }

    /// Names of plan contracts this contract's data refers to.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter_map(|f| match &f.source {
            FieldSource::Contract(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Result of deriving one contract.
#[derive(Debug)]
pub enum ContractOutcome {
    Derived(FormattedAddress),
    Failed(ContractError),
    /// Not attempted because a contract it depends on failed.
    Skipped { blocked_by: String },
}

/// Per-contract entry of a [`PlanReport`].
#[derive(Debug)]
pub struct ContractReport {
    pub name: String,
    pub outcome: ContractOutcome,
}

/// Outcomes of a plan, in derivation order.
#[derive(Debug, Default)]
pub struct PlanReport {
    entries: Vec<ContractReport>,
}

impl PlanReport {
    pub fn entries(&self) -> &[ContractReport] {
        &self.entries
    }

    /// Derived address of `name`, if it was derived.
    pub fn address(&self, name: &str) -> Option<FormattedAddress> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| match &e.outcome {
                ContractOutcome::Derived(address) => Some(*address),
                _ => None,
            })
    }

    /// Whether every contract was derived.
    pub fn is_complete(&self) -> bool {
        self.entries
            .iter()
            .all(|e| matches!(e.outcome, ContractOutcome::Derived(_)))
    }

    /// Entries that failed or were skipped.
    pub fn failures(&self) -> impl Iterator<Item = &ContractReport> {
        self.entries
            .iter()
            .filter(|e| !matches!(e.outcome, ContractOutcome::Derived(_)))
    }
}

/// A set of contracts to derive together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    chain_id: i8,
    flags: AddressFlags,
    accounts: BTreeMap<String, RawAddress>,
    contracts: Vec<ContractSpec>,
}

impl DeploymentPlan {
    /// Empty plan; addresses render non-bounceable for mainnet by default.
    pub fn new(chain_id: i8) -> Self {
        DeploymentPlan {
            chain_id,
            flags: AddressFlags::default(),
            accounts: BTreeMap::new(),
            contracts: Vec::new(),
        }
    }

    pub fn with_flags(mut self, flags: AddressFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn chain_id(&self) -> i8 {
        self.chain_id
    }

    pub fn flags(&self) -> AddressFlags {
        self.flags
    }

    pub fn accounts(&self) -> &BTreeMap<String, RawAddress> {
        &self.accounts
    }

    pub fn contracts(&self) -> &[ContractSpec] {
        &self.contracts
    }

    /// Register (or replace) a named external account.
    pub fn add_account(&mut self, name: impl Into<String>, address: RawAddress) -> &mut Self {
        self.accounts.insert(name.into(), address);
        self
    }

    /// Add a contract. Names must be unique.
    pub fn add_contract(&mut self, contract: ContractSpec) -> ContractResult<&mut Self> {
        if self.contracts.iter().any(|c| c.name == contract.name) {
            return Err(ContractError::DuplicateContract(contract.name));
        }
        self.contracts.push(contract);
        Ok(self)
    }

    /// The project's four singleton contracts, in the field order of their
    /// `init` signatures:
    ///
    /// - `der_master(owner)`
    /// - `transaction_log(owner = der_master)`
    /// - `ico(owner, treasury, token_master = der_master)`
    /// - `governance(owner, token_master = der_master)`
    ///
    /// Code artifacts are `main.boc`, `log.boc`, `ico.boc` and
    /// `governance.boc` under `artifact_dir`.
    pub fn token_suite(
        chain_id: i8,
        owner: RawAddress,
        treasury: RawAddress,
        artifact_dir: &Path,
    ) -> Self {
        let account = |name: &str| FieldSource::Account(name.to_string());
        let contract = |name: &str| FieldSource::Contract(name.to_string());
        let artifact = |file: &str| vec![artifact_dir.join(file)];

        let mut plan = DeploymentPlan::new(chain_id);
        plan.add_account("owner", owner);
        plan.add_account("treasury", treasury);
        plan.contracts = vec![
            ContractSpec::new("der_master", artifact("main.boc")).field("owner", account("owner")),
            ContractSpec::new("transaction_log", artifact("log.boc"))
                .field("owner", contract("der_master")),
            ContractSpec::new("ico", artifact("ico.boc"))
                .field("owner", account("owner"))
                .field("treasury", account("treasury"))
                .field("token_master", contract("der_master")),
            ContractSpec::new("governance", artifact("governance.boc"))
                .field("owner", account("owner"))
                .field("token_master", contract("der_master")),
        ];
        plan
    }

    /// Topological derivation order.
    ///
    /// Among contracts that are ready at the same time, the one declared
    /// first goes first, so the order is stable.
    pub fn resolve_order(&self) -> ContractResult<Vec<&ContractSpec>> {
        let mut position: HashMap<&str, usize> = HashMap::with_capacity(self.contracts.len());
        for (i, contract) in self.contracts.iter().enumerate() {
            if position.insert(contract.name.as_str(), i).is_some() {
                return Err(ContractError::DuplicateContract(contract.name.clone()));
            }
        }

        let mut in_degree = vec![0usize; self.contracts.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.contracts.len()];
        for (i, contract) in self.contracts.iter().enumerate() {
            for field in &contract.fields {
                match &field.source {
                    FieldSource::Account(name) if !self.accounts.contains_key(name) => {
                        return Err(ContractError::UnknownAccount(name.clone()));
                    }
                    FieldSource::Contract(name) => {
                        let dep = *position
                            .get(name.as_str())
                            .ok_or_else(|| ContractError::UnknownContract(name.clone()))?;
                        in_degree[i] += 1;
                        dependents[dep].push(i);
                    }
                    _ => {}
                }
            }
        }

        let mut done = vec![false; self.contracts.len()];
        let mut order = Vec::with_capacity(self.contracts.len());
        while order.len() < self.contracts.len() {
            let Some(next) = (0..self.contracts.len()).find(|&i| !done[i] && in_degree[i] == 0)
            else {
                let cycle = (0..self.contracts.len())
                    .filter(|&i| !done[i])
                    .map(|i| self.contracts[i].name.clone())
                    .collect();
                return Err(ContractError::DependencyCycle(cycle));
            };
            done[next] = true;
            for &dependent in &dependents[next] {
                in_degree[dependent] -= 1;
            }
            order.push(&self.contracts[next]);
        }

        Ok(order)
    }

    /// Derive every contract of the plan.
    ///
    /// Structural problems (unknown names, cycles) fail the whole call.
    /// Failures of individual contracts are recorded in the report instead,
    /// and their dependents are skipped.
    pub fn derive_all(&self, compiler: &dyn CodeCompiler) -> ContractResult<PlanReport> {
        let order = self.resolve_order()?;
        info!(
            "deriving {} contracts on chain {}",
            order.len(),
            self.chain_id
        );

        let mut derived: HashMap<&str, RawAddress> = HashMap::new();
        // failed or skipped contract -> contract whose failure caused it
        let mut blocked: HashMap<&str, String> = HashMap::new();
        let mut report = PlanReport::default();

        for contract in order {
            let blocker = contract
                .dependencies()
                .find_map(|dep| blocked.get(dep).cloned());

            let outcome = match blocker {
                Some(blocked_by) => {
                    warn!(
                        "skipping {}: depends on failed contract {}",
                        contract.name, blocked_by
                    );
                    blocked.insert(&contract.name, blocked_by.clone());
                    ContractOutcome::Skipped { blocked_by }
                }
                None => match self.derive_one(contract, compiler, &derived) {
                    Ok(address) => {
                        info!("{}: {}", contract.name, address);
                        derived.insert(&contract.name, address.address());
                        ContractOutcome::Derived(address)
                    }
                    Err(e) => {
                        warn!("{} failed: {}", contract.name, e);
                        blocked.insert(&contract.name, contract.name.clone());
                        ContractOutcome::Failed(e)
                    }
                },
            };

            report.entries.push(ContractReport {
                name: contract.name.clone(),
                outcome,
            });
        }

        Ok(report)
    }

    fn derive_one(
        &self,
        contract: &ContractSpec,
        compiler: &dyn CodeCompiler,
        derived: &HashMap<&str, RawAddress>,
    ) -> ContractResult<FormattedAddress> {
        let code = compiler.compile(&contract.sources)?;

        let fields = contract
            .fields
            .iter()
            .map(|field| -> ContractResult<InitField> {
                let value = match &field.source {
                    FieldSource::Account(name) => self
                        .accounts
                        .get(name)
                        .copied()
                        .map(InitValue::Address)
                        .ok_or_else(|| ContractError::UnknownAccount(name.clone()))?,
                    FieldSource::Contract(name) => derived
                        .get(name.as_str())
                        .copied()
                        .map(InitValue::Address)
                        .ok_or_else(|| ContractError::UnknownContract(name.clone()))?,
                    FieldSource::Value(value) => value.clone(),
                };
                Ok(InitField::new(field.name.clone(), value))
            })
            .collect::<ContractResult<Vec<_>>>()?;

        debug!(
            "{}: {} init fields, code {} bits",
            contract.name,
            fields.len(),
            code.bit_len()
        );
        derive_address_with_flags(self.chain_id, code, &fields, self.flags)
    }
}
