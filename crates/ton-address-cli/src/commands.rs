//! CLI commands.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::debug;
use ton_cell::{AddressFlags, FormattedAddress, RawAddress};
use ton_contract::{BocArtifactLoader, ContractOutcome, PlanConfig, PlanReport};

/// Main CLI.
#[derive(Parser, Debug)]
#[command(name = "ton-address")]
#[command(about = "Compute TON contract addresses before deployment")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive every contract address of a plan file
    Derive {
        /// Plan file (JSON)
        #[arg(short, long)]
        plan: PathBuf,

        /// Render bounceable addresses (overrides the plan file)
        #[arg(long, value_name = "BOOL")]
        bounceable: Option<bool>,

        /// Render test-only addresses (overrides the plan file)
        #[arg(long, value_name = "BOOL")]
        test_only: Option<bool>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the default plan file
    Template,

    /// Show the parts of an address
    Inspect {
        /// Address in raw (`0:<hex>`) or user-friendly form
        address: String,
    },

    /// Re-render an address with other flags
    Convert {
        /// Address in raw (`0:<hex>`) or user-friendly form
        address: String,

        #[arg(long)]
        bounceable: bool,

        #[arg(long)]
        test_only: bool,
    },
}

/// Execute a command, returning what to print.
pub fn execute(command: Commands) -> anyhow::Result<String> {
    match command {
        Commands::Derive {
            plan,
            bounceable,
            test_only,
            json,
        } => derive(plan, bounceable, test_only, json),
        Commands::Template => Ok(PlanConfig::token_suite_template().to_json_pretty()?),
        Commands::Inspect { address } => inspect(&address),
        Commands::Convert {
            address,
            bounceable,
            test_only,
        } => {
            let raw: RawAddress = address
                .trim()
                .parse()
                .with_context(|| format!("invalid address '{}'", address))?;
            Ok(raw.to_friendly(AddressFlags::new(bounceable, test_only)))
        }
    }
}

fn derive(
    plan_path: PathBuf,
    bounceable: Option<bool>,
    test_only: Option<bool>,
    json: bool,
) -> anyhow::Result<String> {
    let mut config = PlanConfig::from_file(&plan_path)
        .with_context(|| format!("loading plan {}", plan_path.display()))?;
    apply_flag_overrides(&mut config, bounceable, test_only);
    let base_dir = plan_path.parent().map(PathBuf::from).unwrap_or_default();
    debug!("artifact paths resolve against {}", base_dir.display());

    let plan = config.into_plan(&base_dir)?;
    let report = plan.derive_all(&BocArtifactLoader::new())?;

    let output = if json {
        serde_json::to_string_pretty(&report_json(&report))?
    } else {
        report_text(&report)
    };

    if !report.is_complete() {
        bail!(
            "{}\n{} of {} contracts not derived",
            output,
            report.failures().count(),
            report.entries().len()
        );
    }
    Ok(output)
}

/// Command-line flags win over the plan file, in both directions.
fn apply_flag_overrides(config: &mut PlanConfig, bounceable: Option<bool>, test_only: Option<bool>) {
    if let Some(bounceable) = bounceable {
        config.bounceable = bounceable;
    }
    if let Some(test_only) = test_only {
        config.test_only = test_only;
    }
}

fn inspect(address: &str) -> anyhow::Result<String> {
    let address = address.trim();
    let (raw, flags) = if address.contains(':') {
        (RawAddress::from_raw_string(address)?, None)
    } else {
        let friendly = FormattedAddress::parse(address)?;
        (friendly.address(), Some(friendly.flags()))
    };

    let mut lines = vec![
        format!("workchain:   {}", raw.workchain()),
        format!("hash:        {}", hex::encode(raw.hash_part())),
        format!("raw:         {}", raw),
    ];
    if let Some(flags) = flags {
        lines.push(format!("bounceable:  {}", flags.bounceable));
        lines.push(format!("test only:   {}", flags.test_only));
    }
    for (bounceable, test_only) in [(true, false), (false, false), (true, true), (false, true)] {
        lines.push(format!(
            "{:<12} {}",
            label(bounceable, test_only),
            raw.to_friendly(AddressFlags::new(bounceable, test_only))
        ));
    }
    Ok(lines.join("\n"))
}

fn label(bounceable: bool, test_only: bool) -> &'static str {
    match (bounceable, test_only) {
        (true, false) => "bounceable:",
        (false, false) => "plain:",
        (true, true) => "test b.:",
        (false, true) => "test plain:",
    }
}

fn report_text(report: &PlanReport) -> String {
    let width = report
        .entries()
        .iter()
        .map(|e| e.name.len())
        .max()
        .unwrap_or(0);
    report
        .entries()
        .iter()
        .map(|entry| match &entry.outcome {
            ContractOutcome::Derived(address) => format!(
                "{:<width$}  {}  {}",
                entry.name,
                address,
                address.address(),
                width = width
            ),
            ContractOutcome::Failed(e) => {
                format!("{:<width$}  FAILED: {}", entry.name, e, width = width)
            }
            ContractOutcome::Skipped { blocked_by } => format!(
                "{:<width$}  SKIPPED: depends on {}",
                entry.name,
                blocked_by,
                width = width
            ),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn report_json(report: &PlanReport) -> Value {
    let contracts: Vec<Value> = report
        .entries()
        .iter()
        .map(|entry| match &entry.outcome {
            ContractOutcome::Derived(address) => json!({
                "name": entry.name,
                "status": "derived",
                "address": address.to_string(),
                "raw": address.address().to_string(),
                "bounceable": address.flags().bounceable,
                "test_only": address.flags().test_only,
            }),
            ContractOutcome::Failed(e) => json!({
                "name": entry.name,
                "status": "failed",
                "error": e.to_string(),
            }),
            ContractOutcome::Skipped { blocked_by } => json!({
                "name": entry.name,
                "status": "skipped",
                "blocked_by": blocked_by,
            }),
        })
        .collect();
    json!({
        "complete": report.is_complete(),
        "contracts": contracts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const ZERO_BOUNCEABLE: &str = "EQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAM9c";
    const ZERO_PLAIN: &str = "UQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAJKZ";

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_derive_args() {
        let cli = Cli::parse_from(["ton-address", "derive", "--plan", "p.json", "--json"]);
        match cli.command {
            Commands::Derive {
                plan,
                bounceable,
                json,
                ..
            } => {
                assert_eq!(plan, PathBuf::from("p.json"));
                assert_eq!(bounceable, None);
                assert!(json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_flags_override_plan_both_ways() {
        let cli = Cli::parse_from([
            "ton-address",
            "derive",
            "--plan",
            "p.json",
            "--bounceable",
            "false",
        ]);
        let Commands::Derive {
            bounceable,
            test_only,
            ..
        } = cli.command
        else {
            panic!("expected derive");
        };
        assert_eq!(bounceable, Some(false));
        assert_eq!(test_only, None);

        let mut config = PlanConfig::token_suite_template();
        config.bounceable = true;
        config.test_only = true;
        apply_flag_overrides(&mut config, bounceable, test_only);
        assert!(!config.bounceable);
        assert!(config.test_only);

        apply_flag_overrides(&mut config, Some(true), Some(false));
        assert!(config.bounceable);
        assert!(!config.test_only);
    }

    #[test]
    fn test_convert() {
        let out = execute(Commands::Convert {
            address: ZERO_BOUNCEABLE.to_string(),
            bounceable: false,
            test_only: false,
        })
        .unwrap();
        assert_eq!(out, ZERO_PLAIN);

        let raw = format!("0:{}", "00".repeat(32));
        let out = execute(Commands::Convert {
            address: raw,
            bounceable: true,
            test_only: false,
        })
        .unwrap();
        assert_eq!(out, ZERO_BOUNCEABLE);
    }

    #[test]
    fn test_inspect() {
        let out = inspect(ZERO_PLAIN).unwrap();
        assert!(out.contains("workchain:   0"));
        assert!(out.contains("bounceable:  false"));
        assert!(out.contains(ZERO_BOUNCEABLE));
    }

    #[test]
    fn test_inspect_rejects_corrupted_address() {
        let mut corrupted = ZERO_PLAIN.to_string();
        corrupted.replace_range(10..11, "B");
        assert!(inspect(&corrupted).is_err());
    }

    #[test]
    fn test_template_is_valid_plan() {
        let out = execute(Commands::Template).unwrap();
        let config = PlanConfig::from_json(&out).unwrap();
        assert_eq!(config.contracts.len(), 4);
    }
}
