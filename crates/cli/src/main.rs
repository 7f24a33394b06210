// Tuition billing reconciliation CLI

mod exit_codes;
mod insight;
mod report;
mod store;
mod units;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tuition_config::{AIConfigStatus, AIDiagnostics, ResolvedAIConfig, Settings};
use tuition_recon::{ErrorKind, RuleConfig};

use exit_codes::{
    EXIT_AI_DISABLED, EXIT_AI_KEYCHAIN_ERR, EXIT_AI_MISSING_KEY, EXIT_ERROR, EXIT_IO, EXIT_SUCCESS,
    EXIT_USAGE,
};
use store::{SelectionArgs, StoreArgs};

#[derive(Parser)]
#[command(name = "tuition")]
#[command(about = "Reconcile per-unit tuition billing against the school's billing rules")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a billing spreadsheet for a unit (replaces its records)
    #[command(after_help = "\
Examples:
  tuition upload cobrancas-marco.xlsx --unit 'Unidade Centro'
  tuition upload export.csv --unit Norte --json")]
    Upload {
        /// Spreadsheet (xlsx, xls, xlsb, ods, csv, tsv)
        file: PathBuf,

        /// Unit display name; the unit id is derived from it
        #[arg(long)]
        unit: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List units, or delete one
    Units {
        /// Delete the unit with this id, including its resolutions
        #[arg(long, value_name = "ID")]
        delete: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the reconciliation report for the selected units
    #[command(after_help = "\
Exit code 5 with --fail-on-errors means unresolved date or value errors remain \
in the selected units (search and filter do not affect the check).

Examples:
  tuition report --all
  tuition report --unit unidade-centro --errors --no-value
  tuition report --all --search 'maria' --json
  tuition report --all --output pendencias.xlsx")]
    Report(report::ReportArgs),

    /// Mark a student's error as resolved
    #[command(after_help = "\
Examples:
  tuition resolve --unit unidade-centro --student 'Ana Souza' --kind date --note 'Acordo com a família'")]
    Resolve {
        /// Unit id
        #[arg(long)]
        unit: String,

        /// Student name exactly as uploaded
        #[arg(long)]
        student: String,

        /// Error kind: date or value
        #[arg(long)]
        kind: ErrorKind,

        /// Justification
        #[arg(long, default_value = "")]
        note: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List resolutions of the selected units, newest first
    Resolved {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reprint the summary on every store change
    Watch {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Rules file (TOML)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Exit after this many snapshots
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Ask the AI provider for a narrative summary of the selected units
    Insight {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// AI configuration and diagnostics
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },

    /// Billing rules
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
}

#[derive(Subcommand)]
enum AiCommands {
    /// Show the resolved AI configuration
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RulesCommands {
    /// Check a rules file and print the effective rules
    Validate {
        /// Rules file (TOML)
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        None => {
            eprintln!("Usage: tuition <command> [options]");
            eprintln!("       tuition --help for more information");
            Ok(())
        }
        Some(Commands::Upload { file, unit, json }) => units::cmd_upload(&cli.store, file, unit, json),
        Some(Commands::Units { delete, json }) => match delete {
            Some(id) => units::cmd_delete(&cli.store, id, json),
            None => units::cmd_list(&cli.store, json),
        },
        Some(Commands::Report(args)) => report::cmd_report(&cli.store, args),
        Some(Commands::Resolve { unit, student, kind, note, json }) => {
            units::cmd_resolve(&cli.store, unit, student, kind, note, json)
        }
        Some(Commands::Resolved { selection, json }) => {
            report::cmd_resolved(&cli.store, selection, json)
        }
        Some(Commands::Watch { selection, rules, limit }) => {
            report::cmd_watch(&cli.store, selection, rules, limit)
        }
        Some(Commands::Insight { selection, json }) => {
            insight::cmd_insight(&cli.store, selection, json)
        }
        Some(Commands::Ai { command }) => match command {
            AiCommands::Doctor { json } => cmd_ai_doctor(json),
        },
        Some(Commands::Rules { command }) => match command {
            RulesCommands::Validate { file, json } => cmd_rules_validate(file, json),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Print a value as the single JSON document on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::general(format!("failed to encode JSON: {}", e)))?;
    println!("{}", text);
    Ok(())
}

// ============================================================================
// ai doctor
// ============================================================================

fn cmd_ai_doctor(json: bool) -> Result<(), CliError> {
    let config = ResolvedAIConfig::load();
    let diag = AIDiagnostics::from_resolved(&config);

    if json {
        print_json(&diag.to_json(&Settings::config_path_display()))?;
    } else {
        eprint!("{}", diag);
        eprintln!("{:<18}{}", "Settings:", Settings::config_path_display());
    }

    match config.status {
        AIConfigStatus::Ready => Ok(()),
        AIConfigStatus::Disabled => Err(CliError {
            code: EXIT_AI_DISABLED,
            message: "AI is disabled".to_string(),
            hint: Some("set ai.provider in settings.json".to_string()),
        }),
        AIConfigStatus::MissingKey => Err(CliError {
            code: EXIT_AI_MISSING_KEY,
            message: diag.blocking_reason.unwrap_or_else(|| "missing API key".to_string()),
            hint: None,
        }),
        AIConfigStatus::Error => Err(CliError {
            code: EXIT_AI_KEYCHAIN_ERR,
            message: diag.blocking_reason.unwrap_or_else(|| "keychain error".to_string()),
            hint: None,
        }),
    }
}

// ============================================================================
// rules validate
// ============================================================================

fn cmd_rules_validate(file: PathBuf, json: bool) -> Result<(), CliError> {
    let text = std::fs::read_to_string(&file)
        .map_err(|e| CliError::io(format!("{}: {}", file.display(), e)))?;
    let rules = RuleConfig::from_toml(&text).map_err(CliError::recon)?;

    if json {
        print_json(&serde_json::json!({
            "valid": true,
            "base_days": rules.base_days,
            "min_expected_value": rules.min_expected_value,
        }))
    } else {
        let days: Vec<String> = rules.base_days.iter().map(|d| d.to_string()).collect();
        eprintln!("{}: ok", file.display());
        eprintln!("  base days:          {}", days.join(", "));
        eprintln!("  min expected value: {:.2}", rules.min_expected_value);
        Ok(())
    }
}
