// Store selection and shared loading helpers

use std::path::PathBuf;

use clap::Args;
use tuition_client::{FileStore, FirebaseStore, MemoryStore, StoreError, UnitStore};
use tuition_config::{get_secret, Settings, StoreBackend};
use tuition_recon::{Dashboard, ReconError, RuleConfig};

use crate::exit_codes::{
    EXIT_IO, EXIT_NOT_FOUND, EXIT_STORE_AUTH, EXIT_STORE_CONNECT, EXIT_STORE_WRITE, EXIT_USAGE,
};
use crate::CliError;

/// Secret name for the Firebase auth token (keychain or TUITION_FIREBASE_KEY).
const FIREBASE_SECRET: &str = "firebase";

#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Store backend (overrides settings.json)
    #[arg(long, global = true, value_name = "BACKEND")]
    pub store: Option<StoreBackend>,

    /// Data file for the file backend
    #[arg(long, global = true, value_name = "PATH", env = "TUITION_STORE_PATH")]
    pub store_path: Option<PathBuf>,

    /// Firebase database URL
    #[arg(long, global = true, value_name = "URL", env = "TUITION_DATABASE_URL")]
    pub database_url: Option<String>,
}

/// Unit selection shared by report-style commands.
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Unit id to include (repeatable). Default: first unit.
    #[arg(long = "unit", value_name = "ID")]
    pub units: Vec<String>,

    /// Include every unit
    #[arg(long, conflicts_with = "units")]
    pub all: bool,
}

pub fn open_store(args: &StoreArgs, settings: &Settings) -> Result<Box<dyn UnitStore>, CliError> {
    let backend = args.store.unwrap_or(settings.store.backend);
    log::debug!("Using {} store", backend.name());

    match backend {
        StoreBackend::File => {
            let path = args
                .store_path
                .clone()
                .unwrap_or_else(|| settings.store.effective_path());
            Ok(Box::new(FileStore::new(path)))
        }
        StoreBackend::Memory => Ok(Box::new(MemoryStore::new())),
        StoreBackend::Firebase => {
            let url = args
                .database_url
                .clone()
                .or_else(|| settings.store.database_url.clone())
                .filter(|u| !u.is_empty())
                .ok_or_else(|| {
                    CliError::usage("firebase store needs a database URL")
                        .with_hint("pass --database-url or set store.databaseUrl in settings.json")
                })?;
            let token = get_secret(FIREBASE_SECRET).key;
            if token.is_none() {
                log::info!("No Firebase token found; using unauthenticated access");
            }
            let store = FirebaseStore::new(&url, token).map_err(CliError::store)?;
            Ok(Box::new(store))
        }
    }
}

/// Rules from `--rules`, else `rules.file` in settings, else defaults.
pub fn load_rules(flag: Option<&PathBuf>, settings: &Settings) -> Result<RuleConfig, CliError> {
    let path = match flag {
        Some(p) => p.clone(),
        None => match &settings.rules_file {
            Some(p) if !p.is_empty() => PathBuf::from(p),
            _ => return Ok(RuleConfig::default()),
        },
    };
    let text = std::fs::read_to_string(&path)
        .map_err(|e| CliError::io(format!("{}: {}", path.display(), e)))?;
    RuleConfig::from_toml(&text).map_err(CliError::recon)
}

/// Load the current snapshot into a dashboard and apply the selection.
pub fn load_dashboard(
    store: &dyn UnitStore,
    rules: RuleConfig,
    selection: &SelectionArgs,
) -> Result<Dashboard, CliError> {
    let units = store.load_units().map_err(CliError::store)?;
    let mut dash = Dashboard::new(rules);
    dash.apply_snapshot(units);
    apply_selection(&mut dash, selection)?;
    Ok(dash)
}

pub fn apply_selection(dash: &mut Dashboard, selection: &SelectionArgs) -> Result<(), CliError> {
    if selection.all {
        let ids: Vec<String> = dash.units().iter().map(|u| u.id.clone()).collect();
        dash.select(ids).map_err(CliError::recon)
    } else if !selection.units.is_empty() {
        dash.select(selection.units.iter().cloned())
            .map_err(CliError::recon)
    } else {
        Ok(())
    }
}

impl CliError {
    pub fn store(err: StoreError) -> Self {
        let (code, hint) = match &err {
            StoreError::Connect(_) | StoreError::Parse(_) | StoreError::Http(..) => {
                (EXIT_STORE_CONNECT, None)
            }
            StoreError::Write(_) => (EXIT_STORE_WRITE, None),
            StoreError::Auth(_) => (
                EXIT_STORE_AUTH,
                Some("store the token in the keychain or set TUITION_FIREBASE_KEY".to_string()),
            ),
            StoreError::UnknownUnit(_) => (EXIT_NOT_FOUND, None),
        };
        Self { code, message: err.to_string(), hint }
    }

    pub fn recon(err: ReconError) -> Self {
        let (code, hint) = match &err {
            ReconError::UnknownUnit(_) => {
                (EXIT_NOT_FOUND, Some("run `tuition units` to list unit ids".to_string()))
            }
            ReconError::UnknownStudent { .. } => (
                EXIT_NOT_FOUND,
                Some("use the student name exactly as uploaded".to_string()),
            ),
            ReconError::ConfigParse(_)
            | ReconError::ConfigValidation(_)
            | ReconError::UnknownErrorKind(_)
            | ReconError::EmptyErrorFilter => (EXIT_USAGE, None),
        };
        Self { code, message: err.to_string(), hint }
    }

    pub fn read(err: tuition_io::ReadError) -> Self {
        use tuition_io::ReadError;
        let code = match &err {
            ReadError::NotFound(_) | ReadError::Io(_) | ReadError::Export(_) => EXIT_IO,
            ReadError::UnsupportedFormat(_) => EXIT_USAGE,
            ReadError::Workbook(_) | ReadError::NoSheets | ReadError::Csv(_) => {
                crate::exit_codes::EXIT_PARSE
            }
        };
        Self { code, message: err.to_string(), hint: None }
    }
}
