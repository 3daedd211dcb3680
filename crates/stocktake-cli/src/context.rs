//! Shared state for command execution
//!
//! Loads the configuration once and opens the record store on demand.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use stocktake_cache::{DatabasePool, SqliteAuditRepository};
use stocktake_core::config::Config;
use stocktake_core::domain::{StaffDirectory, StaffName};
use stocktake_core::usecases::AuditWorkflowUseCase;

pub struct AppContext {
    pub config_path: PathBuf,
    pub config: Config,
    /// Whether `config_path` existed when loading
    pub config_found: bool,
}

impl AppContext {
    /// Loads configuration from `explicit`, or from the default location
    ///
    /// An explicitly named file must exist and parse. The default file may
    /// be absent, in which case built-in defaults apply.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self> {
        match explicit {
            Some(path) => {
                let config = Config::load(&path)
                    .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
                Ok(Self {
                    config_path: path,
                    config,
                    config_found: true,
                })
            }
            None => {
                let path = Config::default_path();
                if path.exists() {
                    let config = Config::load(&path).with_context(|| {
                        format!("Failed to load configuration from {}", path.display())
                    })?;
                    Ok(Self {
                        config_path: path,
                        config,
                        config_found: true,
                    })
                } else {
                    Ok(Self {
                        config_path: path,
                        config: Config::default(),
                        config_found: false,
                    })
                }
            }
        }
    }

    /// Fails with every validation error when the configuration is unusable
    ///
    /// Commands that touch audits run only after this passes; `config`
    /// commands skip it so they can show and explain a broken file.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors = self.config.validate();
        if errors.is_empty() {
            return Ok(());
        }
        let listed: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!(
            "Invalid configuration in {}: {}",
            self.config_path.display(),
            listed.join("; ")
        )
    }

    /// Opens (creating if needed) the configured SQLite database
    pub async fn open_repository(&self) -> Result<Arc<SqliteAuditRepository>> {
        let db_path = self.config.database.resolved_path();
        let pool = DatabasePool::new(&db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
        Ok(Arc::new(SqliteAuditRepository::new(pool.pool().clone())))
    }

    pub fn workflow(&self, repository: Arc<SqliteAuditRepository>) -> Result<AuditWorkflowUseCase> {
        let supervisors = self
            .config
            .supervisor_roster()
            .context("Invalid staff.supervisors in configuration")?;
        Ok(AuditWorkflowUseCase::new(repository, supervisors))
    }

    /// Resolves a PIN to the staff member it belongs to
    pub fn resolve_pin(&self, pin: &str) -> Result<StaffName> {
        let directory: StaffDirectory = self
            .config
            .staff_directory()
            .context("Invalid staff.pins in configuration")?;
        match directory.resolve(pin) {
            Some(name) => Ok(name.clone()),
            None => anyhow::bail!("Unknown PIN"),
        }
    }
}
