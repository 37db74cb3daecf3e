//! `config.toml` resolution.
//!
//! All paths default to files under `$VOUCH_HOME` (`~/.vouch`). Relative
//! paths inside a config file resolve against the file's directory.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use vouch_core::Actor;

pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_DATABASE: &str = "vouch.duckdb";
pub const DEFAULT_CATALOG: &str = "catalog.json";

/// On-disk shape of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    database: Option<PathBuf>,
    catalog: Option<PathBuf>,
    actor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub home: PathBuf,
    pub config_path: PathBuf,
    pub config_loaded: bool,
    pub database: PathBuf,
    pub catalog: PathBuf,
    pub actor: Option<String>,
}

impl Settings {
    /// Resolve settings from an explicit `--config`, or `$VOUCH_HOME/config.toml`
    /// when present. An explicit path that does not exist is an error.
    pub fn resolve(home: &Path, explicit: Option<&Path>, actor: Option<String>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => home.join(CONFIG_FILE),
        };

        let (file, base, config_loaded) = if config_path.exists() {
            let text = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            let file: ConfigFile = toml::from_str(&text)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?;
            let base = config_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| home.to_path_buf());
            (file, base, true)
        } else if explicit.is_some() {
            bail!("Config file not found: {}", config_path.display());
        } else {
            (ConfigFile::default(), home.to_path_buf(), false)
        };

        let under = |path: Option<PathBuf>, default: &str| match path {
            Some(p) if p.is_absolute() => p,
            Some(p) => base.join(p),
            None => home.join(default),
        };

        Ok(Self {
            home: home.to_path_buf(),
            config_path,
            config_loaded,
            database: under(file.database, DEFAULT_DATABASE),
            catalog: under(file.catalog, DEFAULT_CATALOG),
            actor: actor.or(file.actor).filter(|a| !a.trim().is_empty()),
        })
    }

    pub fn database_url(&self) -> String {
        format!("duckdb:{}", self.database.display())
    }

    /// The acting identity for write commands.
    pub fn actor(&self) -> Result<Actor> {
        match &self.actor {
            Some(id) => Ok(Actor::new(id.clone())),
            None => bail!("No actor configured: pass --actor or set `actor` in {}", CONFIG_FILE),
        }
    }
}
