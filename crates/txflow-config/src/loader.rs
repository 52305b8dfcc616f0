//! Configuration loader module for handling modular configuration files.
//!
//! A configuration may pull top-level sections from other files through an
//! `include` key. Sections must be unique across all files, and a file may be
//! loaded only once.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Configuration loader that handles multi-file configurations with includes.
pub struct ConfigLoader {
	base_path: PathBuf,
	/// Canonical paths already read.
	loaded_files: HashSet<PathBuf>,
	/// File each top-level section came from.
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads a configuration file, merges its includes and validates the result.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;
		let mut root = self.read_toml(&config_path).await?;

		let includes = match root.as_table_mut().and_then(|table| table.remove("include")) {
			Some(value) => include_paths(&value)?,
			None => Vec::new(),
		};

		self.record_sections(&root, &config_path)?;
		for include in includes {
			let include_path = self.resolve_path(&include)?;
			let included = self.read_toml(&include_path).await?;
			self.record_sections(&included, &include_path)?;

			if let (Some(target), toml::Value::Table(source)) = (root.as_table_mut(), included) {
				target.extend(source);
			}
		}

		let config = root.try_into::<Config>()?;
		config.validate()?;
		Ok(config)
	}

	/// Reads a file once, resolving environment variables before parsing.
	async fn read_toml(&mut self, path: &Path) -> Result<toml::Value, ConfigError> {
		let canonical_path = path.canonicalize().map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical_path.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical_path.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		let resolved = resolve_env_vars(&content)?;
		Ok(toml::from_str(&resolved)?)
	}

	fn record_sections(&mut self, value: &toml::Value, source: &Path) -> Result<(), ConfigError> {
		let Some(table) = value.as_table() else {
			return Ok(());
		};

		for key in table.keys() {
			if let Some(existing) = self.section_sources.get(key) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}. \
					Each top-level section must be unique across all configuration files.",
					key,
					existing.display(),
					source.display()
				)));
			}
			self.section_sources
				.insert(key.clone(), source.to_path_buf());
		}
		Ok(())
	}

	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}

/// `include` accepts a single path or an array of paths.
fn include_paths(value: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	match value {
		toml::Value::String(path) => Ok(vec![PathBuf::from(path)]),
		toml::Value::Array(items) => items
			.iter()
			.map(|item| {
				item.as_str().map(PathBuf::from).ok_or_else(|| {
					ConfigError::Validation("Include array must contain only strings".into())
				})
			})
			.collect(),
		_ => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}
