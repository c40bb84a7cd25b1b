use anyhow::{Context, Result};
use hostplan::{Compilation, Configuration};
use std::fs;
use std::path::Path;

/// Read, parse and validate a host configuration file
pub fn load(path: &Path) -> Result<Configuration> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config = Configuration::from_toml_str(&content)
        .with_context(|| format!("Invalid config: {}", path.display()))?;
    log::debug!("loaded config from {}", path.display());
    Ok(config)
}

/// Load and compile in one step
pub fn compile(path: &Path) -> Result<(Configuration, Compilation)> {
    let config = load(path)?;
    let compilation = hostplan::compile(&config)
        .with_context(|| format!("Failed to compile {}", path.display()))?;
    Ok((config, compilation))
}
