//! Library side of the `tessera` command line driver

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use tessera_core::ModuleSet;
use tessera_emitter::{Emitter, EmitterConfig, EmitterResult, EmitterStats};

/// Read a JSON module set
pub fn load_module_set(path: &Path) -> Result<ModuleSet> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read module set: {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse module set JSON: {:?}", path))
}

/// Read and validate a TOML emitter config, or use the defaults
pub fn load_config(path: Option<&Path>) -> Result<EmitterConfig> {
    let config: EmitterConfig = match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config TOML: {:?}", path))?
        }
        None => EmitterConfig::default(),
    };
    config.validate().context("Invalid emitter configuration")?;
    Ok(config)
}

pub fn format_stats(stats: &EmitterStats) -> String {
    format!(
        "classes: {} reused, {} invalidated; methods: {} reused, {} invalidated",
        stats.classes_reused,
        stats.classes_invalidated,
        stats.methods_reused,
        stats.methods_invalidated
    )
}

/// Human readable outline of a run: stats, then one line per statement
pub fn format_report(result: &EmitterResult) -> String {
    let mut lines = vec![
        format!("passes: {}", result.passes),
        format_stats(&result.stats),
    ];
    if !result.dangerous_global_refs.is_empty() {
        lines.push(format!("dangerous globals: {}", result.dangerous_global_refs));
    }
    for (id, module) in &result.modules {
        lines.push(format!("module {}:", id));
        lines.extend(module.trees().map(|tree| format!("  {}", tree.outline())));
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Emit one module set, returning the report or the full result as JSON
pub fn run_emit(input: &Path, config: Option<&Path>, dump: bool) -> Result<String> {
    let config = load_config(config)?;
    let modules = load_module_set(input)?;
    info!("Emitting {} modules from {:?}", modules.modules.len(), input);

    let mut emitter = Emitter::new(config);
    let result = emitter
        .emit(&modules)
        .with_context(|| format!("Failed to emit {:?}", input))?;

    if dump {
        serde_json::to_string_pretty(&result).context("Failed to serialize emitter result")
    } else {
        Ok(format_report(&result))
    }
}

/// Emit successive module sets with the same emitter, as an edit loop would
pub fn run_rerun<P: AsRef<Path>>(inputs: &[P], config: Option<&Path>) -> Result<Vec<EmitterStats>> {
    let mut emitter = Emitter::new(load_config(config)?);
    let mut stats = Vec::with_capacity(inputs.len());
    for (run, input) in inputs.iter().enumerate() {
        let input = input.as_ref();
        let modules = load_module_set(input)?;
        let result = emitter
            .emit(&modules)
            .with_context(|| format!("Run {} failed on {:?}", run + 1, input))?;
        info!("Run {}: {}", run + 1, format_stats(&result.stats));
        stats.push(result.stats);
    }
    Ok(stats)
}
