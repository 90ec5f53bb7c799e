//! Configuration file loading.

use relay_core::EngineConfig;
use std::fs;
use std::path::Path;

/// Configuration file looked up in the project directory.
pub const CONFIG_FILE: &str = "relay.config.json";

/// Loads the engine configuration for `project`.
///
/// An explicit `path` must exist. Otherwise [`CONFIG_FILE`] is read if
/// present, and defaults apply if not. A missing project id falls back to
/// the directory name.
pub fn load(
    project: &Path,
    path: Option<&Path>,
    project_id: Option<&str>,
) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => read(path)?,
        None => {
            let default = project.join(CONFIG_FILE);
            if default.exists() {
                read(&default)?
            } else {
                EngineConfig::default()
            }
        }
    };

    if let Some(id) = project_id {
        config.project_id = id.to_string();
    }
    if config.project_id.trim().is_empty() {
        config.project_id = std::path::absolute(project)?
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or("Project id required: set projectId or pass --project-id")?;
    }
    Ok(config)
}

fn read(path: &Path) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {:?}: {}", path, e))?;
    let config = serde_json::from_str(&text)
        .map_err(|e| format!("Invalid config {:?}: {}", path, e))?;
    Ok(config)
}
