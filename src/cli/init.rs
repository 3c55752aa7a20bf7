use std::path::PathBuf;
use warden::config::{default_config_path, default_store_path, WardenConfig};

/// Write a default configuration file
///
/// Refuses to replace an existing file unless `force` is set.
pub fn execute(
    config_path: Option<String>,
    store_path: Option<String>,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let store_path = store_path
        .map(PathBuf::from)
        .unwrap_or_else(default_store_path);

    if config_path.exists() && !force {
        return Err(format!(
            "Config file '{}' already exists (use --force to overwrite)",
            config_path.display()
        )
        .into());
    }

    WardenConfig::create_default(&config_path, &store_path)?;

    println!("📝 Created configuration: {}", config_path.display());
    println!("   Store: {}", store_path.display());
    println!();
    println!("Edit the guild, role and channel ids before running warden.");

    Ok(())
}
