//! Initialize command.

use console::style;

use crate::config::Settings;

/// Prepare the data directory and write a starter config file.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let config_path = settings.config_path();
    if !config_path.exists() {
        let rendered = toml::to_string_pretty(settings)?;
        std::fs::write(&config_path, rendered)?;
        println!("  {} Wrote {}", style("✓").green(), config_path.display());
    }

    println!(
        "{} Initialized scenarium in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    Ok(())
}
