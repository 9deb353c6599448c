//! Configuration view and validation commands: `cardboard config`.

use anyhow::Result;

use cardboard::config::{CardboardConfig, CardboardToml, DATA_ENV, LOG_FORMAT_ENV};

use super::super::ConfigCommands;

pub fn cmd_config(config: &CardboardConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config.config_file();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Cardboard Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
                println!();
                let toml = CardboardToml::load(&config_path)?;
                print_sections(&toml);
            } else {
                println!("No cardboard.toml found at {}", config_path.display());
                println!();
                println!("Using default configuration:");
                print_sections(&CardboardToml::default());
                println!("Run 'cardboard init' to create a cardboard.toml file.");
                println!();
            }

            println!("Effective values (with env/CLI overrides):");
            println!("  data_file = \"{}\"", config.data_file().display());
            println!("  log.format = \"{}\"", config.log_format());
            println!("  log.level = \"{}\"", config.log_level());
            for var in [DATA_ENV, LOG_FORMAT_ENV] {
                if let Ok(value) = std::env::var(var) {
                    println!("  ({} = \"{}\")", var, value);
                }
            }
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No cardboard.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = CardboardToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
    }

    Ok(())
}

fn print_sections(toml: &CardboardToml) {
    println!("[board]");
    println!("  title = \"{}\"", toml.board.title);
    println!();
    println!("[gateway]");
    println!("  data_file = \"{}\"", toml.gateway.data_file.display());
    println!();
    println!("[log]");
    println!("  format = \"{}\"", toml.log.format);
    if let Some(level) = &toml.log.level {
        println!("  level = \"{}\"", level);
    }
    println!();
}
