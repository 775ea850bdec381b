//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use portal_core::{Config, LocalBackend};

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "data_dir, local_backend, remote_url, remote_key, remote_enabled, \
                          trust_empty_remote, admin_emails, chat_endpoint, chat_model, chat_key";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "local_backend": config.local_backend,
                    "remote_url": config.remote_url,
                    "remote_key": config.remote_key.as_ref().map(|_| "(set)"),
                    "remote_enabled": config.remote_enabled,
                    "trust_empty_remote": config.trust_empty_remote,
                    "admin_emails": config.admin_emails,
                    "chat": {
                        "endpoint": config.chat.endpoint,
                        "model": config.chat.model,
                        "api_key": config.chat.api_key.as_ref().map(|_| "(set)"),
                        "temperature": config.chat.temperature
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:           {}", config.data_dir.display());
            println!(
                "  local_backend:      {}",
                match config.local_backend {
                    LocalBackend::File => "file",
                    LocalBackend::Sqlite => "sqlite",
                }
            );
            println!(
                "  remote_url:         {}",
                config.remote_url.as_deref().unwrap_or("(not set)")
            );
            println!("  remote_key:         {}", secret(&config.remote_key));
            println!("  remote_enabled:     {}", config.remote_enabled);
            println!("  trust_empty_remote: {}", config.trust_empty_remote);
            println!("  admin_emails:       {}", config.admin_emails.join(", "));
            println!("  chat_endpoint:      {}", config.chat.endpoint);
            println!("  chat_model:         {}", config.chat.model);
            println!("  chat_key:           {}", secret(&config.chat.api_key));
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match key.as_str() {
        "data_dir" => {
            config.data_dir = value.clone().into();
        }
        "local_backend" => {
            config.local_backend = value.parse::<LocalBackend>().map_err(anyhow::Error::msg)?;
        }
        "remote_url" => {
            config.remote_url = optional(&value);
        }
        "remote_key" => {
            config.remote_key = optional(&value);
        }
        "remote_enabled" => {
            config.remote_enabled = value
                .parse()
                .context("Invalid value for remote_enabled. Use 'true' or 'false'.")?;
        }
        "trust_empty_remote" => {
            config.trust_empty_remote = value
                .parse()
                .context("Invalid value for trust_empty_remote. Use 'true' or 'false'.")?;
        }
        "admin_emails" => {
            config.admin_emails = value
                .split(',')
                .map(|email| email.trim().to_string())
                .filter(|email| !email.is_empty())
                .collect();
        }
        "chat_endpoint" => {
            config.chat.endpoint = value.clone();
        }
        "chat_model" => {
            config.chat.model = value.clone();
        }
        "chat_key" => {
            config.chat.api_key = optional(&value);
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    let shown = if key.ends_with("_key") { "(hidden)" } else { value.as_str() };
    output.success(&format!("Set {} = {}", key, shown));

    Ok(())
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

fn secret(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "(set)"
    } else {
        "(not set)"
    }
}
