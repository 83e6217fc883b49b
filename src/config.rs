use crate::utils::get_config_dir;
use serde::{Deserialize, Serialize};

/// Persisted session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the scratch table holding the validation chain and sets
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Whether engine mutations are recorded in the audit log
    #[serde(default = "default_true")]
    pub audit_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            audit_enabled: true,
        }
    }
}

fn default_table_name() -> String {
    "validator".to_string()
}

fn default_true() -> bool {
    true
}

/// Saves the config to disk using an atomic write pattern.
/// 1. Writes to a temporary file.
/// 2. Sets restrictive permissions (0o600).
/// 3. Atomically renames to the target path.
///
/// # Errors
///
/// Returns `Err` if the config directory is unavailable or the write fails.
///
/// # Async
/// Uses `tokio::fs` for non-blocking I/O.
pub async fn save_config(config: &AppConfig) -> std::io::Result<()> {
    if let Some(mut path) = get_config_dir() {
        let json = serde_json::to_string_pretty(config)?;

        let mut temp_path = path.clone();
        temp_path.push("config.json.tmp");

        path.push("config.json");

        // Create file with restrictive permissions from the start to prevent
        // race condition where file is briefly world-readable
        #[cfg(unix)]
        {
            use tokio::fs::OpenOptions;
            use tokio::io::AsyncWriteExt;

            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .mode(0o600) // Set permissions BEFORE any data is written
                .open(&temp_path)
                .await?;

            file.write_all(json.as_bytes()).await?;
            file.sync_all().await?; // Ensure data is flushed to physical media
        }

        #[cfg(not(unix))]
        {
            tokio::fs::write(&temp_path, &json).await?;
        }

        tokio::fs::rename(&temp_path, &path).await?;
    }

    Ok(())
}

/// Loads the config from disk, falling back to defaults when missing or
/// unreadable.
pub async fn load_config() -> AppConfig {
    let Some(mut path) = get_config_dir() else {
        return AppConfig::default();
    };
    path.push("config.json");

    match tokio::fs::read_to_string(&path).await {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Malformed config at {:?}, using defaults: {}", path, e);
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}
