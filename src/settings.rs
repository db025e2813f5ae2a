use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{FinError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// Email of the user commands act on when `--user` is omitted.
    #[serde(default)]
    pub default_user: String,
    #[serde(default = "default_card_payment_patterns")]
    pub card_payment_patterns: Vec<String>,
    #[serde(default = "default_min_pattern_occurrences")]
    pub min_pattern_occurrences: i64,
    #[serde(default = "default_min_pattern_confidence")]
    pub min_pattern_confidence: f64,
}

fn default_card_payment_patterns() -> Vec<String> {
    [
        "PAGAMENTO FATURA",
        "PAGTO FATURA",
        "PGTO FATURA",
        "PAGAMENTO RECEBIDO",
        "PAGAMENTO EFETUADO",
        "PAGAMENTO CARTAO",
        "PAGTO CARTAO",
        "PGTO CARTAO",
        "PAG FATURA",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_min_pattern_occurrences() -> i64 {
    2
}

fn default_min_pattern_confidence() -> f64 {
    0.8
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            default_user: String::new(),
            card_payment_patterns: default_card_payment_patterns(),
            min_pattern_occurrences: default_min_pattern_occurrences(),
            min_pattern_confidence: default_min_pattern_confidence(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("finbook")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("finbook")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("ignoring unreadable settings at {}: {e}", path.display());
                Settings::default()
            }
        }
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| FinError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

pub fn db_path() -> PathBuf {
    get_data_dir().join("finbook.db")
}

/// Resolve the user a command acts on: explicit flag first, then the configured default.
pub fn resolve_user_email(explicit: Option<&str>) -> Result<String> {
    if let Some(email) = explicit {
        return Ok(email.to_string());
    }
    let settings = load_settings();
    if settings.default_user.is_empty() {
        return Err(FinError::Settings(
            "no --user given and no default_user configured".to_string(),
        ));
    }
    Ok(settings.default_user)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            default_user: "ana@example.com".to_string(),
            card_payment_patterns: vec!["PAGAMENTO FATURA".to_string()],
            min_pattern_occurrences: 3,
            min_pattern_confidence: 0.9,
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.default_user, "ana@example.com");
        assert_eq!(loaded.card_payment_patterns.len(), 1);
        assert_eq!(loaded.min_pattern_occurrences, 3);
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.default_user.is_empty());
        assert!(!s.data_dir.is_empty());
        assert!(s.card_payment_patterns.iter().any(|p| p == "PAGAMENTO FATURA"));
        assert_eq!(s.min_pattern_occurrences, 2);
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "default_user": "bia@example.com"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.default_user, "bia@example.com");
        assert!((s.min_pattern_confidence - 0.8).abs() < f64::EPSILON);
        assert!(!s.card_payment_patterns.is_empty());
    }
}
