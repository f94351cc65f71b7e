// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Config file persistence.

use std::path::Path;

use printdesk_core::AppConfig;
use printdesk_core::error::{PrintdeskError, Result};
use tracing::info;

pub const CONFIG_FILE: &str = "config.json";

/// Load the config at `path`, or write the defaults there on first run.
/// Missing fields take their default values.
pub fn load_or_init(path: &Path) -> Result<AppConfig> {
    let config = if path.exists() {
        let data = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&data)?;
        info!(path = %path.display(), "configuration loaded");
        config
    } else {
        let config = AppConfig::default();
        persist(path, &config)?;
        info!(path = %path.display(), "default configuration written");
        config
    };
    config.validate()?;
    Ok(config)
}

pub fn persist(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json).map_err(|e| {
        PrintdeskError::Config(format!("cannot write {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_run_writes_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = load_or_init(&path).expect("init");
        assert_eq!(config.printer_name, "Xerox_WorkCentre_3220");
        assert!(path.exists());

        let again = load_or_init(&path).expect("reload");
        assert_eq!(again.scanner.batch_limit, 50);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{ "printer_name": "Office", "booklet": { "sheets_per_signature": 4 } }"#)
            .expect("write");

        let config = load_or_init(&path).expect("load");
        assert_eq!(config.printer_name, "Office");
        assert_eq!(config.booklet.sheets_per_signature, 4);
        assert_eq!(config.booklet.single_signature_below_pages, 29);
        assert_eq!(config.max_file_size, 20 * 1024 * 1024);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{ "scanner": { "batch_limit": 0 } }"#).expect("write");
        assert!(matches!(load_or_init(&path), Err(PrintdeskError::Config(_))));
    }
}
