//! Macro storage - one pretty-printed JSON document per data directory
//!
//! The previous document is copied to `macros.json.bak` before every write.

use macrowing_core::settings::{data_dir, MACROS_FILE};
use macrowing_core::{Error, Macro, Result};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Tag every export file carries
pub const EXPORT_TAG: &str = "macrowing_export";
pub const FORMAT_VERSION: u32 = 1;

pub struct MacroStorage {
    path: PathBuf,
}

impl MacroStorage {
    /// Storage in the application data directory
    pub fn new() -> Result<Self> {
        Ok(Self {
            path: data_dir()?.join(MACROS_FILE),
        })
    }

    pub fn with_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        self.path.with_extension("json.bak")
    }

    /// Missing or corrupt document gives an empty list; undecodable
    /// macros are skipped
    pub fn load_all(&self) -> Vec<Macro> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Cannot read {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };
        let doc: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                warn!("Corrupt macro file {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        let entries = match doc.get("macros") {
            Some(Value::Array(entries)) => entries.clone(),
            _ => Vec::new(),
        };
        let macros: Vec<Macro> = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Macro>(entry) {
                Ok(m) => Some(m),
                Err(e) => {
                    warn!("Skipping undecodable macro: {}", e);
                    None
                }
            })
            .collect();
        debug!("Loaded {} macros from {}", macros.len(), self.path.display());
        macros
    }

    pub fn save_all(&self, macros: &[Macro]) -> Result<()> {
        let doc = json!({
            "macros": serde_json::to_value(macros)?,
            "version": FORMAT_VERSION,
            "updated_at": chrono::Local::now().to_rfc3339(),
        });
        if self.path.exists() {
            fs::copy(&self.path, self.backup_path())?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&doc)?)?;
        info!("Saved {} macros to {}", macros.len(), self.path.display());
        Ok(())
    }

    /// Insert or replace by id
    pub fn save_macro(&self, mac: &Macro) -> Result<()> {
        let mut macros = self.load_all();
        match macros.iter_mut().find(|m| m.id() == mac.id()) {
            Some(existing) => *existing = mac.clone(),
            None => macros.push(mac.clone()),
        }
        self.save_all(&macros)
    }

    pub fn delete_macro(&self, id: &str) -> Result<bool> {
        let mut macros = self.load_all();
        let before = macros.len();
        macros.retain(|m| m.id() != id);
        if macros.len() == before {
            return Ok(false);
        }
        self.save_all(&macros)?;
        Ok(true)
    }

    pub fn get_macro(&self, id: &str) -> Option<Macro> {
        self.load_all().into_iter().find(|m| m.id() == id)
    }

    pub fn export_macro(&self, mac: &Macro, path: impl AsRef<Path>) -> Result<()> {
        write_export(path.as_ref(), "macro", serde_json::to_value(mac)?)
    }

    pub fn export_all(&self, macros: &[Macro], path: impl AsRef<Path>) -> Result<()> {
        write_export(path.as_ref(), "macros", serde_json::to_value(macros)?)
    }

    /// Decode an export file. The stored set is never touched.
    pub fn import_file(&self, path: impl AsRef<Path>) -> Result<Vec<Macro>> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::from(e).with_suggestions(vec![path.display().to_string()]))?;
        self.import_str(&text)
    }

    pub fn import_str(&self, text: &str) -> Result<Vec<Macro>> {
        let doc: Value = serde_json::from_str(text)?;
        if doc.get("type").and_then(Value::as_str) != Some(EXPORT_TAG) {
            return Err(Error::invalid_format("Not a MacroWing export file")
                .with_suggestions(vec![format!("Expected \"type\": \"{}\"", EXPORT_TAG)]));
        }

        let mut imported = Vec::new();
        if let Some(single) = doc.get("macro") {
            imported.push(serde_json::from_value::<Macro>(single.clone())?);
        }
        if let Some(many) = doc.get("macros") {
            imported.extend(serde_json::from_value::<Vec<Macro>>(many.clone())?);
        }
        info!("Imported {} macros", imported.len());
        Ok(imported)
    }
}

fn write_export(path: &Path, key: &str, payload: Value) -> Result<()> {
    let mut doc = json!({
        "type": EXPORT_TAG,
        "version": FORMAT_VERSION,
        "exported_at": chrono::Local::now().to_rfc3339(),
    });
    doc[key] = payload;
    fs::write(path, serde_json::to_string_pretty(&doc)?)?;
    info!("Exported to {}", path.display());
    Ok(())
}
