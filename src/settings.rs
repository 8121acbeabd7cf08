use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ocr::{EngineLifecycle, EngineOptions};

pub const DEFAULT_MAX_SIDE: u32 = 1000;

/// Repository `settings.toml`, applied as the first layer.
const BUILTIN_SETTINGS: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/settings.toml"));

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_addr: String,
    pub body_limit: usize,
    pub ocr_languages: Vec<String>,
    pub ocr_use_accelerator: bool,
    pub ocr_lifecycle: EngineLifecycle,
    pub ocr_max_side: u32,
    pub tesseract_path: String,
    pub tesseract_psm: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8000".to_string(),
            body_limit: 10 * 1024 * 1024,
            ocr_languages: vec!["eng".to_string()],
            ocr_use_accelerator: false,
            ocr_lifecycle: EngineLifecycle::Shared,
            ocr_max_side: DEFAULT_MAX_SIDE,
            tesseract_path: "tesseract".to_string(),
            tesseract_psm: 6,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    server: Option<ServerSettings>,
    ocr: Option<OcrSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
    body_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    languages: Option<Vec<String>>,
    use_accelerator: Option<bool>,
    lifecycle: Option<String>,
    max_side: Option<u32>,
    tesseract: Option<String>,
    psm: Option<u32>,
}

/// Loads settings from the layered TOML files.
///
/// The embedded repository defaults come first, then files are read in
/// order, later files overriding earlier ones: `./settings.toml`, `./settings.local.toml`, `~/.ocr-decoder/settings.toml`,
/// `~/.ocr-decoder/settings.local.toml` and finally `extra_path`, which must
/// exist when given.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    settings
        .merge_toml(BUILTIN_SETTINGS)
        .context("failed to parse built-in settings")?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_toml(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            languages: self.ocr_languages.clone(),
            use_accelerator: self.ocr_use_accelerator,
            binary: self.tesseract_path.clone(),
            psm: self.tesseract_psm,
        }
    }

    fn merge_toml(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed)
    }

    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(server) = incoming.server {
            if let Some(addr) = server.addr {
                if !addr.trim().is_empty() {
                    self.server_addr = addr.trim().to_string();
                }
            }
            if let Some(limit) = server.body_limit {
                if limit > 0 {
                    self.body_limit = limit;
                }
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(languages) = ocr.languages {
                let languages = languages
                    .into_iter()
                    .map(|lang| lang.trim().to_string())
                    .filter(|lang| !lang.is_empty())
                    .collect::<Vec<_>>();
                if !languages.is_empty() {
                    self.ocr_languages = languages;
                }
            }
            if let Some(use_accelerator) = ocr.use_accelerator {
                self.ocr_use_accelerator = use_accelerator;
            }
            if let Some(lifecycle) = ocr.lifecycle {
                self.ocr_lifecycle = lifecycle.parse()?;
            }
            if let Some(max_side) = ocr.max_side {
                if max_side > 0 {
                    self.ocr_max_side = max_side;
                }
            }
            if let Some(binary) = ocr.tesseract {
                if !binary.trim().is_empty() {
                    self.tesseract_path = binary.trim().to_string();
                }
            }
            if let Some(psm) = ocr.psm {
                if psm > 13 {
                    return Err(anyhow!("ocr.psm must be between 0 and 13 (got {})", psm));
                }
                self.tesseract_psm = psm;
            }
        }
        Ok(())
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".ocr-decoder"))
        }
    })
}
