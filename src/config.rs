//! Configuration management for bowtieacquire using the prefer crate.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::scrapers::{resolve_user_agent, BSEE_BASE_URL, CSB_BASE_URL};

/// Default data directory, relative to the working directory.
const DEFAULT_DATA_DIR: &str = "data";

pub const ACQUISITION_MANIFEST: &str = "incidents_manifest_v0.csv";
pub const TEXT_MANIFEST: &str = "text_manifest_v0.csv";
pub const STRUCTURED_MANIFEST: &str = "structured_manifest.csv";
const DEFAULT_BOWTIE_FILE: &str = "sample/bowtie_loc.json";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Delay between requests in milliseconds.
    pub request_delay_ms: u64,
    /// Concurrent PDF downloads.
    pub download_workers: usize,
    pub csb_base_url: String,
    pub bsee_base_url: String,
    /// Structured extraction provider settings.
    pub llm: LlmConfig,
    /// Prompt template override.
    pub prompt_path: Option<PathBuf>,
    /// Schema template override.
    pub schema_path: Option<PathBuf>,
    /// Reference bowtie for the analytics pass (default under `data_dir`).
    pub bowtie_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            user_agent: resolve_user_agent(None),
            request_timeout: 30,
            request_delay_ms: 500,
            download_workers: 4,
            csb_base_url: CSB_BASE_URL.to_string(),
            bsee_base_url: BSEE_BASE_URL.to_string(),
            llm: LlmConfig::default(),
            prompt_path: None,
            schema_path: None,
            bowtie_path: None,
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Acquisition and text manifests, plus PDFs and text per source.
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn acquisition_manifest(&self) -> PathBuf {
        self.raw_dir().join(ACQUISITION_MANIFEST)
    }

    pub fn text_manifest(&self) -> PathBuf {
        self.raw_dir().join(TEXT_MANIFEST)
    }

    /// Flat directory of text files fed to structured extraction.
    pub fn interim_text_dir(&self) -> PathBuf {
        self.data_dir.join("interim").join("text")
    }

    pub fn structured_dir(&self) -> PathBuf {
        self.data_dir.join("structured").join("incidents")
    }

    pub fn structured_manifest(&self) -> PathBuf {
        self.data_dir.join("structured").join(STRUCTURED_MANIFEST)
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    pub fn bowtie_path(&self) -> PathBuf {
        self.bowtie_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_BOWTIE_FILE))
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })
    }
}

/// Base URL override for one incident source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub csb: SourceConfig,
    #[serde(default)]
    pub bsee: SourceConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<String>,
}

/// Configuration file model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory (relative paths resolve against the config file).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Delay between requests in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_workers: Option<usize>,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bowtie_path: Option<String>,
    /// Path the config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover and load the config file, falling back to defaults.
    pub async fn load() -> Self {
        // Use prefer for file discovery, then parse with serde
        match prefer::load("bowtieacquire").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load a config file, choosing the format by extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory containing the config file.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Expand `~` and resolve relative paths against `base_dir`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply config file values over `settings`.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = resolve_user_agent(Some(user_agent));
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(delay) = self.request_delay_ms {
            settings.request_delay_ms = delay;
        }
        if let Some(workers) = self.download_workers {
            settings.download_workers = workers.max(1);
        }
        if let Some(ref url) = self.sources.csb.base_url {
            settings.csb_base_url = url.clone();
        }
        if let Some(ref url) = self.sources.bsee.base_url {
            settings.bsee_base_url = url.clone();
        }
        settings.llm = self.llm.clone();
        if let Some(ref path) = self.prompt.template_path {
            settings.prompt_path = Some(self.resolve_path(path, base_dir));
        }
        if let Some(ref path) = self.prompt.schema_path {
            settings.schema_path = Some(self.resolve_path(path, base_dir));
        }
        if let Some(ref path) = self.bowtie_path {
            settings.bowtie_path = Some(self.resolve_path(path, base_dir));
        }
    }
}

/// How to locate configuration.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file (`--config`).
    pub config_path: Option<PathBuf>,
    /// Resolve relative paths against the working directory instead of the
    /// config file's directory.
    pub use_cwd: bool,
    /// Data directory override (`--data`).
    pub data: Option<PathBuf>,
}

/// Look for a config file inside the data directory.
fn find_config_in_data_dir(data_dir: &Path) -> Option<PathBuf> {
    let extensions = ["json", "yaml", "yml", "toml"];
    let basenames = ["bowtieacquire", "config"];

    for basename in basenames {
        for ext in extensions {
            let path = data_dir.join(format!("{}.{}", basename, ext));
            if path.exists() {
                return Some(path);
            }
        }
    }
    None
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    }
}

/// Load config from file sources.
///
/// An explicit path that fails to load is an error; discovered files fall
/// back to defaults with a warning.
async fn load_file_config(
    options: &LoadOptions,
    data_dir_override: Option<&PathBuf>,
) -> Result<Config, String> {
    // Priority 1: Explicit --config flag
    if let Some(ref config_path) = options.config_path {
        return Config::load_from_path(config_path).await;
    }

    // Priority 2: Config inside the data dir
    if let Some(data_dir) = data_dir_override {
        if let Some(config_path) = find_config_in_data_dir(data_dir) {
            tracing::debug!("Found config in data dir: {}", config_path.display());
            return Ok(Config::load_from_path(&config_path).await.unwrap_or_else(|e| {
                tracing::warn!("{}", e);
                Config::default()
            }));
        }
    }

    // Priority 3: Auto-discover via prefer
    Ok(Config::load().await)
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
///
/// Precedence, lowest first: defaults, config file, environment
/// (`BOWTIE_DATA_DIR`, `BOWTIE_USER_AGENT`, `LLM_*`), `--data`.
pub async fn load_settings_with_options(options: LoadOptions) -> Result<(Settings, Config), String> {
    let data_dir_override = options.data.as_deref().map(absolute);

    let config = load_file_config(&options, data_dir_override.as_ref()).await?;

    let mut settings = Settings::default();

    // Determine base directory for resolving relative paths
    let base_dir = if options.use_cwd {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    } else {
        config
            .base_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    };

    config.apply_to_settings(&mut settings, &base_dir);
    settings.llm = settings.llm.clone().with_env_overrides();

    if let Some(dir) = std::env::var("BOWTIE_DATA_DIR").ok().filter(|s| !s.is_empty()) {
        tracing::debug!("Using BOWTIE_DATA_DIR from environment: {}", dir);
        settings.data_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
    }
    if let Ok(agent) = std::env::var("BOWTIE_USER_AGENT") {
        settings.user_agent = resolve_user_agent(Some(&agent));
    }

    // --data override takes precedence for data_dir
    if let Some(data_dir) = data_dir_override {
        settings.data_dir = data_dir;
    }

    Ok((settings, config))
}
