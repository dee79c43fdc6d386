//! Configuration for lcva.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (LCVA_HOME, LCVA_CACHE_DIR, SUPABASE_URL, SUPABASE_ANON_KEY)
//! 2. Config file (.lcva/config.yaml)
//! 3. Defaults (~/.lcva, platform cache dir)
//!
//! Config file discovery:
//! - Searches current directory and parents for .lcva/config.yaml
//! - Paths in config file are relative to the project root (parent of .lcva/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::backend::SupabaseConfig;
use crate::cache::{MediaKind, MemoryLimits};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const MIB: u64 = 1024 * 1024;

pub const ENV_HOME: &str = "LCVA_HOME";
pub const ENV_CACHE_DIR: &str = "LCVA_CACHE_DIR";
pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub backend: Option<BackendConfig>,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to project root)
    pub home: Option<String>,
    /// Cache root (relative to project root)
    pub cache: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
    pub image: Option<TierConfig>,
    pub video: Option<TierConfig>,
    pub audio: Option<TierConfig>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TierConfig {
    pub max_entries: Option<u64>,
    pub max_bytes: Option<u64>,
}

impl TierConfig {
    fn resolve(self, default: MemoryLimits) -> MemoryLimits {
        MemoryLimits::new(
            self.max_entries.unwrap_or(default.max_entries),
            self.max_bytes.unwrap_or(default.max_bytes),
        )
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// Root holding the per-kind cache directories
    pub cache_root: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Content store settings
    pub backend: BackendSettings,
    /// Memory tier bounds per media kind
    pub memory: MemorySettings,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySettings {
    pub image: MemoryLimits,
    pub video: MemoryLimits,
    pub audio: MemoryLimits,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            image: MemoryLimits::new(200, 64 * MIB),
            video: MemoryLimits::new(20, 256 * MIB),
            audio: MemoryLimits::new(50, 128 * MIB),
        }
    }
}

impl MemorySettings {
    fn from_file(cache: Option<&CacheConfig>) -> Self {
        let defaults = Self::default();
        let Some(cache) = cache else {
            return defaults;
        };

        Self {
            image: cache.image.unwrap_or_default().resolve(defaults.image),
            video: cache.video.unwrap_or_default().resolve(defaults.video),
            audio: cache.audio.unwrap_or_default().resolve(defaults.audio),
        }
    }
}

impl ResolvedConfig {
    /// Memory bounds for one media kind
    pub fn memory_limits(&self, kind: MediaKind) -> MemoryLimits {
        match kind {
            MediaKind::Image => self.memory.image,
            MediaKind::Video => self.memory.video,
            MediaKind::Audio => self.memory.audio,
        }
    }

    /// Directory of one cache namespace
    pub fn cache_dir(&self, kind: MediaKind) -> PathBuf {
        self.cache_root.join(kind.dir_name())
    }

    /// Request timeout for the content store and media downloads
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_seconds)
    }

    /// Supabase connection settings; fails when credentials are missing
    pub fn supabase(&self) -> Result<SupabaseConfig> {
        let url = self.backend.url.clone().with_context(|| {
            format!("Backend URL not configured (set {} or backend.url)", ENV_SUPABASE_URL)
        })?;
        let anon_key = self.backend.anon_key.clone().with_context(|| {
            format!(
                "Backend anon key not configured (set {} or backend.anon_key)",
                ENV_SUPABASE_ANON_KEY
            )
        })?;

        Ok(SupabaseConfig { url, anon_key })
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".lcva").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Resolve configuration starting the file search at `cwd`, reading the
/// environment through `env`
fn load_config_from(cwd: &Path, env: impl Fn(&str) -> Option<String>) -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".lcva");

    let config_file = find_config_file(cwd);
    let file = config_file.as_deref().map(load_config_file).transpose()?;

    // Project root is the parent of .lcva/
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));

    let home = if let Some(env_home) = env(ENV_HOME) {
        PathBuf::from(env_home)
    } else if let Some(home_path) = file.as_ref().and_then(|f| f.paths.home.as_deref()) {
        resolve_path(base_dir, home_path)
    } else {
        default_home
    };

    let cache_root = if let Some(env_cache) = env(ENV_CACHE_DIR) {
        PathBuf::from(env_cache)
    } else if let Some(cache_path) = file.as_ref().and_then(|f| f.paths.cache.as_deref()) {
        resolve_path(base_dir, cache_path)
    } else {
        dirs::cache_dir()
            .map(|d| d.join("lcva"))
            .unwrap_or_else(|| home.join("cache"))
    };

    let file_backend = file
        .as_ref()
        .and_then(|f| f.backend.clone())
        .unwrap_or_default();
    let backend = BackendSettings {
        url: env(ENV_SUPABASE_URL).or(file_backend.url),
        anon_key: env(ENV_SUPABASE_ANON_KEY).or(file_backend.anon_key),
        timeout_seconds: file_backend
            .timeout_seconds
            .unwrap_or(BackendSettings::default().timeout_seconds),
    };

    let memory = MemorySettings::from_file(file.as_ref().and_then(|f| f.cache.as_ref()));

    Ok(ResolvedConfig {
        home,
        cache_root,
        config_file,
        backend,
        memory,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    load_config_from(&cwd, |name| std::env::var(name).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(root: &Path, yaml: &str) -> PathBuf {
        let lcva_dir = root.join(".lcva");
        std::fs::create_dir_all(&lcva_dir).unwrap();

        let config_path = lcva_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "{}", yaml).unwrap();
        config_path
    }

    #[test]
    fn test_defaults_without_file() {
        let temp = TempDir::new().unwrap();
        let config = load_config_from(temp.path(), no_env).unwrap();

        let expected_home = dirs::home_dir().unwrap().join(".lcva");
        assert_eq!(config.home, expected_home);
        assert!(config.config_file.is_none());
        assert_eq!(config.backend.timeout_seconds, 30);
        assert!(config.backend.url.is_none());
        assert_eq!(config.memory, MemorySettings::default());
        assert_eq!(config.memory_limits(MediaKind::Video).max_entries, 20);
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            temp.path(),
            r#"
version: "1.0"
paths:
  home: ./state
  cache: ./media
backend:
  url: https://abc.supabase.co
  anon_key: KEY
  timeout_seconds: 5
cache:
  image:
    max_entries: 10
"#,
        );

        let file = load_config_file(&config_path).unwrap();
        assert_eq!(file.version, "1.0");
        assert_eq!(file.paths.cache, Some("./media".to_string()));

        let config = load_config_from(temp.path(), no_env).unwrap();
        assert_eq!(config.config_file.as_deref(), Some(config_path.as_path()));
        assert!(config.cache_root.ends_with("media"));
        assert_eq!(config.cache_dir(MediaKind::Audio), config.cache_root.join("audio_cache"));
        assert_eq!(config.timeout(), Duration::from_secs(5));

        // Only the overridden bound changes
        assert_eq!(config.memory.image.max_entries, 10);
        assert_eq!(config.memory.image.max_bytes, 64 * MIB);

        let supabase = config.supabase().unwrap();
        assert_eq!(supabase.url, "https://abc.supabase.co");
    }

    #[test]
    fn test_config_found_from_subdirectory() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "version: \"1.0\"");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let config = load_config_from(&nested, no_env).unwrap();
        assert!(config.config_file.is_some());
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            r#"
version: "1.0"
paths:
  cache: ./media
backend:
  url: https://file.example
"#,
        );

        let env: HashMap<&str, &str> = [
            (ENV_CACHE_DIR, "/tmp/lcva-cache"),
            (ENV_SUPABASE_URL, "https://env.example"),
            (ENV_SUPABASE_ANON_KEY, "ENVKEY"),
        ]
        .into_iter()
        .collect();

        let config =
            load_config_from(temp.path(), |name| env.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(config.cache_root, PathBuf::from("/tmp/lcva-cache"));
        assert_eq!(config.backend.url.as_deref(), Some("https://env.example"));
        assert_eq!(config.backend.anon_key.as_deref(), Some("ENVKEY"));
    }

    #[test]
    fn test_missing_credentials_fail_lazily() {
        let temp = TempDir::new().unwrap();
        let config = load_config_from(temp.path(), no_env).unwrap();

        let err = config.supabase().unwrap_err();
        assert!(err.to_string().contains(ENV_SUPABASE_URL));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
