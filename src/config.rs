use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "surat-justifikasi.toml";
pub const CONFIG_ENV: &str = "SURAT_JUSTIFIKASI_CONFIG";

pub const DEFAULT_BIND: &str = "0.0.0.0:5000";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_TEMPLATE: &str = "template_surat_justifikasi.docx";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 16;
pub const DEFAULT_KEEP_JOBS: usize = 50;

const DEFAULT_CONFIG_TOML: &str = r#"[server]
bind = "0.0.0.0:5000"
# Uploads and generated letters, one sub-directory per request.
upload_dir = "uploads"
max_upload_mb = 16
# Finished jobs kept on disk; older ones are deleted.
keep_jobs = 50

[letter]
# Template with [NOMOR_SURAT], [NAMA_BARANG], ... placeholders.
# `surat-justifikasi --init-template <path>` writes a starter template.
template = "template_surat_justifikasi.docx"
"#;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub letter: LetterSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ServerSection {
    #[serde(default)]
    pub bind: Option<String>,
    /// Relative paths are resolved against the config file's directory.
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,
    #[serde(default)]
    pub max_upload_mb: Option<usize>,
    #[serde(default)]
    pub keep_jobs: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct LetterSection {
    #[serde(default)]
    pub template: Option<PathBuf>,
}

/// Values read from the environment (or `.env`). Neither is used by letter
/// generation; they are kept so deployments sharing one `.env` still load.
#[derive(Clone, Default)]
pub struct Secrets {
    pub secret_key: Option<String>,
    pub database_url: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Secrets")
            .field("secret_key", &redact(&self.secret_key))
            .field("database_url", &redact(&self.database_url))
            .finish()
    }
}

/// Fully resolved runtime settings.
#[derive(Clone, Debug)]
pub struct Settings {
    pub config_path: Option<PathBuf>,
    pub bind: String,
    pub upload_dir: PathBuf,
    pub template: PathBuf,
    pub max_upload_bytes: usize,
    /// Job directories kept after a successful upload, the newest included.
    pub keep_jobs: usize,
    pub secrets: Secrets,
}

impl Default for Settings {
    fn default() -> Self {
        Self::resolve(AppConfig::default(), None, |_| None)
    }
}

impl Settings {
    /// Loads `.env`, then the config file (explicit path, `SURAT_JUSTIFIKASI_CONFIG`,
    /// or the first `surat-justifikasi.toml` found upwards), then env overrides.
    pub fn load(explicit: Option<PathBuf>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let cfg_file = explicit
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(|| find_default_config(CONFIG_FILE_NAME));
        let mut file_cfg = AppConfig::default();
        if let Some(p) = cfg_file.as_ref() {
            if p.exists() {
                file_cfg = load_config(p)?;
            }
        }
        Ok(Self::resolve(file_cfg, cfg_file, |k| std::env::var(k).ok()))
    }

    pub fn resolve(
        cfg: AppConfig,
        config_path: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let env = |k: &str| env(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let config_dir = config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let relative_to_config = |p: PathBuf| {
            if p.is_relative() {
                config_dir.join(p)
            } else {
                p
            }
        };

        let bind = env("SURAT_BIND")
            .or(cfg.server.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let upload_dir = env("SURAT_UPLOAD_DIR")
            .map(PathBuf::from)
            .or_else(|| cfg.server.upload_dir.map(relative_to_config))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));
        let template = env("SURAT_TEMPLATE")
            .map(PathBuf::from)
            .or_else(|| cfg.letter.template.map(relative_to_config))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE));
        let max_upload_mb = cfg.server.max_upload_mb.unwrap_or(DEFAULT_MAX_UPLOAD_MB);

        Self {
            config_path,
            bind,
            upload_dir,
            template,
            max_upload_bytes: max_upload_mb.max(1) * 1024 * 1024,
            keep_jobs: cfg.server.keep_jobs.unwrap_or(DEFAULT_KEEP_JOBS).max(1),
            secrets: Secrets {
                secret_key: env("SECRET_KEY"),
                database_url: env("DATABASE_URL"),
            },
        }
    }

    pub fn ensure_upload_dir(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.upload_dir)
            .with_context(|| format!("create upload dir: {}", self.upload_dir.display()))
    }
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    let exe = std::env::current_exe().ok()?;
    find_file_upwards(exe.parent()?, filename, 4)
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parse config toml: {}", path.display()))
}

/// Writes a commented default config into `dir`. Existing files are kept
/// unless `force` is set.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILE_NAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_without_file_or_env() {
        let s = Settings::default();
        assert_eq!(s.bind, DEFAULT_BIND);
        assert_eq!(s.upload_dir, PathBuf::from(DEFAULT_UPLOAD_DIR));
        assert_eq!(s.template, PathBuf::from(DEFAULT_TEMPLATE));
        assert_eq!(s.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(s.keep_jobs, DEFAULT_KEEP_JOBS);
        assert!(s.secrets.secret_key.is_none());
    }

    #[test]
    fn file_paths_are_relative_to_config_and_env_wins() {
        let cfg: AppConfig = toml::from_str(
            "[server]\nupload_dir = \"data/up\"\nbind = \"127.0.0.1:9000\"\n[letter]\ntemplate = \"tpl.docx\"\n",
        )
        .expect("toml");
        let env: HashMap<&str, &str> =
            HashMap::from([("SURAT_BIND", "127.0.0.1:7000"), ("SECRET_KEY", "s3cret")]);
        let s = Settings::resolve(cfg, Some(PathBuf::from("/srv/app/surat-justifikasi.toml")), |k| {
            env.get(k).map(|v| v.to_string())
        });
        assert_eq!(s.bind, "127.0.0.1:7000");
        assert_eq!(s.upload_dir, PathBuf::from("/srv/app/data/up"));
        assert_eq!(s.template, PathBuf::from("/srv/app/tpl.docx"));
        assert_eq!(s.secrets.secret_key.as_deref(), Some("s3cret"));
        assert!(!format!("{:?}", s.secrets).contains("s3cret"));
    }

    #[test]
    fn init_config_writes_parseable_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = init_default_config(dir.path(), false).expect("init");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.server.max_upload_mb, Some(16));
        assert_eq!(cfg.server.keep_jobs, Some(DEFAULT_KEEP_JOBS));

        std::fs::write(&path, "[server]\nbind = \"x\"\n").expect("overwrite");
        init_default_config(dir.path(), false).expect("init again");
        assert_eq!(load_config(&path).expect("load").server.bind.as_deref(), Some("x"));
        init_default_config(dir.path(), true).expect("force");
        assert_eq!(
            load_config(&path).expect("load").server.bind.as_deref(),
            Some(DEFAULT_BIND)
        );
    }

    #[test]
    fn finds_config_in_parent_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "").expect("write");
        assert_eq!(
            find_file_upwards(&nested, CONFIG_FILE_NAME, 3),
            Some(dir.path().join(CONFIG_FILE_NAME))
        );
        assert_eq!(find_file_upwards(&nested, CONFIG_FILE_NAME, 1), None);
    }
}
