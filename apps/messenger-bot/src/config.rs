//! Service configuration: an optional YAML file overlaid by environment
//! variables.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use sos_core::MessengerCredentials;
use sos_nlu::DEFAULT_WIT_API_BASE;

pub const CONFIG_PATH_ENV: &str = "SOS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/default.yaml";

const DEFAULT_STATIC_DIR: &str = "public";
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_SEND_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration `{0}`")]
    Missing(&'static str),
    #[error("invalid value {value:?} for `{key}`: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_bw::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NluEngineKind {
    #[default]
    Wit,
    Keyword,
}

impl FromStr for NluEngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wit" => Ok(Self::Wit),
            "keyword" => Ok(Self::Keyword),
            other => Err(format!("expected `wit` or `keyword`, got `{other}`")),
        }
    }
}

/// Keys accepted in the YAML config file. Every key is optional here;
/// required values may come from the environment instead.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub wit_token: Option<String>,
    pub page_access_token: Option<String>,
    pub app_secret: Option<String>,
    pub validation_token: Option<String>,
    pub bind_addr: Option<IpAddr>,
    pub graph_api_base: Option<String>,
    pub wit_api_base: Option<String>,
    pub nlu_engine: Option<String>,
    pub static_dir: Option<PathBuf>,
    pub session_ttl_secs: Option<u64>,
    pub send_max_attempts: Option<u32>,
    pub http_timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml_bw::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Clone)]
pub struct BotConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub wit_token: String,
    pub credentials: MessengerCredentials,
    pub graph_api_base: Option<String>,
    pub wit_api_base: String,
    pub nlu_engine: NluEngineKind,
    pub static_dir: PathBuf,
    pub session_ttl: Duration,
    pub send_max_attempts: u32,
    pub http_timeout: Duration,
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("bind_addr", &self.bind_addr)
            .field("port", &self.port)
            .field("wit_token", &"<redacted>")
            .field("credentials", &self.credentials)
            .field("graph_api_base", &self.graph_api_base)
            .field("wit_api_base", &self.wit_api_base)
            .field("nlu_engine", &self.nlu_engine)
            .field("static_dir", &self.static_dir)
            .field("session_ttl", &self.session_ttl)
            .field("send_max_attempts", &self.send_max_attempts)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl BotConfig {
    /// Loads the file named by `SOS_CONFIG` (or `config/default.yaml` when it
    /// exists) and applies the process environment on top.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                default.exists().then_some(default)
            });
        let file = path.as_deref().map(FileConfig::load).transpose()?;
        Self::from_sources(file, &|key| std::env::var(key).ok())
    }

    /// Merges `file` with values from `env`; environment values win.
    pub fn from_sources(
        file: Option<FileConfig>,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();
        let text = |key: &str, fallback: Option<String>| {
            env(key).filter(|v| !v.trim().is_empty()).or(fallback)
        };

        let port = match env("PORT") {
            Some(raw) => parse("PORT", &raw)?,
            None => file.port.ok_or(ConfigError::Missing("PORT"))?,
        };
        let wit_token = text("WIT_TOKEN", file.wit_token).ok_or(ConfigError::Missing("WIT_TOKEN"))?;
        let page_access_token = text("FB_PAGE_TOKEN", file.page_access_token)
            .ok_or(ConfigError::Missing("FB_PAGE_TOKEN"))?;
        let app_secret =
            text("FB_APP_SECRET", file.app_secret).ok_or(ConfigError::Missing("FB_APP_SECRET"))?;
        let validation_token = text("FB_VALIDATION_TOKEN", file.validation_token)
            .ok_or(ConfigError::Missing("FB_VALIDATION_TOKEN"))?;

        let bind_addr = match env("BIND_ADDR") {
            Some(raw) => parse("BIND_ADDR", &raw)?,
            None => file
                .bind_addr
                .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        };
        let nlu_engine = match text("NLU_ENGINE", file.nlu_engine) {
            Some(raw) => parse("NLU_ENGINE", &raw)?,
            None => NluEngineKind::default(),
        };
        let session_ttl_secs = match env("SESSION_TTL_SECS") {
            Some(raw) => parse("SESSION_TTL_SECS", &raw)?,
            None => file.session_ttl_secs.unwrap_or(DEFAULT_SESSION_TTL_SECS),
        };
        let send_max_attempts: u32 = match env("SEND_MAX_ATTEMPTS") {
            Some(raw) => parse("SEND_MAX_ATTEMPTS", &raw)?,
            None => file.send_max_attempts.unwrap_or(DEFAULT_SEND_MAX_ATTEMPTS),
        };
        let http_timeout_secs = match env("HTTP_TIMEOUT_SECS") {
            Some(raw) => parse("HTTP_TIMEOUT_SECS", &raw)?,
            None => file.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            bind_addr,
            port,
            wit_token,
            credentials: MessengerCredentials {
                page_access_token,
                app_secret,
                validation_token,
            },
            graph_api_base: text("GRAPH_API_BASE", file.graph_api_base),
            wit_api_base: text("WIT_API_BASE", file.wit_api_base)
                .unwrap_or_else(|| DEFAULT_WIT_API_BASE.to_string()),
            nlu_engine,
            static_dir: env("STATIC_DIR")
                .map(PathBuf::from)
                .or(file.static_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
            session_ttl: Duration::from_secs(session_ttl_secs),
            send_max_attempts: send_max_attempts.max(1),
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("PORT", "5000"),
        ("WIT_TOKEN", "wit"),
        ("FB_PAGE_TOKEN", "page"),
        ("FB_APP_SECRET", "secret"),
        ("FB_VALIDATION_TOKEN", "verify"),
    ];

    #[test]
    fn required_values_from_env_with_defaults() {
        let cfg = BotConfig::from_sources(None, &env_from(REQUIRED)).unwrap();
        assert_eq!(cfg.listen_addr(), "0.0.0.0:5000".parse().unwrap());
        assert_eq!(cfg.credentials.page_access_token, "page");
        assert_eq!(cfg.credentials.app_secret, "secret");
        assert_eq!(cfg.credentials.validation_token, "verify");
        assert_eq!(cfg.wit_api_base, "https://api.wit.ai");
        assert_eq!(cfg.graph_api_base, None);
        assert_eq!(cfg.nlu_engine, NluEngineKind::Wit);
        assert_eq!(cfg.static_dir, PathBuf::from("public"));
        assert_eq!(cfg.session_ttl, Duration::from_secs(86_400));
        assert_eq!(cfg.send_max_attempts, 3);
        assert_eq!(cfg.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn each_required_value_is_reported_when_absent() {
        for (missing, _) in REQUIRED {
            let pairs: Vec<_> = REQUIRED.iter().copied().filter(|(k, _)| k != missing).collect();
            match BotConfig::from_sources(None, &env_from(&pairs)) {
                Err(ConfigError::Missing(name)) => assert_eq!(&name, missing),
                other => panic!("expected Missing({missing}), got {other:?}"),
            }
        }
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs.retain(|(k, _)| *k != "FB_APP_SECRET");
        pairs.push(("FB_APP_SECRET", "  "));
        let err = BotConfig::from_sources(None, &env_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("FB_APP_SECRET")));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.retain(|(k, _)| *k != "PORT");
        pairs.push(("PORT", "eighty"));
        let err = BotConfig::from_sources(None, &env_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("NLU_ENGINE", "gpt"));
        let err = BotConfig::from_sources(None, &env_from(&pairs)).unwrap_err();
        assert!(err.to_string().contains("NLU_ENGINE"));
    }

    #[test]
    fn file_values_are_overridden_by_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.yaml");
        std::fs::write(
            &path,
            r#"
port: 8080
wit_token: file-wit
page_access_token: file-page
app_secret: file-secret
validation_token: file-verify
nlu_engine: keyword
session_ttl_secs: 60
graph_api_base: "http://graph.local"
"#,
        )
        .unwrap();
        let file = FileConfig::load(&path).unwrap();

        let cfg = BotConfig::from_sources(
            Some(file),
            &env_from(&[("FB_PAGE_TOKEN", "env-page"), ("SEND_MAX_ATTEMPTS", "0")]),
        )
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.wit_token, "file-wit");
        assert_eq!(cfg.credentials.page_access_token, "env-page");
        assert_eq!(cfg.nlu_engine, NluEngineKind::Keyword);
        assert_eq!(cfg.session_ttl, Duration::from_secs(60));
        assert_eq!(cfg.graph_api_base.as_deref(), Some("http://graph.local"));
        assert_eq!(cfg.send_max_attempts, 1);
    }

    #[test]
    fn unknown_file_keys_fail_to_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.yaml");
        std::fs::write(&path, "prot: 80\n").unwrap();
        assert!(matches!(
            FileConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            FileConfig::load(&dir.path().join("absent.yaml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn debug_output_hides_tokens() {
        let cfg = BotConfig::from_sources(None, &env_from(REQUIRED)).unwrap();
        let rendered = format!("{cfg:?}");
        for value in ["\"wit\"", "\"page\"", "\"secret\"", "\"verify\""] {
            assert!(!rendered.contains(value), "{value} leaked");
        }
    }
}
