use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    pub json_logs: bool,
}

impl TelemetryConfig {
    pub fn from_env(default_service_name: &str, default_service_version: &str) -> Self {
        Self::from_lookup(default_service_name, default_service_version, |key| {
            env::var(key).ok()
        })
    }

    pub fn from_lookup(
        default_service_name: &str,
        default_service_version: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let service_name =
            lookup("SERVICE_NAME").unwrap_or_else(|| default_service_name.to_string());
        let json_logs = lookup("LOG_FORMAT")
            .map(|v| !matches!(v.to_lowercase().as_str(), "text" | "pretty" | "plain"))
            .unwrap_or(true);
        Self {
            service_name,
            service_version: default_service_version.to_string(),
            json_logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_logs_by_default() {
        let cfg = TelemetryConfig::from_lookup("sos-bot", "0.1.0", |_| None);
        assert!(cfg.json_logs);
        assert_eq!(cfg.service_name, "sos-bot");
    }

    #[test]
    fn human_formats_disable_json() {
        for format in ["text", "Pretty", "PLAIN"] {
            let cfg = TelemetryConfig::from_lookup("sos-bot", "0.1.0", |key| {
                (key == "LOG_FORMAT").then(|| format.to_string())
            });
            assert!(!cfg.json_logs, "{format}");
        }
        let cfg = TelemetryConfig::from_lookup("sos-bot", "0.1.0", |key| {
            (key == "LOG_FORMAT").then(|| "json".to_string())
        });
        assert!(cfg.json_logs);
    }
}
