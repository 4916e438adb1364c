use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Load `KEY=value` pairs from a `.env` file in the working directory.
/// Variables already present in the environment are left alone.
pub fn load_dotenv() {
    let Ok(content) = fs::read_to_string(Path::new(".env")) else {
        return;
    };

    for (key, value) in content.lines().filter_map(parse_env_line) {
        if std::env::var(key).is_err() {
            // SAFETY: only called from main before the tokio runtime is built
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (key, value) = line.split_once('=')?;
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.trim(), value))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub sync: SyncConfig,
}

/// Where the dashboard is served from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Page origin, e.g. `https://sensors.example.com`.
    pub origin: String,
    /// Path of the live channel endpoint on the origin.
    pub ws_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub reconnect_delay_secs: u64,
    pub age_refresh_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                origin: "http://localhost:8080".to_string(),
                ws_path: "/ws/".to_string(),
            },
            sync: SyncConfig::default(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: 5,
            age_refresh_secs: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(origin) = std::env::var("DASHBOARD_ORIGIN") {
            config.server.origin = origin;
        }
        if let Ok(path) = std::env::var("DASHBOARD_WS_PATH") {
            config.server.ws_path = path;
        }
        if let Ok(delay) = std::env::var("DASHBOARD_RECONNECT_DELAY_SECS")
            && let Ok(d) = delay.parse()
        {
            config.sync.reconnect_delay_secs = d;
        }
        if let Ok(refresh) = std::env::var("DASHBOARD_AGE_REFRESH_SECS")
            && let Ok(r) = refresh.parse()
        {
            config.sync.age_refresh_secs = r;
        }

        config
    }
}

impl ServerConfig {
    /// Base URL for REST calls, without a trailing slash.
    pub fn api_base(&self) -> String {
        self.origin.trim_end_matches('/').to_string()
    }

    /// Live channel URL. Secure pages get `wss`, everything else `ws`.
    ///
    /// Never fails: a malformed origin yields a URL the transport will
    /// refuse, which surfaces as a close event.
    pub fn ws_url(&self) -> String {
        let origin = self.origin.trim_end_matches('/');
        let (scheme, host) = match origin.split_once("://") {
            Some((scheme, host)) if scheme.eq_ignore_ascii_case("https") => ("wss", host),
            Some((_, host)) => ("ws", host),
            None => ("ws", origin),
        };

        let path = if self.ws_path.starts_with('/') {
            self.ws_path.clone()
        } else {
            format!("/{}", self.ws_path)
        };

        format!("{scheme}://{host}{path}")
    }
}

impl SyncConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn age_refresh_interval(&self) -> Duration {
        // A zero period would make tokio's interval panic.
        Duration::from_secs(self.age_refresh_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(origin: &str) -> ServerConfig {
        ServerConfig {
            origin: origin.to_string(),
            ws_path: "/ws/".to_string(),
        }
    }

    #[test]
    fn test_ws_url_follows_page_scheme() {
        assert_eq!(
            server("https://sensors.example.com").ws_url(),
            "wss://sensors.example.com/ws/"
        );
        assert_eq!(
            server("http://localhost:8080/").ws_url(),
            "ws://localhost:8080/ws/"
        );
    }

    #[test]
    fn test_ws_url_without_scheme() {
        assert_eq!(server("localhost:8080").ws_url(), "ws://localhost:8080/ws/");

        let mut cfg = server("http://pi.local");
        cfg.ws_path = "socket".to_string();
        assert_eq!(cfg.ws_url(), "ws://pi.local/socket");
    }

    #[test]
    fn test_api_base_strips_trailing_slash() {
        assert_eq!(server("https://x.io/").api_base(), "https://x.io");
    }

    #[test]
    fn test_parse_env_line() {
        assert_eq!(parse_env_line("A=b c"), Some(("A", "b c")));
        assert_eq!(parse_env_line(" B = \"quoted\" "), Some(("B", "quoted")));
        assert_eq!(parse_env_line("C='single'"), Some(("C", "single")));
        assert_eq!(parse_env_line("# comment"), None);
        assert_eq!(parse_env_line("no-equals"), None);
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.sync.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(cfg.sync.age_refresh_interval(), Duration::from_secs(60));
    }
}
