use std::time::Duration;

use anyhow::Result;
use clap_serde_derive::ClapSerde;

#[derive(ClapSerde, Debug)]
pub struct Config {
    /// The address the listener binds to
    #[default("0.0.0.0".to_string())]
    #[arg(short, long, env)]
    pub(crate) address: String,

    /// The port the listener binds to
    #[default(3001)]
    #[arg(short, long, env)]
    pub(crate) port: u16,

    /// OTLP collector endpoint, telemetry is only exported when set
    #[arg(long, env)]
    pub(crate) otlp_endpoint: Option<String>,

    /// Keep logging to the console while exporting to an OTLP collector
    #[arg(long, env)]
    pub(crate) console: bool,

    /// PEM certificate chain, HTTPS is served when set together with the key
    #[arg(long, env)]
    pub(crate) tls_cert_path: Option<String>,

    /// PEM private key for the certificate
    #[arg(long, env)]
    pub(crate) tls_key_path: Option<String>,

    /// Origin the watch pages are requested from
    #[default("https://www.youtube.com".to_string())]
    #[arg(long, env)]
    pub(crate) youtube_base_url: String,

    /// User-Agent sent to YouTube
    #[default(DEFAULT_USER_AGENT.to_string())]
    #[arg(long, env)]
    pub(crate) user_agent: String,

    /// Timeout in seconds for each upstream request
    #[default(30)]
    #[arg(long, env)]
    pub(crate) fetch_timeout: u64,

    /// Seconds in-flight requests get to finish after a shutdown signal
    #[default(10)]
    #[arg(long, env)]
    pub(crate) shutdown_timeout: u64,
}

pub(crate) const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/85.0.4183.83 Safari/537.36,gzip(gfe)";

impl Config {
    /// Reads the optional fields of a TOML file, missing keys keep their defaults.
    pub fn from_toml(path: &str) -> Result<<Self as ClapSerde>::Opt> {
        let str = std::fs::read_to_string(path)?;
        let opt = toml::from_str(&str)?;
        Ok(opt)
    }

    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_listen_on_3001() {
        let config = Config::default();
        assert_eq!(config.address, "0.0.0.0");
        assert_eq!(config.port, 3001);
        assert_eq!(config.youtube_base_url, "https://www.youtube.com");
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert!(config.otlp_endpoint.is_none());
        assert!(config.tls_paths().is_none());
    }

    #[test]
    fn toml_overrides_only_present_keys() {
        let opt: <Config as ClapSerde>::Opt =
            toml::from_str("port = 8080\nuser_agent = \"test-agent\"").unwrap();
        let config = Config::from(opt);
        assert_eq!(config.port, 8080);
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.address, "0.0.0.0");
    }

    #[test]
    fn tls_requires_both_paths() {
        let opt: <Config as ClapSerde>::Opt =
            toml::from_str("tls_cert_path = \"cert.pem\"").unwrap();
        let mut config = Config::from(opt);
        assert!(config.tls_paths().is_none());

        config.tls_key_path = Some("key.pem".to_string());
        assert_eq!(config.tls_paths(), Some(("cert.pem", "key.pem")));
    }
}
