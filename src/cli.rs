//! Command-line surface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{loader, ConfigError, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "tinyserver")]
#[command(about = "Minimal TCP listener with optional mutual TLS", long_about = None)]
pub struct Cli {
    /// Serve plain text instead of TLS
    #[arg(long)]
    pub no_tls: bool,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on (overrides the configuration file)
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl Cli {
    /// Build the effective configuration: file (or defaults), then flags, then validation.
    pub fn resolve_config(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => loader::load_config(path)?,
            None => ServerConfig::default(),
        };
        self.apply(&mut config);
        loader::ensure_valid(&config)?;
        Ok(config)
    }

    /// Apply flag overrides to `config`.
    pub fn apply(&self, config: &mut ServerConfig) {
        if self.no_tls {
            config.tls.enabled = false;
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn tls_is_on_without_flag() {
        let cli = Cli::try_parse_from(["tinyserver"]).unwrap();
        let config = cli.resolve_config().unwrap();
        assert!(config.tls.enabled);
        assert_eq!(config.listener.port, 8080);
    }

    #[test]
    fn no_tls_flag_disables_security() {
        let cli = Cli::try_parse_from(["tinyserver", "--no-tls"]).unwrap();
        assert!(!cli.resolve_config().unwrap().tls.enabled);
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener]\nport = 9000\n\n[tls]\nenabled = true").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let cli =
            Cli::try_parse_from(["tinyserver", "--config", &path, "--no-tls", "--port", "9100"])
                .unwrap();
        let config = cli.resolve_config().unwrap();
        assert!(!config.tls.enabled);
        assert_eq!(config.listener.port, 9100);
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(Cli::try_parse_from(["tinyserver", "--verbose"]).is_err());
    }
}
