use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Spring '83 board server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "spring83-server", version, about = "Spring '83 board server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "SPRING_PORT", default_value = "8083")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "SPRING_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./spring83.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "SPRING_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Directory holding board documents and their metadata
    #[arg(long, env = "SPRING_CONTENT_DIR", default_value = "./content")]
    pub content_dir: String,

    /// Hostname this server is reachable at, shown on the index page
    #[arg(long, env = "SPRING_FQDN", default_value = "localhost")]
    pub fqdn: String,

    /// Operator contact address, shown on the index page
    #[arg(long, env = "SPRING_CONTACT_EMAIL")]
    pub contact_email: Option<String>,

    /// Board lifecycle configuration (loaded from [boards] section in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub boards: Option<BoardsConfig>,
}

/// Timing knobs for the board engine. Protocol limits are not configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardsConfig {
    /// Interval in seconds between TTL sweeps (default: 660 = 11 minutes)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Upper bound in seconds on a single document read, write or delete (default: 5)
    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,
}

impl Default for BoardsConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            io_timeout_secs: default_io_timeout(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    660
}

fn default_io_timeout() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8083,
            bind_address: "0.0.0.0".to_string(),
            config: "./spring83.toml".to_string(),
            json_logs: false,
            generate_config: false,
            content_dir: "./content".to_string(),
            fqdn: "localhost".to_string(),
            contact_email: None,
            boards: None,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (SPRING_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("SPRING_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }

    /// Board settings with defaults filled in.
    pub fn boards(&self) -> BoardsConfig {
        self.boards.clone().unwrap_or_default()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Spring '83 Board Server Configuration
# Place this file at ./spring83.toml or specify with --config <path>
# All settings can be overridden via environment variables (SPRING_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8083)
# port = 8083

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Directory for board documents (<key>.html) and metadata (<key>.json)
# content_dir = "./content"

# Hostname this server is reachable at
# fqdn = "localhost"

# Operator contact address shown on the index page
# contact_email = "ops@example.com"

# ---- Board Lifecycle ----
# [boards]

# Interval in seconds between TTL sweeps (default: 660 = 11 minutes)
# sweep_interval_secs = 660

# Upper bound in seconds on a single storage operation (default: 5)
# io_timeout_secs = 5
"#
    .to_string()
}
