//! Command-line interface.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use regex::Regex;
use std::path::PathBuf;
use toolgate_core::GateConfig;
use toolgate_core::config::LogFormat;
use toolgate_openapi::{EngineOptions, ExtractMode, ToolNameFormat};

#[derive(Debug, Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to toolgate.toml in this or a parent directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// OpenAPI document: file path or http(s) URL
    #[arg(short, long, global = true)]
    pub spec: Option<String>,

    /// Base URL used instead of the document's servers
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Upstream request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Tool name format: as-is, snake, lower, upper
    #[arg(long, global = true)]
    pub name_format: Option<String>,

    /// Prefix added to every tool name
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    /// Keep only operations whose summary or description matches
    #[arg(long, global = true)]
    pub include: Option<String>,

    /// Drop operations whose summary or description matches
    #[arg(long, global = true)]
    pub exclude: Option<String>,

    /// Run PUT/POST/DELETE/PATCH without asking for confirmation
    #[arg(long, global = true)]
    pub no_confirm: bool,

    /// Fail on spec defects instead of repairing them
    #[arg(long, global = true)]
    pub strict: bool,

    /// Register tools without executing any request
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check the document for defects and report them
    Validate,

    /// Print every tool with its description and tags
    List,

    /// Print input schemas and usage examples
    Describe {
        /// Only this tool
        tool: Option<String>,
    },

    /// Call one tool and print the result envelope
    Call {
        tool: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },

    /// Serve the tools over HTTP or stdio
    Serve {
        #[arg(short, long, value_enum, default_value_t = Transport::Http)]
        transport: Transport,

        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    Http,
    Stdio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl Cli {
    /// Layer command-line flags on top of file and environment values.
    pub fn apply(&self, config: &mut GateConfig) {
        if let Some(spec) = &self.spec {
            config.spec.path = Some(spec.clone());
        }
        if let Some(base_url) = &self.base_url {
            config.upstream.base_url = Some(base_url.clone());
        }
        if let Some(timeout) = self.timeout {
            config.upstream.timeout_secs = timeout;
        }
        if let Some(format) = &self.name_format {
            config.tools.name_format = format.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.tools.prefix = Some(prefix.clone());
        }
        if let Some(include) = &self.include {
            config.tools.include_desc_regex = Some(include.clone());
        }
        if let Some(exclude) = &self.exclude {
            config.tools.exclude_desc_regex = Some(exclude.clone());
        }
        if self.no_confirm {
            config.tools.confirm_dangerous = false;
        }
        if self.strict {
            config.tools.strict = true;
        }
        if self.dry_run {
            config.tools.dry_run = true;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.logging.format = match format {
                LogFormatArg::Text => LogFormat::Text,
                LogFormatArg::Json => LogFormat::Json,
            };
        }
        if let Command::Serve { host, port, .. } = &self.command {
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
        }
    }
}

/// Turn resolved configuration into engine options.
pub fn engine_options(config: &GateConfig) -> Result<EngineOptions> {
    let name_format = config
        .tools
        .name_format
        .parse::<ToolNameFormat>()
        .map_err(|e| anyhow!(e))?;

    let compile = |pattern: &Option<String>, what: &str| -> Result<Option<Regex>> {
        pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .with_context(|| format!("Invalid {what} pattern"))
    };

    Ok(EngineOptions {
        name_format,
        prefix: config.tools.prefix.clone(),
        confirm_dangerous: config.tools.confirm_dangerous,
        dry_run: config.tools.dry_run,
        timeout: config.timeout(),
        base_url: config.upstream.base_url.clone(),
        credentials: config.credentials().context("Invalid credentials")?,
        mode: if config.tools.strict {
            ExtractMode::Strict
        } else {
            ExtractMode::Lenient
        },
        include: compile(&config.tools.include_desc_regex, "include")?,
        exclude: compile(&config.tools.exclude_desc_regex, "exclude")?,
        executor: None,
        random: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "toolgate",
            "--spec",
            "./petstore.yaml",
            "--no-confirm",
            "--name-format",
            "snake",
            "serve",
            "--transport",
            "stdio",
            "--port",
            "9000",
        ])
        .unwrap();

        let mut config = GateConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.spec.path.as_deref(), Some("./petstore.yaml"));
        assert!(!config.tools.confirm_dangerous);
        assert_eq!(config.tools.name_format, "snake");
        assert_eq!(config.server.port, 9000);
        assert!(matches!(
            cli.command,
            Command::Serve {
                transport: Transport::Stdio,
                ..
            }
        ));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "toolgate",
            "call",
            "getPet",
            "--args",
            "{\"id\":1}",
            "--dry-run",
        ])
        .unwrap();
        let mut config = GateConfig::default();
        cli.apply(&mut config);
        assert!(config.tools.dry_run);
    }

    #[test]
    fn test_engine_options() {
        let mut config = GateConfig::test_defaults();
        config.tools.strict = true;
        config.tools.include_desc_regex = Some("(?i)pets".to_string());
        config.auth.basic = Some("alice:pw".to_string());

        let options = engine_options(&config).unwrap();
        assert_eq!(options.mode, ExtractMode::Strict);
        assert!(options.include.unwrap().is_match("List PETS"));
        assert_eq!(options.credentials.basic.unwrap().username, "alice");
        assert_eq!(options.base_url.as_deref(), Some("http://127.0.0.1:9"));
    }

    #[test]
    fn test_bad_settings_are_rejected() {
        let mut config = GateConfig::test_defaults();
        config.tools.name_format = "camel".to_string();
        assert!(engine_options(&config).is_err());

        let mut config = GateConfig::test_defaults();
        config.tools.exclude_desc_regex = Some("(".to_string());
        let err = engine_options(&config).err().unwrap();
        assert!(err.to_string().contains("exclude"));
    }
}
