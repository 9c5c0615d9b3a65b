//! Drive the WinRM connector from the command line.
//!
//! Run with: cargo run -p winrm-cli -- --host win01 --user vagrant exec hostname
//!
//! Hosts are looked up in the inventory file first; anything not listed
//! there is addressed as `@winrm/<host>` with the flags given here.

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use winbridge_connector::{WinRmConnector, make_names_data};
use winbridge_core::{
    Connector, ExecutionRequest, HostIdentity, Inventory, Password, PrintOptions, ShellKind,
    TransportKind, UploadSource,
};

#[derive(Debug, Parser)]
#[command(name = "winrm-cli", version, about)]
struct Cli {
    /// Inventory file (TOML) with `[hosts."<name>"]` tables.
    #[arg(long, env = "WINRM_INVENTORY")]
    inventory: Option<PathBuf>,

    /// Inventory name or bare hostname.
    #[arg(long)]
    host: String,

    #[arg(long, env = "WINRM_USER")]
    user: Option<String>,

    #[arg(long, env = "WINRM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// plaintext or ssl.
    #[arg(long)]
    transport: Option<TransportKind>,

    /// Seconds to wait for a response.
    #[arg(long)]
    read_timeout: Option<u64>,

    /// Seconds the endpoint may spend on one operation.
    #[arg(long)]
    operation_timeout: Option<u64>,

    /// Do not echo commands and output.
    #[arg(long, short)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a command.
    Exec {
        /// ps (default) or cmd.
        #[arg(long, value_parser = parse_shell)]
        shell: Option<ShellKind>,
        /// KEY=VALUE, repeatable.
        #[arg(long = "env", value_parser = parse_env)]
        env: Vec<(String, String)>,
        /// Exit codes counted as success, repeatable. Defaults to 0.
        #[arg(long = "success-code", allow_hyphen_values = true)]
        success_codes: Vec<i32>,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Upload a local file.
    Put { local: PathBuf, remote: String },
    /// Print a host fact.
    Facts {
        #[command(subcommand)]
        fact: FactName,
    },
}

#[derive(Debug, Subcommand)]
enum FactName {
    /// Remote temp directory.
    TempDir,
    /// Installed winget packages.
    Winget,
}

fn parse_shell(s: &str) -> Result<ShellKind, String> {
    ShellKind::from_executable(s).ok_or_else(|| format!("unknown shell: {s}"))
}

fn parse_env(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))
}

impl Cli {
    fn identity(&self) -> Result<HostIdentity> {
        let inventory = match self.inventory.clone().or_else(Inventory::default_path) {
            Some(path) if path.exists() => Some(Inventory::load(&path)?),
            Some(path) if self.inventory.is_some() => {
                bail!("inventory {} does not exist", path.display())
            }
            _ => None,
        };
        self.identity_from(inventory.as_ref())
    }

    /// Inventory entry for `--host` if listed, else `@winrm/<host>`, with
    /// command-line flags applied on top.
    fn identity_from(&self, inventory: Option<&Inventory>) -> Result<HostIdentity> {
        let listed = match inventory {
            Some(inventory) if inventory.names().any(|name| name == self.host) => {
                Some(inventory.host(&self.host)?)
            }
            _ => None,
        };
        let (name, mut data) = match listed {
            Some(identity) => (identity.name().to_string(), identity.data().clone()),
            None => make_names_data(&self.host),
        };
        if let Some(user) = &self.user {
            data.winrm_user = Some(user.clone());
        }
        if let Some(password) = &self.password {
            data.password = Some(Password::new(password.clone()));
        }
        if let Some(port) = self.port {
            data.port = Some(port);
        }
        if let Some(transport) = self.transport {
            data.transport = transport;
        }
        if let Some(secs) = self.read_timeout {
            data.read_timeout_sec = secs;
        }
        if let Some(secs) = self.operation_timeout {
            data.operation_timeout_sec = secs;
        }
        Ok(HostIdentity::new(name, data))
    }

    const fn print(&self) -> PrintOptions {
        PrintOptions {
            print_input: !self.quiet,
            print_output: !self.quiet,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let identity = cli.identity()?;
    let host = identity.name().to_string();
    let mut connector = WinRmConnector::new(identity);
    connector
        .connect()
        .await
        .with_context(|| format!("connecting to {host}"))?;

    let ok = match &cli.command {
        Command::Exec {
            shell,
            env,
            success_codes,
            command,
        } => {
            let mut request = ExecutionRequest::new(command.join(" "));
            request.shell = *shell;
            request.env = env.iter().cloned().collect();
            if !success_codes.is_empty() {
                request.success_exit_codes = Some(success_codes.clone());
            }

            let result = connector.run_shell_command(&request, cli.print()).await?;
            if cli.quiet {
                for line in &result.stdout {
                    println!("{line}");
                }
                for line in &result.stderr {
                    eprintln!("{line}");
                }
            }
            tracing::info!(exit_code = result.exit_code, success = result.success, "{host}");
            result.success
        }
        Command::Put { local, remote } => {
            let uploaded = connector
                .put_file(UploadSource::Path(local.clone()), remote, cli.print())
                .await
                .with_context(|| format!("uploading {}", local.display()))?;
            if !uploaded {
                tracing::error!("Upload of {} to {host} failed", local.display());
            }
            uploaded
        }
        Command::Facts { fact } => {
            match fact {
                FactName::TempDir => println!("{}", connector.temp_dir().await?),
                FactName::Winget => {
                    let packages = connector
                        .get_fact(&winbridge_connector::WingetPackages)
                        .await?;
                    for (id, versions) in packages {
                        let versions: Vec<_> = versions.into_iter().collect();
                        println!("{id}\t{}", versions.join(", "));
                    }
                }
            }
            true
        }
    };

    if let Err(e) = connector.disconnect().await {
        tracing::debug!("Disconnect from {host}: {e}");
    }
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env() {
        assert_eq!(
            parse_env("A=b=c").unwrap(),
            ("A".to_string(), "b=c".to_string())
        );
        assert!(parse_env("=x").is_err());
        assert!(parse_env("novalue").is_err());
    }

    #[test]
    fn test_exec_arguments() {
        let cli = Cli::try_parse_from([
            "winrm-cli", "--host", "win01", "exec", "--shell", "cmd", "--env", "X=1",
            "--success-code", "3010", "dir", "/b",
        ])
        .unwrap();

        let Command::Exec {
            shell,
            env,
            success_codes,
            command,
        } = cli.command
        else {
            panic!("expected exec");
        };
        assert_eq!(shell, Some(ShellKind::Cmd));
        assert_eq!(env, vec![("X".to_string(), "1".to_string())]);
        assert_eq!(success_codes, vec![3010]);
        assert_eq!(command, vec!["dir", "/b"]);
    }

    #[test]
    fn test_flags_override_bare_host() {
        let cli = Cli::try_parse_from([
            "winrm-cli", "--host", "win01", "--user", "vagrant", "--port", "15985", "facts",
            "temp-dir",
        ])
        .unwrap();

        let identity = cli.identity_from(None).unwrap();
        assert_eq!(identity.name(), "@winrm/win01");
        assert_eq!(identity.hostname(), "win01");
        assert_eq!(identity.username(), "vagrant");
        assert_eq!(identity.endpoint(), "http://win01:15985/wsman");
    }

    #[test]
    fn test_inventory_entry_with_overrides() {
        let inventory = Inventory::from_toml_str(
            r#"
            [hosts."build-agent"]
            winrm_hostname = "10.0.0.5"
            winrm_username = "builder"
            transport = "ssl"
            "#,
        )
        .unwrap();
        let cli = Cli::try_parse_from([
            "winrm-cli", "--host", "build-agent", "--user", "admin", "facts", "winget",
        ])
        .unwrap();

        let identity = cli.identity_from(Some(&inventory)).unwrap();
        assert_eq!(identity.name(), "build-agent");
        assert_eq!(identity.username(), "admin");
        assert_eq!(identity.endpoint(), "https://10.0.0.5:5986/wsman");
    }

    #[test]
    fn test_missing_inventory_is_an_error() {
        let cli = Cli::try_parse_from([
            "winrm-cli", "--inventory", "/nonexistent/inventory.toml", "--host", "win01",
            "facts", "temp-dir",
        ])
        .unwrap();
        assert!(cli.identity().is_err());
    }
}
