//! # mailcfg demo daemon
//!
//! A pretend POP3 daemon that loads its configuration the way the real ones
//! do. It exists to demonstrate and manually verify the loader, not to serve
//! mail.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example mailcfg_check -- --no-site-config --config-file demo.rc
//! cargo run --example mailcfg_check -- --config-help
//! ```
//!
//! ## Features demonstrated
//!
//! | Feature            | How to exercise it                                               |
//! |--------------------|------------------------------------------------------------------|
//! | Site file          | `--site-file FILE` with `program pop3d { ... }` blocks           |
//! | Custom file        | `--config-file FILE`                                             |
//! | Overrides          | `--set server/port=1110`                                         |
//! | Lint               | `--config-lint`                                                  |
//! | Schema template    | `--config-help`                                                  |
//! | Dump / JSON / get  | `--config-dump`, `--config-json`, `--config-get server/port`     |
//! | ACL check          | `--check-ip 10.1.2.3`                                            |
//!
//! Set `RUST_LOG=debug` to watch files being read and directives expanded.

mod config;

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mailcfg::{CfgError, ConfigArgs, ConfigLoader, Diagnostics};

use config::DemoConfig;

/// mailcfg demo: load and check a POP3 daemon configuration.
#[derive(Parser, Debug)]
#[command(name = "mailcfg-check")]
struct Cli {
    /// Program name used for `program` blocks and `~/.NAME`.
    #[arg(long, default_value = "pop3d")]
    program: String,

    /// Use this site-wide file instead of the default.
    #[arg(long, value_name = "FILE")]
    site_file: Option<PathBuf>,

    /// Report whether the ACL admits this address.
    #[arg(long, value_name = "IP")]
    check_ip: Option<Ipv4Addr>,

    #[command(flatten)]
    config: ConfigArgs,
}

fn make_loader(cli: &Cli) -> ConfigLoader {
    let mut loader = ConfigLoader::new().program(&cli.program);
    if let Some(path) = &cli.site_file {
        loader = loader.site_file(path);
    }
    cli.config.apply(loader)
}

fn run(cli: Cli) -> Result<ExitCode, CfgError> {
    let schema = config::schema()?;
    let loader = make_loader(&cli);

    if let Some(action) = cli.config.clone().into_action() {
        let result = loader.handle_and_print(&action, &schema)?;
        return Ok(if result.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let mut diag = Diagnostics::new();
    let mut config = DemoConfig::default();
    if let Err(e) = loader.load_into(&schema, &mut config, None, &mut diag) {
        eprintln!("{diag}");
        return Err(e);
    }
    if diag.warning_count() > 0 {
        eprintln!("{diag}");
    }

    println!("facility  {}", config.logging.facility);
    println!("port      {}", config.server.port);
    println!("timeout   {}s", config.server.timeout.as_secs());
    println!("tls       {}", config.server.tls);
    println!("listen    {:?}", config.server.listen);
    println!("acl       {} rule(s)", config.acl.len());

    if let Some(ip) = cli.check_ip {
        let verdict = if config.allows(ip) { "allowed" } else { "denied" };
        println!("{ip}  {verdict}");
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
