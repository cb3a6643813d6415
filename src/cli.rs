//! Clap adapter for mailcfg.
//!
//! This module is the **optional integration layer** between the
//! framework-agnostic loader and the [clap](https://docs.rs/clap) CLI parser.
//! It is compiled only when the `clap` Cargo feature is enabled (on by
//! default).
//!
//! [`ConfigArgs`] carries the options every mail daemon accepts for its
//! configuration. Flatten it into your own parser, feed it to a
//! [`ConfigLoader`] with [`ConfigArgs::apply()`], and turn any
//! introspection flag into a [`ConfigAction`] with
//! [`ConfigArgs::into_action()`].
//!
//! If you use a different CLI parser (or no CLI at all), you can skip this
//! module entirely and call the [`ConfigLoader`] setters directly.

use std::path::PathBuf;

use clap::Args;

use crate::builder::ConfigLoader;
use crate::types::ConfigAction;

/// Configuration options shared by all programs.
///
/// ```ignore
/// #[derive(Parser)]
/// struct Cli {
///     #[command(flatten)]
///     config: ConfigArgs,
/// }
/// ```
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Load this configuration file after the site and user files.
    #[arg(long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Do not load the site-wide configuration file.
    #[arg(long = "no-site-config")]
    pub no_site_config: bool,

    /// Do not load the user configuration file.
    #[arg(long = "no-user-config")]
    pub no_user_config: bool,

    /// Check the configuration and exit.
    #[arg(long = "config-lint")]
    pub config_lint: bool,

    /// Show a summary of the configuration file syntax and exit.
    #[arg(long = "config-help")]
    pub config_help: bool,

    /// Print the merged configuration and exit.
    #[arg(long = "config-dump")]
    pub config_dump: bool,

    /// Print the merged configuration as JSON and exit.
    #[arg(long = "config-json")]
    pub config_json: bool,

    /// Print the value at PATH and exit.
    #[arg(long = "config-get", value_name = "PATH")]
    pub config_get: Option<String>,

    /// Set a configuration parameter, e.g. `logging/facility=mail`.
    #[arg(long = "set", value_name = "PATH=VALUE")]
    pub set: Vec<String>,
}

impl ConfigArgs {
    /// Feed the file selection and overrides into `loader`.
    pub fn apply(&self, mut loader: ConfigLoader) -> ConfigLoader {
        if let Some(path) = &self.config_file {
            loader = loader.config_file(path);
        }
        if self.no_site_config {
            loader = loader.no_site_config();
        }
        if self.no_user_config {
            loader = loader.no_user_config();
        }
        for assignment in &self.set {
            loader = loader.set(assignment);
        }
        loader
    }

    /// The introspection action requested, if any. `None` means the program
    /// should load its configuration and run normally.
    ///
    /// When several flags are given, the first of help, lint, get, json and
    /// dump wins.
    pub fn into_action(self) -> Option<ConfigAction> {
        if self.config_help {
            Some(ConfigAction::Schema)
        } else if self.config_lint {
            Some(ConfigAction::Lint)
        } else if let Some(path) = self.config_get {
            Some(ConfigAction::Get { path })
        } else if self.config_json {
            Some(ConfigAction::Json)
        } else if self.config_dump {
            Some(ConfigAction::Dump)
        } else {
            None
        }
    }
}
