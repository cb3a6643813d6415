//! Configuration engine for a family of mail daemons. Describe what a program
//! accepts, point it at its files, and get a filled-in struct plus a list of
//! every problem found along the way.
//!
//! ```ignore
//! let mut diag = Diagnostics::new();
//! let mut config = Pop3Config::default();
//! ConfigLoader::new()
//!     .program("pop3d")
//!     .load_into(&schema, &mut config, None, &mut diag)?;
//! ```
//!
//! That call reads `/etc/mailutils.rc`, then `~/.pop3d`, merges them, expands
//! `include` and `program` directives, and binds the result into `config`
//! according to `schema`.
//!
//! # The pipeline
//!
//! ```text
//! text ──parse──▶ Tree ──postprocess──▶ Tree ──union──▶ Tree ──reduce──▶ T
//!                                           ▲
//!                    other files, --set ────┘
//! ```
//!
//! - [`parser`] turns text into a [`Tree`] of statements (`tag label { ... }`)
//!   and parameters (`tag label;`). Labels are [`Value`]s: a string, a
//!   parenthesized list, or several juxtaposed words (an array).
//! - [`postprocess`] resolves directives. `include FILE;` is replaced by the
//!   parsed contents of `FILE`. In the site-wide file, `program NAME { ... }`
//!   is replaced by its contents when `NAME` is the running program and
//!   dropped otherwise.
//! - [`Tree::union`] appends one tree after another. Layers are unioned in
//!   read order, so later settings come later in the tree.
//! - [`reduce`] walks the tree against a [`Section`] schema and writes each
//!   value into the caller's struct through setters registered on the schema.
//!
//! # Error tolerance
//!
//! No stage stops at the first problem. Each reports into a [`Diagnostics`]
//! sink passed in by the caller, with the file, line and column of the
//! offending node, and carries on. A daemon checks the sink (or the returned
//! count) at the end, prints everything at once, and refuses to start if
//! anything was an error. Bindings that succeeded stay in place.
//!
//! # Schemas
//!
//! A [`Section<T>`] lists the [`Param`]s and subsections a block accepts.
//! Scalar and list parameters convert their label to a Rust type chosen by the
//! setter's argument (`u16`, `bool`, `Duration`, [`Cidr`], ...); callback
//! parameters see the raw label. Sections can run hooks when a block is
//! entered and left. See the [`schema`] module.
//!
//! # Path queries
//!
//! [`path`] addresses nodes with strings like `server=imap/port`, and builds
//! detached fragments from them: `--set logging/facility=mail` becomes a tree
//! unioned after all files.
//!
//! # Clap adapter
//!
//! The `cli` module (behind the `clap` feature, on by default) provides
//! [`ConfigArgs`] with the usual `--config-file`, `--no-site-config`,
//! `--no-user-config`, `--config-lint`, `--config-help` and `--set` options.
//! [`ConfigArgs::into_action()`] bridges introspection flags to a
//! [`ConfigAction`] that [`ConfigLoader::handle()`] executes.
//!
//! # Error handling
//!
//! Operations that can fail outright return [`CfgError`]. Conversion of a
//! single value fails with [`ConversionError`], which the reducer turns into a
//! diagnostic. Enable the `rich-errors` feature to render diagnostics with
//! `miette`.

pub mod convert;
pub mod diag;
pub mod error;
pub mod format;
pub mod parser;
pub mod path;
pub mod postprocess;
pub mod reduce;
pub mod schema;
pub mod tree;
pub mod types;
pub mod value;

mod builder;
#[cfg(feature = "clap")]
mod cli;
mod file;
mod lexer;
mod ops;

#[cfg(test)]
mod fixtures;

pub use builder::ConfigLoader;
#[cfg(feature = "clap")]
pub use cli::ConfigArgs;
pub use convert::{Cidr, HostAddr, ParamType};
pub use diag::{Diagnostic, Diagnostics, Locus, Severity};
pub use error::{CfgError, ConversionError};
pub use file::SITE_CONFIG_FILE;
pub use ops::ConfigResult;
pub use postprocess::{ParseHints, postprocess};
pub use reduce::{Reducer, reduce};
pub use schema::{Param, Section};
pub use tree::{NodeId, NodeKind, Tree};
pub use types::{ConfigAction, ConfigSource};
pub use value::Value;
