use std::fmt;
use std::path::PathBuf;

/// One layer of the configuration, in the order layers are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// The site-wide file. Read in global context, so `program` blocks apply.
    Site(PathBuf),
    /// The per-user `~/.{program}` file.
    User(PathBuf),
    /// A file named explicitly. Unlike the others it must exist.
    Custom(PathBuf),
}

impl ConfigSource {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigSource::Site(p) | ConfigSource::User(p) | ConfigSource::Custom(p) => p,
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, ConfigSource::Custom(_))
    }

    pub fn is_global(&self) -> bool {
        matches!(self, ConfigSource::Site(_))
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ConfigSource::Site(_) => "site",
            ConfigSource::User(_) => "user",
            ConfigSource::Custom(_) => "custom",
        };
        write!(f, "{kind} configuration {}", self.path().display())
    }
}

/// A config operation, independent of any CLI framework.
/// The CLI layer converts parsed clap args into this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the merged tree in configuration syntax.
    Dump,
    /// Print the merged tree as JSON.
    Json,
    /// Print the value at a path.
    Get { path: String },
    /// Check the configuration against the schema and report every problem.
    Lint,
    /// Print a commented template of the schema.
    Schema,
}
