use std::any::Any;
use std::path::PathBuf;

use crate::diag::Diagnostics;
use crate::error::CfgError;
use crate::file;
use crate::format;
use crate::ops::{self, ConfigResult};
use crate::parser;
use crate::path;
use crate::postprocess::{ParseHints, postprocess};
use crate::reduce::Reducer;
use crate::schema::Section;
use crate::tree::Tree;
use crate::types::{ConfigAction, ConfigSource};

/// Builder for locating, reading and merging a program's configuration.
///
/// Layers are read in a fixed order and unioned, so later layers come after
/// earlier ones in the merged tree:
///
/// - the site-wide file ([`site_file()`](Self::site_file), default
///   `/etc/mailutils.rc`), read in global context;
/// - the per-user file `~/.{program}`;
/// - an explicit [`config_file()`](Self::config_file);
/// - [`set()`](Self::set) overrides, in the order given.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    program: Option<String>,
    site_file: Option<PathBuf>,
    site_enabled: bool,
    user_enabled: bool,
    custom_file: Option<PathBuf>,
    include_dir: Option<PathBuf>,
    overrides: Vec<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            program: None,
            site_file: None,
            site_enabled: true,
            user_enabled: true,
            custom_file: None,
            include_dir: None,
            overrides: Vec::new(),
        }
    }

    /// Set the program name. It selects `program` blocks in the site file and
    /// names the per-user file.
    pub fn program(mut self, name: &str) -> Self {
        self.program = Some(name.to_string());
        self
    }

    /// Override the site-wide file location.
    pub fn site_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.site_file = Some(path.into());
        self
    }

    pub fn no_site_config(mut self) -> Self {
        self.site_enabled = false;
        self
    }

    pub fn no_user_config(mut self) -> Self {
        self.user_enabled = false;
        self
    }

    /// Read this file after the site and user files. It must exist.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.custom_file = Some(path.into());
        self
    }

    /// Resolve relative `include` targets against `dir`.
    pub fn include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dir = Some(dir.into());
        self
    }

    /// Add an override in path syntax, e.g. `logging/facility=mail`.
    pub fn set(mut self, assignment: &str) -> Self {
        self.overrides.push(assignment.to_string());
        self
    }

    /// Resolve the effective program name, or error if not set.
    fn effective_program(&self) -> Result<&str, CfgError> {
        self.program.as_deref().ok_or(CfgError::ProgramRequired)
    }

    fn effective_site_file(&self) -> PathBuf {
        self.site_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(file::SITE_CONFIG_FILE))
    }

    /// The layers this loader will read, in order.
    pub fn sources(&self) -> Result<Vec<ConfigSource>, CfgError> {
        let program = self.effective_program()?;
        let mut sources = Vec::new();
        if self.site_enabled {
            sources.push(ConfigSource::Site(self.effective_site_file()));
        }
        if self.user_enabled
            && let Some(path) = file::user_config_path(program)
        {
            sources.push(ConfigSource::User(path));
        }
        if let Some(path) = &self.custom_file {
            sources.push(ConfigSource::Custom(path.clone()));
        }
        Ok(sources)
    }

    fn hints(&self, global: bool) -> ParseHints {
        let mut hints = ParseHints::new().global(global);
        if let Some(program) = &self.program {
            hints = hints.program(program);
        }
        if let Some(dir) = &self.include_dir {
            hints = hints.include_dir(dir);
        }
        hints
    }

    /// Read every layer and return the merged tree.
    ///
    /// Problems inside files are reported to `diag`. A site or user file with
    /// syntax errors is left out of the result and loading goes on; a broken
    /// custom file or override aborts the load.
    pub fn load(&self, diag: &mut Diagnostics) -> Result<Tree, CfgError> {
        let mut tree = Tree::new();
        for source in self.sources()? {
            if let Some(layer) = self.read_layer(&source, diag)? {
                tree.union(layer);
            }
        }
        for assignment in &self.overrides {
            tracing::debug!(assignment, "applying override");
            tree.union(path::create_subtree(assignment)?);
        }
        Ok(tree)
    }

    fn read_layer(
        &self,
        source: &ConfigSource,
        diag: &mut Diagnostics,
    ) -> Result<Option<Tree>, CfgError> {
        let path = source.path();
        let text = if source.is_required() {
            file::read_required(path)?
        } else {
            match file::read_optional(path)? {
                Some(text) => text,
                None => return Ok(None),
            }
        };
        tracing::debug!(%source, "loading configuration layer");
        let mut tree = match parser::parse_source(&text, path, diag) {
            Ok(tree) => tree,
            Err(e @ CfgError::Syntax { .. }) if !source.is_required() => {
                tracing::debug!(%source, error = %e, "skipping layer");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        postprocess(&mut tree, &self.hints(source.is_global()), diag);
        Ok(Some(tree))
    }

    /// Load, then bind the result into `target`. Fails with
    /// [`CfgError::Invalid`] if anything was reported as an error.
    pub fn load_into<T>(
        &self,
        schema: &Section<T>,
        target: &mut T,
        call_data: Option<&dyn Any>,
        diag: &mut Diagnostics,
    ) -> Result<Tree, CfgError> {
        self.load_into_with(&Reducer::new(), schema, target, call_data, diag)
    }

    /// Like [`load_into()`](Self::load_into), binding through `reducer`, e.g.
    /// one carrying a custom host resolver.
    pub fn load_into_with<T>(
        &self,
        reducer: &Reducer<'_>,
        schema: &Section<T>,
        target: &mut T,
        call_data: Option<&dyn Any>,
        diag: &mut Diagnostics,
    ) -> Result<Tree, CfgError> {
        let before = diag.error_count();
        let tree = self.load(diag)?;
        reducer.reduce(&tree, schema, target, call_data, diag);
        let count = diag.error_count() - before;
        if count > 0 {
            return Err(CfgError::Invalid { count });
        }
        Ok(tree)
    }

    /// Handle a `ConfigAction` and print the result to stdout.
    pub fn handle_and_print<T: Default>(
        &self,
        action: &ConfigAction,
        schema: &Section<T>,
    ) -> Result<ConfigResult, CfgError> {
        let result = self.handle(action, schema)?;
        println!("{result}");
        Ok(result)
    }

    /// Handle a `ConfigAction` (dump / json / get / lint / schema).
    pub fn handle<T: Default>(
        &self,
        action: &ConfigAction,
        schema: &Section<T>,
    ) -> Result<ConfigResult, CfgError> {
        match action {
            ConfigAction::Schema => Ok(ConfigResult::Text(format::format_schema(schema))),
            ConfigAction::Lint => {
                let mut diag = Diagnostics::new();
                match self.load(&mut diag) {
                    Ok(tree) => {
                        let mut target = T::default();
                        Reducer::new().reduce(&tree, schema, &mut target, None, &mut diag);
                    }
                    Err(CfgError::Syntax { .. }) => {}
                    Err(CfgError::Io { path, source }) => {
                        diag.error_global(format!("cannot read {}: {source}", path.display()));
                    }
                    Err(e) => return Err(e),
                }
                Ok(ops::lint(&diag))
            }
            ConfigAction::Dump => Ok(ops::dump(&self.load_quiet()?)),
            ConfigAction::Json => ops::to_json(&self.load_quiet()?),
            ConfigAction::Get { path } => ops::get_value(&self.load_quiet()?, path),
        }
    }

    fn load_quiet(&self) -> Result<Tree, CfgError> {
        let mut diag = Diagnostics::new();
        self.load(&mut diag)
    }
}
