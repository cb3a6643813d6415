//! Resolution of the `include` and `program` directives.
//!
//! Both directives are ordinary nodes to the parser. This pass rewrites them
//! in place:
//!
//! - `include PATH;` is replaced by the nodes of the file it names. The
//!   included tree is postprocessed on its own first, with the global flag
//!   cleared.
//! - `program NAME { ... }` is only meaningful in the site-wide file. When
//!   `NAME` is the current program its children take the place of the block;
//!   otherwise the block is dropped.
//!
//! Expanded content appears exactly where the directive stood, and unrelated
//! siblings keep their order.

use std::path::{Path, PathBuf};

use crate::diag::{Diagnostics, Locus};
use crate::error::CfgError;
use crate::file::{self, IncludeTarget};
use crate::parser;
use crate::tree::{NodeId, NodeKind, Rewrite, Tree};

/// Context for one postprocess run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseHints {
    /// The tree comes from the site-wide file. Enables `program` blocks and
    /// directory includes.
    pub global: bool,
    /// Canonical name of the running program.
    pub program: Option<String>,
    /// Directory against which relative include paths are resolved. When
    /// unset, the directory of the including file is used.
    pub include_dir: Option<PathBuf>,
}

impl ParseHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    pub fn program(mut self, name: impl Into<String>) -> Self {
        self.program = Some(name.into());
        self
    }

    pub fn include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dir = Some(dir.into());
        self
    }
}

/// Expand directives in `tree`. Returns the number of errors added to `diag`.
pub fn postprocess(tree: &mut Tree, hints: &ParseHints, diag: &mut Diagnostics) -> usize {
    let before = diag.error_count();
    let mut stack = Vec::new();
    if let Some(src) = tree.source() {
        stack.push(canonical(src));
    }
    Postprocessor {
        hints,
        diag: &mut *diag,
        stack: &mut stack,
    }
    .run(tree);
    diag.error_count() - before
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

struct Postprocessor<'a> {
    hints: &'a ParseHints,
    diag: &'a mut Diagnostics,
    /// Files currently being included, outermost first.
    stack: &'a mut Vec<PathBuf>,
}

impl Postprocessor<'_> {
    fn run(&mut self, tree: &mut Tree) {
        let base = self
            .hints
            .include_dir
            .clone()
            .or_else(|| tree.source().and_then(Path::parent).map(Path::to_path_buf));

        tree.rewrite(|tree, id| {
            let node = tree.node(id);
            let program = node.kind == NodeKind::Statement && node.tag == "program";
            let include = node.kind == NodeKind::Parameter && node.tag == "include";
            if program {
                self.program(tree, id)
            } else if include {
                self.include(tree, id, base.as_deref())
            } else {
                Rewrite::Keep
            }
        });
        tree.compact();
    }

    fn program(&mut self, tree: &Tree, id: NodeId) -> Rewrite {
        if !self.hints.global {
            return Rewrite::Skip;
        }
        let node = tree.node(id);
        let Some(name) = node.label_str() else {
            self.diag
                .error(&node.locus, "argument to `program' is not a string");
            return Rewrite::Remove;
        };
        if self.hints.program.as_deref() == Some(name) {
            tracing::debug!(program = name, locus = %node.locus, "applying program block");
            Rewrite::Splice(node.children().to_vec())
        } else {
            tracing::debug!(program = name, locus = %node.locus, "dropping program block");
            Rewrite::Remove
        }
    }

    fn include(&mut self, tree: &mut Tree, id: NodeId, base: Option<&Path>) -> Rewrite {
        let node = tree.node(id);
        let locus = node.locus.clone();
        let Some(target) = node.label_str().map(str::to_string) else {
            self.diag
                .error(&locus, "argument to `include' is not a string");
            return Rewrite::Remove;
        };
        match self.load(&target, base, &locus) {
            Some(sub) => Rewrite::Replace(tree.graft(sub, None)),
            None => Rewrite::Remove,
        }
    }

    /// Parse and expand the file an include points at. `None` means the
    /// include contributes nothing; any error has already been reported.
    fn load(&mut self, target: &str, base: Option<&Path>, locus: &Locus) -> Option<Tree> {
        let path = file::resolve_relative(target, base);
        let path = match file::locate(&path) {
            Ok(IncludeTarget::File(p)) => p,
            Ok(IncludeTarget::Missing(_)) => {
                self.diag
                    .error(locus, "include file or directory does not exist");
                return None;
            }
            Ok(IncludeTarget::Dir(dir)) => self.program_file(&dir, locus)?,
            Err(e) => {
                self.diag.error(
                    locus,
                    format!("cannot stat include file or directory: {e}"),
                );
                return None;
            }
        };

        let key = canonical(&path);
        if self.stack.contains(&key) {
            let chain: Vec<String> = self
                .stack
                .iter()
                .chain(std::iter::once(&key))
                .map(|p| p.display().to_string())
                .collect();
            self.diag
                .error(locus, format!("include cycle: {}", chain.join(" -> ")));
            return None;
        }

        tracing::debug!(path = %path.display(), locus = %locus, "including file");
        let mut sub = match parser::parse_file(&path, self.diag) {
            Ok(t) => t,
            // already reported line by line
            Err(CfgError::Syntax { .. }) => return None,
            Err(e) => {
                self.diag.error(locus, e.to_string());
                return None;
            }
        };

        let hints = ParseHints {
            global: false,
            ..self.hints.clone()
        };
        self.stack.push(key);
        Postprocessor {
            hints: &hints,
            diag: &mut *self.diag,
            stack: &mut *self.stack,
        }
        .run(&mut sub);
        self.stack.pop();
        Some(sub)
    }

    /// A directory include names `dir/{program}`, and only in the site-wide
    /// file of a known program.
    fn program_file(&mut self, dir: &Path, locus: &Locus) -> Option<PathBuf> {
        let program = match (&self.hints.program, self.hints.global) {
            (Some(p), true) => p,
            _ => {
                self.diag.warning(
                    locus,
                    format!(
                        "include directory {} is only meaningful in the site-wide file; ignored",
                        dir.display()
                    ),
                );
                return None;
            }
        };
        let path = dir.join(program);
        match file::locate(&path) {
            Ok(IncludeTarget::File(p)) => Some(p),
            Ok(_) => {
                tracing::debug!(path = %path.display(), "no per-program include file");
                None
            }
            Err(e) => {
                self.diag.error(locus, e.to_string());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use std::fs;
    use tempfile::TempDir;

    fn tree(src: &str) -> Tree {
        let mut diag = Diagnostics::new();
        parse(src, "test", &mut diag).unwrap()
    }

    fn render(t: &Tree) -> Vec<String> {
        t.iter()
            .map(|id| {
                let n = t.node(id);
                match &n.label {
                    Some(v) => format!("{}={}", t.node_path(id), v),
                    None => t.node_path(id),
                }
            })
            .collect()
    }

    fn site(program: &str) -> ParseHints {
        ParseHints::new().global(true).program(program)
    }

    #[test]
    fn include_splices_file_in_place() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub.conf");
        fs::write(&sub, "x 1;\n").unwrap();

        let mut t = tree(&format!("a 1;\ninclude \"{}\";\nb 2;", sub.display()));
        let mut diag = Diagnostics::new();
        assert_eq!(postprocess(&mut t, &ParseHints::new(), &mut diag), 0);
        assert_eq!(render(&t), vec!["a=1", "x=1", "b=2"]);
        let x = t.roots()[1];
        assert_eq!(t.node(x).locus.file, sub.display().to_string());
    }

    #[test]
    fn missing_include_reports_once_and_vanishes() {
        let dir = TempDir::new().unwrap();
        let mut t = tree(&format!(
            "a 1; include \"{}\"; b 2;",
            dir.path().join("nope.conf").display()
        ));
        let mut diag = Diagnostics::new();
        assert_eq!(postprocess(&mut t, &ParseHints::new(), &mut diag), 1);
        assert_eq!(render(&t), vec!["a=1", "b=2"]);
        assert!(diag.to_string().contains("does not exist"));
    }

    #[test]
    fn include_needs_string_label() {
        let mut t = tree("include (a, b);");
        let mut diag = Diagnostics::new();
        assert_eq!(postprocess(&mut t, &ParseHints::new(), &mut diag), 1);
        assert!(t.is_empty());
    }

    #[test]
    fn include_inside_block_keeps_parent() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("tls.conf");
        fs::write(&sub, "cert /etc/cert.pem;\n").unwrap();

        let mut t = tree(&format!("server {{ include \"{}\"; port 110; }}", sub.display()));
        let mut diag = Diagnostics::new();
        postprocess(&mut t, &ParseHints::new(), &mut diag);
        assert_eq!(
            render(&t),
            vec!["server", "server/cert=/etc/cert.pem", "server/port=110"]
        );
    }

    #[test]
    fn relative_include_uses_including_file_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.rc"), "include sub.rc;\n").unwrap();
        fs::write(dir.path().join("sub.rc"), "y 2;\n").unwrap();

        let mut diag = Diagnostics::new();
        let mut t = parser::parse_file(&dir.path().join("main.rc"), &mut diag).unwrap();
        assert_eq!(postprocess(&mut t, &ParseHints::new(), &mut diag), 0);
        assert_eq!(render(&t), vec!["y=2"]);
    }

    #[test]
    fn include_dir_hint_anchors_relative_paths() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("common.rc"), "z 3;\n").unwrap();

        let mut t = tree("include common.rc;");
        let hints = ParseHints::new().include_dir(dir.path());
        let mut diag = Diagnostics::new();
        assert_eq!(postprocess(&mut t, &hints, &mut diag), 0);
        assert_eq!(render(&t), vec!["z=3"]);
    }

    #[test]
    fn include_cycle_is_detected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.rc"), "a 1; include b.rc;\n").unwrap();
        fs::write(dir.path().join("b.rc"), "b 1; include a.rc;\n").unwrap();

        let mut diag = Diagnostics::new();
        let mut t = parser::parse_file(&dir.path().join("a.rc"), &mut diag).unwrap();
        assert_eq!(postprocess(&mut t, &ParseHints::new(), &mut diag), 1);
        assert!(diag.to_string().contains("include cycle"), "{diag}");
        assert_eq!(render(&t), vec!["a=1", "b=1"]);
    }

    #[test]
    fn program_block_matching_is_hoisted() {
        let mut t = tree("before 1; program \"foo\" { x 1; } after 1;");
        let mut diag = Diagnostics::new();
        assert_eq!(postprocess(&mut t, &site("foo"), &mut diag), 0);
        assert_eq!(render(&t), vec!["before=1", "x=1", "after=1"]);
        let x = t.roots()[1];
        assert_eq!(t.node(x).parent(), None);
    }

    #[test]
    fn program_block_other_program_is_dropped() {
        let mut t = tree("program \"foo\" { x 1; }");
        let mut diag = Diagnostics::new();
        assert_eq!(postprocess(&mut t, &site("bar"), &mut diag), 0);
        assert!(t.is_empty());
    }

    #[test]
    fn program_block_untouched_outside_site_file() {
        let mut t = tree("program \"foo\" { x 1; }");
        let hints = ParseHints::new().program("foo");
        let mut diag = Diagnostics::new();
        assert_eq!(postprocess(&mut t, &hints, &mut diag), 0);
        assert_eq!(render(&t), vec!["program=foo", "program/x=1"]);
    }

    #[test]
    fn program_label_must_be_string() {
        let mut t = tree("program (a, b) { x 1; } y 2;");
        let mut diag = Diagnostics::new();
        assert_eq!(postprocess(&mut t, &site("a"), &mut diag), 1);
        assert_eq!(render(&t), vec!["y=2"]);
    }

    #[test]
    fn nested_program_block_reparents_children() {
        let mut t = tree("server { program imap4d { port 143; } tls no; }");
        let mut diag = Diagnostics::new();
        postprocess(&mut t, &site("imap4d"), &mut diag);
        assert_eq!(
            render(&t),
            vec!["server", "server/port=143", "server/tls=no"]
        );
    }

    #[test]
    fn includes_inside_program_block_expand() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("pop.rc");
        fs::write(&sub, "port 110;\n").unwrap();
        let mut t = tree(&format!("program pop3d {{ include \"{}\"; }}", sub.display()));
        let mut diag = Diagnostics::new();
        assert_eq!(postprocess(&mut t, &site("pop3d"), &mut diag), 0);
        assert_eq!(render(&t), vec!["port=110"]);
    }

    #[test]
    fn included_file_program_blocks_are_not_global() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub.rc");
        fs::write(&sub, "program foo { x 1; }\n").unwrap();
        let mut t = tree(&format!("include \"{}\";", sub.display()));
        let mut diag = Diagnostics::new();
        postprocess(&mut t, &site("foo"), &mut diag);
        assert_eq!(render(&t), vec!["program=foo", "program/x=1"]);
    }

    #[test]
    fn directory_include_picks_program_file() {
        let dir = TempDir::new().unwrap();
        let conf_d = dir.path().join("mailutils.d");
        fs::create_dir(&conf_d).unwrap();
        fs::write(conf_d.join("pop3d"), "port 110;\n").unwrap();
        fs::write(conf_d.join("imap4d"), "port 143;\n").unwrap();

        let src = format!("include \"{}\";", conf_d.display());
        let mut diag = Diagnostics::new();

        let mut t = tree(&src);
        assert_eq!(postprocess(&mut t, &site("imap4d"), &mut diag), 0);
        assert_eq!(render(&t), vec!["port=143"]);

        let mut t = tree(&src);
        assert_eq!(postprocess(&mut t, &site("smtpd"), &mut diag), 0);
        assert!(t.is_empty());
    }

    #[test]
    fn directory_include_outside_site_file_warns() {
        let dir = TempDir::new().unwrap();
        let mut t = tree(&format!("include \"{}\";", dir.path().display()));
        let mut diag = Diagnostics::new();
        assert_eq!(postprocess(&mut t, &ParseHints::new().program("x"), &mut diag), 0);
        assert_eq!(diag.warning_count(), 1);
        assert!(t.is_empty());
    }

    #[test]
    fn syntax_errors_in_included_file_are_counted() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("broken.rc");
        fs::write(&sub, "x 1\n").unwrap();
        let mut t = tree(&format!("include \"{}\"; y 1;", sub.display()));
        let mut diag = Diagnostics::new();
        assert_eq!(postprocess(&mut t, &ParseHints::new(), &mut diag), 1);
        assert_eq!(render(&t), vec!["y=1"]);
    }
}
