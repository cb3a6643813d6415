//! Rendering trees and schemas back to text.
//!
//! [`format_tree`] prints a parse tree in configuration syntax. The default
//! output parses back to an equal tree. [`format_schema`] prints a commented
//! template listing every statement a schema accepts.

use crate::schema::{Param, Section};
use crate::tree::{NodeId, NodeKind, Tree, Visit, Visitor};
use crate::value::Value;

const DOC_WIDTH: usize = 78;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOptions {
    /// Precede each node with a `# LINE "FILE"` comment.
    pub locus: bool,
    /// Print one `path/to/param: value` line per parameter instead of blocks.
    pub param_paths: bool,
    /// Print only the values of parameters.
    pub value_only: bool,
}

/// Render `tree` as configuration text.
pub fn format_tree(tree: &Tree, opts: FormatOptions) -> String {
    let mut printer = TreePrinter {
        out: String::new(),
        level: 0,
        opts,
    };
    tree.preorder(&mut printer);
    printer.out
}

struct TreePrinter {
    out: String,
    level: usize,
    opts: FormatOptions,
}

impl TreePrinter {
    fn indent(&mut self) {
        for _ in 0..self.level {
            self.out.push_str("  ");
        }
    }

    fn locus(&mut self, tree: &Tree, id: NodeId) {
        let locus = &tree.node(id).locus;
        if self.opts.locus && !locus.is_internal() {
            self.out.push_str(&format!("# {} ", locus.line));
            self.out.push_str(&Value::String(locus.file.clone()).to_string());
            self.out.push('\n');
        }
    }

    fn path(&mut self, tree: &Tree, id: NodeId) {
        let node = tree.node(id);
        if let Some(parent) = node.parent() {
            self.path(tree, parent);
            self.out.push('/');
        }
        self.out.push_str(&node.tag);
        if node.kind == NodeKind::Statement
            && let Some(label) = &node.label
        {
            self.out.push_str(&format!("={}", path_label(label)));
        }
    }
}

/// Labels inside a path are quoted when they contain the delimiter.
fn path_label(label: &Value) -> String {
    let text = label.to_string();
    match label {
        Value::String(s) if text.contains('/') => {
            let mut quoted = String::from("\"");
            quoted.push_str(&s.replace('\\', "\\\\").replace('"', "\\\""));
            quoted.push('"');
            quoted
        }
        _ => text,
    }
}

impl Visitor for TreePrinter {
    fn enter(&mut self, tree: &Tree, id: NodeId) -> Visit {
        let node = tree.node(id);
        match node.kind {
            NodeKind::Statement => {
                if self.opts.param_paths {
                    return Visit::Continue;
                }
                self.locus(tree, id);
                self.indent();
                self.out.push_str(&node.tag);
                if let Some(label) = &node.label {
                    self.out.push_str(&format!(" {label}"));
                }
                self.out.push_str(" {\n");
                self.level += 1;
            }
            NodeKind::Parameter => {
                if self.opts.value_only && node.label.is_none() {
                    return Visit::Continue;
                }
                self.locus(tree, id);
                self.indent();
                if self.opts.value_only {
                    if let Some(label) = &node.label {
                        self.out.push_str(&label.to_string());
                    }
                } else if self.opts.param_paths {
                    self.path(tree, id);
                    self.out.push(':');
                    if let Some(label) = &node.label {
                        self.out.push_str(&format!(" {label}"));
                    }
                } else {
                    self.out.push_str(&node.tag);
                    if let Some(label) = &node.label {
                        self.out.push_str(&format!(" {label}"));
                    }
                    self.out.push(';');
                }
                self.out.push('\n');
            }
        }
        Visit::Continue
    }

    fn leave(&mut self, _tree: &Tree, _id: NodeId) -> Visit {
        if !self.opts.param_paths {
            self.level = self.level.saturating_sub(1);
            self.indent();
            self.out.push_str("};\n");
        }
        Visit::Continue
    }
}

/// Render a commented template of everything `schema` accepts.
pub fn format_schema<T>(schema: &Section<T>) -> String {
    let mut out = String::new();
    section(&mut out, schema, 0);
    out
}

fn section<T>(out: &mut String, sect: &Section<T>, level: usize) {
    if sect.name().is_empty() {
        entries(out, sect, level);
        return;
    }
    if let Some(doc) = sect.doc_str() {
        docstring(out, doc, level);
    }
    indent(out, level);
    out.push_str(sect.name());
    if let Some(label) = sect.label_str() {
        out.push_str(&format!(" {label}"));
    }
    out.push_str(" {\n");
    entries(out, sect, level + 1);
    indent(out, level);
    out.push_str("};\n\n");
}

fn entries<T>(out: &mut String, sect: &Section<T>, level: usize) {
    for p in sect.params() {
        param(out, p, level);
    }
    for s in sect.sections() {
        section(out, s, level);
    }
}

fn param<T>(out: &mut String, p: &Param<T>, level: usize) {
    if let Some(doc) = p.doc_str() {
        docstring(out, doc, level);
    }
    indent(out, level);
    match p.argname_str() {
        Some(arg) if arg.contains(':') => {
            out.push_str(&format!("{} <{arg}>;\n", p.name()));
        }
        arg => {
            let arg = arg.unwrap_or("arg");
            out.push_str(&format!("{} <{arg}: {}>;\n", p.name(), p.type_desc()));
        }
    }
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

/// Write `doc` as `# ` comment lines wrapped to fit the page at `level`.
fn docstring(out: &mut String, doc: &str, level: usize) {
    let (level, width) = match DOC_WIDTH.checked_sub(level * 2 + 2) {
        Some(w) if w > 0 => (level, w),
        _ => (0, DOC_WIDTH - 2),
    };
    for para in doc.lines() {
        let mut line = String::new();
        for word in para.split_whitespace() {
            if !line.is_empty() && line.len() + 1 + word.len() > width {
                comment_line(out, &line, level);
                line.clear();
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        comment_line(out, &line, level);
    }
}

fn comment_line(out: &mut String, text: &str, level: usize) {
    indent(out, level);
    out.push('#');
    if !text.is_empty() {
        out.push(' ');
        out.push_str(text);
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Diagnostics;
    use crate::parser::parse;
    use crate::path::create_subtree;
    use crate::schema::Param;

    fn tree(src: &str) -> Tree {
        let mut diag = Diagnostics::new();
        parse(src, "site.rc", &mut diag).unwrap()
    }

    fn shape(t: &Tree) -> Vec<(String, Option<Value>, usize)> {
        t.iter()
            .map(|id| {
                let n = t.node(id);
                (n.tag.clone(), n.label.clone(), n.children().len())
            })
            .collect()
    }

    #[test]
    fn default_format_reparses_to_same_tree() {
        let src = "logging { facility mail; }\n\
                   server \"a b\" { port 25; alias (x, \"y z\"); flag; }\n\
                   acl { allow from 10.0.0.0/8; }\n\
                   text \"line\\none\";";
        let t = tree(src);
        let text = format_tree(&t, FormatOptions::default());
        assert_eq!(shape(&tree(&text)), shape(&t));
    }

    #[test]
    fn default_format_layout() {
        let t = tree("logging { facility mail; }");
        assert_eq!(
            format_tree(&t, FormatOptions::default()),
            "logging {\n  facility mail;\n};\n"
        );
    }

    #[test]
    fn locus_comments() {
        let t = tree("a 1;\nb 2;");
        let opts = FormatOptions {
            locus: true,
            ..Default::default()
        };
        let text = format_tree(&t, opts);
        assert_eq!(text, "# 1 site.rc\na 1;\n# 2 site.rc\nb 2;\n");
        assert_eq!(shape(&tree(&text)), shape(&t));
    }

    #[test]
    fn locus_comment_quotes_odd_file_names() {
        let mut diag = Diagnostics::new();
        let t = parse("a 1;", "my site.rc", &mut diag).unwrap();
        let opts = FormatOptions {
            locus: true,
            ..Default::default()
        };
        assert_eq!(format_tree(&t, opts), "# 1 \"my site.rc\"\na 1;\n");
    }

    #[test]
    fn internal_nodes_have_no_locus_comment() {
        let t = create_subtree("debug=1").unwrap();
        let opts = FormatOptions {
            locus: true,
            ..Default::default()
        };
        assert_eq!(format_tree(&t, opts), "debug 1;\n");
    }

    #[test]
    fn param_paths() {
        let t = tree("logging { facility mail; } server imap { port 143; }");
        let opts = FormatOptions {
            param_paths: true,
            ..Default::default()
        };
        assert_eq!(
            format_tree(&t, opts),
            "logging/facility: mail\nserver=imap/port: 143\n"
        );
    }

    #[test]
    fn param_path_label_with_slash_is_quoted() {
        let t = tree("dir \"/var/mail\" { mode 0600; }");
        let opts = FormatOptions {
            param_paths: true,
            ..Default::default()
        };
        let text = format_tree(&t, opts);
        assert_eq!(text, "dir=\"/var/mail\"/mode: 0600\n");
        let path = text.trim_end().trim_end_matches(": 0600");
        assert!(crate::path::find_node(&t, path).is_ok());
    }

    #[test]
    fn value_only() {
        let t = tree("a 1; b (x, y); c;");
        let opts = FormatOptions {
            value_only: true,
            ..Default::default()
        };
        assert_eq!(format_tree(&t, opts), "1\n(x, y)\n");
    }

    #[test]
    fn schema_template() {
        let schema = Section::<(String, u16)>::root()
            .with_param(
                Param::new("name", |t: &mut (String, u16), v: String| t.0 = v)
                    .doc("Server name."),
            )
            .unwrap()
            .with_section(
                Section::new("listen")
                    .label("<address>")
                    .doc("Listening socket.")
                    .with_param(Param::new("port", |t: &mut (String, u16), v: u16| t.1 = v))
                    .unwrap()
                    .with_param(
                        Param::callback("acl", |_: &mut (String, u16), _: &Value, _| Ok(()))
                            .argname("allow|deny: cidr"),
                    )
                    .unwrap(),
            )
            .unwrap();
        let text = format_schema(&schema);
        assert_eq!(
            text,
            "# Server name.\n\
             name <arg: string>;\n\
             # Listening socket.\n\
             listen <address> {\n  \
               port <arg: number>;\n  \
               acl <allow|deny: cidr>;\n\
             };\n\n"
        );
    }

    #[test]
    fn docstrings_wrap() {
        let mut out = String::new();
        let doc = "word ".repeat(30);
        docstring(&mut out, doc.trim_end(), 1);
        for line in out.lines() {
            assert!(line.len() <= DOC_WIDTH);
            assert!(line.starts_with("  # "));
        }
        assert!(out.lines().count() > 1);
    }
}
