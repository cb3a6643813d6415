//! Binding a parse tree to a schema.
//!
//! The reducer walks the tree in preorder, keeping a stack of the schema
//! sections it is inside. Each statement must name a subsection of the
//! innermost one, and each parameter one of its parameters. Values are
//! converted to the declared type and handed to the parameter's setter.
//!
//! Problems are reported to the [`Diagnostics`] sink and the walk goes on, so
//! one pass reports every bad line. Bindings made before an error stay in
//! place.

use std::any::Any;

use crate::convert::{self, Resolver, SystemResolver};
use crate::diag::Diagnostics;
use crate::error::ConversionError;
use crate::schema::{Context, Param, ParamKind, Section};
use crate::tree::{NodeId, NodeKind, Tree, Visit, Visitor};
use crate::value::Value;

/// Reduce with the system host resolver.
pub fn reduce<T>(
    tree: &Tree,
    schema: &Section<T>,
    target: &mut T,
    call_data: Option<&dyn Any>,
    diag: &mut Diagnostics,
) -> usize {
    Reducer::new().reduce(tree, schema, target, call_data, diag)
}

/// Reduction settings.
pub struct Reducer<'r> {
    resolver: &'r dyn Resolver,
}

impl Default for Reducer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Reducer<'r> {
    pub fn new() -> Self {
        Reducer {
            resolver: &SystemResolver,
        }
    }

    /// Use `resolver` for `host` parameters.
    pub fn resolver(mut self, resolver: &'r dyn Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Bind `tree` into `target` following `schema`. Returns the number of
    /// errors reported to `diag` by this call.
    pub fn reduce<T>(
        &self,
        tree: &Tree,
        schema: &Section<T>,
        target: &mut T,
        call_data: Option<&dyn Any>,
        diag: &mut Diagnostics,
    ) -> usize {
        let before = diag.error_count();
        let mut scan = Scan {
            stack: vec![schema],
            target,
            call_data,
            resolver: self.resolver,
            diag: &mut *diag,
        };
        tree.preorder(&mut scan);
        let errors = diag.error_count() - before;
        tracing::debug!(errors, "reduction finished");
        errors
    }
}

struct Scan<'s, T> {
    stack: Vec<&'s Section<T>>,
    target: &'s mut T,
    call_data: Option<&'s dyn Any>,
    resolver: &'s dyn Resolver,
    diag: &'s mut Diagnostics,
}

impl<'s, T> Scan<'s, T> {
    fn context<'t>(&self, tree: &'t Tree, id: NodeId) -> Context<'t>
    where
        's: 't,
    {
        let node = tree.node(id);
        Context {
            tree,
            node: id,
            locus: &node.locus,
            label: node.label.as_ref(),
            call_data: self.call_data,
            resolver: self.resolver,
        }
    }

    fn top(&self) -> &'s Section<T> {
        self.stack[self.stack.len() - 1]
    }

    fn statement(&mut self, tree: &Tree, id: NodeId) -> Visit {
        let node = tree.node(id);
        let Some(section) = self.top().find_subsection(&node.tag) else {
            self.diag
                .error(&node.locus, format!("unknown section `{}'", node.tag));
            return Visit::Skip;
        };
        if section.is_empty() {
            return Visit::Skip;
        }
        if let Some(enter) = &section.enter {
            let ctx = self.context(tree, id);
            if let Err(e) = enter(&mut *self.target, &ctx) {
                self.diag.error(&node.locus, e.to_string());
                return Visit::Skip;
            }
        }
        self.stack.push(section);
        Visit::Continue
    }

    fn parameter(&mut self, tree: &Tree, id: NodeId) {
        let node = tree.node(id);
        let Some(param) = self.top().find_param(&node.tag) else {
            self.diag
                .error(&node.locus, format!("unknown keyword `{}'", node.tag));
            return;
        };
        if let Err(e) = self.bind(tree, id, param) {
            self.diag.error(&node.locus, format!("`{}': {e}", node.tag));
        }
    }

    fn bind(&mut self, tree: &Tree, id: NodeId, param: &Param<T>) -> Result<(), ConversionError> {
        let node = tree.node(id);
        let label = node.label.as_ref().ok_or(ConversionError::MissingValue)?;
        match &param.kind {
            ParamKind::Callback(f) => {
                let ctx = self.context(tree, id);
                f(&mut *self.target, label, &ctx)
            }
            ParamKind::Scalar { ty, set } => {
                let value = convert::convert_with(label, *ty, self.resolver)?;
                set(&mut *self.target, value)
            }
            ParamKind::List { ty, set } => {
                let items = match label {
                    Value::String(_) => std::slice::from_ref(label),
                    Value::List(items) => items.as_slice(),
                    Value::Array(_) => return Err(ConversionError::ExpectedList),
                };
                let mut converted = Vec::with_capacity(items.len());
                for item in items {
                    match convert::convert_with(item, *ty, self.resolver) {
                        Ok(v) => converted.push(v),
                        Err(e) => self
                            .diag
                            .error(&node.locus, format!("`{}': {e}", node.tag)),
                    }
                }
                set(&mut *self.target, converted)
            }
        }
    }
}

impl<T> Visitor for Scan<'_, T> {
    fn enter(&mut self, tree: &Tree, id: NodeId) -> Visit {
        match tree.node(id).kind {
            NodeKind::Statement => self.statement(tree, id),
            NodeKind::Parameter => {
                self.parameter(tree, id);
                Visit::Continue
            }
        }
    }

    fn leave(&mut self, tree: &Tree, id: NodeId) -> Visit {
        let Some(section) = self.stack.pop() else {
            return Visit::Continue;
        };
        if let Some(leave) = &section.leave {
            let ctx = self.context(tree, id);
            if let Err(e) = leave(&mut *self.target, &ctx) {
                self.diag.error(&tree.node(id).locus, e.to_string());
            }
        }
        Visit::Continue
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use super::*;
    use crate::convert::HostAddr;
    use crate::parser::parse;
    use crate::schema::Param;

    #[derive(Debug, Default)]
    struct Server {
        name: String,
        port: u16,
        timeout: Duration,
        aliases: Vec<String>,
        ports: Vec<u16>,
        host: Option<HostAddr>,
        trace: Vec<String>,
    }

    fn schema() -> Section<Server> {
        Section::root()
            .with_param(Param::new("name", |s: &mut Server, v: String| s.name = v))
            .unwrap()
            .with_param(Param::list("alias", |s: &mut Server, v: Vec<String>| {
                s.aliases.extend(v)
            }))
            .unwrap()
            .with_section(
                Section::new("listen")
                    .on_enter(|s: &mut Server, ctx| {
                        s.trace.push(format!("enter {}", ctx.label.map(|l| l.to_string()).unwrap_or_default()));
                        Ok(())
                    })
                    .on_leave(|s: &mut Server, _| {
                        s.trace.push("leave".into());
                        Ok(())
                    })
                    .with_param(Param::new("port", |s: &mut Server, v: u16| s.port = v))
                    .unwrap()
                    .with_param(Param::list("ports", |s: &mut Server, v: Vec<u16>| s.ports = v))
                    .unwrap()
                    .with_param(Param::new("timeout", |s: &mut Server, v: Duration| {
                        s.timeout = v
                    }))
                    .unwrap()
                    .with_param(Param::new("host", |s: &mut Server, v: HostAddr| {
                        s.host = Some(v)
                    }))
                    .unwrap(),
            )
            .unwrap()
            .with_section(Section::new("empty"))
            .unwrap()
    }

    fn run(src: &str) -> (Server, usize, Diagnostics) {
        let mut diag = Diagnostics::new();
        let tree = parse(src, "test", &mut diag).unwrap();
        let mut target = Server::default();
        let errors = reduce(&tree, &schema(), &mut target, None, &mut diag);
        (target, errors, diag)
    }

    #[test]
    fn binds_scalars_in_sections() {
        let (s, errors, _) = run("name imap; listen { port 143; timeout 30; }");
        assert_eq!(errors, 0);
        assert_eq!(s.name, "imap");
        assert_eq!(s.port, 143);
        assert_eq!(s.timeout, Duration::from_secs(30));
    }

    #[test]
    fn hooks_bracket_children() {
        let (s, errors, _) = run("listen main { port 1; } listen other { port 2; }");
        assert_eq!(errors, 0);
        assert_eq!(s.trace, vec!["enter main", "leave", "enter other", "leave"]);
        assert_eq!(s.port, 2);
    }

    #[test]
    fn unknown_keyword_counts_once_and_continues() {
        let (s, errors, diag) = run("name a; bogus 1; listen { nope; port 25; }");
        assert_eq!(errors, 2);
        assert_eq!(s.name, "a");
        assert_eq!(s.port, 25);
        let messages: Vec<_> = diag.errors().map(|d| d.message.clone()).collect();
        assert_eq!(messages, vec!["unknown keyword `bogus'", "unknown keyword `nope'"]);
    }

    #[test]
    fn unknown_section_skips_subtree() {
        let (s, errors, diag) = run("mystery { port 1; bogus 2; } listen { port 3; }");
        assert_eq!(errors, 1);
        assert_eq!(s.port, 3);
        assert!(diag.to_string().contains("unknown section `mystery'"));
    }

    #[test]
    fn section_without_entries_is_skipped_silently() {
        let (_, errors, diag) = run("empty { anything goes; }");
        assert_eq!(errors, 0);
        assert!(diag.is_empty());
    }

    #[test]
    fn scalar_promotes_to_list() {
        let (s, errors, _) = run("alias mail; alias (smtp, lmtp); listen { ports 25; }");
        assert_eq!(errors, 0);
        assert_eq!(s.aliases, vec!["mail", "smtp", "lmtp"]);
        assert_eq!(s.ports, vec![25]);
    }

    #[test]
    fn array_for_list_is_type_error() {
        let (s, errors, diag) = run("alias a b;");
        assert_eq!(errors, 1);
        assert!(s.aliases.is_empty());
        assert!(diag.to_string().contains("expected list, but found array"));
    }

    #[test]
    fn bad_list_elements_are_reported_and_dropped() {
        let (s, errors, _) = run("listen { ports (25, x, 99999, 587); }");
        assert_eq!(errors, 2);
        assert_eq!(s.ports, vec![25, 587]);
    }

    #[test]
    fn conversion_errors_name_the_keyword() {
        let (s, errors, diag) = run("listen { port 70000; port 110; timeout; }");
        assert_eq!(errors, 2);
        assert_eq!(s.port, 110);
        let text = diag.to_string();
        assert!(text.contains("`port': value out of allowed range"));
        assert!(text.contains("`timeout'"));
    }

    #[test]
    fn list_value_for_scalar_is_error() {
        let (_, errors, diag) = run("name (a, b);");
        assert_eq!(errors, 1);
        assert!(diag.to_string().contains("expected string value"));
    }

    #[test]
    fn failing_enter_hook_skips_block() {
        let schema = Section::<Server>::root()
            .with_section(
                Section::new("listen")
                    .on_enter(|_: &mut Server, _| Err(ConversionError::custom("refused")))
                    .with_param(Param::new("port", |s: &mut Server, v: u16| s.port = v))
                    .unwrap(),
            )
            .unwrap();
        let mut diag = Diagnostics::new();
        let tree = parse("listen { port 1; bogus; }", "t", &mut diag).unwrap();
        let mut target = Server::default();
        assert_eq!(reduce(&tree, &schema, &mut target, None, &mut diag), 1);
        assert_eq!(target.port, 0);
    }

    #[test]
    fn failing_leave_hook_counts() {
        let schema = Section::<Server>::root()
            .with_section(
                Section::new("listen")
                    .on_leave(|s: &mut Server, _| {
                        if s.port == 0 {
                            Err(ConversionError::custom("port is required"))
                        } else {
                            Ok(())
                        }
                    })
                    .with_param(Param::new("port", |s: &mut Server, v: u16| s.port = v))
                    .unwrap(),
            )
            .unwrap();
        let mut diag = Diagnostics::new();
        let tree = parse("listen { port 0; }", "t", &mut diag).unwrap();
        let mut target = Server::default();
        assert_eq!(reduce(&tree, &schema, &mut target, None, &mut diag), 1);
        assert!(diag.to_string().contains("port is required"));
    }

    #[test]
    fn callback_sees_raw_label_and_call_data() {
        let schema = Section::<Vec<String>>::root()
            .with_param(Param::callback("tag", |out: &mut Vec<String>, v: &Value, ctx| {
                let prefix = ctx.call_data::<&str>().copied().unwrap_or("");
                out.push(format!("{prefix}{v}"));
                Ok(())
            }))
            .unwrap();
        let mut diag = Diagnostics::new();
        let tree = parse("tag (a, b); tag x y;", "t", &mut diag).unwrap();
        let mut out = Vec::new();
        let prefix: &str = "> ";
        let errors = reduce(&tree, &schema, &mut out, Some(&prefix), &mut diag);
        assert_eq!(errors, 0);
        assert_eq!(out, vec!["> (a, b)", "> x y"]);
    }

    struct FixedResolver;

    impl Resolver for FixedResolver {
        fn resolve(&self, host: &str) -> Option<Ipv4Addr> {
            (host == "mail.example").then_some(Ipv4Addr::new(192, 0, 2, 25))
        }
    }

    #[test]
    fn custom_resolver_for_hosts() {
        let mut diag = Diagnostics::new();
        let tree = parse("listen { host mail.example; }", "t", &mut diag).unwrap();
        let mut target = Server::default();
        let errors = Reducer::new()
            .resolver(&FixedResolver)
            .reduce(&tree, &schema(), &mut target, None, &mut diag);
        assert_eq!(errors, 0);
        assert_eq!(target.host, Some(HostAddr(Ipv4Addr::new(192, 0, 2, 25))));
    }

    #[test]
    fn same_schema_binds_different_targets() {
        let schema = schema();
        let mut diag = Diagnostics::new();
        let a = parse("name a;", "a", &mut diag).unwrap();
        let b = parse("name b;", "b", &mut diag).unwrap();
        let (mut ta, mut tb) = (Server::default(), Server::default());
        reduce(&a, &schema, &mut ta, None, &mut diag);
        reduce(&b, &schema, &mut tb, None, &mut diag);
        assert_eq!((ta.name.as_str(), tb.name.as_str()), ("a", "b"));
    }

    #[test]
    fn error_count_is_per_call() {
        let schema = schema();
        let mut diag = Diagnostics::new();
        let tree = parse("bogus;", "t", &mut diag).unwrap();
        let mut t = Server::default();
        assert_eq!(reduce(&tree, &schema, &mut t, None, &mut diag), 1);
        assert_eq!(reduce(&tree, &schema, &mut t, None, &mut diag), 1);
        assert_eq!(diag.error_count(), 2);
    }
}
