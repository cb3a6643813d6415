//! Schemas: what a program accepts, and where each accepted value goes.
//!
//! A [`Section<T>`] describes a block: its parameters, its subsections, and
//! optional hooks run when a matching block is entered and left. A
//! [`Param<T>`] describes a leaf. Parameters bind through setter closures
//! captured at registration time. The target `T` is supplied on every
//! reduction, so one schema can fill many structures.
//!
//! ```
//! use mailcfg::schema::{Param, Section};
//!
//! #[derive(Default)]
//! struct Logging {
//!     facility: String,
//!     verbose: bool,
//! }
//!
//! # fn main() -> Result<(), mailcfg::CfgError> {
//! let schema = Section::<Logging>::root().with_section(
//!     Section::new("logging")
//!         .doc("Where diagnostics go.")
//!         .with_param(Param::new("facility", |l: &mut Logging, v: String| l.facility = v))?
//!         .with_param(Param::new("verbose", |l: &mut Logging, v: bool| l.verbose = v))?,
//! )?;
//! assert!(schema.find_section("logging").is_ok());
//! # Ok(())
//! # }
//! ```
//!
//! A section written for one structure can be reused inside a larger one
//! with [`Section::map_target`], which points it at a field of the outer
//! target.

use std::any::Any;
use std::rc::Rc;

use crate::convert::{self, FromTyped, ParamType, Resolver, Typed};
use crate::diag::Locus;
use crate::error::{CfgError, ConversionError};
use crate::tree::{NodeId, Tree};
use crate::value::Value;

/// What hooks and callbacks get to see about the node being reduced.
pub struct Context<'a> {
    pub tree: &'a Tree,
    pub node: NodeId,
    pub locus: &'a Locus,
    pub label: Option<&'a Value>,
    pub(crate) call_data: Option<&'a dyn Any>,
    pub(crate) resolver: &'a dyn Resolver,
}

impl Context<'_> {
    /// Caller data passed to the reduction, if it has type `D`.
    pub fn call_data<D: 'static>(&self) -> Option<&D> {
        self.call_data?.downcast_ref()
    }

    /// Convert a value with the resolver of the running reduction.
    pub fn convert(&self, value: &Value, ty: ParamType) -> Result<Typed, ConversionError> {
        convert::convert_with(value, ty, self.resolver)
    }
}

pub type Hook<T> = Box<dyn Fn(&mut T, &Context<'_>) -> Result<(), ConversionError>>;
pub type Callback<T> = Box<dyn Fn(&mut T, &Value, &Context<'_>) -> Result<(), ConversionError>>;
type Setter<T> = Box<dyn Fn(&mut T, Typed) -> Result<(), ConversionError>>;
type ListSetter<T> = Box<dyn Fn(&mut T, Vec<Typed>) -> Result<(), ConversionError>>;

pub(crate) enum ParamKind<T> {
    Scalar { ty: ParamType, set: Setter<T> },
    List { ty: ParamType, set: ListSetter<T> },
    Callback(Callback<T>),
}

fn mismatch() -> ConversionError {
    ConversionError::custom("converted value has the wrong type")
}

/// A leaf entry of a schema.
pub struct Param<T> {
    name: String,
    doc: Option<String>,
    argname: Option<String>,
    pub(crate) kind: ParamKind<T>,
}

impl<T: 'static> Param<T> {
    /// A scalar parameter. The value type `V` decides the conversion.
    pub fn new<V, F>(name: impl Into<String>, set: F) -> Self
    where
        V: FromTyped,
        F: Fn(&mut T, V) + 'static,
    {
        let set: Setter<T> = Box::new(move |target: &mut T, typed: Typed| {
            set(target, V::from_typed(typed).ok_or_else(mismatch)?);
            Ok(())
        });
        Self::with_kind(name, ParamKind::Scalar { ty: V::TYPE, set })
    }

    /// A list parameter. A single value in the configuration is accepted as a
    /// one-element list.
    pub fn list<V, F>(name: impl Into<String>, set: F) -> Self
    where
        V: FromTyped,
        F: Fn(&mut T, Vec<V>) + 'static,
    {
        let set: ListSetter<T> = Box::new(move |target: &mut T, items: Vec<Typed>| {
            let items = items
                .into_iter()
                .map(|t| V::from_typed(t).ok_or_else(mismatch))
                .collect::<Result<Vec<V>, _>>()?;
            set(target, items);
            Ok(())
        });
        Self::with_kind(name, ParamKind::List { ty: V::TYPE, set })
    }

    /// A parameter interpreted by `f`, which receives the raw label.
    pub fn callback<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut T, &Value, &Context<'_>) -> Result<(), ConversionError> + 'static,
    {
        Self::with_kind(name, ParamKind::Callback(Box::new(f)))
    }

    fn with_kind(name: impl Into<String>, kind: ParamKind<T>) -> Self {
        Param {
            name: name.into(),
            doc: None,
            argname: None,
            kind,
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Placeholder shown for the value in generated documentation.
    pub fn argname(mut self, argname: impl Into<String>) -> Self {
        self.argname = Some(argname.into());
        self
    }

    fn map_with<S: 'static>(self, project: Rc<dyn Fn(&mut S) -> &mut T>) -> Param<S> {
        let kind = match self.kind {
            ParamKind::Scalar { ty, set } => ParamKind::Scalar {
                ty,
                set: Box::new(move |s: &mut S, v: Typed| set(project(s), v)),
            },
            ParamKind::List { ty, set } => ParamKind::List {
                ty,
                set: Box::new(move |s: &mut S, v: Vec<Typed>| set(project(s), v)),
            },
            ParamKind::Callback(f) => ParamKind::Callback(Box::new(
                move |s: &mut S, v: &Value, ctx: &Context<'_>| f(project(s), v, ctx),
            )),
        };
        Param {
            name: self.name,
            doc: self.doc,
            argname: self.argname,
            kind,
        }
    }
}

impl<T> Param<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc_str(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn argname_str(&self) -> Option<&str> {
        self.argname.as_deref()
    }

    /// Kind of value expected, for documentation: `number`, `list of host`.
    pub fn type_desc(&self) -> String {
        match &self.kind {
            ParamKind::Scalar { ty, .. } => doc_type(*ty).to_string(),
            ParamKind::List { ty, .. } => format!("list of {}", doc_type(*ty)),
            ParamKind::Callback(_) => "string".to_string(),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, ParamKind::List { .. })
    }
}

fn doc_type(ty: ParamType) -> &'static str {
    match ty {
        ParamType::Short
        | ParamType::UShort
        | ParamType::Int
        | ParamType::UInt
        | ParamType::Long
        | ParamType::ULong
        | ParamType::Size => "number",
        ParamType::Bool => "boolean",
        other => other.name(),
    }
}

/// Something that can be registered under a section.
pub enum Entry<T> {
    Section(Section<T>),
    Param(Param<T>),
}

impl<T> From<Section<T>> for Entry<T> {
    fn from(s: Section<T>) -> Self {
        Entry::Section(s)
    }
}

impl<T> From<Param<T>> for Entry<T> {
    fn from(p: Param<T>) -> Self {
        Entry::Param(p)
    }
}

/// A block entry of a schema, or the root of one.
pub struct Section<T> {
    name: String,
    doc: Option<String>,
    label: Option<String>,
    pub(crate) enter: Option<Hook<T>>,
    pub(crate) leave: Option<Hook<T>>,
    params: Vec<Param<T>>,
    sections: Vec<Section<T>>,
}

impl<T: 'static> Section<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Section {
            name: name.into(),
            doc: None,
            label: None,
            enter: None,
            leave: None,
            params: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// The unnamed top-level section.
    pub fn root() -> Self {
        Self::new("")
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Placeholder for the block label in generated documentation, as in
    /// `server <address> { ... }`.
    pub fn label(mut self, argname: impl Into<String>) -> Self {
        self.label = Some(argname.into());
        self
    }

    /// Run `f` when a matching block is entered. A failure counts as one error
    /// and the block's contents are skipped.
    pub fn on_enter<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut T, &Context<'_>) -> Result<(), ConversionError> + 'static,
    {
        self.enter = Some(Box::new(f));
        self
    }

    /// Run `f` after the contents of a matching block have been reduced.
    pub fn on_leave<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut T, &Context<'_>) -> Result<(), ConversionError> + 'static,
    {
        self.leave = Some(Box::new(f));
        self
    }

    pub fn add_param(&mut self, param: Param<T>) -> Result<(), CfgError> {
        if self.find_param(&param.name).is_some() {
            return Err(self.duplicate(&param.name));
        }
        self.params.push(param);
        Ok(())
    }

    pub fn add_section(&mut self, section: Section<T>) -> Result<(), CfgError> {
        if self.find_subsection(&section.name).is_some() {
            return Err(self.duplicate(&section.name));
        }
        self.sections.push(section);
        Ok(())
    }

    pub fn with_param(mut self, param: Param<T>) -> Result<Self, CfgError> {
        self.add_param(param)?;
        Ok(self)
    }

    pub fn with_section(mut self, section: Section<T>) -> Result<Self, CfgError> {
        self.add_section(section)?;
        Ok(self)
    }

    /// Add `entry` under the section at `parent_path` (`/`-separated, empty
    /// for this section itself).
    pub fn register(&mut self, parent_path: &str, entry: impl Into<Entry<T>>) -> Result<(), CfgError> {
        let parent = self.section_mut(parent_path)?;
        match entry.into() {
            Entry::Section(s) => parent.add_section(s),
            Entry::Param(p) => parent.add_param(p),
        }
    }

    /// Rebind this section to an outer target type: every setter and hook
    /// first applies `project` to reach its `T`.
    pub fn map_target<S, F>(self, project: F) -> Section<S>
    where
        S: 'static,
        F: Fn(&mut S) -> &mut T + 'static,
    {
        self.map_with(Rc::new(project))
    }

    fn map_with<S: 'static>(self, project: Rc<dyn Fn(&mut S) -> &mut T>) -> Section<S> {
        let wrap = |hook: Hook<T>| -> Hook<S> {
            let project = Rc::clone(&project);
            Box::new(move |s: &mut S, ctx: &Context<'_>| hook(project(s), ctx))
        };
        Section {
            enter: self.enter.map(wrap),
            leave: self.leave.map(wrap),
            params: self
                .params
                .into_iter()
                .map(|p| p.map_with(Rc::clone(&project)))
                .collect(),
            sections: self
                .sections
                .into_iter()
                .map(|s| s.map_with(Rc::clone(&project)))
                .collect(),
            name: self.name,
            doc: self.doc,
            label: self.label,
        }
    }
}

impl<T> Section<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc_str(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn label_str(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn params(&self) -> &[Param<T>] {
        &self.params
    }

    pub fn sections(&self) -> &[Section<T>] {
        &self.sections
    }

    /// True when the section has nothing to bind.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.sections.is_empty()
    }

    pub fn find_param(&self, name: &str) -> Option<&Param<T>> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn find_subsection(&self, name: &str) -> Option<&Section<T>> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// The section at a `/`-separated path below this one.
    pub fn find_section(&self, path: &str) -> Result<&Section<T>, CfgError> {
        let mut cur = self;
        for name in path.split('/').filter(|s| !s.is_empty()) {
            cur = cur
                .find_subsection(name)
                .ok_or_else(|| CfgError::NoSuchSection(path.to_string()))?;
        }
        Ok(cur)
    }

    pub fn section_mut(&mut self, path: &str) -> Result<&mut Section<T>, CfgError> {
        let mut cur = self;
        for name in path.split('/').filter(|s| !s.is_empty()) {
            cur = cur
                .sections
                .iter_mut()
                .find(|s| s.name == name)
                .ok_or_else(|| CfgError::NoSuchSection(path.to_string()))?;
        }
        Ok(cur)
    }

    fn duplicate(&self, name: &str) -> CfgError {
        CfgError::DuplicateEntry {
            section: if self.name.is_empty() {
                "<root>".to_string()
            } else {
                self.name.clone()
            },
            name: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Inner {
        port: u16,
    }

    #[derive(Default)]
    struct Outer {
        name: String,
        inner: Inner,
    }

    fn noop_ctx<R>(f: impl FnOnce(&Context<'_>) -> R) -> R {
        let tree = crate::path::create_subtree("x").unwrap();
        let locus = Locus::internal();
        let ctx = Context {
            tree: &tree,
            node: tree.roots()[0],
            locus: &locus,
            label: None,
            call_data: None,
            resolver: &convert::SystemResolver,
        };
        f(&ctx)
    }

    fn set_scalar<T>(p: &Param<T>, target: &mut T, typed: Typed) -> Result<(), ConversionError> {
        match &p.kind {
            ParamKind::Scalar { set, .. } => set(target, typed),
            _ => panic!("not a scalar"),
        }
    }

    #[test]
    fn duplicate_param_is_rejected() {
        let mut s = Section::<Outer>::new("srv");
        s.add_param(Param::new("name", |o: &mut Outer, v: String| o.name = v))
            .unwrap();
        let err = s
            .add_param(Param::new("name", |o: &mut Outer, v: String| o.name = v))
            .unwrap_err();
        assert!(matches!(err, CfgError::DuplicateEntry { ref section, ref name } if section == "srv" && name == "name"));
    }

    #[test]
    fn params_and_sections_have_separate_namespaces() {
        let s = Section::<Outer>::root()
            .with_param(Param::new("acl", |o: &mut Outer, v: String| o.name = v))
            .unwrap()
            .with_section(Section::new("acl"))
            .unwrap();
        assert!(s.find_param("acl").is_some());
        assert!(s.find_subsection("acl").is_some());
    }

    #[test]
    fn register_by_path() {
        let mut root = Section::<Outer>::root()
            .with_section(Section::new("server").with_section(Section::new("tls")).unwrap())
            .unwrap();
        root.register(
            "server/tls",
            Param::new("port", |o: &mut Outer, v: u16| o.inner.port = v),
        )
        .unwrap();
        let tls = root.find_section("server/tls").unwrap();
        assert_eq!(tls.params()[0].name(), "port");

        let err = root.register("nope", Section::new("x")).unwrap_err();
        assert!(matches!(err, CfgError::NoSuchSection(p) if p == "nope"));
    }

    #[test]
    fn find_section_empty_path_is_self() {
        let root = Section::<Outer>::root();
        assert_eq!(root.find_section("").unwrap().name(), "");
    }

    #[test]
    fn map_target_projects_setters() {
        let inner = Section::<Inner>::new("inner")
            .with_param(Param::new("port", |i: &mut Inner, v: u16| i.port = v))
            .unwrap();
        let outer: Section<Outer> = inner.map_target(|o: &mut Outer| &mut o.inner);
        let mut target = Outer::default();
        set_scalar(&outer.params()[0], &mut target, Typed::UShort(993)).unwrap();
        assert_eq!(target.inner.port, 993);
    }

    #[test]
    fn map_target_projects_hooks() {
        let inner = Section::<Inner>::new("inner").on_enter(|i: &mut Inner, _| {
            i.port = 1;
            Ok(())
        });
        let outer: Section<Outer> = inner.map_target(|o: &mut Outer| &mut o.inner);
        let mut target = Outer::default();
        noop_ctx(|ctx| (outer.enter.as_ref().unwrap())(&mut target, ctx)).unwrap();
        assert_eq!(target.inner.port, 1);
    }

    #[test]
    fn setter_rejects_mismatched_variant() {
        let p = Param::new("port", |i: &mut Inner, v: u16| i.port = v);
        let mut target = Inner::default();
        assert!(set_scalar(&p, &mut target, Typed::Bool(true)).is_err());
    }

    #[test]
    fn type_desc_for_docs() {
        let p = Param::new("port", |i: &mut Inner, v: u16| i.port = v);
        assert_eq!(p.type_desc(), "number");
        assert_eq!(p.argname_str(), None);
        let p = Param::list("ports", |i: &mut Inner, v: Vec<u16>| i.port = v[0]).argname("port");
        assert_eq!(p.type_desc(), "list of number");
        assert_eq!(p.argname_str(), Some("port"));
        assert!(p.is_list());
    }

    #[test]
    fn context_downcasts_call_data() {
        let tree = crate::path::create_subtree("x").unwrap();
        let locus = Locus::internal();
        let data = 42u32;
        let ctx = Context {
            tree: &tree,
            node: tree.roots()[0],
            locus: &locus,
            label: None,
            call_data: Some(&data),
            resolver: &convert::SystemResolver,
        };
        assert_eq!(ctx.call_data::<u32>(), Some(&42));
        assert_eq!(ctx.call_data::<String>(), None);
    }
}
