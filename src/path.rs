//! Path addressing into a parse tree.
//!
//! A path names a chain of nested nodes: `mailbox/type`. Any segment may carry
//! a `=label` qualifier to pick one of several siblings sharing a tag, as in
//! `server=imap/port` or `acl=(a, b)/allow`. The label uses value syntax,
//! so it may be quoted or be a parenthesized list.
//!
//! The delimiter is `/` unless the path starts with a punctuation character,
//! which then becomes the delimiter for that path (`:logging:facility`). A
//! path starting with a backslash is one literal segment.

use crate::diag::Locus;
use crate::error::CfgError;
use crate::parser::{is_ident, parse_value};
use crate::tree::{Node, NodeId, NodeKind, Tree};
use crate::value::Value;

pub const DEFAULT_DELIMITER: char = '/';

/// One component of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub tag: String,
    pub label: Option<Value>,
}

impl Segment {
    pub fn matches(&self, node: &Node) -> bool {
        node.tag == self.tag
            && match &self.label {
                Some(want) => node.label.as_ref() == Some(want),
                None => true,
            }
    }
}

/// Split `path` into segments.
pub fn split(path: &str) -> Result<Vec<Segment>, CfgError> {
    let invalid = |reason: &str| CfgError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let literal = path.starts_with('\\');
    let words = if let Some(rest) = path.strip_prefix('\\') {
        vec![rest.to_string()]
    } else {
        let mut chars = path.chars();
        match chars.next() {
            Some(c) if c.is_ascii_punctuation() && !matches!(c, '"' | '\'' | '(') => {
                split_words(chars.as_str(), c)
            }
            _ => split_words(path, DEFAULT_DELIMITER),
        }
    };
    if words.is_empty() {
        return Err(invalid("empty path"));
    }

    words
        .iter()
        .map(|word| {
            let (tag, label) = match find_unescaped(word, '=') {
                Some(pos) => (&word[..pos], Some(&word[pos + 1..])),
                None => (word.as_str(), None),
            };
            let tag = if literal { tag.to_string() } else { unquote(tag) };
            let valid = if literal { !tag.is_empty() } else { is_ident(&tag) };
            if !valid {
                return Err(invalid(&format!("`{tag}' is not a valid tag")));
            }
            let label = label
                .map(|text| parse_value(text).map_err(|e| invalid(&e)))
                .transpose()?;
            Ok(Segment { tag, label })
        })
        .collect()
}

/// Split on `delim` outside quotes and parentheses, dropping empty words.
/// Backslash escapes are kept for the later stages.
fn split_words(s: &str, delim: char) -> Vec<String> {
    let mut words = Vec::new();
    let mut cur = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (_, '\\') => {
                cur.push(c);
                if let Some(next) = chars.next() {
                    cur.push(next);
                }
            }
            (Some(q), _) if c == q => {
                quote = None;
                cur.push(c);
            }
            (Some(_), _) => cur.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                cur.push(c);
            }
            (None, '(') => {
                depth += 1;
                cur.push(c);
            }
            (None, ')') => {
                depth = depth.saturating_sub(1);
                cur.push(c);
            }
            (None, _) if c == delim && depth == 0 => {
                if !cur.is_empty() {
                    words.push(std::mem::take(&mut cur));
                }
            }
            _ => cur.push(c),
        }
    }
    if !cur.is_empty() {
        words.push(cur);
    }
    words
}

/// Byte offset of the first `target` not escaped by a backslash and not
/// inside quotes.
fn find_unescaped(s: &str, target: char) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (_, '\\') => escaped = true,
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, _) if c == target => return Some(i),
            _ => {}
        }
    }
    None
}

/// Strip quotes and resolve backslash escapes in a tag.
fn unquote(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut quote: Option<char> = None;
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match (quote, c) {
            (_, '\\') => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            (Some(q), _) if c == q => quote = None,
            (None, '"' | '\'') => quote = Some(c),
            _ => out.push(c),
        }
    }
    out
}

/// Find the first node, in source order, addressed by `path`.
///
/// Matching is depth-first: when a segment matches a node whose subtree does
/// not contain the rest of the path, the search moves on to later siblings.
pub fn find_node(tree: &Tree, path: &str) -> Result<NodeId, CfgError> {
    let segments = split(path)?;
    search(tree, tree.roots(), &segments).ok_or_else(|| CfgError::NotFound(path.to_string()))
}

fn search(tree: &Tree, ids: &[NodeId], segments: &[Segment]) -> Option<NodeId> {
    let (seg, rest) = segments.split_first()?;
    for &id in ids {
        let node = tree.node(id);
        if !seg.matches(node) {
            continue;
        }
        if rest.is_empty() {
            return Some(id);
        }
        if let Some(found) = search(tree, node.children(), rest) {
            return Some(found);
        }
    }
    None
}

/// The label of the node addressed by `path`.
pub fn find_label<'t>(tree: &'t Tree, path: &str) -> Result<&'t Value, CfgError> {
    let id = find_node(tree, path)?;
    tree.node(id)
        .label
        .as_ref()
        .ok_or_else(|| CfgError::NotFound(path.to_string()))
}

/// Build a one-root tree from `path` alone. Every segment but the last is a
/// statement; the last is a parameter carrying its label, if any.
///
/// `logging/facility=mail` gives the same tree as `logging { facility mail; }`.
pub fn create_subtree(path: &str) -> Result<Tree, CfgError> {
    let segments = split(path)?;
    let last = segments.len() - 1;
    let mut tree = Tree::new();
    let mut parent = None;
    for (i, seg) in segments.into_iter().enumerate() {
        let kind = if i == last {
            NodeKind::Parameter
        } else {
            NodeKind::Statement
        };
        parent = Some(tree.push(parent, kind, seg.tag, seg.label, Locus::internal()));
    }
    Ok(tree)
}
