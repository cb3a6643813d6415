//! Source positions and the diagnostics sink.
//!
//! Every stage of the engine (parser, postprocess, reducer, loader) reports
//! problems into a [`Diagnostics`] value passed in by the caller instead of a
//! process-wide counter. A nested reduction run by an auxiliary tool gets its
//! own sink and never leaks errors into an unrelated call.
//!
//! Each pushed diagnostic is also emitted as a `tracing` event, so an
//! application that installs a subscriber sees the messages as they happen
//! while still being able to inspect the full list afterwards.

use std::fmt;

use serde::Serialize;

/// A position in a configuration source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Locus {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl Locus {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Locus {
            file: file.into(),
            line,
            column,
        }
    }

    /// Locus used for nodes synthesized from code rather than read from a file.
    pub fn internal() -> Self {
        Locus::new("<int>", 0, 0)
    }

    pub fn is_internal(&self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.column > 0 {
            write!(f, "{}:{}.{}", self.file, self.line, self.column)
        } else {
            write!(f, "{}:{}", self.file, self.line)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One locus-tagged message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub locus: Option<Locus>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(locus) = &self.locus {
            write!(f, "{locus}: ")?;
        }
        if self.severity == Severity::Warning {
            write!(f, "warning: ")?;
        }
        write!(f, "{}", self.message)
    }
}

#[cfg(feature = "rich-errors")]
impl Diagnostic {
    /// Render this diagnostic against the text it was reported for, with the
    /// offending line labelled.
    pub fn to_report(&self, source: &str) -> miette::Report {
        use miette::{LabeledSpan, MietteDiagnostic, NamedSource};

        let severity = match self.severity {
            Severity::Error => miette::Severity::Error,
            Severity::Warning => miette::Severity::Warning,
        };
        let mut diag = MietteDiagnostic::new(self.message.clone()).with_severity(severity);
        let name = match &self.locus {
            Some(locus) => {
                if let Some((offset, len)) = byte_span(source, locus) {
                    diag = diag.with_label(LabeledSpan::at(offset..offset + len, "here"));
                }
                locus.file.clone()
            }
            None => String::from("<config>"),
        };
        miette::Report::new(diag).with_source_code(NamedSource::new(name, source.to_string()))
    }
}

/// Byte offset and length of the rest of the line a locus points at.
#[cfg(feature = "rich-errors")]
fn byte_span(source: &str, locus: &Locus) -> Option<(usize, usize)> {
    if locus.line == 0 {
        return None;
    }
    let mut offset = 0;
    for (i, line) in source.split_inclusive('\n').enumerate() {
        if i + 1 == locus.line {
            let col = locus.column.saturating_sub(1).min(line.len());
            let text = line[col..].trim_end_matches(['\n', '\r']);
            return Some((offset + col, text.len().max(1)));
        }
        offset += line.len();
    }
    None
}

/// Ordered collection of diagnostics produced during one load/reduce run.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error at `locus`.
    pub fn error(&mut self, locus: &Locus, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(locus = %locus, "{message}");
        self.entries.push(Diagnostic {
            severity: Severity::Error,
            locus: Some(locus.clone()),
            message,
        });
    }

    /// Record an error that has no source position (e.g. an unreadable file).
    pub fn error_global(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{message}");
        self.entries.push(Diagnostic {
            severity: Severity::Error,
            locus: None,
            message,
        });
    }

    pub fn warning(&mut self, locus: &Locus, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(locus = %locus, "{message}");
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            locus: Some(locus.clone()),
            message,
        });
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.entries.len() - self.error_count()
    }

    /// True when no errors were reported. Warnings do not count.
    pub fn is_clean(&self) -> bool {
        self.error_count() == 0
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    /// Append everything collected by another sink, preserving order.
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}
