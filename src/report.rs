//! Error chains rendered as nested report records.

use crate::errors::{CoreError, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;
use std::any::type_name;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;

/// Where an error was raised.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct ErrorOrigin {
    pub application: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl ErrorOrigin {
    pub fn new(application: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            method: None,
            stack_trace: None,
        }
    }

    /// Origin for the running executable, with a backtrace when backtraces
    /// are enabled (`RUST_BACKTRACE` / `RUST_LIB_BACKTRACE`).
    pub fn capture(method: impl Into<String>) -> Self {
        let application = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
        let backtrace = Backtrace::capture();
        let stack_trace = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };
        Self {
            application,
            method: Some(method.into()),
            stack_trace,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }
}

/// One error in a causal chain, holding the error that caused it (if any).
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ErrorReport {
    #[serde(rename = "type")]
    pub type_name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<ErrorOrigin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<ErrorReport>>,
}

impl ErrorReport {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            origin: None,
            inner: None,
        }
    }

    pub fn with_origin(mut self, origin: ErrorOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_inner(mut self, inner: ErrorReport) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// Builds a report for `error` and every error reachable through `source()`.
    pub fn from_error<E: Error + 'static>(error: &E) -> Self {
        let report = Self::new(type_name::<E>(), error.to_string());
        match error.source() {
            Some(source) => report.with_inner(Self::from_dyn_error(source)),
            None => report,
        }
    }

    /// Like [`ErrorReport::from_error`] for a type-erased error.
    ///
    /// Type names are only known for errors this crate can downcast to; the
    /// rest are reported as `dyn Error`.
    pub fn from_dyn_error(error: &(dyn Error + 'static)) -> Self {
        let report = Self::new(erased_type_name(error), error.to_string());
        match error.source() {
            Some(source) => report.with_inner(Self::from_dyn_error(source)),
            None => report,
        }
    }

    /// Iterates from this error down to the root cause.
    pub fn chain(&self) -> impl Iterator<Item = &ErrorReport> {
        std::iter::successors(Some(self), |report| report.inner.as_deref())
    }

    /// Number of errors in the chain, including this one.
    pub fn depth(&self) -> usize {
        self.chain().count()
    }

    /// The last error in the chain.
    pub fn root_cause(&self) -> &ErrorReport {
        self.chain().last().unwrap_or(self)
    }

    /// Renders the chain as an `<Exception>` document with nested `<InnerException>` nodes.
    pub fn to_xml(&self) -> Result<String> {
        let mut xml = XmlWriter::new();
        xml.declaration()?;
        self.write_node(&mut xml, "Exception")?;
        xml.finish()
    }

    fn write_node(&self, xml: &mut XmlWriter, element: &str) -> Result<()> {
        xml.start(element)?;
        xml.text_element("Type", &self.type_name)?;
        xml.text_element("Message", &self.message)?;
        if let Some(origin) = &self.origin {
            xml.start("Source")?;
            xml.text_element("Application", &origin.application)?;
            if let Some(method) = &origin.method {
                xml.text_element("Method", method)?;
            }
            if let Some(stack_trace) = &origin.stack_trace {
                xml.text_element("StackTrace", stack_trace)?;
            }
            xml.end("Source")?;
        }
        if let Some(inner) = &self.inner {
            inner.write_node(xml, "InnerException")?;
        }
        xml.end(element)
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (idx, report) in self.chain().enumerate() {
            if idx > 0 {
                write!(f, "\n  caused by: ")?;
            }
            write!(f, "{}: {}", report.type_name, report.message)?;
        }
        Ok(())
    }
}

fn erased_type_name(error: &(dyn Error + 'static)) -> &'static str {
    if error.is::<std::io::Error>() {
        type_name::<std::io::Error>()
    } else if error.is::<CoreError>() {
        type_name::<CoreError>()
    } else if error.is::<std::num::ParseIntError>() {
        type_name::<std::num::ParseIntError>()
    } else if error.is::<std::num::ParseFloatError>() {
        type_name::<std::num::ParseFloatError>()
    } else if error.is::<std::str::Utf8Error>() {
        type_name::<std::str::Utf8Error>()
    } else if error.is::<std::fmt::Error>() {
        type_name::<std::fmt::Error>()
    } else {
        "dyn Error"
    }
}

/// Indented XML output shared by the report renderers.
pub(crate) struct XmlWriter {
    inner: Writer<Vec<u8>>,
}

impl XmlWriter {
    pub(crate) fn new() -> Self {
        Self {
            inner: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn write(&mut self, event: Event<'_>) -> Result<()> {
        self.inner
            .write_event(event)
            .map_err(|err| CoreError::xml(err.to_string()))
    }

    pub(crate) fn declaration(&mut self) -> Result<()> {
        self.write(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
    }

    pub(crate) fn start(&mut self, name: &str) -> Result<()> {
        self.write(Event::Start(BytesStart::new(name)))
    }

    pub(crate) fn start_with_attributes(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
    ) -> Result<()> {
        let mut start = BytesStart::new(name);
        for attribute in attributes {
            start.push_attribute(*attribute);
        }
        self.write(Event::Start(start))
    }

    pub(crate) fn end(&mut self, name: &str) -> Result<()> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    pub(crate) fn text(&mut self, text: &str) -> Result<()> {
        self.write(Event::Text(BytesText::new(text)))
    }

    pub(crate) fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.start(name)?;
        self.text(text)?;
        self.end(name)
    }

    pub(crate) fn finish(self) -> Result<String> {
        String::from_utf8(self.inner.into_inner()).map_err(|err| CoreError::xml(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    fn child_text<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
        node.children()
            .find(|child| child.has_tag_name(name))
            .and_then(|child| child.text())
    }

    #[test]
    fn chain_terminates_at_first_error_without_cause() {
        let error = CoreError::io(
            PathBuf::from("/srv/data.xml"),
            io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
        );
        let report = ErrorReport::from_error(&error);

        assert_eq!(report.depth(), 2);
        assert_eq!(report.type_name, type_name::<CoreError>());
        assert_eq!(report.message, "I/O error while accessing /srv/data.xml");
        assert_eq!(report.root_cause().type_name, type_name::<io::Error>());
        assert_eq!(report.root_cause().message, "access denied");
        assert!(report.root_cause().inner.is_none());
    }

    #[test]
    fn xml_nests_inner_exceptions() {
        let report = ErrorReport::new("LoadError", "could not load <config> & friends")
            .with_origin(
                ErrorOrigin::new("loader")
                    .with_method("load_config")
                    .with_stack_trace("at load_config\nat main"),
            )
            .with_inner(
                ErrorReport::new("ParseError", "unexpected token")
                    .with_inner(ErrorReport::new("IoError", "truncated file")),
            );

        let xml = report.to_xml().unwrap();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let root = doc.root_element();
        assert!(root.has_tag_name("Exception"));
        assert_eq!(child_text(root, "Type"), Some("LoadError"));
        assert_eq!(child_text(root, "Message"), Some("could not load <config> & friends"));

        let source = root.children().find(|n| n.has_tag_name("Source")).unwrap();
        assert_eq!(child_text(source, "Application"), Some("loader"));
        assert_eq!(child_text(source, "Method"), Some("load_config"));
        assert_eq!(child_text(source, "StackTrace"), Some("at load_config\nat main"));

        let inner = root.children().find(|n| n.has_tag_name("InnerException")).unwrap();
        assert_eq!(child_text(inner, "Type"), Some("ParseError"));
        assert!(inner.children().all(|n| !n.has_tag_name("Source")));
        let innermost = inner.children().find(|n| n.has_tag_name("InnerException")).unwrap();
        assert_eq!(child_text(innermost, "Message"), Some("truncated file"));
        assert!(innermost.children().all(|n| !n.has_tag_name("InnerException")));
    }

    #[test]
    fn serializes_to_json() {
        let report =
            ErrorReport::new("Outer", "top").with_inner(ErrorReport::new("Inner", "bottom"));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["type"], "Outer");
        assert_eq!(value["inner"]["message"], "bottom");
        assert!(value["inner"].get("inner").is_none());
        assert!(value.get("origin").is_none());
    }

    #[test]
    fn display_lists_causes() {
        let report = ErrorReport::new("A", "first").with_inner(ErrorReport::new("B", "second"));
        assert_eq!(report.to_string(), "A: first\n  caused by: B: second");
    }

    #[test]
    fn captured_origin_names_the_method() {
        let origin = ErrorOrigin::capture("validate");
        assert_eq!(origin.method.as_deref(), Some("validate"));
        assert!(!origin.application.is_empty());
    }
}
