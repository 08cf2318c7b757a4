//! XML Schema validation for a practical subset of XSD 1.0.
//!
//! Supported: global and local element declarations (including `ref`),
//! named and anonymous complex types built from `sequence`, `choice` and
//! `all`, simple content extensions, attributes with `use`, `anyAttribute`,
//! `any`, and simple type restrictions with the `enumeration`, `pattern`,
//! `length`, `minLength`, `maxLength`, `minInclusive` and `maxInclusive`
//! facets. Anything else is rejected when the schema is loaded rather than
//! silently ignored.

mod model;
mod validate;

use crate::errors::{CoreError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::paths::PathValidator;
use crate::report::XmlWriter;
use model::SchemaModel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// File extension accepted for schema files.
pub const SCHEMA_EXTENSION: &str = "xsd";

/// How many deviations a validation run collects.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Stop at the first deviation and return it as [`CoreError::Validation`].
    #[default]
    FailFast,
    /// Record every deviation in the returned [`ValidationReport`].
    CollectAll,
}

/// One place where a document does not match its schema.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Deviation {
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
    pub message: String,
}

impl Deviation {
    pub fn new(line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Deviation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}: {}", self.line, self.column, self.message)
    }
}

/// Outcome of validating one document.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct ValidationReport {
    /// The validated file, when the document came from disk.
    pub document: Option<PathBuf>,
    /// Deviations ordered by position.
    pub deviations: Vec<Deviation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.deviations.is_empty()
    }

    /// Renders the report as a `<ValidationReport>` document.
    pub fn to_xml(&self) -> Result<String> {
        let document = self
            .document
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_default();
        let valid = if self.is_valid() { "true" } else { "false" };

        let mut xml = XmlWriter::new();
        xml.declaration()?;
        xml.start_with_attributes(
            "ValidationReport",
            &[("document", document.as_str()), ("valid", valid)],
        )?;
        for deviation in &self.deviations {
            let line = deviation.line.to_string();
            let column = deviation.column.to_string();
            xml.start_with_attributes(
                "Deviation",
                &[("line", line.as_str()), ("column", column.as_str())],
            )?;
            xml.text(&deviation.message)?;
            xml.end("Deviation")?;
        }
        xml.end("ValidationReport")?;
        xml.finish()
    }
}

/// A loaded schema, ready to validate documents.
#[derive(Debug, Clone)]
pub struct Schema {
    model: SchemaModel,
    source: Option<PathBuf>,
}

impl Schema {
    /// Parses schema text.
    pub fn parse(text: &str) -> Result<Self> {
        let model = model::parse_schema(text)?;
        Ok(Self { model, source: None })
    }

    /// Loads a schema file; the path must name an existing `.xsd` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_file_in(&RealFileSystem, path)
    }

    pub fn from_file_in<F: FileSystem + Copy>(fs: &F, path: &Path) -> Result<Self> {
        PathValidator::new(*fs).validate_file(path, &[SCHEMA_EXTENSION])?;
        let text = fs.read_to_string(path)?;
        let mut schema = Self::parse(&text)?;
        schema.source = Some(path.to_path_buf());
        tracing::debug!(
            path = %path.display(),
            elements = schema.model.elements.len(),
            types = schema.model.types.len(),
            "loaded schema"
        );
        Ok(schema)
    }

    /// File the schema was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.model.target_namespace.as_deref()
    }

    /// Names of the elements a document may use as its root.
    pub fn root_elements(&self) -> impl Iterator<Item = &str> {
        self.model.elements.keys().map(String::as_str)
    }

    /// Validates document text.
    ///
    /// In [`ValidationMode::FailFast`] the first deviation is returned as
    /// [`CoreError::Validation`]; otherwise every deviation is reported.
    pub fn validate_str(&self, text: &str, mode: ValidationMode) -> Result<ValidationReport> {
        let mut deviations = validate::validate(&self.model, text, mode);
        if mode == ValidationMode::FailFast && !deviations.is_empty() {
            return Err(CoreError::Validation(deviations.swap_remove(0)));
        }
        Ok(ValidationReport {
            document: None,
            deviations,
        })
    }

    /// Validates a document file.
    pub fn validate_file(&self, path: &Path, mode: ValidationMode) -> Result<ValidationReport> {
        self.validate_file_in(&RealFileSystem, path, mode)
    }

    pub fn validate_file_in<F: FileSystem + Copy>(
        &self,
        fs: &F,
        path: &Path,
        mode: ValidationMode,
    ) -> Result<ValidationReport> {
        PathValidator::new(*fs).ensure_file(path)?;
        let text = fs.read_to_string(path)?;
        let mut report = self.validate_str(&text, mode)?;
        tracing::debug!(
            path = %path.display(),
            deviations = report.deviations.len(),
            "validated document"
        );
        report.document = Some(path.to_path_buf());
        Ok(report)
    }
}

/// Loads `schema_path` and validates `document_path` against it.
pub fn validate_file(
    schema_path: &Path,
    document_path: &Path,
    mode: ValidationMode,
) -> Result<ValidationReport> {
    Schema::from_file(schema_path)?.validate_file(document_path, mode)
}
