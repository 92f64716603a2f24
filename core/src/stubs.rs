//! Static interface description of a client's resolved methods.
//!
//! # Design
//! The generator walks the final `MethodTable`, so natives, synthesized
//! defaults and overrides are covered without reading any source again.
//! Output depends only on the table: entries come out in name order and DTO
//! references are sorted and de-duplicated, so unchanged inputs render to
//! byte-identical text.
//!
//! Artifacts that failed to load have no entries in the table; each one is
//! reported as a diagnostic on the document instead of aborting the pass.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{OverrideLoadError, StubGenerationError};
use crate::registry::{MethodEntry, MethodTable};

pub const GENERATED_HEADER: &str = "// This file is generated. Do not edit directly.";

/// Type name used when nothing more specific is known.
pub const PLACEHOLDER_TYPE: &str = "Any";

const NO_DESCRIPTION: &str = "No description";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubParam {
    pub name: String,
    pub ty: String,
}

/// One method line of the stub document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubEntry {
    pub method_name: String,
    pub params: Vec<StubParam>,
    pub return_type: String,
    pub doc: String,
}

impl StubEntry {
    fn from_entry(entry: &MethodEntry) -> Self {
        let params = entry
            .signature
            .params
            .iter()
            .map(|p| StubParam {
                name: p.name.clone(),
                ty: p.ty.clone().unwrap_or_else(|| PLACEHOLDER_TYPE.to_string()),
            })
            .collect();

        let return_type = match (&entry.dto, &entry.signature.returns) {
            (Some(dto), _) => dto.schema.name.clone(),
            (None, Some(declared)) => declared.clone(),
            (None, None) => PLACEHOLDER_TYPE.to_string(),
        };

        let doc = entry
            .signature
            .doc
            .as_deref()
            .and_then(|d| d.lines().map(str::trim).find(|line| !line.is_empty()))
            .unwrap_or(NO_DESCRIPTION)
            .to_string();

        Self {
            method_name: entry.name.clone(),
            params,
            return_type,
            doc,
        }
    }

    /// `name(a: T, b: U) -> R`
    pub fn signature_line(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.ty))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({}) -> {}", self.method_name, params, self.return_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubDocument {
    pub client: String,
    pub references: BTreeSet<String>,
    pub entries: Vec<StubEntry>,
    pub diagnostics: Vec<StubGenerationError>,
}

impl StubDocument {
    pub fn entry(&self, method_name: &str) -> Option<&StubEntry> {
        self.entries.iter().find(|e| e.method_name == method_name)
    }

    /// Render and write to `path`, leaving the file alone when the bytes are
    /// already identical. Returns whether the file was written.
    pub fn write(&self, path: &Path) -> Result<bool, StubGenerationError> {
        let rendered = self.render();
        if let Ok(existing) = std::fs::read(path) {
            if existing == rendered.as_bytes() {
                tracing::debug!(path = %path.display(), "stubs unchanged");
                return Ok(false);
            }
        }
        std::fs::write(path, rendered).map_err(|e| StubGenerationError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        tracing::info!(path = %path.display(), "stubs written");
        Ok(true)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(GENERATED_HEADER);
        out.push_str("\n\n");

        if !self.references.is_empty() {
            for reference in &self.references {
                out.push_str(reference);
                out.push('\n');
            }
            out.push('\n');
        }

        out.push_str(&format!("client {} {{\n", self.client));
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format!("    /// {}\n", entry.doc));
            out.push_str(&format!("    {}\n", entry.signature_line()));
        }
        out.push_str("}\n");
        out
    }
}

pub struct StubsGenerator<'a> {
    client: &'a str,
    table: &'a MethodTable,
    load_errors: &'a [OverrideLoadError],
}

impl<'a> StubsGenerator<'a> {
    pub fn new(client: &'a str, table: &'a MethodTable, load_errors: &'a [OverrideLoadError]) -> Self {
        Self {
            client,
            table,
            load_errors,
        }
    }

    pub fn generate(&self) -> StubDocument {
        let mut references = BTreeSet::new();
        let mut entries = Vec::with_capacity(self.table.len());

        for entry in self.table.iter() {
            if let Some(dto) = &entry.dto {
                references.insert(format!("use {}::{};", dto.artifact, dto.schema.name));
            }
            entries.push(StubEntry::from_entry(entry));
        }

        let diagnostics: Vec<StubGenerationError> =
            self.load_errors.iter().cloned().map(Into::into).collect();
        for diagnostic in &diagnostics {
            tracing::warn!(client = self.client, %diagnostic, "stub generation diagnostic");
        }

        StubDocument {
            client: self.client.to_string(),
            references,
            entries,
            diagnostics,
        }
    }

    /// Regenerate and write to `path`. Returns whether the file was written.
    pub fn write(&self, path: &Path) -> Result<bool, StubGenerationError> {
        self.generate().write(path)
    }
}

/// Sibling of `source` named `{stem}.generated.stub`.
pub fn stubs_path_for(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "client".to_string());
    source.with_file_name(format!("{stem}.generated.stub"))
}
