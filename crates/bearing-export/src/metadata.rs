use serde::{Deserialize, Serialize};

use crate::errors::ExportError;

/// One `<metadata>` entry of a 3MF model.
///
/// Names are either one of the well-known 3MF names (`Title`, `Application`, ...)
/// or `prefix:name`, in which case the prefix must be declared on the package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub name: String,
    pub value: String,
}

impl MetadataEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Namespace prefix of a `prefix:name` entry.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }
}

/// Metadata attached to a 3MF package, with the namespaces its entries use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    namespaces: Vec<(String, String)>,
    entries: Vec<MetadataEntry>,
}

impl PackageMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `xmlns:<prefix>="<uri>"` on the model element.
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let uri = uri.into();
        match self.namespaces.iter_mut().find(|(p, _)| *p == prefix) {
            Some(existing) => existing.1 = uri,
            None => self.namespaces.push((prefix, uri)),
        }
        self
    }

    pub fn with_entry(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push(MetadataEntry::new(name, value));
        self
    }

    /// Add an entry whose value is `value` serialized as compact JSON.
    pub fn with_json<T: Serialize>(
        self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self, ExportError> {
        let json = serde_json::to_string(value)?;
        Ok(self.with_entry(name, json))
    }

    pub fn namespaces(&self) -> &[(String, String)] {
        &self.namespaces
    }

    pub fn entries(&self) -> &[MetadataEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every prefixed entry must name a declared namespace.
    pub fn validate(&self) -> Result<(), ExportError> {
        for entry in &self.entries {
            if let Some(prefix) = entry.prefix() {
                if !self.namespaces.iter().any(|(p, _)| p == prefix) {
                    return Err(ExportError::UndeclaredNamespace {
                        prefix: prefix.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
