//! Configurable rendering of span operations.
//!
//! The concrete tracing calls are not hard-coded: each span operation kind
//! maps to a template string whose `${field}` placeholders are filled from
//! the operation. Swapping tracing libraries means swapping templates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CodegenError;

/// Span operations that are rendered through templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanOp {
    StartSpan,
    EndSpan,
}

impl SpanOp {
    /// The configuration key for this operation.
    pub fn key(self) -> &'static str {
        match self {
            SpanOp::StartSpan => "start-span",
            SpanOp::EndSpan => "end-span",
        }
    }

    /// Fields a template for this operation may reference.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            SpanOp::StartSpan => &["name", "parent"],
            SpanOp::EndSpan => &["context"],
        }
    }
}

/// Mapping from span-operation key to template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanTemplates {
    templates: BTreeMap<String, String>,
}

impl Default for SpanTemplates {
    fn default() -> Self {
        SpanTemplates::empty()
            .with(SpanOp::StartSpan, "(start-span ${name} ${parent})")
            .with(SpanOp::EndSpan, "(end-span ${context})")
    }
}

impl SpanTemplates {
    /// A mapping with no templates at all.
    pub fn empty() -> Self {
        SpanTemplates {
            templates: BTreeMap::new(),
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, op: SpanOp, template: impl Into<String>) -> Self {
        self.templates.insert(op.key().to_string(), template.into());
        self
    }

    pub fn get(&self, op: SpanOp) -> Option<&str> {
        self.templates.get(op.key()).map(String::as_str)
    }

    /// Renders `op` with the given field values.
    ///
    /// Fails if no template is configured for `op`, if the template names a
    /// field `op` does not have, or if a `${` is never closed. A `$` not
    /// followed by `{` is copied through.
    pub fn render(&self, op: SpanOp, fields: &[(&str, &str)]) -> Result<String, CodegenError> {
        let template = self.get(op).ok_or_else(|| CodegenError::MissingTemplate {
            op: op.key().to_string(),
        })?;

        let mut out = String::with_capacity(template.len() + 16);
        let mut rest = template;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| CodegenError::MalformedTemplate {
                op: op.key().to_string(),
                reason: format!("unterminated placeholder at byte {}", template.len() - rest.len() + start),
            })?;
            let field = &after[..end];
            if !op.fields().contains(&field) {
                return Err(CodegenError::UnknownTemplateField {
                    op: op.key().to_string(),
                    field: field.to_string(),
                });
            }
            let value = fields
                .iter()
                .find(|(name, _)| *name == field)
                .map(|(_, value)| *value)
                .ok_or_else(|| CodegenError::UnknownTemplateField {
                    op: op.key().to_string(),
                    field: field.to_string(),
                })?;
            out.push_str(value);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
