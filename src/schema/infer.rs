//! Schema inference engine
//!
//! Maps a [`RecordDescription`] to BigQuery columns. Fields the store cannot
//! represent (unsigned integers, maps) or that have no mapping rule are
//! logged and left out; the rest of the schema is still produced.

use super::{ColumnDescriptor, ColumnType, FieldKind, RecordDescription};

/// Maximum record nesting before inference gives up
pub const MAX_DEPTH: usize = 32;

/// Inference failures. Unsupported fields are not errors, see [`SkippedField`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("record nesting deeper than {max} levels at `{path}`")]
    DepthExceeded { path: String, max: usize },
}

/// Why a field was left out of the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The store has no column type for it (unsigned integers, maps)
    Unsupported,
    /// No mapping rule exists for the kind
    Undefined,
}

/// A field omitted from the inferred schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedField {
    /// Dotted path from the root record
    pub path: String,
    pub kind: String,
    pub reason: SkipReason,
}

/// Result of inference: the columns and everything that was dropped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inference {
    pub columns: Vec<ColumnDescriptor>,
    pub skipped: Vec<SkippedField>,
}

/// Infer the columns of a record description
pub fn infer_schema(record: &RecordDescription) -> Result<Vec<ColumnDescriptor>, SchemaError> {
    infer(record).map(|inference| inference.columns)
}

/// Infer the columns of a record description, reporting skipped fields
pub fn infer(record: &RecordDescription) -> Result<Inference, SchemaError> {
    let mut engine = Engine::default();
    let columns = engine.record(record, "", 0)?;
    tracing::trace!(
        "InferSchema {}: {} columns, {} skipped",
        record.name,
        columns.len(),
        engine.skipped.len()
    );
    Ok(Inference {
        columns,
        skipped: engine.skipped,
    })
}

#[derive(Default)]
struct Engine {
    skipped: Vec<SkippedField>,
}

impl Engine {
    fn record(
        &mut self,
        record: &RecordDescription,
        prefix: &str,
        depth: usize,
    ) -> Result<Vec<ColumnDescriptor>, SchemaError> {
        if depth > MAX_DEPTH {
            return Err(SchemaError::DepthExceeded {
                path: prefix.to_string(),
                max: MAX_DEPTH,
            });
        }

        let mut columns = Vec::with_capacity(record.fields.len());
        for field in record.fields.iter().filter(|f| !f.excluded) {
            let path = if prefix.is_empty() {
                field.name.clone()
            } else {
                format!("{}.{}", prefix, field.name)
            };
            if let Some(column) = self.field(&record.name, &field.name, &field.kind, &path, depth)? {
                tracing::trace!("InferSchema {} -> {:?}", path, column.column_type);
                columns.push(column);
            }
        }
        Ok(columns)
    }

    fn field(
        &mut self,
        parent: &str,
        name: &str,
        kind: &FieldKind,
        path: &str,
        depth: usize,
    ) -> Result<Option<ColumnDescriptor>, SchemaError> {
        let column = match kind {
            FieldKind::String => ColumnDescriptor::leaf(name, ColumnType::String),
            FieldKind::Bool => ColumnDescriptor::leaf(name, ColumnType::Boolean),
            FieldKind::Int(_) => ColumnDescriptor::leaf(name, ColumnType::Integer),
            FieldKind::Float(_) => ColumnDescriptor::leaf(name, ColumnType::Float),
            FieldKind::Timestamp => ColumnDescriptor::leaf(name, ColumnType::Timestamp),
            FieldKind::Uint(_) | FieldKind::Map => {
                self.unsupported(parent, path, kind);
                return Ok(None);
            }
            FieldKind::Record(nested) => {
                ColumnDescriptor::record(name, self.record(nested, path, depth + 1)?)
            }
            FieldKind::Sequence(element) => match element.as_ref() {
                FieldKind::String => ColumnDescriptor::leaf(name, ColumnType::String).repeated(),
                FieldKind::Record(nested) => {
                    ColumnDescriptor::record(name, self.record(nested, path, depth + 1)?).repeated()
                }
                _ => {
                    self.undefined(parent, path, kind);
                    return Ok(None);
                }
            },
            FieldKind::Reference(target) => match self.reference_leaf(name, target) {
                Ok(column) => column,
                Err(reason) => {
                    match reason {
                        SkipReason::Unsupported => self.unsupported(parent, path, kind),
                        SkipReason::Undefined => self.undefined(parent, path, kind),
                    }
                    return Ok(None);
                }
            },
            FieldKind::Opaque(_) => {
                self.undefined(parent, path, kind);
                return Ok(None);
            }
        };
        Ok(Some(column))
    }

    /// A reference resolves to a string or bool leaf, following at most one
    /// extra level of indirection.
    fn reference_leaf(&self, name: &str, target: &FieldKind) -> Result<ColumnDescriptor, SkipReason> {
        let resolved = match target {
            FieldKind::Reference(inner) => inner.as_ref(),
            other => other,
        };
        match resolved {
            FieldKind::String => Ok(ColumnDescriptor::leaf(name, ColumnType::String)),
            FieldKind::Bool => Ok(ColumnDescriptor::leaf(name, ColumnType::Boolean)),
            FieldKind::Uint(_) => Err(SkipReason::Unsupported),
            _ => Err(SkipReason::Undefined),
        }
    }

    fn unsupported(&mut self, parent: &str, path: &str, kind: &FieldKind) {
        tracing::warn!(
            "InferSchema {} is of type <{}> and is not currently supported. This item was passed from Parent: {}",
            path,
            kind,
            parent
        );
        self.skipped.push(SkippedField {
            path: path.to_string(),
            kind: kind.label(),
            reason: SkipReason::Unsupported,
        });
    }

    fn undefined(&mut self, parent: &str, path: &str, kind: &FieldKind) {
        tracing::error!(
            "InferSchema {} is of type <{}> and is not currently defined. This item was passed from Parent: {}",
            path,
            kind,
            parent
        );
        self.skipped.push(SkippedField {
            path: path.to_string(),
            kind: kind.label(),
            reason: SkipReason::Undefined,
        });
    }
}
