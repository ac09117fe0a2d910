//! Tabular schema inference
//!
//! Record types are described declaratively (see [`describe`]) and the
//! [`infer`] engine turns such a description into BigQuery column
//! descriptors.
//!
//! # Module Structure
//!
//! - [`describe`] - `Describe` / `FieldType` traits and the description builder
//! - [`infer`] - Field-kind to column-type mapping rules

pub mod describe;
pub mod infer;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;

pub use describe::{Describe, FieldType};
pub use infer::{infer, infer_schema, Inference, SchemaError, SkippedField, MAX_DEPTH};

/// Kind of a declared field, as seen by the inference engine
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Bool,
    /// Signed integer of the given width
    Int(u8),
    /// Unsigned integer of the given width
    Uint(u8),
    /// Floating point of the given width
    Float(u8),
    Timestamp,
    Map,
    Sequence(Box<FieldKind>),
    /// Reference to a nested record
    Record(RecordDescription),
    /// Reference to a non-record value
    Reference(Box<FieldKind>),
    /// Anything the engine has no rule for
    Opaque(&'static str),
}

impl FieldKind {
    pub fn sequence(element: FieldKind) -> Self {
        FieldKind::Sequence(Box::new(element))
    }

    pub fn reference(target: FieldKind) -> Self {
        FieldKind::Reference(Box::new(target))
    }

    /// Short label used in log lines
    pub fn label(&self) -> String {
        match self {
            FieldKind::String => "string".to_string(),
            FieldKind::Bool => "bool".to_string(),
            FieldKind::Int(bits) => format!("int{}", bits),
            FieldKind::Uint(bits) => format!("uint{}", bits),
            FieldKind::Float(bits) => format!("float{}", bits),
            FieldKind::Timestamp => "timestamp".to_string(),
            FieldKind::Map => "map".to_string(),
            FieldKind::Sequence(inner) => format!("[]{}", inner.label()),
            FieldKind::Record(record) => format!("*{}", record.name),
            FieldKind::Reference(inner) => format!("*{}", inner.label()),
            FieldKind::Opaque(label) => label.to_string(),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A single declared field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescription {
    pub name: String,
    pub kind: FieldKind,
    /// Excluded fields never reach the schema
    pub excluded: bool,
}

/// Ordered structural description of a record type
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDescription {
    pub name: String,
    pub fields: Vec<FieldDescription>,
}

impl RecordDescription {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    /// Append a field whose kind comes from its Rust type
    pub fn field<T: FieldType>(self, name: &str) -> Self {
        self.field_of_kind(name, T::kind())
    }

    pub fn field_of_kind(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldDescription {
            name: name.to_string(),
            kind,
            excluded: false,
        });
        self
    }

    /// Append a field that is carried by the type but kept out of the schema
    pub fn excluded<T: FieldType>(mut self, name: &str) -> Self {
        self.fields.push(FieldDescription {
            name: name.to_string(),
            kind: T::kind(),
            excluded: true,
        });
        self
    }
}

/// BigQuery column types produced by inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Boolean,
    Integer,
    Float,
    Timestamp,
    Record,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "STRING",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "FLOAT",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Record => "RECORD",
        }
    }
}

/// One column of a tabular schema
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: ColumnType,
    pub required: bool,
    pub repeated: bool,
    /// Nested columns, only populated for `ColumnType::Record`
    pub fields: Vec<ColumnDescriptor>,
}

impl ColumnDescriptor {
    pub fn leaf(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            required: false,
            repeated: false,
            fields: Vec::new(),
        }
    }

    pub fn record(name: &str, fields: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.to_string(),
            column_type: ColumnType::Record,
            required: false,
            repeated: false,
            fields,
        }
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    /// BigQuery field mode
    pub fn mode(&self) -> &'static str {
        if self.repeated {
            "REPEATED"
        } else if self.required {
            "REQUIRED"
        } else {
            "NULLABLE"
        }
    }
}

/// Serializes as a BigQuery `TableFieldSchema`
impl Serialize for ColumnDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.fields.is_empty() { 3 } else { 4 };
        let mut state = serializer.serialize_struct("TableFieldSchema", len)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("type", self.column_type.as_str())?;
        state.serialize_field("mode", self.mode())?;
        if !self.fields.is_empty() {
            state.serialize_field("fields", &self.fields)?;
        }
        state.end()
    }
}
