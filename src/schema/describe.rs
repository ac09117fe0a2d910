//! Declarative record descriptions
//!
//! Rust types map to a [`FieldKind`] through [`FieldType`]; record structs
//! implement [`Describe`] and list their columns with the
//! [`RecordDescription`] builder, in the order they are serialized.

use super::{FieldKind, RecordDescription};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// A record type with a structural description
pub trait Describe {
    fn describe() -> RecordDescription;
}

/// A Rust type that can appear as a field of a described record
pub trait FieldType {
    fn kind() -> FieldKind;
}

/// Implement [`FieldType`] for a [`Describe`] struct so it can be nested
#[macro_export]
macro_rules! nested_record {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::schema::FieldType for $ty {
                fn kind() -> $crate::schema::FieldKind {
                    $crate::schema::FieldKind::Record(
                        <$ty as $crate::schema::Describe>::describe(),
                    )
                }
            }
        )+
    };
}

macro_rules! leaf_kind {
    ($kind:expr => $($ty:ty),+) => {
        $(
            impl FieldType for $ty {
                fn kind() -> FieldKind {
                    $kind
                }
            }
        )+
    };
}

leaf_kind!(FieldKind::String => String, &'static str);
leaf_kind!(FieldKind::Bool => bool);
leaf_kind!(FieldKind::Int(8) => i8);
leaf_kind!(FieldKind::Int(16) => i16);
leaf_kind!(FieldKind::Int(32) => i32);
leaf_kind!(FieldKind::Int(64) => i64, isize);
leaf_kind!(FieldKind::Uint(8) => u8);
leaf_kind!(FieldKind::Uint(16) => u16);
leaf_kind!(FieldKind::Uint(32) => u32);
leaf_kind!(FieldKind::Uint(64) => u64, usize);
leaf_kind!(FieldKind::Float(32) => f32);
leaf_kind!(FieldKind::Float(64) => f64);
leaf_kind!(FieldKind::Timestamp => DateTime<Utc>);
leaf_kind!(FieldKind::Opaque("json") => serde_json::Value);

impl<K, V> FieldType for HashMap<K, V> {
    fn kind() -> FieldKind {
        FieldKind::Map
    }
}

impl<K, V> FieldType for BTreeMap<K, V> {
    fn kind() -> FieldKind {
        FieldKind::Map
    }
}

impl<T: FieldType> FieldType for Vec<T> {
    fn kind() -> FieldKind {
        FieldKind::sequence(T::kind())
    }
}

/// `Option<Record>` is still a reference to a record; any other optional
/// value is a reference to that value.
impl<T: FieldType> FieldType for Option<T> {
    fn kind() -> FieldKind {
        match T::kind() {
            record @ FieldKind::Record(_) => record,
            other => FieldKind::reference(other),
        }
    }
}

impl<T: FieldType> FieldType for Box<T> {
    fn kind() -> FieldKind {
        <Option<T> as FieldType>::kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Inner;

    impl Describe for Inner {
        fn describe() -> RecordDescription {
            RecordDescription::new("Inner").field::<String>("value")
        }
    }

    nested_record!(Inner);

    #[test]
    fn test_leaf_kinds() {
        assert_eq!(<String as FieldType>::kind(), FieldKind::String);
        assert_eq!(<i32 as FieldType>::kind(), FieldKind::Int(32));
        assert_eq!(<u64 as FieldType>::kind(), FieldKind::Uint(64));
        assert_eq!(<HashMap<String, String> as FieldType>::kind(), FieldKind::Map);
    }

    #[test]
    fn test_option_of_record_stays_record() {
        let kind = <Option<Inner> as FieldType>::kind();
        assert!(matches!(kind, FieldKind::Record(ref r) if r.name == "Inner"));
    }

    #[test]
    fn test_option_of_leaf_is_reference() {
        assert_eq!(
            <Option<Option<bool>> as FieldType>::kind(),
            FieldKind::reference(FieldKind::reference(FieldKind::Bool))
        );
    }

    #[test]
    fn test_vec_of_record() {
        let kind = <Vec<Inner> as FieldType>::kind();
        match kind {
            FieldKind::Sequence(element) => {
                assert!(matches!(*element, FieldKind::Record(_)));
            }
            other => panic!("unexpected kind {other}"),
        }
    }
}
