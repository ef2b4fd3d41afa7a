//! Schema-validated models parsed from untyped JSON records.
//!
//! # Design
//! A model declares its fields once, in `Model::read`, by pulling each one
//! through a `Fields` reader. The reader records every violation it meets
//! instead of stopping at the first, and `Model::parse` hands back a value
//! only when the whole record validated, nested records and sequences
//! included. No partially validated model ever escapes.
//!
//! `Model::write` is the inverse and drives `to_record`, so a parsed model can
//! be serialized back into the wire shape it was read from.

use serde_json::Map;
pub use serde_json::Value;
use uuid::Uuid;

use crate::closed_set::{self, ClosedSet};
use crate::error::{ValidationError, Violation};

/// A type that a single record field can hold.
pub trait FieldValue: Sized {
    /// Shape description used in violations.
    fn expected() -> String;

    /// Converts one raw value found at `path`. On failure the reason is pushed
    /// onto `violations` and `None` is returned.
    fn from_field(raw: &Value, path: &str, violations: &mut Vec<Violation>) -> Option<Self>;

    fn to_field(&self) -> Value;
}

/// A typed record with a declared schema.
pub trait Model: Sized {
    const NAME: &'static str;

    /// Closed models reject keys they do not declare.
    const CLOSED: bool = false;

    /// Reads every declared field. Read all fields before combining them so
    /// that each failing field is reported.
    fn read(fields: &mut Fields<'_>) -> Option<Self>;

    fn write(&self, record: &mut RecordWriter);

    fn parse(raw: &Value) -> Result<Self, ValidationError> {
        let mut violations = Vec::new();
        match parse_nested::<Self>(raw, "", &mut violations) {
            Some(model) => Ok(model),
            None => Err(ValidationError::new(Self::NAME, violations)),
        }
    }

    /// Parses a JSON array of records. Stops at the first failing element,
    /// like any other sequence.
    fn parse_list(raw: &Value) -> Result<Vec<Self>, ValidationError> {
        let mut violations = Vec::new();
        let parsed = parse_sequence(
            raw,
            "",
            &mut violations,
            || format!("sequence of {} records", Self::NAME),
            parse_nested::<Self>,
        );
        match parsed {
            Some(models) => Ok(models),
            None => Err(ValidationError::new(Self::NAME, violations)),
        }
    }

    fn to_record(&self) -> Value {
        let mut record = RecordWriter::default();
        self.write(&mut record);
        record.finish()
    }
}

/// Reader over one raw record, handed to `Model::read`.
pub struct Fields<'a> {
    record: &'a Map<String, Value>,
    path: &'a str,
    violations: &'a mut Vec<Violation>,
    declared: Vec<&'static str>,
    closed: bool,
}

impl<'a> Fields<'a> {
    pub fn required<T: FieldValue>(&mut self, key: &'static str) -> Option<T> {
        self.required_as(key, key)
    }

    /// Required field stored under the wire key `alias`. The declared `name`
    /// is accepted when the alias is absent. When both keys are present the
    /// alias wins; a closed model reports the declared-name key as a conflict.
    pub fn required_as<T: FieldValue>(&mut self, name: &'static str, alias: &'static str) -> Option<T> {
        match self.lookup(name, alias) {
            Some((key, raw)) => T::from_field(raw, &key_path(self.path, key), self.violations),
            None => {
                self.violations
                    .push(Violation::missing(key_path(self.path, alias), T::expected()));
                None
            }
        }
    }

    /// Optional field: absent and `null` both read as `Some(None)`.
    pub fn optional<T: FieldValue>(&mut self, key: &'static str) -> Option<Option<T>> {
        self.optional_as(key, key)
    }

    pub fn optional_as<T: FieldValue>(
        &mut self,
        name: &'static str,
        alias: &'static str,
    ) -> Option<Option<T>> {
        match self.lookup(name, alias) {
            None | Some((_, Value::Null)) => Some(None),
            Some((key, raw)) => {
                T::from_field(raw, &key_path(self.path, key), self.violations).map(Some)
            }
        }
    }

    fn lookup(&mut self, name: &'static str, alias: &'static str) -> Option<(&'static str, &'a Value)> {
        self.declared.push(name);
        if alias != name {
            self.declared.push(alias);
        }
        let record = self.record;
        match (record.get(alias), record.get(name)) {
            (Some(raw), shadowed) => {
                if let Some(shadowed) = shadowed.filter(|_| self.closed && alias != name) {
                    self.violations.push(Violation::mismatch(
                        key_path(self.path, name),
                        format!("no second key for the field read from {alias:?}"),
                        shadowed,
                    ));
                }
                Some((alias, raw))
            }
            (None, Some(raw)) => Some((name, raw)),
            (None, None) => None,
        }
    }

    fn reject_undeclared(&mut self, model: &str) {
        let record = self.record;
        for (key, raw) in record {
            if !self.declared.iter().any(|declared| *declared == key.as_str()) {
                self.violations.push(Violation::mismatch(
                    key_path(self.path, key),
                    format!("no such field on closed {model}"),
                    raw,
                ));
            }
        }
    }
}

/// Builds the wire record for `Model::write` and request payloads.
#[derive(Debug, Default)]
pub struct RecordWriter {
    record: Map<String, Value>,
}

impl RecordWriter {
    pub fn field<T: FieldValue>(&mut self, key: &str, value: &T) -> &mut Self {
        self.record.insert(key.to_string(), value.to_field());
        self
    }

    /// Writes `value` when present; absent values are left out of the record.
    pub fn optional<T: FieldValue>(&mut self, key: &str, value: &Option<T>) -> &mut Self {
        if let Some(value) = value {
            self.field(key, value);
        }
        self
    }

    pub fn finish(self) -> Value {
        Value::Object(self.record)
    }
}

/// Parses a nested record at `path`. Returns `None` if any violation was
/// recorded while reading it.
pub fn parse_nested<M: Model>(raw: &Value, path: &str, violations: &mut Vec<Violation>) -> Option<M> {
    let Some(record) = raw.as_object() else {
        violations.push(Violation::mismatch(path, record_shape::<M>(), raw));
        return None;
    };
    let before = violations.len();
    let mut fields = Fields {
        record,
        path,
        violations,
        declared: Vec::new(),
        closed: M::CLOSED,
    };
    let model = M::read(&mut fields);
    if M::CLOSED {
        fields.reject_undeclared(M::NAME);
    }
    if violations.len() > before {
        return None;
    }
    if model.is_none() {
        violations.push(Violation::mismatch(path, record_shape::<M>(), raw));
    }
    model
}

pub fn record_shape<M: Model>() -> String {
    format!("{} record", M::NAME)
}

/// `FieldValue` conversion shared by every `closed_set!` declaration.
pub fn closed_set_field<S: ClosedSet>(raw: &Value, path: &str, violations: &mut Vec<Violation>) -> Option<S> {
    convert(raw, path, violations, closed_set::describe::<S>, |raw| {
        raw.as_str().and_then(S::lookup)
    })
}

/// Implements `FieldValue` for a model so it can be nested in another model.
#[macro_export]
macro_rules! model_field {
    ($($model:ty),+ $(,)?) => {
        $(
            impl $crate::model::FieldValue for $model {
                fn expected() -> ::std::string::String {
                    $crate::model::record_shape::<Self>()
                }

                fn from_field(
                    raw: &$crate::model::Value,
                    path: &str,
                    violations: &mut ::std::vec::Vec<$crate::error::Violation>,
                ) -> ::std::option::Option<Self> {
                    $crate::model::parse_nested::<Self>(raw, path, violations)
                }

                fn to_field(&self) -> $crate::model::Value {
                    $crate::model::Model::to_record(self)
                }
            }
        )+
    };
}

fn key_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

fn convert<T>(
    raw: &Value,
    path: &str,
    violations: &mut Vec<Violation>,
    expected: fn() -> String,
    conversion: impl FnOnce(&Value) -> Option<T>,
) -> Option<T> {
    let converted = conversion(raw);
    if converted.is_none() {
        violations.push(Violation::mismatch(path, expected(), raw));
    }
    converted
}

fn parse_sequence<T>(
    raw: &Value,
    path: &str,
    violations: &mut Vec<Violation>,
    expected: impl FnOnce() -> String,
    mut element: impl FnMut(&Value, &str, &mut Vec<Violation>) -> Option<T>,
) -> Option<Vec<T>> {
    let Some(items) = raw.as_array() else {
        violations.push(Violation::mismatch(path, expected(), raw));
        return None;
    };
    let mut parsed = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        parsed.push(element(item, &index_path(path, index), violations)?);
    }
    Some(parsed)
}

/// Integer view of a JSON number or an exact numeric string.
fn integer(raw: &Value) -> Option<i128> {
    match raw {
        Value::Number(n) => n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

macro_rules! integer_field {
    ($($ty:ty),+) => {
        $(
            impl FieldValue for $ty {
                fn expected() -> String {
                    format!("integer ({})", stringify!($ty))
                }

                fn from_field(raw: &Value, path: &str, violations: &mut Vec<Violation>) -> Option<Self> {
                    convert(raw, path, violations, Self::expected, |raw| {
                        integer(raw).and_then(|n| <$ty>::try_from(n).ok())
                    })
                }

                fn to_field(&self) -> Value {
                    Value::from(*self)
                }
            }
        )+
    };
}

integer_field!(u8, u16, u32, u64, i32, i64);

impl FieldValue for f64 {
    fn expected() -> String {
        "number".to_string()
    }

    fn from_field(raw: &Value, path: &str, violations: &mut Vec<Violation>) -> Option<Self> {
        convert(raw, path, violations, Self::expected, |raw| match raw {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        })
    }

    fn to_field(&self) -> Value {
        Value::from(*self)
    }
}

impl FieldValue for bool {
    fn expected() -> String {
        "boolean".to_string()
    }

    fn from_field(raw: &Value, path: &str, violations: &mut Vec<Violation>) -> Option<Self> {
        convert(raw, path, violations, Self::expected, Value::as_bool)
    }

    fn to_field(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FieldValue for String {
    fn expected() -> String {
        "string".to_string()
    }

    fn from_field(raw: &Value, path: &str, violations: &mut Vec<Violation>) -> Option<Self> {
        convert(raw, path, violations, Self::expected, |raw| {
            raw.as_str().map(str::to_owned)
        })
    }

    fn to_field(&self) -> Value {
        Value::String(self.clone())
    }
}

impl FieldValue for Uuid {
    fn expected() -> String {
        "uuid".to_string()
    }

    fn from_field(raw: &Value, path: &str, violations: &mut Vec<Violation>) -> Option<Self> {
        convert(raw, path, violations, Self::expected, |raw| {
            raw.as_str().and_then(|s| Uuid::parse_str(s).ok())
        })
    }

    fn to_field(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn expected() -> String {
        format!("sequence of {}", T::expected())
    }

    fn from_field(raw: &Value, path: &str, violations: &mut Vec<Violation>) -> Option<Self> {
        parse_sequence(raw, path, violations, Self::expected, T::from_field)
    }

    fn to_field(&self) -> Value {
        Value::Array(self.iter().map(FieldValue::to_field).collect())
    }
}

impl<A: FieldValue, B: FieldValue> FieldValue for (A, B) {
    fn expected() -> String {
        format!("pair of ({}, {})", A::expected(), B::expected())
    }

    fn from_field(raw: &Value, path: &str, violations: &mut Vec<Violation>) -> Option<Self> {
        match raw.as_array().map(Vec::as_slice) {
            Some([first, second]) => {
                let a = A::from_field(first, &index_path(path, 0), violations);
                let b = B::from_field(second, &index_path(path, 1), violations);
                Some((a?, b?))
            }
            _ => {
                violations.push(Violation::mismatch(path, Self::expected(), raw));
                None
            }
        }
    }

    fn to_field(&self) -> Value {
        Value::Array(vec![self.0.to_field(), self.1.to_field()])
    }
}
