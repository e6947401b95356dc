//! Renderer-state attribute model.
//!
//! An attribute is one `ATTR_*` directive name with zero or more ordered
//! value lines and a weight controlling emission order. Whether a written
//! attribute actually reaches the output is decided by the
//! [`AttributeState`](crate::state::AttributeState) tracker.

use std::fmt;

use crate::common::float_to_str;

/// One line's worth of attribute payload.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Bare directive with no values (e.g. `ATTR_no_blend`).
    Flag,
    /// Free-form text value (e.g. a dataref path or command name).
    Text(String),
    /// Ordered numeric tuple (e.g. an RGB triple plus a parameter).
    Floats(Vec<f64>),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Floats(values) => {
                let joined = values
                    .iter()
                    .map(|v| float_to_str(*v))
                    .collect::<Vec<_>>()
                    .join("\t");
                f.write_str(&joined)
            }
        }
    }
}

/// A named renderer-state directive with its value lines.
///
/// Attributes with several values emit one directive line per value, in
/// order. Bigger weight writes the attribute later in the output.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<AttrValue>,
    pub weight: i32,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: AttrValue) -> Self {
        Self {
            name: name.into(),
            values: vec![value],
            weight: 0,
        }
    }

    /// A value-less directive.
    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, AttrValue::Flag)
    }

    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn push_value(&mut self, value: AttrValue) {
        if !self.values.contains(&value) {
            self.values.push(value);
        }
    }
}

/// Insertion-ordered set of attributes with weight-ordered iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    attrs: Vec<Attribute>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute; values of an already-present name are merged.
    pub fn add(&mut self, attr: Attribute) {
        if let Some(existing) = self.attrs.iter_mut().find(|a| a.name == attr.name) {
            for value in attr.values {
                existing.push_value(value);
            }
        } else {
            self.attrs.push(attr);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attrs.iter().map(|a| a.name.as_str())
    }

    /// Attributes sorted by weight (stable, so equal weights keep insertion
    /// order).
    pub fn by_weight(&self) -> Vec<&Attribute> {
        let mut sorted: Vec<&Attribute> = self.attrs.iter().collect();
        sorted.sort_by_key(|a| a.weight);
        sorted
    }
}

/// A conditional compile switch bracketing a payload body (`IF`/`ENDIF`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub variable: String,
    pub value: bool,
}
