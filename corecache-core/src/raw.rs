//! The adapter-agnostic reply representation passed between an `Adapter` and
//! an `OperationDescriptor`'s result parser.

use std::fmt;

/// A command argument. Arguments tagged `Key` are the ones the Cache Facade
/// prefixes; everything else passes through untouched. This
/// replaces positional "arg 0 is the key" string parsing with an explicit tag the facade can find without knowing
/// anything about the command's shape.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandArg {
    Key(String),
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl CommandArg {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            CommandArg::Key(k) => Some(k),
            _ => None,
        }
    }
}

impl fmt::Display for CommandArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandArg::Key(s) | CommandArg::Str(s) => write!(f, "{s}"),
            CommandArg::Int(i) => write!(f, "{i}"),
            CommandArg::Float(v) => write!(f, "{v}"),
            CommandArg::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// An adapter's raw reply, before an `OperationDescriptor`'s `parse_result`
/// turns it into a typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Nil,
    Ok,
    Integer(i64),
    Double(f64),
    Bulk(String),
    Array(Vec<RawValue>),
    Boolean(bool),
}

impl RawValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RawValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bulk(&self) -> Option<&str> {
        match self {
            RawValue::Bulk(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, RawValue::Nil)
    }
}
