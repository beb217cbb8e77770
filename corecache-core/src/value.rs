//! Data-structure tags, sorted-set score bounds, and the serializer seam.

use serde::{de::DeserializeOwned, Serialize};

use crate::CommandError;

/// The structure tag an Adapter's `Store Entry` carries. A command
/// whose declared tag does not match an entry's tag returns the zero value
/// for its return type instead of reinterpreting the stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    String,
    List,
    Set,
    SortedSet,
    Hash,
    Stream,
    HyperLogLog,
    Bloom,
}

impl DataType {
    /// The literal `TYPE` returns for this tag.
    pub fn as_type_literal(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::List => "list",
            DataType::Set => "set",
            DataType::SortedSet => "zset",
            DataType::Hash => "hash",
            DataType::Stream => "stream",
            DataType::HyperLogLog => "string", // HLLs are stored as strings server-side
            DataType::Bloom => "bloom",
        }
    }
}

/// A parsed sorted-set score bound:
/// `"-inf" | "+inf" | "<float>" | "(<float>"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    NegInf,
    PosInf,
    Inclusive(f64),
    Exclusive(f64),
}

impl ScoreBound {
    /// Parse `"-inf"`, `"+inf"`, `"<float>"`, or `"(<float>"` (exclusive).
    pub fn parse(s: &str) -> Result<Self, CommandError> {
        match s {
            "-inf" => Ok(ScoreBound::NegInf),
            "+inf" => Ok(ScoreBound::PosInf),
            _ => {
                if let Some(rest) = s.strip_prefix('(') {
                    rest.parse::<f64>()
                        .map(ScoreBound::Exclusive)
                        .map_err(|e| CommandError::Command(format!("invalid score bound: {e}")))
                } else {
                    s.parse::<f64>()
                        .map(ScoreBound::Inclusive)
                        .map_err(|e| CommandError::Command(format!("invalid score bound: {e}")))
                }
            }
        }
    }

    /// Whether `score` satisfies this bound as a lower bound.
    pub fn satisfies_lower(&self, score: f64) -> bool {
        match self {
            ScoreBound::NegInf => true,
            ScoreBound::PosInf => false,
            ScoreBound::Inclusive(v) => score >= *v,
            ScoreBound::Exclusive(v) => score > *v,
        }
    }

    /// Whether `score` satisfies this bound as an upper bound.
    pub fn satisfies_upper(&self, score: f64) -> bool {
        match self {
            ScoreBound::NegInf => false,
            ScoreBound::PosInf => true,
            ScoreBound::Inclusive(v) => score <= *v,
            ScoreBound::Exclusive(v) => score < *v,
        }
    }
}

/// Serialization seam used by the facade to store arbitrary caller types
/// through the string/hash command surface.
pub trait Serializer: Send + Sync {
    fn serialize<T: Serialize>(&self, value: &T) -> Result<String, CommandError>;
    fn deserialize<T: DeserializeOwned>(&self, raw: &str) -> Result<T, CommandError>;
}

/// Default `Serializer` backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize>(&self, value: &T) -> Result<String, CommandError> {
        serde_json::to_string(value).map_err(|e| CommandError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, raw: &str) -> Result<T, CommandError> {
        serde_json::from_str(raw).map_err(|e| CommandError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_bound_parses_infinities_and_exclusivity() {
        assert_eq!(ScoreBound::parse("-inf").unwrap(), ScoreBound::NegInf);
        assert_eq!(ScoreBound::parse("+inf").unwrap(), ScoreBound::PosInf);
        assert_eq!(ScoreBound::parse("5").unwrap(), ScoreBound::Inclusive(5.0));
        assert_eq!(
            ScoreBound::parse("(5").unwrap(),
            ScoreBound::Exclusive(5.0)
        );
    }

    #[test]
    fn score_bound_satisfaction() {
        let excl = ScoreBound::Exclusive(5.0);
        assert!(!excl.satisfies_lower(5.0));
        assert!(excl.satisfies_lower(5.1));
        let incl = ScoreBound::Inclusive(5.0);
        assert!(incl.satisfies_lower(5.0));
    }

    #[test]
    fn json_serializer_round_trips() {
        let ser = JsonSerializer;
        let encoded = ser.serialize(&42i32).unwrap();
        let decoded: i32 = ser.deserialize(&encoded).unwrap();
        assert_eq!(decoded, 42);
    }
}
