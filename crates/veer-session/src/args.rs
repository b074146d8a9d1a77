use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::envelope::RemoteError;

/// Arguments for one call: positional values and named values.
///
/// On the wire this is the two-element sequence `[positional, keyword]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "(Vec<Value>, Map<String, Value>)", into = "(Vec<Value>, Map<String, Value>)")]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keyword: Map<String, Value>,
}

/// An argument an entry asked for is missing or has the wrong shape.
#[derive(Debug, thiserror::Error)]
pub enum ArgumentError {
    #[error("missing positional argument {0}")]
    MissingPositional(usize),

    #[error("missing keyword argument {0:?}")]
    MissingKeyword(String),

    #[error("argument {name} has the wrong type: {source}")]
    WrongType {
        name: String,
        source: serde_json::Error,
    },
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Append any serializable value as a positional argument.
    pub fn push_serialized<T: Serialize>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        self.positional.push(serde_json::to_value(value)?);
        Ok(())
    }

    /// Set any serializable value as a keyword argument.
    pub fn insert_serialized<T: Serialize>(
        &mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        self.keyword.insert(name.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Decode positional argument `index`.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, ArgumentError> {
        let value = self
            .positional
            .get(index)
            .ok_or(ArgumentError::MissingPositional(index))?;
        decode(index.to_string(), value)
    }

    /// Decode keyword argument `name`.
    pub fn get_kw<T: DeserializeOwned>(&self, name: &str) -> Result<T, ArgumentError> {
        let value = self
            .keyword
            .get(name)
            .ok_or_else(|| ArgumentError::MissingKeyword(name.to_string()))?;
        decode(name.to_string(), value)
    }

    /// Decode keyword argument `name`, or `None` when it was not passed.
    pub fn get_kw_opt<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ArgumentError> {
        self.keyword
            .get(name)
            .map(|value| decode(name.to_string(), value))
            .transpose()
    }

    /// Decode every positional argument as the same type.
    pub fn all<T: DeserializeOwned>(&self) -> Result<Vec<T>, ArgumentError> {
        self.positional
            .iter()
            .enumerate()
            .map(|(index, value)| decode(index.to_string(), value))
            .collect()
    }
}

fn decode<T: DeserializeOwned>(name: String, value: &Value) -> Result<T, ArgumentError> {
    T::deserialize(value).map_err(|source| ArgumentError::WrongType { name, source })
}

impl From<(Vec<Value>, Map<String, Value>)> for CallArgs {
    fn from((positional, keyword): (Vec<Value>, Map<String, Value>)) -> Self {
        Self {
            positional,
            keyword,
        }
    }
}

impl From<CallArgs> for (Vec<Value>, Map<String, Value>) {
    fn from(args: CallArgs) -> Self {
        (args.positional, args.keyword)
    }
}

/// What the child sends back: the entry's return value or its failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Reply {
    Return(Value),
    Raised(RemoteError),
}

impl Reply {
    pub fn into_result(self) -> Result<Value, RemoteError> {
        match self {
            Reply::Return(value) => Ok(value),
            Reply::Raised(err) => Err(err),
        }
    }
}
