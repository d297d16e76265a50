//! Signal kinds, causality and typed values
//!
//! The set of transferable kinds is closed: real (f64), integer (i32),
//! boolean and UTF-8 text. `Structure` exists only so that a configuration
//! naming it can be rejected with [`IslError::UnsupportedType`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{IslError, IslResult};

/// Scalar signal kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalType {
    Real,
    Integer,
    Boolean,
    String,
    Structure,
}

impl SignalType {
    /// Decode the flat numeric code used at the C boundary
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(SignalType::Real),
            1 => Some(SignalType::Integer),
            2 => Some(SignalType::Boolean),
            3 => Some(SignalType::String),
            4 => Some(SignalType::Structure),
            _ => None,
        }
    }

    #[inline]
    pub fn code(self) -> i32 {
        match self {
            SignalType::Real => 0,
            SignalType::Integer => 1,
            SignalType::Boolean => 2,
            SignalType::String => 3,
            SignalType::Structure => 4,
        }
    }

    #[inline]
    pub fn is_supported(self) -> bool {
        self != SignalType::Structure
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::Real => "Real",
            SignalType::Integer => "Integer",
            SignalType::Boolean => "Boolean",
            SignalType::String => "String",
            SignalType::Structure => "Structure",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of an IO relative to its owning participant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Causality {
    Input,
    Output,
}

impl Causality {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Causality::Input),
            1 => Some(Causality::Output),
            _ => None,
        }
    }

    #[inline]
    pub fn code(self) -> i32 {
        match self {
            Causality::Input => 0,
            Causality::Output => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Causality::Input => "input",
            Causality::Output => "output",
        }
    }
}

impl FromStr for Causality {
    type Err = IslError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" => Ok(Causality::Input),
            "output" => Ok(Causality::Output),
            other => Err(IslError::ValidationError(format!(
                "unknown causality {:?}",
                other
            ))),
        }
    }
}

/// A typed signal value
///
/// Numeric and boolean kinds carry one element per vector slot. Text is a
/// single UTF-8 string whose byte length is bounded by the string size.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Real(Vec<f64>),
    Integer(Vec<i32>),
    Boolean(Vec<bool>),
    Text(String),
}

impl Value {
    #[inline]
    pub fn real(v: f64) -> Self {
        Value::Real(vec![v])
    }

    #[inline]
    pub fn integer(v: i32) -> Self {
        Value::Integer(vec![v])
    }

    #[inline]
    pub fn boolean(v: bool) -> Self {
        Value::Boolean(vec![v])
    }

    #[inline]
    pub fn text(v: impl Into<String>) -> Self {
        Value::Text(v.into())
    }

    /// Zeroed value for a kind and vector size
    pub fn zeroed(signal_type: SignalType, size: usize) -> IslResult<Self> {
        let size = size.max(1);
        match signal_type {
            SignalType::Real => Ok(Value::Real(vec![0.0; size])),
            SignalType::Integer => Ok(Value::Integer(vec![0; size])),
            SignalType::Boolean => Ok(Value::Boolean(vec![false; size])),
            SignalType::String => Ok(Value::Text(String::new())),
            SignalType::Structure => Err(IslError::UnsupportedType(signal_type)),
        }
    }

    pub fn signal_type(&self) -> SignalType {
        match self {
            Value::Real(_) => SignalType::Real,
            Value::Integer(_) => SignalType::Integer,
            Value::Boolean(_) => SignalType::Boolean,
            Value::Text(_) => SignalType::String,
        }
    }

    /// Number of elements (bytes for text)
    pub fn len(&self) -> usize {
        match self {
            Value::Real(v) => v.len(),
            Value::Integer(v) => v.len(),
            Value::Boolean(v) => v.len(),
            Value::Text(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(v) => v.first().copied(),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => v.first().copied(),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => v.first().copied(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Verify this value fits an IO declared with `signal_type` and `size`
    ///
    /// `max_text` bounds text values when the declared size is 1.
    pub fn conform(&self, signal_type: SignalType, size: usize, max_text: usize) -> IslResult<()> {
        if !signal_type.is_supported() {
            return Err(IslError::UnsupportedType(signal_type));
        }
        if self.signal_type() != signal_type {
            return Err(IslError::TypeMismatch {
                expected: signal_type,
                actual: self.signal_type(),
            });
        }
        let size = size.max(1);
        match self {
            Value::Text(s) => {
                let limit = if size > 1 { size } else { max_text };
                if s.len() > limit {
                    return Err(IslError::SizeMismatch {
                        expected: limit,
                        actual: s.len(),
                    });
                }
            }
            _ => {
                if self.len() != size {
                    return Err(IslError::SizeMismatch {
                        expected: size,
                        actual: self.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Parse the comma-separated initial value form
    ///
    /// Missing trailing elements keep their zero value, extra ones are ignored.
    pub fn parse(signal_type: SignalType, size: usize, text: &str) -> IslResult<Self> {
        let mut value = Value::zeroed(signal_type, size)?;
        if text.is_empty() {
            return Ok(value);
        }
        let invalid = |token: &str| {
            IslError::ValidationError(format!(
                "invalid {} initial value {:?}",
                signal_type, token
            ))
        };
        match &mut value {
            Value::Real(slots) => {
                for (slot, token) in slots.iter_mut().zip(text.split(',')) {
                    *slot = token.trim().parse().map_err(|_| invalid(token))?;
                }
            }
            Value::Integer(slots) => {
                for (slot, token) in slots.iter_mut().zip(text.split(',')) {
                    *slot = token.trim().parse().map_err(|_| invalid(token))?;
                }
            }
            Value::Boolean(slots) => {
                for (slot, token) in slots.iter_mut().zip(text.split(',')) {
                    *slot = matches!(token.trim(), "true" | "1");
                }
            }
            Value::Text(s) => {
                *s = text.to_string();
            }
        }
        Ok(value)
    }

    /// Inverse of [`Value::parse`]
    pub fn to_initial_string(&self) -> String {
        match self {
            Value::Real(v) => join(v),
            Value::Integer(v) => join(v),
            Value::Boolean(v) => join(v),
            Value::Text(s) => s.clone(),
        }
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        for code in 0..5 {
            let t = SignalType::from_code(code).unwrap();
            assert_eq!(t.code(), code);
        }
        assert!(SignalType::from_code(5).is_none());
        assert_eq!(Causality::from_code(1), Some(Causality::Output));
        assert_eq!("input".parse::<Causality>().unwrap(), Causality::Input);
        assert!("param".parse::<Causality>().is_err());
    }

    #[test]
    fn test_structure_rejected() {
        assert!(matches!(
            Value::zeroed(SignalType::Structure, 1),
            Err(IslError::UnsupportedType(SignalType::Structure))
        ));
    }

    #[test]
    fn test_conform() {
        let v = Value::real(10.5);
        assert!(v.conform(SignalType::Real, 1, 1024).is_ok());
        assert!(matches!(
            v.conform(SignalType::Integer, 1, 1024),
            Err(IslError::TypeMismatch { .. })
        ));
        assert!(matches!(
            v.conform(SignalType::Real, 3, 1024),
            Err(IslError::SizeMismatch { expected: 3, actual: 1 })
        ));

        let s = Value::text("hello");
        assert!(s.conform(SignalType::String, 1, 1024).is_ok());
        assert!(s.conform(SignalType::String, 1, 4).is_err());
    }

    #[test]
    fn test_parse_initial() {
        let v = Value::parse(SignalType::Real, 3, "1.5,2").unwrap();
        assert_eq!(v, Value::Real(vec![1.5, 2.0, 0.0]));
        assert_eq!(v.to_initial_string(), "1.5,2,0");

        let b = Value::parse(SignalType::Boolean, 2, "true,0").unwrap();
        assert_eq!(b, Value::Boolean(vec![true, false]));

        let i = Value::parse(SignalType::Integer, 1, "").unwrap();
        assert_eq!(i, Value::integer(0));

        assert!(Value::parse(SignalType::Integer, 1, "abc").is_err());
    }
}
