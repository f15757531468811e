//! Field setters: value transforms applied while binding.
//!
//! A setter that fails leaves the raw value in place so the validator can
//! report the mismatch as a field error.

use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, bail};

use crate::types::Value;

type SetterFn = dyn Fn(&Value) -> anyhow::Result<Value> + Send + Sync;

/// Transform applied to a scalar field value before it is stored.
#[derive(Clone)]
pub enum Setter {
    /// Trims surrounding whitespace from strings.
    Trim,
    /// Lowercases strings.
    Lowercase,
    /// Coerces to [`Value::Int`].
    Integer,
    /// Coerces to [`Value::Float`].
    Float,
    /// Coerces to [`Value::Bool`] (`1/0`, `true/false`, `on/off`, `yes/no`).
    Boolean,
    /// Renders scalars as strings.
    String,
    /// Caller-supplied transform.
    Custom(Arc<SetterFn>),
}

impl Setter {
    /// Wraps a closure as a setter.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Applies the transform. `Null` passes through untouched.
    ///
    /// # Errors
    ///
    /// Returns an error when the value cannot be coerced.
    pub fn apply(&self, value: &Value) -> anyhow::Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            Self::Trim => string_op(value, |s| s.trim().to_string()),
            Self::Lowercase => string_op(value, str::to_lowercase),
            Self::Integer => to_int(value),
            Self::Float => to_float(value),
            Self::Boolean => to_bool(value),
            Self::String => to_string(value),
            Self::Custom(f) => f(value),
        }
    }
}

impl fmt::Debug for Setter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Trim => "Trim",
            Self::Lowercase => "Lowercase",
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::Boolean => "Boolean",
            Self::String => "String",
            Self::Custom(_) => "Custom",
        };
        f.write_str(name)
    }
}

fn string_op(value: &Value, op: impl Fn(&str) -> String) -> anyhow::Result<Value> {
    value
        .as_str()
        .map(|s| Value::String(op(s)))
        .ok_or_else(|| anyhow!("expected string, got {}", value.type_name()))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn to_int(value: &Value) -> anyhow::Result<Value> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Ok(Value::Int(*f as i64))
        }
        Value::String(s) => Ok(Value::Int(s.trim().parse::<i64>()?)),
        other => bail!("cannot convert {} to integer", other.type_name()),
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_float(value: &Value) -> anyhow::Result<Value> {
    match value {
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::String(s) => Ok(Value::Float(s.trim().parse::<f64>()?)),
        other => bail!("cannot convert {} to float", other.type_name()),
    }
}

fn to_bool(value: &Value) -> anyhow::Result<Value> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Int(0) => Ok(Value::Bool(false)),
        Value::Int(1) => Ok(Value::Bool(true)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Ok(Value::Bool(true)),
            "0" | "false" | "off" | "no" | "" => Ok(Value::Bool(false)),
            other => bail!("cannot convert `{other}` to boolean"),
        },
        other => bail!("cannot convert {} to boolean", other.type_name()),
    }
}

fn to_string(value: &Value) -> anyhow::Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(s.clone())),
        Value::Int(i) => Ok(Value::String(i.to_string())),
        Value::Float(f) => Ok(Value::String(f.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        other => bail!("cannot convert {} to string", other.type_name()),
    }
}
