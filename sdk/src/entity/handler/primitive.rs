//! Base type handlers

use crate::entity::schema::{Primitive, PropertyDescriptor};
use crate::entity::types::{EntityError, EntityResult, ObjectId, Timestamp, Value};

/// Validate and coerce an assigned value
pub fn set(kind: Primitive, descriptor: &PropertyDescriptor, input: Value, path: &str) -> EntityResult<Value> {
    if input.is_null() {
        return Err(EntityError::wrong_type(path, kind.name(), &input));
    }

    let value = match kind {
        Primitive::String => match input {
            Value::String(s) => {
                check_string(descriptor, &s, path)?;
                Value::String(s)
            }
            other => return Err(EntityError::wrong_type(path, kind.name(), &other)),
        },
        Primitive::Number => match input {
            Value::Int(_) | Value::Float(_) => {
                check_number(descriptor, &input, path)?;
                input
            }
            other => return Err(EntityError::wrong_type(path, kind.name(), &other)),
        },
        Primitive::Boolean => match input {
            Value::Bool(_) => input,
            other => return Err(EntityError::wrong_type(path, kind.name(), &other)),
        },
        Primitive::Date => match input {
            Value::Date(_) => input,
            Value::String(s) => Timestamp::from_rfc3339(&s)
                .map(Value::Date)
                .map_err(|e| {
                    EntityError::validation(path, "date", format!("'{}' is not a valid date: {}", s, e))
                })?,
            Value::Int(millis) => Timestamp::from_timestamp_millis(millis)
                .map(Value::Date)
                .ok_or_else(|| EntityError::validation(path, "date", "timestamp out of range"))?,
            other => return Err(EntityError::wrong_type(path, kind.name(), &other)),
        },
        Primitive::ObjectId => match input {
            Value::ObjectId(_) => input,
            Value::String(s) => Value::ObjectId(parse_object_id(&s, path)?),
            other => return Err(EntityError::wrong_type(path, kind.name(), &other)),
        },
        Primitive::Mixed => {
            super::check_untyped(path, &input)?;
            input
        }
    };

    check_one_of(descriptor, &value, path)?;
    Ok(value)
}

/// Read-time coercion of a stored value. Unparseable strings pass through unchanged.
pub fn get(kind: Primitive, raw: &Value) -> Value {
    match (kind, raw) {
        (Primitive::ObjectId, Value::String(s)) => ObjectId::parse_str(s)
            .map(Value::ObjectId)
            .unwrap_or_else(|_| raw.clone()),
        (Primitive::Date, Value::String(s)) => Timestamp::from_rfc3339(s)
            .map(Value::Date)
            .unwrap_or_else(|_| raw.clone()),
        _ => raw.clone(),
    }
}

pub fn parse_object_id(s: &str, path: &str) -> EntityResult<ObjectId> {
    ObjectId::parse_str(s).map_err(|_| {
        EntityError::validation(path, "objectId", format!("'{}' is not a valid object id", s))
    })
}

fn check_string(descriptor: &PropertyDescriptor, s: &str, path: &str) -> EntityResult<()> {
    let len = s.chars().count();
    if let Some(length) = descriptor.length {
        if len != length {
            return Err(EntityError::validation(
                path,
                "length",
                format!("length {} is not {}", len, length),
            ));
        }
    }
    if let Some(min) = descriptor.min {
        if (len as f64) < min {
            return Err(EntityError::validation(
                path,
                "min",
                format!("length {} is shorter than {}", len, min),
            ));
        }
    }
    if let Some(max) = descriptor.max {
        if (len as f64) > max {
            return Err(EntityError::validation(
                path,
                "max",
                format!("length {} is longer than {}", len, max),
            ));
        }
    }
    if let Some(pattern) = &descriptor.pattern {
        if !pattern.is_match(s) {
            return Err(EntityError::validation(
                path,
                "pattern",
                format!("'{}' does not match /{}/", s, pattern.as_str()),
            ));
        }
    }
    Ok(())
}

fn check_number(descriptor: &PropertyDescriptor, value: &Value, path: &str) -> EntityResult<()> {
    let n = value.as_f64().unwrap_or(f64::NAN);
    if n.is_nan() {
        return Err(EntityError::validation(path, "number", "NaN is not a number"));
    }
    if let Some(min) = descriptor.min {
        if n < min {
            return Err(EntityError::validation(path, "min", format!("{} is less than {}", n, min)));
        }
    }
    if let Some(max) = descriptor.max {
        if n > max {
            return Err(EntityError::validation(path, "max", format!("{} is greater than {}", n, max)));
        }
    }
    Ok(())
}

fn check_one_of(descriptor: &PropertyDescriptor, value: &Value, path: &str) -> EntityResult<()> {
    let Some(allowed) = &descriptor.one_of else {
        return Ok(());
    };
    let same = |candidate: &Value| match (candidate.as_f64(), value.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => candidate == value,
    };
    if allowed.iter().any(same) {
        Ok(())
    } else {
        Err(EntityError::validation(
            path,
            "oneOf",
            format!("{} is not one of the allowed values", value),
        ))
    }
}
