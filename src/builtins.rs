//! Built-in memory-movement primitives.
//!
//! These are the verbs every scenario composes its patterns from:
//! `iam`, `pick`, `pickin`, `validate`, `ack`, `ackmy`, `draft`,
//! `out`, `outmy` and `convert`. Each operates on the narrowest scope
//! its phase allows and fails with a descriptive error that aborts the
//! run at the current step boundary.

use indexmap::IndexMap;

use crate::error::ExecError;
use crate::memory::{one_deep, GivenScope, Heap, ThenScope, WhenScope};
use crate::registry::Registries;
use crate::value::Value;

/// Register the pieces every scenario relies on: the identity schema
/// and the default octet converters.
pub fn install(reg: &mut Registries) {
    reg.schemas.register("identity", |v| Ok(v.clone()));
    reg.converters.register("string", convert_string);
    reg.converters.register("hex", convert_hex);
    reg.converters.register("base58", convert_base58);
}

/// Declare the actor identity, or with `None` assert one is declared.
/// The identity is immutable for the rest of the run.
pub fn iam(ack: &mut Heap, name: Option<&str>) -> Result<(), ExecError> {
    match name {
        Some(name) => {
            if let Some(existing) = &ack.whoami {
                return Err(ExecError::Identity(format!(
                    "identity already declared as '{existing}'"
                )));
            }
            ack.whoami = Some(name.to_string());
            Ok(())
        }
        None => ack.require_whoami().map(|_| ()),
    }
}

/// Bind a value into the scratch region. With an explicit object, the
/// object is taken as-is and `what` becomes the pending schema name.
/// Otherwise `what` is resolved by one-deep lookup over `IN.KEYS` then
/// `IN`.
pub fn pick(scope: &mut GivenScope, what: &str, obj: Option<Value>) -> Result<(), ExecError> {
    scope.tmp.reset();
    match obj {
        Some(value) => {
            scope.tmp.data = Some(value);
            scope.tmp.schema = Some(what.to_string());
        }
        None => {
            let found = one_deep(scope.keys, what)
                .or_else(|| one_deep(scope.input, what))
                .ok_or_else(|| ExecError::NotFound(what.to_string()))?;
            scope.tmp.data = Some(found.clone());
        }
    }
    Ok(())
}

/// Bind a value found inside a named section. The section itself is
/// resolved one-deep over `IN.KEYS` then `IN` and must be a mapping;
/// `what` is then resolved one-deep within it.
pub fn pickin(scope: &mut GivenScope, section: &str, what: &str) -> Result<(), ExecError> {
    let root = one_deep(scope.keys, section)
        .or_else(|| one_deep(scope.input, section))
        .ok_or_else(|| ExecError::NotFound(section.to_string()))?;
    let map = root.as_map().ok_or_else(|| {
        ExecError::Type(format!("section '{section}' is not a mapping"))
    })?;
    let found = one_deep(map, what)
        .cloned()
        .ok_or_else(|| ExecError::NotFound(what.to_string()))?;
    scope.tmp.reset();
    scope.tmp.data = Some(found);
    scope.tmp.root = Some(section.to_string());
    Ok(())
}

/// Run the named schema over the picked data and store the canonical
/// result. The schema name defaults to the one `pick` recorded, then
/// to `name` itself.
pub fn validate(
    scope: &mut GivenScope,
    name: &str,
    schema: Option<&str>,
) -> Result<(), ExecError> {
    let schema_name = schema
        .map(str::to_string)
        .or_else(|| scope.tmp.schema.clone())
        .unwrap_or_else(|| name.to_string());
    let validator = scope
        .schemas
        .get(&schema_name)
        .ok_or_else(|| ExecError::SchemaNotFound(schema_name.clone()))?;
    let data = scope
        .tmp
        .data
        .as_ref()
        .ok_or_else(|| ExecError::Type(format!("nothing picked to validate as '{name}'")))?;
    let canonical = validator(data).map_err(|reason| ExecError::SchemaFailed {
        name: schema_name,
        reason,
    })?;
    scope.tmp.valid = Some(canonical);
    Ok(())
}

/// Move the validated value into `ACK[name]`. Appends when an entry is
/// already present, promoting a scalar to a singleton array first; a
/// repeated ack onto an existing non-array mapping is rejected.
pub fn ack(scope: &mut GivenScope, name: &str) -> Result<(), ExecError> {
    let value = scope.tmp.valid.take().ok_or_else(|| {
        ExecError::Type(format!("no validated data to acknowledge as '{name}'"))
    })?;
    match scope.ack.entries.entry(name.to_string()) {
        indexmap::map::Entry::Vacant(slot) => {
            slot.insert(value);
        }
        indexmap::map::Entry::Occupied(mut slot) => match slot.get_mut() {
            Value::Array(items) => items.push(value),
            Value::Map(_) => {
                return Err(ExecError::Type(format!(
                    "'{name}' already holds a mapping and cannot be appended to"
                )));
            }
            existing => {
                let previous = std::mem::replace(existing, Value::Null);
                *existing = Value::Array(vec![previous, value]);
            }
        },
    }
    Ok(())
}

/// Move a value into `ACK[whoami][name]`. With no explicit object the
/// validated scratch value is used and the scratch region is cleared
/// after the move. Requires a declared identity.
pub fn ackmy(scope: &mut GivenScope, name: &str, obj: Option<Value>) -> Result<(), ExecError> {
    let who = scope.ack.require_whoami()?.to_string();
    let (value, consumed_tmp) = match obj {
        Some(v) => (v, false),
        None => {
            let v = scope.tmp.valid.take().ok_or_else(|| {
                ExecError::Type(format!("no validated data to acknowledge as '{name}'"))
            })?;
            (v, true)
        }
    };
    heap_insert_my(scope.ack, &who, name, value)?;
    if consumed_tmp {
        scope.tmp.reset();
    }
    Ok(())
}

/// Append a line of text to `ACK.draft`, creating it on first use.
pub fn draft(ack: &mut Heap, text: &str) -> Result<(), ExecError> {
    match ack.entries.get_mut("draft") {
        None => {
            ack.entries
                .insert("draft".to_string(), Value::String(text.to_string()));
        }
        Some(Value::String(existing)) => {
            existing.push('\n');
            existing.push_str(text);
        }
        Some(other) => {
            return Err(ExecError::Type(format!(
                "'draft' holds a {} and cannot be appended to",
                other.kind()
            )));
        }
    }
    Ok(())
}

/// Move `ACK[name]` into the output region.
pub fn out(scope: &mut ThenScope, name: &str) -> Result<(), ExecError> {
    let value = scope
        .ack
        .entries
        .get(name)
        .cloned()
        .ok_or_else(|| ExecError::NotFound(name.to_string()))?;
    scope.out.insert(name.to_string(), value);
    Ok(())
}

/// Move `ACK[whoami][name]` into `OUT[whoami][name]`.
pub fn outmy(scope: &mut ThenScope, name: &str) -> Result<(), ExecError> {
    let who = scope.ack.require_whoami()?.to_string();
    let mine = scope
        .ack
        .entries
        .get(&who)
        .and_then(Value::as_map)
        .ok_or_else(|| ExecError::NotFound(format!("{who}.{name}")))?;
    let value = mine
        .get(name)
        .cloned()
        .ok_or_else(|| ExecError::NotFound(format!("{who}.{name}")))?;
    match scope
        .out
        .entry(who.clone())
        .or_insert_with(|| Value::Map(IndexMap::new()))
    {
        Value::Map(section) => {
            section.insert(name.to_string(), value);
        }
        other => {
            return Err(ExecError::Type(format!(
                "output entry '{who}' holds a {} and cannot be extended",
                other.kind()
            )));
        }
    }
    Ok(())
}

/// Move every acknowledged entry into the output region.
pub fn out_all(scope: &mut ThenScope) -> Result<(), ExecError> {
    for (name, value) in &scope.ack.entries {
        scope.out.insert(name.clone(), value.clone());
    }
    Ok(())
}

/// Rewrite `ACK[name]` through a named converter.
pub fn convert(scope: &mut WhenScope, name: &str, format: &str) -> Result<(), ExecError> {
    let converter = scope.converters.get(format).ok_or_else(|| {
        ExecError::Type(format!("no converter registered for format '{format}'"))
    })?;
    let value = scope
        .ack
        .entries
        .get(name)
        .ok_or_else(|| ExecError::NotFound(name.to_string()))?;
    let converted = converter(value)?;
    scope.ack.entries.insert(name.to_string(), converted);
    Ok(())
}

/// Store a value under `ACK[whoami][name]`, creating the per-actor
/// mapping on first use.
pub fn heap_insert_my(
    heap: &mut Heap,
    who: &str,
    name: &str,
    value: Value,
) -> Result<(), ExecError> {
    match heap
        .entries
        .entry(who.to_string())
        .or_insert_with(|| Value::Map(IndexMap::new()))
    {
        Value::Map(section) => {
            section.insert(name.to_string(), value);
            Ok(())
        }
        other => Err(ExecError::Type(format!(
            "'{who}' holds a {} and cannot hold acknowledged values",
            other.kind()
        ))),
    }
}

fn convert_string(value: &Value) -> Result<Value, ExecError> {
    match value {
        Value::Octet(o) => Ok(Value::String(o.to_text()?)),
        Value::String(s) => Ok(Value::String(s.clone())),
        other => Err(ExecError::Type(format!(
            "cannot convert a {} to a string",
            other.kind()
        ))),
    }
}

fn convert_hex(value: &Value) -> Result<Value, ExecError> {
    Ok(Value::String(value.to_octet()?.to_hex()))
}

fn convert_base58(value: &Value) -> Result<Value, ExecError> {
    Ok(Value::String(value.to_octet()?.to_base58()))
}
