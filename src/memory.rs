//! Memory compartments and phase-scoped access.
//!
//! A run owns four regions: `IN` (plus `IN.KEYS`) reset before every
//! step, `TMP` as the pick/validate/ack scratch, `ACK` accumulating
//! acknowledged values across steps, and `OUT` collecting what the
//! script prints. Handlers never see the whole memory: each phase gets
//! a scope struct borrowing exactly the regions that phase may touch,
//! so the write discipline holds by construction.

use indexmap::IndexMap;
use serde_json::json;

use crate::error::ExecError;
use crate::registry::{ConverterRegistry, SchemaRegistry};
use crate::value::Value;

/// The pick/validate scratch region. Overwritten by every `pick`,
/// consumed by `ack`.
#[derive(Debug, Default, Clone)]
pub struct Scratch {
    pub data: Option<Value>,
    pub schema: Option<String>,
    pub root: Option<String>,
    pub valid: Option<Value>,
}

impl Scratch {
    pub fn reset(&mut self) {
        *self = Scratch::default();
    }
}

/// The acknowledged region. `whoami` is set once per run and never
/// changes afterwards.
#[derive(Debug, Default, Clone)]
pub struct Heap {
    pub whoami: Option<String>,
    pub entries: IndexMap<String, Value>,
}

impl Heap {
    pub fn require_whoami(&self) -> Result<&str, ExecError> {
        self.whoami
            .as_deref()
            .ok_or_else(|| ExecError::Identity("identity not declared".into()))
    }
}

/// Full run memory, owned by the executor.
#[derive(Debug, Default)]
pub struct Memory {
    pub input: IndexMap<String, Value>,
    pub keys: IndexMap<String, Value>,
    pub tmp: Scratch,
    pub ack: Heap,
    pub out: IndexMap<String, Value>,
}

impl Memory {
    pub fn new() -> Self {
        Memory::default()
    }

    pub fn input_json(&self) -> serde_json::Value {
        let mut obj = map_to_json(&self.input);
        obj["KEYS"] = map_to_json(&self.keys);
        obj
    }

    pub fn tmp_json(&self) -> serde_json::Value {
        json!({
            "data": self.tmp.data.as_ref().map(Value::to_json),
            "schema": self.tmp.schema,
            "root": self.tmp.root,
            "valid": self.tmp.valid.as_ref().map(Value::to_json),
        })
    }

    pub fn ack_json(&self) -> serde_json::Value {
        let mut obj = map_to_json(&self.ack.entries);
        if let Some(who) = &self.ack.whoami {
            obj["whoami"] = json!(who);
        }
        obj
    }

    pub fn out_json(&self) -> serde_json::Value {
        map_to_json(&self.out)
    }
}

fn map_to_json(map: &IndexMap<String, Value>) -> serde_json::Value {
    Value::Map(map.clone()).to_json()
}

/// One-deep lookup: a direct hit on `container[key]`, otherwise the
/// first `child[key]` found scanning one level of nested mappings in
/// insertion order.
pub fn one_deep<'a>(container: &'a IndexMap<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(v) = container.get(key) {
        return Some(v);
    }
    for child in container.values() {
        if let Value::Map(m) = child {
            if let Some(v) = m.get(key) {
                return Some(v);
            }
        }
    }
    None
}

/// What a Given handler may touch: read the per-step inputs, write the
/// scratch and acknowledged regions, consult the schema registry.
pub struct GivenScope<'a> {
    pub input: &'a IndexMap<String, Value>,
    pub keys: &'a IndexMap<String, Value>,
    pub tmp: &'a mut Scratch,
    pub ack: &'a mut Heap,
    pub schemas: &'a SchemaRegistry,
}

/// What a When handler may touch: the acknowledged region and the
/// converter registry.
pub struct WhenScope<'a> {
    pub ack: &'a mut Heap,
    pub converters: &'a ConverterRegistry,
}

/// What a Then handler may touch: read acknowledged values, write the
/// output region.
pub struct ThenScope<'a> {
    pub ack: &'a Heap,
    pub out: &'a mut IndexMap<String, Value>,
}
