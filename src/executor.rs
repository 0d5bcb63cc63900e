//! Script executor.
//!
//! Runs a bound script in AST order. Before every step the `IN`
//! region is rebuilt from the host-provided JSON documents, so no step
//! can observe mutations made by an earlier one; `ACK` and `OUT`
//! accumulate across steps. Any failure aborts the run at that step
//! boundary with a rendered failure report.

use indexmap::IndexMap;

use crate::ast::{Script, StepNode};
use crate::error::ExecError;
use crate::memory::{GivenScope, Memory, ThenScope, WhenScope};
use crate::registry::{Handler, Registries};
use crate::trace::Traceback;
use crate::value::Value;

/// An aborted run: the error, the report destined for stderr, and the
/// machine-readable dump of the failure state.
#[derive(Debug)]
pub(crate) struct RunFailure {
    pub error: ExecError,
    pub report: String,
    pub dump: serde_json::Value,
}

pub(crate) fn run(
    script: &Script,
    regs: &Registries,
    trace: &mut Traceback,
    data: Option<&str>,
    keys: Option<&str>,
) -> Result<IndexMap<String, Value>, Box<RunFailure>> {
    let input_template = match decode_data(data) {
        Ok(map) => map,
        Err(err) => return Err(fail(trace, None, regs, err)),
    };
    let keys_template = match decode_keys(keys) {
        Ok(map) => map,
        Err(err) => return Err(fail(trace, None, regs, err)),
    };

    let mut order: Vec<&StepNode> = script.steps.iter().collect();
    order.sort_by_key(|node| node.id);

    let mut mem = Memory::new();
    for node in order {
        mem.input = input_template.clone();
        mem.keys = keys_template.clone();
        trace.line(node.id, &node.source);
        tracing::debug!(id = node.id, step = %node.pattern, "executing step");

        let result = match node.handler {
            Handler::Given(f) => f(
                &node.args,
                &mut GivenScope {
                    input: &mem.input,
                    keys: &mem.keys,
                    tmp: &mut mem.tmp,
                    ack: &mut mem.ack,
                    schemas: &regs.schemas,
                },
            ),
            Handler::When(f) => f(
                &node.args,
                &mut WhenScope {
                    ack: &mut mem.ack,
                    converters: &regs.converters,
                },
            ),
            Handler::Then(f) => f(
                &node.args,
                &mut ThenScope {
                    ack: &mem.ack,
                    out: &mut mem.out,
                },
            ),
        };

        if let Err(error) = result {
            trace.error(error.to_string());
            return Err(fail(trace, Some(&mem), regs, error));
        }
    }

    Ok(mem.out)
}

fn fail(
    trace: &mut Traceback,
    mem: Option<&Memory>,
    regs: &Registries,
    error: ExecError,
) -> Box<RunFailure> {
    let schemas = regs.schemas.names();
    let report = trace.failure_report(mem, &schemas);
    let dump = trace.debug_dump(mem, &schemas);
    trace.clear();
    tracing::warn!(%error, "run aborted");
    Box::new(RunFailure {
        error,
        report,
        dump,
    })
}

/// Decode the `DATA` document: a mapping, or an array of mappings
/// flattened one level with later keys winning on collision.
fn decode_data(data: Option<&str>) -> Result<IndexMap<String, Value>, ExecError> {
    let Some(text) = data else {
        return Ok(IndexMap::new());
    };
    if text.trim().is_empty() {
        return Ok(IndexMap::new());
    }
    let json: serde_json::Value = serde_json::from_str(text)?;
    match Value::from_json(&json) {
        Value::Map(map) => Ok(map),
        Value::Array(items) => {
            let mut merged = IndexMap::new();
            for item in items {
                match item {
                    Value::Map(member) => merged.extend(member),
                    other => {
                        return Err(ExecError::Codec(format!(
                            "input array member is a {}, expected a mapping",
                            other.kind()
                        )))
                    }
                }
            }
            Ok(merged)
        }
        other => Err(ExecError::Codec(format!(
            "input document is a {}, expected a mapping or an array of mappings",
            other.kind()
        ))),
    }
}

/// Decode the `KEYS` document: a mapping or nothing.
fn decode_keys(keys: Option<&str>) -> Result<IndexMap<String, Value>, ExecError> {
    let Some(text) = keys else {
        return Ok(IndexMap::new());
    };
    if text.trim().is_empty() {
        return Ok(IndexMap::new());
    }
    let json: serde_json::Value = serde_json::from_str(text)?;
    match Value::from_json(&json) {
        Value::Map(map) => Ok(map),
        other => Err(ExecError::Codec(format!(
            "key document is a {}, expected a mapping",
            other.kind()
        ))),
    }
}
