//! ZenDSL — a BDD-style cryptographic scripting engine.
//!
//! Scripts read like prose organized into Given/When/Then phases and
//! drive cryptographic operations over a compartmented memory model.
//! The engine has a strict two-stage lifecycle: `parse` binds every
//! statement to a registered handler (loading scenarios as they are
//! declared), `run` executes the bound script against the host's JSON
//! documents and produces one JSON output document.
//!
//! ## Quick start
//!
//! ```
//! let script = "Scenario 'eddsa'\n\
//!               Given I am 'Alice'\n\
//!               When I create the keypair\n\
//!               Then print my 'keyring'";
//! let out = zendsl::run_script(script, None, None).unwrap();
//! assert!(out.unwrap().contains("Alice"));
//! ```

use std::collections::HashSet;

// Core error handling
pub mod error;

// Value model and the JSON boundary
pub mod value;

// Script structure: phases, AST, line parser
pub mod ast;
pub mod parser;
pub mod phase;

// Registries and scenario loading
pub mod registry;
pub mod scenario;
pub mod scenarios;

// Run memory, built-in verbs, executor, diagnostics
pub mod builtins;
pub mod executor;
pub mod memory;
pub mod trace;

pub use ast::Script;
pub use error::{EngineError, ExecError, ParseError};
pub use phase::Phase;
pub use registry::{Registries, SchemaFn};
pub use scenario::{RegisterFn, ScenarioLoader, StaticResolver};
pub use value::{Octet, Value};

use trace::Traceback;

/// The parser-dispatcher-executor pipeline behind one handle.
///
/// An engine owns the registries, the set of scenarios already loaded
/// (loading is idempotent across scripts) and the traceback buffer.
pub struct Engine {
    registries: Registries,
    loader: Box<dyn ScenarioLoader>,
    loaded: HashSet<String>,
    trace: Traceback,
    counter: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl Engine {
    /// Engine with the built-in scenario table.
    pub fn new() -> Self {
        Engine::with_loader(Box::new(StaticResolver))
    }

    /// Engine with a custom scenario source.
    pub fn with_loader(loader: Box<dyn ScenarioLoader>) -> Self {
        Engine {
            registries: Registries::default(),
            loader,
            loaded: HashSet::new(),
            trace: Traceback::new(),
            counter: 0,
        }
    }

    /// Register a named validator, as a scenario load would.
    pub fn register_schema(&mut self, name: &str, schema: SchemaFn) {
        self.registries.schemas.register(name, schema);
    }

    /// Parse and bind a script. No handler runs during this stage; a
    /// failure yields the rendered traceback alongside the error.
    pub fn parse(&mut self, source: &str) -> Result<Script, EngineError> {
        let mut parser = parser::Parser {
            registries: &mut self.registries,
            loader: self.loader.as_ref(),
            loaded: &mut self.loaded,
            trace: &mut self.trace,
            counter: &mut self.counter,
        };
        match parser.parse(source) {
            Ok(script) => {
                tracing::debug!(steps = script.len(), "script bound");
                self.trace.clear();
                Ok(script)
            }
            Err(error) => {
                self.trace.error(error.to_string());
                let schemas = self.registries.schemas.names();
                let report = self.trace.failure_report(None, &schemas);
                let dump = self.trace.debug_dump(None, &schemas);
                self.trace.clear();
                Err(EngineError::Parse {
                    error,
                    report,
                    dump,
                })
            }
        }
    }

    /// Execute a bound script against the host documents. Returns the
    /// encoded `OUT` document when the script printed anything.
    pub fn run(
        &mut self,
        script: &Script,
        data: Option<&str>,
        keys: Option<&str>,
    ) -> Result<Option<String>, EngineError> {
        match executor::run(script, &self.registries, &mut self.trace, data, keys) {
            Ok(out) => {
                self.trace.clear();
                if out.is_empty() {
                    return Ok(None);
                }
                let doc = Value::Map(out).to_json();
                Ok(Some(doc.to_string()))
            }
            Err(failure) => Err(EngineError::Run {
                error: failure.error,
                report: failure.report,
                dump: failure.dump,
            }),
        }
    }
}

/// One-shot convenience: parse and run a script in a fresh engine.
pub fn run_script(
    source: &str,
    data: Option<&str>,
    keys: Option<&str>,
) -> Result<Option<String>, EngineError> {
    let mut engine = Engine::new();
    let script = engine.parse(source)?;
    engine.run(&script, data, keys)
}
