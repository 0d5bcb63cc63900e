//! Handler, schema and converter registries.
//!
//! Patterns are canonicalized once at registration (lowercase, quoted
//! literals already collapsed to `''` by the author) so lookup is exact
//! equality against the normalized statement. Duplicate registration
//! replaces silently; patterns are unique per phase.

use indexmap::IndexMap;

use crate::error::ExecError;
use crate::memory::{GivenScope, ThenScope, WhenScope};
use crate::phase::Phase;
use crate::value::Value;

/// Handler signatures, one per phase. Arity of the slice equals the
/// number of `''` sentinels in the bound pattern.
pub type GivenFn = fn(&[String], &mut GivenScope) -> Result<(), ExecError>;
pub type WhenFn = fn(&[String], &mut WhenScope) -> Result<(), ExecError>;
pub type ThenFn = fn(&[String], &mut ThenScope) -> Result<(), ExecError>;

/// A bound handler reference, tagged with the phase it executes in.
#[derive(Debug, Clone, Copy)]
pub enum Handler {
    Given(GivenFn),
    When(WhenFn),
    Then(ThenFn),
}

/// Three pattern-keyed dictionaries, one per step phase.
#[derive(Default)]
pub struct HandlerRegistry {
    given: IndexMap<String, GivenFn>,
    when: IndexMap<String, WhenFn>,
    then: IndexMap<String, ThenFn>,
}

impl HandlerRegistry {
    pub fn given(&mut self, pattern: &str, f: GivenFn) {
        self.given.insert(canonical(pattern), f);
    }

    pub fn when(&mut self, pattern: &str, f: WhenFn) {
        self.when.insert(canonical(pattern), f);
    }

    pub fn then(&mut self, pattern: &str, f: ThenFn) {
        self.then.insert(canonical(pattern), f);
    }

    /// Exact lookup of a normalized statement in the phase's dictionary.
    pub fn lookup(&self, phase: Phase, candidate: &str) -> Option<Handler> {
        match phase {
            Phase::Given => self.given.get(candidate).map(|f| Handler::Given(*f)),
            Phase::When => self.when.get(candidate).map(|f| Handler::When(*f)),
            Phase::Then => self.then.get(candidate).map(|f| Handler::Then(*f)),
            _ => None,
        }
    }

    pub fn pattern_count(&self) -> usize {
        self.given.len() + self.when.len() + self.then.len()
    }
}

fn canonical(pattern: &str) -> String {
    pattern.to_lowercase()
}

/// A named validator: maps a decoded value to its canonical form or
/// rejects it with a reason.
pub type SchemaFn = fn(&Value) -> Result<Value, String>;

#[derive(Default)]
pub struct SchemaRegistry {
    schemas: IndexMap<String, SchemaFn>,
}

impl SchemaRegistry {
    pub fn register(&mut self, name: &str, f: SchemaFn) {
        self.schemas.insert(name.to_string(), f);
    }

    pub fn get(&self, name: &str) -> Option<SchemaFn> {
        self.schemas.get(name).copied()
    }

    pub fn names(&self) -> Vec<String> {
        self.schemas.keys().cloned().collect()
    }
}

/// A named octet conversion, dispatched by `convert`.
pub type ConvertFn = fn(&Value) -> Result<Value, ExecError>;

#[derive(Default)]
pub struct ConverterRegistry {
    converters: IndexMap<String, ConvertFn>,
}

impl ConverterRegistry {
    pub fn register(&mut self, format: &str, f: ConvertFn) {
        self.converters.insert(format.to_string(), f);
    }

    pub fn get(&self, format: &str) -> Option<ConvertFn> {
        self.converters.get(format).copied()
    }
}

/// Everything a scenario registration function may populate.
#[derive(Default)]
pub struct Registries {
    pub handlers: HandlerRegistry,
    pub schemas: SchemaRegistry,
    pub converters: ConverterRegistry,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_given(_: &[String], _: &mut GivenScope) -> Result<(), ExecError> {
        Ok(())
    }

    fn other_given(_: &[String], _: &mut GivenScope) -> Result<(), ExecError> {
        Err(ExecError::Type("other".into()))
    }

    #[test]
    fn test_lookup_is_phase_keyed() {
        let mut reg = HandlerRegistry::default();
        reg.given("i am ''", noop_given);
        assert!(reg.lookup(Phase::Given, "i am ''").is_some());
        assert!(reg.lookup(Phase::When, "i am ''").is_none());
        assert!(reg.lookup(Phase::Then, "i am ''").is_none());
    }

    #[test]
    fn test_registration_canonicalizes_case() {
        let mut reg = HandlerRegistry::default();
        reg.given("I AM ''", noop_given);
        assert!(reg.lookup(Phase::Given, "i am ''").is_some());
    }

    #[test]
    fn test_duplicate_registration_replaces_silently() {
        let mut reg = HandlerRegistry::default();
        reg.given("i am ''", noop_given);
        reg.given("i am ''", other_given);
        assert_eq!(reg.pattern_count(), 1);
        match reg.lookup(Phase::Given, "i am ''") {
            Some(Handler::Given(f)) => assert!(f as usize == other_given as usize),
            _ => panic!("pattern not found"),
        }
    }

    #[test]
    fn test_schema_registry_names_in_order() {
        let mut reg = SchemaRegistry::default();
        reg.register("identity", |v| Ok(v.clone()));
        reg.register("keyring", |v| Ok(v.clone()));
        assert_eq!(reg.names(), vec!["identity", "keyring"]);
    }
}
