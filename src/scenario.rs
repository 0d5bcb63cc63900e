//! Scenario loading.
//!
//! A `Scenario '<name>'` line extends the registries with the patterns,
//! schemas and converters that scenario provides. Resolution goes
//! through a trait so embedders can supply their own table; the
//! default resolver is a compile-time map over the modules under
//! `scenarios/`. Loading is idempotent per engine: a name already
//! loaded is a no-op with identical observable registry state.

use crate::registry::Registries;

/// A scenario's registration entry point.
pub type RegisterFn = fn(&mut Registries);

/// Maps a scenario name to its registration function.
pub trait ScenarioLoader {
    fn resolve(&self, name: &str) -> Option<RegisterFn>;
}

/// Default resolver over the built-in scenario table.
#[derive(Default)]
pub struct StaticResolver;

impl ScenarioLoader for StaticResolver {
    fn resolve(&self, name: &str) -> Option<RegisterFn> {
        crate::scenarios::lookup(name)
    }
}
