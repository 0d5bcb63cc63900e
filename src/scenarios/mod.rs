//! Built-in scenario table.
//!
//! A scenario name resolves to the registration function of one of the
//! modules below. The table is fixed at compile time; embedders who
//! need another source of scenarios implement `ScenarioLoader`.

use crate::scenario::RegisterFn;

pub mod common;
pub mod eddsa;
pub mod p256;

pub fn lookup(name: &str) -> Option<RegisterFn> {
    match name {
        "eddsa" => Some(eddsa::register as RegisterFn),
        "p256" => Some(p256::register as RegisterFn),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_exact() {
        assert!(lookup("eddsa").is_some());
        assert!(lookup("p256").is_some());
        assert!(lookup("EDDSA").is_none());
        assert!(lookup("ecdh").is_none());
    }
}
