//! Line parser and pattern matcher.
//!
//! Parsing walks the script once, line by line: classify, extract the
//! prefix keyword, drive the phase machine, load scenarios as they are
//! declared, normalize the statement into a candidate pattern, extract
//! quoted arguments, and bind against the current phase's registry.
//! The result is a fully bound script; no handler runs during parsing.

use std::collections::HashSet;

use crate::ast::{Script, StepNode};
use crate::error::ParseError;
use crate::phase::{Phase, Prefix};
use crate::registry::Registries;
use crate::scenario::ScenarioLoader;
use crate::trace::Traceback;

/// Scripts shorter than this are rejected before any line processing.
const MIN_SCRIPT_BYTES: usize = 9;

/// One parse pass over a script, borrowing the engine's mutable state.
pub(crate) struct Parser<'e> {
    pub registries: &'e mut Registries,
    pub loader: &'e dyn ScenarioLoader,
    pub loaded: &'e mut HashSet<String>,
    pub trace: &'e mut Traceback,
    pub counter: &'e mut u64,
}

impl Parser<'_> {
    pub fn parse(&mut self, source: &str) -> Result<Script, ParseError> {
        if source.len() < MIN_SCRIPT_BYTES {
            return Err(ParseError::TooShort(source.len()));
        }

        let mut phase = Phase::Feature;
        let mut steps = Vec::new();

        for raw in source.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.trace.line(0, line);

            let keyword = line.split_whitespace().next().unwrap_or("");
            let prefix = Prefix::from_keyword(keyword)
                .ok_or_else(|| ParseError::InvalidStatement(line.to_string()))?;
            phase = phase.transition(prefix)?;

            match prefix {
                Prefix::Rule => continue,
                Prefix::Scenario => {
                    let name = extract_args(line)
                        .into_iter()
                        .next()
                        .ok_or_else(|| ParseError::InvalidStatement(line.to_string()))?
                        .to_lowercase();
                    self.load_scenario(&name)?;
                    continue;
                }
                _ => {}
            }

            let candidate = normalize(line);
            let args = extract_args(line);
            let handler = self
                .registries
                .handlers
                .lookup(phase, &candidate)
                .ok_or_else(|| ParseError::UnknownStep(line.to_string()))?;

            *self.counter += 1;
            steps.push(StepNode {
                id: *self.counter,
                source: line.to_string(),
                args,
                phase,
                pattern: candidate,
                handler,
            });
        }

        Ok(Script { steps })
    }

    fn load_scenario(&mut self, name: &str) -> Result<(), ParseError> {
        if self.loaded.contains(name) {
            return Ok(());
        }
        let register = self
            .loader
            .resolve(name)
            .ok_or_else(|| ParseError::ScenarioLoadFailure(name.to_string()))?;
        register(self.registries);
        self.loaded.insert(name.to_string());
        tracing::debug!(scenario = name, "scenario loaded");
        Ok(())
    }
}

/// Turn a statement into its candidate pattern: quoted literals become
/// `''`, the line is lowercased, and each of the leading keywords
/// `when`, `then`, `given`, `and`, `that` is stripped at most once, in
/// that order.
pub(crate) fn normalize(line: &str) -> String {
    let mut s = blank_quotes(line).to_lowercase();
    for prefix in ["when ", "then ", "given ", "and ", "that "] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.trim_start().to_string();
        }
    }
    s.trim().to_string()
}

/// Replace every `'…'` span with the empty sentinel `''`. A dangling
/// quote swallows the remainder; the resulting candidate simply fails
/// to match.
fn blank_quotes(line: &str) -> String {
    let mut out = String::new();
    let mut rest = line;
    while let Some(start) = rest.find('\'') {
        out.push_str(&rest[..start]);
        out.push_str("''");
        let after = &rest[start + 1..];
        match after.find('\'') {
            Some(end) => rest = &after[end + 1..],
            None => rest = "",
        }
    }
    out.push_str(rest);
    out
}

/// Collect quoted arguments from the original line, in source order.
/// Interior spaces become underscores; arguments never contain
/// whitespace.
pub(crate) fn extract_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut rest = line;
    while let Some(start) = rest.find('\'') {
        let after = &rest[start + 1..];
        match after.find('\'') {
            Some(end) => {
                args.push(after[..end].replace(' ', "_"));
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::error::ExecError;
    use crate::memory::{GivenScope, ThenScope};
    use crate::scenario::RegisterFn;

    fn step_iam(args: &[String], scope: &mut GivenScope) -> Result<(), ExecError> {
        builtins::iam(scope.ack, Some(&args[0]))
    }

    fn step_have(args: &[String], scope: &mut GivenScope) -> Result<(), ExecError> {
        builtins::pick(scope, &args[0], None)?;
        builtins::validate(scope, &args[0], None)?;
        builtins::ack(scope, &args[0])
    }

    fn step_print(args: &[String], scope: &mut ThenScope) -> Result<(), ExecError> {
        builtins::out(scope, &args[0])
    }

    fn register_test(reg: &mut Registries) {
        builtins::install(reg);
        reg.handlers.given("i am known as ''", step_iam);
        reg.handlers.given("i am ''", step_iam);
        reg.handlers.given("i have a ''", step_have);
        reg.handlers.then("print ''", step_print);
    }

    struct TestLoader;

    impl ScenarioLoader for TestLoader {
        fn resolve(&self, name: &str) -> Option<RegisterFn> {
            match name {
                "test" => Some(register_test as RegisterFn),
                _ => None,
            }
        }
    }

    struct Harness {
        registries: Registries,
        loaded: HashSet<String>,
        trace: Traceback,
        counter: u64,
    }

    impl Harness {
        fn new() -> Self {
            Harness {
                registries: Registries::default(),
                loaded: HashSet::new(),
                trace: Traceback::new(),
                counter: 0,
            }
        }

        fn parse(&mut self, source: &str) -> Result<Script, ParseError> {
            let loader = TestLoader;
            let mut parser = Parser {
                registries: &mut self.registries,
                loader: &loader,
                loaded: &mut self.loaded,
                trace: &mut self.trace,
                counter: &mut self.counter,
            };
            parser.parse(source)
        }
    }

    #[test]
    fn test_normalize_strips_prefix_chain() {
        assert_eq!(
            normalize("Given that I am known as 'Alice'"),
            "i am known as ''"
        );
        assert_eq!(normalize("Then print 'keyring'"), "print ''");
        assert_eq!(normalize("And I have a 'key'"), "i have a ''");
    }

    #[test]
    fn test_extract_args_rewrites_spaces() {
        let args = extract_args("Given I have a 'eddsa public key'");
        assert_eq!(args, vec!["eddsa_public_key"]);
    }

    #[test]
    fn test_extract_args_in_source_order() {
        let args = extract_args("When I convert 'msg' to 'string'");
        assert_eq!(args, vec!["msg", "string"]);
    }

    #[test]
    fn test_comments_and_blanks_are_noops() {
        let mut plain = Harness::new();
        let a = plain
            .parse("Scenario 'test'\nGiven I am 'Alice'\nThen print 'x'")
            .map(|s| s.len());
        let mut commented = Harness::new();
        let b = commented
            .parse("# header\n\nScenario 'test'\n\n# note\nGiven I am 'Alice'\n\nThen print 'x'\n")
            .map(|s| s.len());
        assert!(a.is_err() == b.is_err());
        // print 'x' binds in both; AST shape is unchanged by comments
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn test_ast_ids_follow_source_order() {
        let mut h = Harness::new();
        let script = h
            .parse("Scenario 'test'\nGiven I am 'Alice'\nAnd I am known as 'Alice'\nThen print 'x'")
            .unwrap();
        let ids: Vec<_> = script.steps.iter().map(|s| s.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
        assert_eq!(script.steps[0].source, "Given I am 'Alice'");
    }

    #[test]
    fn test_unknown_step() {
        let mut h = Harness::new();
        let err = h
            .parse("Scenario 'test'\nGiven I dance the tango")
            .unwrap_err();
        assert!(matches!(err, ParseError::UnknownStep(_)));
    }

    #[test]
    fn test_unknown_prefix_is_invalid_statement() {
        let mut h = Harness::new();
        let err = h.parse("Frobnicate the widget now").unwrap_err();
        assert!(matches!(err, ParseError::InvalidStatement(_)));
    }

    #[test]
    fn test_when_before_given_is_invalid_transition() {
        let mut h = Harness::new();
        let err = h.parse("When I sign 'msg'").unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidTransition {
                from: Phase::Feature,
                want: Prefix::When
            }
        ));
    }

    #[test]
    fn test_unknown_scenario_is_fatal() {
        let mut h = Harness::new();
        let err = h.parse("Scenario 'tango'\nGiven I am 'x'").unwrap_err();
        assert!(matches!(err, ParseError::ScenarioLoadFailure(name) if name == "tango"));
    }

    #[test]
    fn test_scenario_load_is_idempotent() {
        let mut h = Harness::new();
        h.parse("Scenario 'test'\nGiven I am 'Alice'").unwrap();
        let before = h.registries.handlers.pattern_count();
        h.parse("Scenario 'test'\nGiven I am 'Bob'").unwrap();
        assert_eq!(h.registries.handlers.pattern_count(), before);
    }

    #[test]
    fn test_too_short_script() {
        let mut h = Harness::new();
        assert!(matches!(h.parse("Given"), Err(ParseError::TooShort(_))));
    }

    #[test]
    fn test_scenario_without_name_is_invalid() {
        let mut h = Harness::new();
        let err = h.parse("Scenario eddsa keygen").unwrap_err();
        assert!(matches!(err, ParseError::InvalidStatement(_)));
    }

    #[test]
    fn test_case_insensitive_statement_match() {
        let mut h = Harness::new();
        let script = h
            .parse("Scenario 'test'\nGIVEN I AM 'Alice'\nthen PRINT 'x'")
            .unwrap();
        assert_eq!(script.len(), 2);
    }
}
