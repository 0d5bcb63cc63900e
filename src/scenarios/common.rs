//! Statements shared by every scenario.
//!
//! Identity declaration, the `I have` family moving host input into the
//! acknowledged region, drafting, conversion and the `print` family.
//! Scenarios call `register` first and then add their own patterns on
//! top; re-registration is a silent replace, so the order is harmless.

use sha2::{Digest, Sha256};

use crate::builtins;
use crate::error::ExecError;
use crate::memory::{GivenScope, ThenScope, WhenScope};
use crate::registry::Registries;
use crate::value::{Octet, Value};

pub fn register(reg: &mut Registries) {
    builtins::install(reg);

    reg.handlers.given("i am known as ''", g_iam);
    reg.handlers.given("i am ''", g_iam);
    reg.handlers.given("i have a ''", g_have);
    reg.handlers.given("i have ''", g_have);
    reg.handlers.given("i have a valid ''", g_have);
    reg.handlers.given("i have my ''", g_have_my);
    reg.handlers.given("i have a '' inside ''", g_have_inside);

    reg.handlers.when("i draft the text ''", w_draft);
    reg.handlers.when("i draft ''", w_draft);
    reg.handlers.when("i convert '' to ''", w_convert);
    reg.handlers.when("i create the hash of ''", w_hash);

    reg.handlers.then("print ''", t_print);
    reg.handlers.then("print my ''", t_print_my);
    reg.handlers.then("print all data", t_print_all);
    reg.handlers.then("print my draft", t_print_draft);
}

fn g_iam(args: &[String], scope: &mut GivenScope) -> Result<(), ExecError> {
    builtins::iam(scope.ack, Some(&args[0]))
}

fn g_have(args: &[String], scope: &mut GivenScope) -> Result<(), ExecError> {
    builtins::pick(scope, &args[0], None)?;
    builtins::validate(scope, &args[0], None)?;
    builtins::ack(scope, &args[0])
}

fn g_have_my(args: &[String], scope: &mut GivenScope) -> Result<(), ExecError> {
    let who = scope.ack.require_whoami()?.to_string();
    builtins::pickin(scope, &who, &args[0])?;
    builtins::validate(scope, &args[0], None)?;
    builtins::ackmy(scope, &args[0], None)
}

fn g_have_inside(args: &[String], scope: &mut GivenScope) -> Result<(), ExecError> {
    // statement order is "a 'what' inside 'section'"
    builtins::pickin(scope, &args[1], &args[0])?;
    builtins::validate(scope, &args[0], None)?;
    builtins::ack(scope, &args[0])
}

fn w_draft(args: &[String], scope: &mut WhenScope) -> Result<(), ExecError> {
    builtins::draft(scope.ack, &args[0])
}

fn w_convert(args: &[String], scope: &mut WhenScope) -> Result<(), ExecError> {
    builtins::convert(scope, &args[0], &args[1])
}

fn w_hash(args: &[String], scope: &mut WhenScope) -> Result<(), ExecError> {
    let value = scope
        .ack
        .entries
        .get(&args[0])
        .ok_or_else(|| ExecError::NotFound(args[0].clone()))?
        .to_octet()?;
    let digest = Sha256::digest(value.as_bytes());
    scope.ack.entries.insert(
        "hash".to_string(),
        Value::Octet(Octet::from_bytes(digest.to_vec())),
    );
    Ok(())
}

fn t_print(args: &[String], scope: &mut ThenScope) -> Result<(), ExecError> {
    builtins::out(scope, &args[0])
}

fn t_print_my(args: &[String], scope: &mut ThenScope) -> Result<(), ExecError> {
    builtins::outmy(scope, &args[0])
}

fn t_print_all(_args: &[String], scope: &mut ThenScope) -> Result<(), ExecError> {
    builtins::out_all(scope)
}

fn t_print_draft(_args: &[String], scope: &mut ThenScope) -> Result<(), ExecError> {
    builtins::out(scope, "draft")
}
