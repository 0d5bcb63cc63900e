//! Ed25519 scenario.
//!
//! Key generation stores a keyring under the declared identity; signing
//! and verification operate on acknowledged octets. The signing key is
//! the 32-byte Ed25519 seed, rendered base58 at the output boundary
//! like every other octet.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use indexmap::IndexMap;
use rand::rngs::OsRng;

use crate::builtins;
use crate::error::ExecError;
use crate::memory::{Heap, WhenScope};
use crate::registry::Registries;
use crate::scenarios::common;
use crate::value::{Octet, Value};

const KEY_BYTES: usize = 32;
const SIG_BYTES: usize = 64;

pub fn register(reg: &mut Registries) {
    common::register(reg);

    reg.schemas.register("keyring", schema_keyring);
    reg.schemas.register("eddsa_public_key", schema_public_key);
    reg.schemas.register("eddsa_signature", schema_signature);
    reg.schemas.register("message", |v| Ok(v.clone()));

    reg.handlers.when("i create the keypair", w_keypair);
    reg.handlers.when("i create the eddsa public key", w_public_key);
    reg.handlers.when("i create the eddsa signature of ''", w_sign);
    reg.handlers.when("i verify the eddsa signature of ''", w_verify);
}

/// Canonicalize an octet that may arrive as a base58 string from the
/// host documents, enforcing an exact length.
fn octet_of_len(value: &Value, len: usize) -> Result<Octet, String> {
    let octet = match value {
        Value::Octet(o) => o.clone(),
        Value::String(s) => Octet::from_base58(s).map_err(|e| e.to_string())?,
        other => return Err(format!("expected an octet, found a {}", other.kind())),
    };
    if octet.len() != len {
        return Err(format!("expected {len} bytes, found {}", octet.len()));
    }
    Ok(octet)
}

fn schema_keyring(value: &Value) -> Result<Value, String> {
    let map = value
        .as_map()
        .ok_or_else(|| format!("keyring is a {}, expected a mapping", value.kind()))?;
    let seed = map.get("eddsa").ok_or("keyring has no 'eddsa' entry")?;
    let mut canonical = IndexMap::new();
    canonical.insert(
        "eddsa".to_string(),
        Value::Octet(octet_of_len(seed, KEY_BYTES)?),
    );
    Ok(Value::Map(canonical))
}

fn schema_public_key(value: &Value) -> Result<Value, String> {
    Ok(Value::Octet(octet_of_len(value, KEY_BYTES)?))
}

fn schema_signature(value: &Value) -> Result<Value, String> {
    Ok(Value::Octet(octet_of_len(value, SIG_BYTES)?))
}

/// Fetch the signing key from `ACK[whoami].keyring.eddsa`.
fn my_signing_key(ack: &Heap) -> Result<SigningKey, ExecError> {
    let who = ack.require_whoami()?;
    let keyring = ack
        .entries
        .get(who)
        .and_then(Value::as_map)
        .and_then(|mine| mine.get("keyring"))
        .and_then(Value::as_map)
        .ok_or_else(|| ExecError::NotFound(format!("{who}.keyring")))?;
    let seed = keyring
        .get("eddsa")
        .ok_or_else(|| ExecError::NotFound("keyring.eddsa".to_string()))?
        .to_octet()?;
    let bytes: [u8; KEY_BYTES] = seed
        .as_bytes()
        .try_into()
        .map_err(|_| ExecError::Crypto(format!("eddsa key must be {KEY_BYTES} bytes")))?;
    Ok(SigningKey::from_bytes(&bytes))
}

fn ack_octet(ack: &Heap, name: &str) -> Result<Octet, ExecError> {
    ack.entries
        .get(name)
        .ok_or_else(|| ExecError::NotFound(name.to_string()))?
        .to_octet()
}

fn w_keypair(_args: &[String], scope: &mut WhenScope) -> Result<(), ExecError> {
    let who = scope.ack.require_whoami()?.to_string();
    let key = SigningKey::generate(&mut OsRng);
    let mut keyring = IndexMap::new();
    keyring.insert(
        "eddsa".to_string(),
        Value::Octet(Octet::from_bytes(key.to_bytes().to_vec())),
    );
    builtins::heap_insert_my(scope.ack, &who, "keyring", Value::Map(keyring))
}

fn w_public_key(_args: &[String], scope: &mut WhenScope) -> Result<(), ExecError> {
    let key = my_signing_key(scope.ack)?;
    let public = key.verifying_key();
    scope.ack.entries.insert(
        "eddsa_public_key".to_string(),
        Value::Octet(Octet::from_bytes(public.to_bytes().to_vec())),
    );
    Ok(())
}

fn w_sign(args: &[String], scope: &mut WhenScope) -> Result<(), ExecError> {
    let key = my_signing_key(scope.ack)?;
    let message = ack_octet(scope.ack, &args[0])?;
    let signature = key.sign(message.as_bytes());
    scope.ack.entries.insert(
        "eddsa_signature".to_string(),
        Value::Octet(Octet::from_bytes(signature.to_bytes().to_vec())),
    );
    Ok(())
}

fn w_verify(args: &[String], scope: &mut WhenScope) -> Result<(), ExecError> {
    let message = ack_octet(scope.ack, &args[0])?;
    let public = ack_octet(scope.ack, "eddsa_public_key")?;
    let signature = ack_octet(scope.ack, "eddsa_signature")?;

    let public_bytes: [u8; KEY_BYTES] = public
        .as_bytes()
        .try_into()
        .map_err(|_| ExecError::Crypto(format!("eddsa public key must be {KEY_BYTES} bytes")))?;
    let key = VerifyingKey::from_bytes(&public_bytes)
        .map_err(|e| ExecError::Crypto(format!("invalid eddsa public key: {e}")))?;
    let signature = Signature::try_from(signature.as_bytes())
        .map_err(|e| ExecError::Crypto(format!("invalid eddsa signature: {e}")))?;

    key.verify(message.as_bytes(), &signature)
        .map_err(|_| ExecError::Crypto("eddsa signature verification failed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap_with_keypair() -> Heap {
        let mut heap = Heap {
            whoami: Some("Alice".into()),
            entries: IndexMap::new(),
        };
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let mut keyring = IndexMap::new();
        keyring.insert(
            "eddsa".to_string(),
            Value::Octet(Octet::from_bytes(key.to_bytes().to_vec())),
        );
        builtins::heap_insert_my(&mut heap, "Alice", "keyring", Value::Map(keyring)).unwrap();
        heap
    }

    #[test]
    fn test_keyring_schema_decodes_base58() {
        let seed = Octet::from_bytes(vec![9u8; 32]);
        let mut map = IndexMap::new();
        map.insert("eddsa".to_string(), Value::String(seed.to_base58()));
        let canonical = schema_keyring(&Value::Map(map)).unwrap();
        let inner = canonical.as_map().unwrap();
        assert_eq!(inner.get("eddsa"), Some(&Value::Octet(seed)));
    }

    #[test]
    fn test_keyring_schema_rejects_wrong_length() {
        let mut map = IndexMap::new();
        map.insert(
            "eddsa".to_string(),
            Value::Octet(Octet::from_bytes(vec![1u8; 16])),
        );
        assert!(schema_keyring(&Value::Map(map)).is_err());
    }

    #[test]
    fn test_sign_then_verify_round_trip() {
        let mut heap = heap_with_keypair();
        heap.entries
            .insert("message".to_string(), Value::String("hi there".into()));

        let regs = {
            let mut r = Registries::default();
            register(&mut r);
            r
        };
        let mut scope = WhenScope {
            ack: &mut heap,
            converters: &regs.converters,
        };
        w_sign(&["message".to_string()], &mut scope).unwrap();
        w_public_key(&[], &mut scope).unwrap();
        w_verify(&["message".to_string()], &mut scope).unwrap();
    }

    #[test]
    fn test_verify_rejects_tampered_message() {
        let mut heap = heap_with_keypair();
        heap.entries
            .insert("message".to_string(), Value::String("hi there".into()));

        let regs = {
            let mut r = Registries::default();
            register(&mut r);
            r
        };
        let mut scope = WhenScope {
            ack: &mut heap,
            converters: &regs.converters,
        };
        w_sign(&["message".to_string()], &mut scope).unwrap();
        w_public_key(&[], &mut scope).unwrap();
        scope
            .ack
            .entries
            .insert("message".to_string(), Value::String("tampered".into()));
        assert!(matches!(
            w_verify(&["message".to_string()], &mut scope),
            Err(ExecError::Crypto(_))
        ));
    }

    #[test]
    fn test_keypair_requires_identity() {
        let mut heap = Heap::default();
        let regs = {
            let mut r = Registries::default();
            register(&mut r);
            r
        };
        let mut scope = WhenScope {
            ack: &mut heap,
            converters: &regs.converters,
        };
        assert!(matches!(
            w_keypair(&[], &mut scope),
            Err(ExecError::Identity(_))
        ));
    }
}
