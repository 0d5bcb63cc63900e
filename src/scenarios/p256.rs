//! NIST P-256 scenario.
//!
//! Keys and signatures travel as raw octets: a 32-byte secret key, a
//! 64-byte public key (both coordinates, no SEC1 tag) and a 64-byte
//! signature over the SHA-256 of the message. Public keys arriving in
//! host documents may also use the 65-byte uncompressed or 33-byte
//! compressed SEC1 encodings and are normalized to the raw form.

use indexmap::IndexMap;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::generic_array::GenericArray;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{EncodedPoint, PublicKey};
use rand::rngs::OsRng;

use crate::builtins;
use crate::error::ExecError;
use crate::memory::{Heap, WhenScope};
use crate::registry::Registries;
use crate::scenarios::common;
use crate::value::{Octet, Value};

const SK_BYTES: usize = 32;
const PK_BYTES: usize = 64;
const SIG_BYTES: usize = 64;

pub fn register(reg: &mut Registries) {
    common::register(reg);

    reg.schemas.register("keyring", schema_keyring);
    reg.schemas.register("p256_public_key", schema_public_key);
    reg.schemas.register("p256_signature", schema_signature);
    reg.schemas.register("message", |v| Ok(v.clone()));

    reg.handlers.when("i create the p256 key", w_key);
    reg.handlers.when("i create the p256 public key", w_public_key);
    reg.handlers.when("i create the p256 signature of ''", w_sign);
    reg.handlers.when("i verify the p256 signature of ''", w_verify);
}

fn decode_octet(value: &Value) -> Result<Octet, String> {
    match value {
        Value::Octet(o) => Ok(o.clone()),
        Value::String(s) => Octet::from_base58(s).map_err(|e| e.to_string()),
        other => Err(format!("expected an octet, found a {}", other.kind())),
    }
}

fn schema_keyring(value: &Value) -> Result<Value, String> {
    let map = value
        .as_map()
        .ok_or_else(|| format!("keyring is a {}, expected a mapping", value.kind()))?;
    let secret = map.get("p256").ok_or("keyring has no 'p256' entry")?;
    let octet = decode_octet(secret)?;
    if octet.len() != SK_BYTES {
        return Err(format!(
            "p256 secret key must be {SK_BYTES} bytes, found {}",
            octet.len()
        ));
    }
    let mut canonical = IndexMap::new();
    canonical.insert("p256".to_string(), Value::Octet(octet));
    Ok(Value::Map(canonical))
}

fn schema_public_key(value: &Value) -> Result<Value, String> {
    let octet = decode_octet(value)?;
    let raw = normalize_public_key(octet.as_bytes())?;
    Ok(Value::Octet(Octet::from_bytes(raw)))
}

fn schema_signature(value: &Value) -> Result<Value, String> {
    let octet = decode_octet(value)?;
    if octet.len() != SIG_BYTES {
        return Err(format!(
            "p256 signature must be {SIG_BYTES} bytes, found {}",
            octet.len()
        ));
    }
    Ok(Value::Octet(octet))
}

/// Accept the three public key encodings and return the raw 64-byte
/// coordinate form.
fn normalize_public_key(bytes: &[u8]) -> Result<Vec<u8>, String> {
    match bytes.len() {
        PK_BYTES => Ok(bytes.to_vec()),
        65 => {
            if bytes[0] != 0x04 {
                return Err("invalid long public key prefix: 0x04 expected".into());
            }
            Ok(bytes[1..].to_vec())
        }
        33 => {
            if bytes[0] != 0x02 && bytes[0] != 0x03 {
                return Err("invalid compressed public key prefix: 0x02 or 0x03 expected".into());
            }
            let key = PublicKey::from_sec1_bytes(bytes)
                .map_err(|_| "could not uncompress public key".to_string())?;
            let point = key.to_encoded_point(false);
            Ok(point.as_bytes()[1..].to_vec())
        }
        n => Err(format!("invalid public key length: {n}")),
    }
}

fn my_signing_key(ack: &Heap) -> Result<SigningKey, ExecError> {
    let who = ack.require_whoami()?;
    let keyring = ack
        .entries
        .get(who)
        .and_then(Value::as_map)
        .and_then(|mine| mine.get("keyring"))
        .and_then(Value::as_map)
        .ok_or_else(|| ExecError::NotFound(format!("{who}.keyring")))?;
    let secret = keyring
        .get("p256")
        .ok_or_else(|| ExecError::NotFound("keyring.p256".to_string()))?
        .to_octet()?;
    SigningKey::from_slice(secret.as_bytes())
        .map_err(|e| ExecError::Crypto(format!("invalid p256 secret key: {e}")))
}

fn ack_octet(ack: &Heap, name: &str) -> Result<Octet, ExecError> {
    ack.entries
        .get(name)
        .ok_or_else(|| ExecError::NotFound(name.to_string()))?
        .to_octet()
}

fn w_key(_args: &[String], scope: &mut WhenScope) -> Result<(), ExecError> {
    let who = scope.ack.require_whoami()?.to_string();
    let key = SigningKey::random(&mut OsRng);
    let mut keyring = IndexMap::new();
    keyring.insert(
        "p256".to_string(),
        Value::Octet(Octet::from_bytes(key.to_bytes().to_vec())),
    );
    builtins::heap_insert_my(scope.ack, &who, "keyring", Value::Map(keyring))
}

fn w_public_key(_args: &[String], scope: &mut WhenScope) -> Result<(), ExecError> {
    let key = my_signing_key(scope.ack)?;
    let point = VerifyingKey::from(&key).to_encoded_point(false);
    scope.ack.entries.insert(
        "p256_public_key".to_string(),
        Value::Octet(Octet::from_bytes(point.as_bytes()[1..].to_vec())),
    );
    Ok(())
}

fn w_sign(args: &[String], scope: &mut WhenScope) -> Result<(), ExecError> {
    let key = my_signing_key(scope.ack)?;
    let message = ack_octet(scope.ack, &args[0])?;
    let signature: Signature = key.sign(message.as_bytes());
    scope.ack.entries.insert(
        "p256_signature".to_string(),
        Value::Octet(Octet::from_bytes(signature.to_bytes().to_vec())),
    );
    Ok(())
}

fn w_verify(args: &[String], scope: &mut WhenScope) -> Result<(), ExecError> {
    let message = ack_octet(scope.ack, &args[0])?;
    let public = ack_octet(scope.ack, "p256_public_key")?;
    let signature = ack_octet(scope.ack, "p256_signature")?;

    let raw = normalize_public_key(public.as_bytes()).map_err(ExecError::Crypto)?;
    let point = EncodedPoint::from_untagged_bytes(GenericArray::from_slice(&raw));
    let key = VerifyingKey::from_encoded_point(&point)
        .map_err(|e| ExecError::Crypto(format!("invalid p256 public key: {e}")))?;
    let signature = Signature::from_slice(signature.as_bytes())
        .map_err(|e| ExecError::Crypto(format!("invalid p256 signature: {e}")))?;

    key.verify(message.as_bytes(), &signature)
        .map_err(|_| ExecError::Crypto("p256 signature verification failed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_key() -> SigningKey {
        SigningKey::from_slice(&[5u8; 32]).unwrap()
    }

    fn heap_with_key() -> Heap {
        let mut heap = Heap {
            whoami: Some("Alice".into()),
            entries: IndexMap::new(),
        };
        let mut keyring = IndexMap::new();
        keyring.insert(
            "p256".to_string(),
            Value::Octet(Octet::from_bytes(fixed_key().to_bytes().to_vec())),
        );
        builtins::heap_insert_my(&mut heap, "Alice", "keyring", Value::Map(keyring)).unwrap();
        heap
    }

    #[test]
    fn test_normalize_accepts_raw_key() {
        let raw = vec![1u8; 64];
        assert_eq!(normalize_public_key(&raw).unwrap(), raw);
    }

    #[test]
    fn test_normalize_strips_uncompressed_tag() {
        let key = fixed_key();
        let long = VerifyingKey::from(&key).to_encoded_point(false);
        let raw = normalize_public_key(long.as_bytes()).unwrap();
        assert_eq!(raw.len(), PK_BYTES);
        assert_eq!(&long.as_bytes()[1..], raw.as_slice());
    }

    #[test]
    fn test_normalize_uncompresses_short_key() {
        let key = fixed_key();
        let compressed = VerifyingKey::from(&key).to_encoded_point(true);
        let long = VerifyingKey::from(&key).to_encoded_point(false);
        let raw = normalize_public_key(compressed.as_bytes()).unwrap();
        assert_eq!(raw.as_slice(), &long.as_bytes()[1..]);
    }

    #[test]
    fn test_normalize_rejects_bad_prefixes() {
        let mut long = vec![0x05u8];
        long.extend_from_slice(&[0u8; 64]);
        assert!(normalize_public_key(&long)
            .unwrap_err()
            .contains("0x04 expected"));

        let mut short = vec![0x07u8];
        short.extend_from_slice(&[0u8; 32]);
        assert!(normalize_public_key(&short)
            .unwrap_err()
            .contains("0x02 or 0x03"));

        assert!(normalize_public_key(&[0u8; 10])
            .unwrap_err()
            .contains("length"));
    }

    #[test]
    fn test_sign_then_verify_round_trip() {
        let mut heap = heap_with_key();
        heap.entries
            .insert("message".to_string(), Value::String("payload".into()));
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
    fn test_verify_rejects_wrong_signature() {
        let mut heap = heap_with_key();
        heap.entries
            .insert("message".to_string(), Value::String("payload".into()));
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
        scope.ack.entries.insert(
            "p256_signature".to_string(),
            Value::Octet(Octet::from_bytes(vec![1u8; 64])),
        );
        assert!(matches!(
            w_verify(&["message".to_string()], &mut scope),
            Err(ExecError::Crypto(_))
        ));
    }
}
