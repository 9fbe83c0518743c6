//! USM authentication: password-to-key, key localization, HMAC.
//!
//! Key derivation follows RFC 3414 Section 2.6: the password is expanded by
//! cyclic repetition to exactly 1 MiB and hashed (Ku), then localized as
//! `Kul = H(Ku || engineID || Ku)`. Authentication parameters are the HMAC
//! over the whole message, truncated to 12 bytes, computed with the auth
//! slot zeroed.

use digest::Digest;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{AuthErrorKind, CryptoErrorKind, Error, Result};
use crate::v3::AuthProtocol;

/// Length of the msgAuthenticationParameters field when auth is active.
pub const AUTH_PARAMS_LEN: usize = 12;

/// Total bytes hashed during password expansion (RFC 3414).
const KU_EXPANSION_LEN: usize = 1_048_576;

/// Chunk size for streaming the expanded password into the digest.
const KU_CHUNK: usize = 64;

/// A password-derived master key (Ku), not yet bound to an engine.
#[derive(Clone)]
pub struct MasterKey {
    bytes: Zeroizing<Vec<u8>>,
    protocol: AuthProtocol,
}

impl MasterKey {
    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The protocol this key was derived for.
    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    /// Localize to an engine: `Kul = H(Ku || engineID || Ku)`.
    pub fn localize(&self, engine_id: &[u8]) -> LocalizedKey {
        let digest = hash_parts(self.protocol, &[&self.bytes, engine_id, &self.bytes]);
        LocalizedKey {
            bytes: Zeroizing::new(digest),
            protocol: self.protocol,
        }
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MasterKey({}, <{} bytes>)", self.protocol, self.bytes.len())
    }
}

/// A localized key (Kul), bound to one engine. Zeroed on drop.
#[derive(Clone)]
pub struct LocalizedKey {
    bytes: Zeroizing<Vec<u8>>,
    protocol: AuthProtocol,
}

impl LocalizedKey {
    /// Build from raw bytes (test vectors, persisted keys).
    pub fn from_bytes(bytes: Vec<u8>, protocol: AuthProtocol) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
            protocol,
        }
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The protocol this key belongs to.
    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    /// Stretch this key with iterated hashing until `len` bytes are
    /// available, then truncate. Used for privacy keys longer than the
    /// auth digest.
    pub fn stretch(&self, len: usize) -> Zeroizing<Vec<u8>> {
        let mut key = Zeroizing::new(self.bytes.to_vec());
        while key.len() < len {
            let next = hash_parts(self.protocol, &[&key]);
            key.extend_from_slice(&next);
        }
        key.truncate(len);
        key
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LocalizedKey({}, <{} bytes>)",
            self.protocol,
            self.bytes.len()
        )
    }
}

/// Derive the master key Ku from a password (RFC 3414 Section 2.6).
///
/// The password is repeated cyclically to exactly 1 MiB and fed through the
/// digest in fixed chunks; the 1 MiB buffer is never materialized.
pub fn password_to_key(password: &[u8], protocol: AuthProtocol) -> MasterKey {
    let bytes = match protocol {
        AuthProtocol::Md5 => ku_digest::<Md5>(password),
        AuthProtocol::Sha1 => ku_digest::<Sha1>(password),
        // SHA-256 truncated to 28 bytes stands in for SHA-224 in this key
        // derivation scheme.
        AuthProtocol::Sha224 => truncate(ku_digest::<Sha256>(password), 28),
        AuthProtocol::Sha256 => ku_digest::<Sha256>(password),
        AuthProtocol::Sha384 => ku_digest::<Sha384>(password),
        AuthProtocol::Sha512 => ku_digest::<Sha512>(password),
    };

    MasterKey {
        bytes: Zeroizing::new(bytes),
        protocol,
    }
}

fn ku_digest<D: Digest>(password: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();

    if password.is_empty() {
        // Degenerate but defined: hash 1 MiB of nothing repeated is the
        // empty hash input.
        hasher.update([0u8; 0]);
        return hasher.finalize().to_vec();
    }

    let mut chunk = [0u8; KU_CHUNK];
    let mut index = 0usize;
    let mut remaining = KU_EXPANSION_LEN;

    while remaining > 0 {
        let take = remaining.min(KU_CHUNK);
        for slot in chunk[..take].iter_mut() {
            *slot = password[index];
            index += 1;
            if index == password.len() {
                index = 0;
            }
        }
        hasher.update(&chunk[..take]);
        remaining -= take;
    }

    hasher.finalize().to_vec()
}

fn truncate(mut bytes: Vec<u8>, len: usize) -> Vec<u8> {
    bytes.truncate(len);
    bytes
}

/// Hash a concatenation of byte slices with the protocol's digest,
/// applying the SHA-224 truncation rule.
fn hash_parts(protocol: AuthProtocol, parts: &[&[u8]]) -> Vec<u8> {
    fn digest_parts<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
        let mut hasher = D::new();
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize().to_vec()
    }

    match protocol {
        AuthProtocol::Md5 => digest_parts::<Md5>(parts),
        AuthProtocol::Sha1 => digest_parts::<Sha1>(parts),
        AuthProtocol::Sha224 => truncate(digest_parts::<Sha256>(parts), 28),
        AuthProtocol::Sha256 => digest_parts::<Sha256>(parts),
        AuthProtocol::Sha384 => digest_parts::<Sha384>(parts),
        AuthProtocol::Sha512 => digest_parts::<Sha512>(parts),
    }
}

/// Compute the 12-byte truncated HMAC of `message` with `key`.
pub fn compute_mac(key: &LocalizedKey, message: &[u8]) -> Result<[u8; AUTH_PARAMS_LEN]> {
    macro_rules! mac12 {
        ($digest:ty) => {{
            let mut mac = Hmac::<$digest>::new_from_slice(key.as_bytes())
                .map_err(|_| Error::crypto(CryptoErrorKind::InvalidKeyLength))?;
            mac.update(message);
            let full = mac.finalize().into_bytes();
            let mut out = [0u8; AUTH_PARAMS_LEN];
            out.copy_from_slice(&full[..AUTH_PARAMS_LEN]);
            out
        }};
    }

    Ok(match key.protocol() {
        AuthProtocol::Md5 => mac12!(Md5),
        AuthProtocol::Sha1 => mac12!(Sha1),
        AuthProtocol::Sha224 => mac12!(Sha224),
        AuthProtocol::Sha256 => mac12!(Sha256),
        AuthProtocol::Sha384 => mac12!(Sha384),
        AuthProtocol::Sha512 => mac12!(Sha512),
    })
}

/// Sign an encoded message in place.
///
/// The 12 bytes at `offset` must already be zero (the encoder fills the
/// slot); the HMAC is computed over the whole message and patched in.
pub fn sign_message(key: &LocalizedKey, message: &mut [u8], offset: usize) -> Result<()> {
    if offset + AUTH_PARAMS_LEN > message.len() {
        return Err(Error::auth(None, AuthErrorKind::AuthParamsNotLocated));
    }

    message[offset..offset + AUTH_PARAMS_LEN].fill(0);
    let mac = compute_mac(key, message)?;
    message[offset..offset + AUTH_PARAMS_LEN].copy_from_slice(&mac);
    Ok(())
}

/// Verify the HMAC of a received message.
///
/// The received MAC is extracted from `offset`, the slot is zeroed in a
/// scratch copy, and the recomputed MAC is compared in constant time.
pub fn verify_message(key: &LocalizedKey, message: &[u8], offset: usize) -> Result<()> {
    if offset + AUTH_PARAMS_LEN > message.len() {
        return Err(Error::auth(None, AuthErrorKind::AuthParamsNotLocated));
    }

    let received = &message[offset..offset + AUTH_PARAMS_LEN];

    let mut scratch = message.to_vec();
    scratch[offset..offset + AUTH_PARAMS_LEN].fill(0);
    let computed = compute_mac(key, &scratch)?;

    if received.ct_eq(&computed).into() {
        Ok(())
    } else {
        Err(Error::auth(None, AuthErrorKind::HmacMismatch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::decode_hex;

    /// RFC 3414 Appendix A test engine ID: 11 zero bytes then 0x02.
    fn test_engine_id() -> Vec<u8> {
        let mut id = vec![0u8; 12];
        id[11] = 0x02;
        id
    }

    #[test]
    fn test_md5_password_to_key_vector() {
        // RFC 3414 A.3.1
        let ku = password_to_key(b"maplesyrup", AuthProtocol::Md5);
        assert_eq!(
            ku.as_bytes(),
            &decode_hex("9faf3283884e92834ebc9847d8edd963").unwrap()[..]
        );
    }

    #[test]
    fn test_md5_localized_key_vector() {
        // RFC 3414 A.3.1
        let ku = password_to_key(b"maplesyrup", AuthProtocol::Md5);
        let kul = ku.localize(&test_engine_id());
        assert_eq!(
            kul.as_bytes(),
            &decode_hex("526f5eed9fcce26f8964c2930787d82b").unwrap()[..]
        );
    }

    #[test]
    fn test_sha1_password_to_key_vector() {
        // RFC 3414 A.3.2
        let ku = password_to_key(b"maplesyrup", AuthProtocol::Sha1);
        assert_eq!(
            ku.as_bytes(),
            &decode_hex("9fb5cc0381497b3793528939ff788d5d79145211").unwrap()[..]
        );
    }

    #[test]
    fn test_sha1_localized_key_vector() {
        // RFC 3414 A.3.2: 20 bytes, leading 66 95 fe bc
        let ku = password_to_key(b"maplesyrup", AuthProtocol::Sha1);
        let kul = ku.localize(&test_engine_id());
        assert_eq!(kul.as_bytes().len(), 20);
        assert_eq!(
            kul.as_bytes(),
            &decode_hex("6695febc9288e36282235fc7151f128497b38f3f").unwrap()[..]
        );
    }

    #[test]
    fn test_localization_deterministic() {
        let engine = test_engine_id();
        for protocol in [
            AuthProtocol::Md5,
            AuthProtocol::Sha1,
            AuthProtocol::Sha224,
            AuthProtocol::Sha256,
            AuthProtocol::Sha384,
            AuthProtocol::Sha512,
        ] {
            let a = password_to_key(b"maplesyrup", protocol).localize(&engine);
            let b = password_to_key(b"maplesyrup", protocol).localize(&engine);
            assert_eq!(a.as_bytes(), b.as_bytes());
            assert_eq!(a.as_bytes().len(), protocol.digest_len());
        }
    }

    #[test]
    fn test_localization_varies_by_engine() {
        let ku = password_to_key(b"maplesyrup", AuthProtocol::Sha1);
        let a = ku.localize(&test_engine_id());
        let b = ku.localize(&[0x80, 0, 0, 0, 0x05, 9, 9, 9, 9, 9, 9, 9, 9]);
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_sha224_is_truncated_sha256() {
        let engine = test_engine_id();
        let sha256 = password_to_key(b"maplesyrup", AuthProtocol::Sha256);
        let sha224 = password_to_key(b"maplesyrup", AuthProtocol::Sha224);
        assert_eq!(sha224.as_bytes(), &sha256.as_bytes()[..28]);
        // Localization re-hashes, so the localized keys differ beyond
        // truncation; only the length contract holds.
        assert_eq!(sha224.localize(&engine).as_bytes().len(), 28);
    }

    #[test]
    fn test_stretch_extends_short_keys() {
        let kul = password_to_key(b"maplesyrup", AuthProtocol::Md5).localize(&test_engine_id());
        let stretched = kul.stretch(32);
        assert_eq!(stretched.len(), 32);
        // The first 16 bytes are the original key
        assert_eq!(&stretched[..16], kul.as_bytes());
    }

    #[test]
    fn test_sign_and_verify() {
        let key = password_to_key(b"maplesyrup", AuthProtocol::Sha1).localize(&test_engine_id());
        let mut message = vec![0x30, 0x10];
        message.extend_from_slice(&[0xAB; 4]);
        let offset = message.len();
        message.extend_from_slice(&[0u8; 12]);
        message.extend_from_slice(&[0xCD; 4]);

        sign_message(&key, &mut message, offset).unwrap();
        assert_ne!(&message[offset..offset + 12], &[0u8; 12]);
        verify_message(&key, &message, offset).unwrap();
    }

    #[test]
    fn test_single_bit_mutation_fails_verification() {
        let key = password_to_key(b"maplesyrup", AuthProtocol::Sha256).localize(&test_engine_id());
        let mut message = vec![0u8; 64];
        let offset = 20;
        sign_message(&key, &mut message, offset).unwrap();

        for bit_pos in [0usize, 7, 100, 350, 511] {
            let byte = bit_pos / 8;
            if (offset..offset + 12).contains(&byte) {
                continue;
            }
            let mut mutated = message.clone();
            mutated[byte] ^= 1 << (bit_pos % 8);
            let err = verify_message(&key, &mutated, offset).unwrap_err();
            assert!(matches!(
                err,
                Error::AuthenticationFailed {
                    kind: AuthErrorKind::HmacMismatch,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let key = password_to_key(b"maplesyrup", AuthProtocol::Sha1).localize(&test_engine_id());
        let other = password_to_key(b"pancakes", AuthProtocol::Sha1).localize(&test_engine_id());

        let mut message = vec![0u8; 40];
        sign_message(&key, &mut message, 10).unwrap();
        assert!(verify_message(&other, &message, 10).is_err());
    }

    #[test]
    fn test_offset_bounds_checked() {
        let key = password_to_key(b"maplesyrup", AuthProtocol::Md5).localize(&test_engine_id());
        let mut message = vec![0u8; 16];
        let err = sign_message(&key, &mut message, 8).unwrap_err();
        assert!(matches!(
            err,
            Error::AuthenticationFailed {
                kind: AuthErrorKind::AuthParamsNotLocated,
                ..
            }
        ));
    }
}
