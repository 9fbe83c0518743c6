//! USM privacy: DES-CFB and AES-CFB encryption of the scoped PDU.
//!
//! - DES (RFC 3414 key layout): the 16-byte privacy key splits into an
//!   8-byte DES key and an 8-byte pre-IV. The IV is `preIV XOR salt`, the
//!   plaintext is zero-padded to the 8-byte block boundary, and nothing is
//!   stripped on decrypt (BER parsing stops at the end of the SEQUENCE).
//! - AES (RFC 3826): the IV is `engineBoots(4) || engineTime(4) || salt(8)`,
//!   big-endian, with no padding.
//!
//! The msgPrivacyParameters field transports only the 8-byte salt.

use std::sync::atomic::{AtomicU64, Ordering};

use aes::{Aes128, Aes192, Aes256};
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use des::Des;
use zeroize::Zeroizing;

use crate::error::{CryptoErrorKind, Error, Result};
use crate::v3::PrivProtocol;
use crate::v3::auth::LocalizedKey;

/// Length of the msgPrivacyParameters field when privacy is active.
pub const PRIV_PARAMS_LEN: usize = 8;

/// DES block size; also the padding granularity.
const DES_BLOCK: usize = 8;

/// A derived privacy key. Zeroed on drop.
#[derive(Clone)]
pub struct PrivKey {
    bytes: Zeroizing<Vec<u8>>,
    protocol: PrivProtocol,
}

impl PrivKey {
    /// Derive the privacy key from a localized auth key.
    ///
    /// Takes the first `key_len` bytes of the localized key; when the auth
    /// digest is shorter than the cipher needs, the key is first stretched
    /// by iterated hashing with the auth algorithm.
    pub fn derive(localized: &LocalizedKey, protocol: PrivProtocol) -> Self {
        let needed = protocol.key_len();
        let bytes = if localized.as_bytes().len() >= needed {
            Zeroizing::new(localized.as_bytes()[..needed].to_vec())
        } else {
            localized.stretch(needed)
        };
        Self { bytes, protocol }
    }

    /// Build from raw bytes (test vectors, persisted keys).
    pub fn from_bytes(bytes: Vec<u8>, protocol: PrivProtocol) -> Result<Self> {
        if bytes.len() != protocol.key_len() {
            return Err(Error::crypto(CryptoErrorKind::InvalidKeyLength));
        }
        Ok(Self {
            bytes: Zeroizing::new(bytes),
            protocol,
        })
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The privacy protocol this key belongs to.
    pub fn protocol(&self) -> PrivProtocol {
        self.protocol
    }
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivKey({}, <{} bytes>)", self.protocol, self.bytes.len())
    }
}

/// Monotonic salt source, randomly seeded once per process.
///
/// Salts must never repeat for the same key; a random starting point plus a
/// counter satisfies both DES (RFC 3414 Section 8.1.1.1) and AES
/// (RFC 3826 Section 3.1.2.1).
pub struct SaltCounter {
    counter: AtomicU64,
}

impl SaltCounter {
    /// Create a salt counter seeded from the system RNG.
    pub fn new() -> Result<Self> {
        let mut seed = [0u8; 8];
        getrandom::fill(&mut seed).map_err(|_| Error::crypto(CryptoErrorKind::SaltGeneration))?;
        Ok(Self {
            counter: AtomicU64::new(u64::from_be_bytes(seed)),
        })
    }

    /// Produce the next 8-byte salt.
    pub fn next_salt(&self) -> [u8; PRIV_PARAMS_LEN] {
        self.counter
            .fetch_add(1, Ordering::Relaxed)
            .to_be_bytes()
    }
}

/// Encrypt a scoped PDU.
///
/// Returns the ciphertext; the caller places `salt` into
/// msgPrivacyParameters unchanged.
pub fn encrypt_scoped_pdu(
    key: &PrivKey,
    engine_boots: i32,
    engine_time: i32,
    salt: [u8; PRIV_PARAMS_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    match key.protocol() {
        PrivProtocol::Des => {
            let (des_key, pre_iv) = key.as_bytes().split_at(DES_BLOCK);
            let iv = xor_iv(pre_iv, &salt);

            let mut data = plaintext.to_vec();
            let rem = data.len() % DES_BLOCK;
            if rem != 0 {
                data.resize(data.len() + DES_BLOCK - rem, 0);
            }

            cfb_mode::Encryptor::<Des>::new_from_slices(des_key, &iv)
                .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?
                .encrypt(&mut data);
            Ok(data)
        }
        PrivProtocol::Aes128 | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
            let iv = aes_iv(engine_boots, engine_time, &salt);
            let mut data = plaintext.to_vec();
            aes_apply(key, &iv, &mut data, Direction::Encrypt)?;
            Ok(data)
        }
    }
}

/// Decrypt a scoped PDU.
///
/// `priv_params` is the received msgPrivacyParameters field (the salt).
/// DES padding is not stripped; the caller's BER parse terminates at the
/// end of the scoped-PDU SEQUENCE.
pub fn decrypt_scoped_pdu(
    key: &PrivKey,
    engine_boots: i32,
    engine_time: i32,
    priv_params: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    if priv_params.len() != PRIV_PARAMS_LEN {
        return Err(Error::decrypt(
            None,
            CryptoErrorKind::InvalidPrivParamsLength {
                expected: PRIV_PARAMS_LEN,
                actual: priv_params.len(),
            },
        ));
    }

    match key.protocol() {
        PrivProtocol::Des => {
            if !ciphertext.len().is_multiple_of(DES_BLOCK) {
                return Err(Error::decrypt(
                    None,
                    CryptoErrorKind::InvalidCiphertextLength {
                        length: ciphertext.len(),
                        block_size: DES_BLOCK,
                    },
                ));
            }

            let (des_key, pre_iv) = key.as_bytes().split_at(DES_BLOCK);
            let iv = xor_iv(pre_iv, priv_params);

            let mut data = ciphertext.to_vec();
            cfb_mode::Decryptor::<Des>::new_from_slices(des_key, &iv)
                .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?
                .decrypt(&mut data);
            Ok(data)
        }
        PrivProtocol::Aes128 | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
            let iv = aes_iv(engine_boots, engine_time, priv_params);
            let mut data = ciphertext.to_vec();
            aes_apply(key, &iv, &mut data, Direction::Decrypt)?;
            Ok(data)
        }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Encrypt,
    Decrypt,
}

fn aes_apply(key: &PrivKey, iv: &[u8; 16], data: &mut [u8], direction: Direction) -> Result<()> {
    macro_rules! apply {
        ($cipher:ty) => {
            match direction {
                Direction::Encrypt => cfb_mode::Encryptor::<$cipher>::new_from_slices(
                    key.as_bytes(),
                    iv,
                )
                .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?
                .encrypt(data),
                Direction::Decrypt => cfb_mode::Decryptor::<$cipher>::new_from_slices(
                    key.as_bytes(),
                    iv,
                )
                .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?
                .decrypt(data),
            }
        };
    }

    match key.protocol() {
        PrivProtocol::Aes128 => apply!(Aes128),
        PrivProtocol::Aes192 => apply!(Aes192),
        PrivProtocol::Aes256 => apply!(Aes256),
        PrivProtocol::Des => return Err(Error::crypto(CryptoErrorKind::CipherError)),
    }
    Ok(())
}

fn xor_iv(pre_iv: &[u8], salt: &[u8]) -> [u8; DES_BLOCK] {
    let mut iv = [0u8; DES_BLOCK];
    for (slot, (a, b)) in iv.iter_mut().zip(pre_iv.iter().zip(salt.iter())) {
        *slot = a ^ b;
    }
    iv
}

fn aes_iv(engine_boots: i32, engine_time: i32, salt: &[u8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
    iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
    iv[8..].copy_from_slice(salt);
    iv
}
