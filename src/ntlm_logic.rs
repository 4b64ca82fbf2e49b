//! Core logic for computing NTLM password hashes.
//!
//! The NTLM hash is MD4 over the UTF-16LE encoding of the password, see
//! [MS-NLMP] Section 3.3.1. MD4 itself comes from the in-crate
//! [`crate::md4`] compression function rather than a digest crate, so the
//! whole computation is visible and bit-exact.

use crate::error::{CrackError, Result};
use crate::md4;

/// Length of an NTLM hash rendered as hexadecimal.
pub const NTLM_HEX_LEN: usize = 32;

/// Raw NTLM digest.
pub type NtlmDigest = [u8; 16];

// --- Helper Functions ---

/// Encodes a password as UTF-16 Little Endian code units, without BOM or
/// terminator.
fn utf16_le(password: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(password.len() * 2 + md4::BLOCK_SIZE + 8);
    for code_unit in password.encode_utf16() {
        bytes.extend_from_slice(&code_unit.to_le_bytes());
    }
    bytes
}

// --- Core Functions ---

/// Calculates the raw 16-byte NTLM digest of a password.
///
/// The attack loop compares these bytes directly, which avoids rendering a hex
/// string for every candidate.
pub fn ntlm_bytes(password: &str) -> NtlmDigest {
    let mut buffer = utf16_le(password);
    md4::pad(&mut buffer);
    md4::digest_padded(&buffer)
}

/// Calculates the NTLM hash (MD4) of a password.
///
/// # Arguments
/// * `password` - The user's password. Any string is accepted.
///
/// # Returns
/// A `String` containing the 32-character lowercase hexadecimal NTLM hash.
pub fn ntlm(password: &str) -> String {
    hex::encode(ntlm_bytes(password))
}

/// Returns `true` if `value` looks like an NTLM hash: exactly 32 hex digits,
/// in either case.
pub fn is_ntlm_hex(value: &str) -> bool {
    value.len() == NTLM_HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Validates a captured NTLM hash and returns it lowercased.
///
/// Surrounding whitespace is ignored. Anything other than 32 hex digits is
/// rejected with [`CrackError::InvalidHash`].
pub fn normalize_hash(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if !is_ntlm_hex(trimmed) {
        return Err(CrackError::InvalidHash(value.to_string()));
    }
    Ok(trimmed.to_ascii_lowercase())
}

/// Decodes a captured NTLM hash into raw digest bytes.
///
/// Hex decoding ignores case, so two hashes differing only in case decode to
/// the same digest.
pub fn decode_hash(value: &str) -> Result<NtlmDigest> {
    let normalized = normalize_hash(value)?;
    let mut digest = [0u8; 16];
    hex::decode_to_slice(normalized, &mut digest)
        .map_err(|_| CrackError::InvalidHash(value.to_string()))?;
    Ok(digest)
}

#[cfg(test)]
#[path = "ntlm_logic_test.rs"]
mod tests;
