use super::*;
use ::md4::{Digest, Md4};
use hex_literal::hex;
use proptest::prelude::*;

// Known test vectors - these are real NTLM hashes for validation
const KNOWN_EMPTY_NTLM: &str = "31d6cfe0d16ae931b73c59d7e0c089c0";

const KNOWN_PASSWORD_1: &str = "password";
const KNOWN_NTLM_1: &str = "8846f7eaee8fb117ad06bdd830b7586c";

const KNOWN_PASSWORD_2: &str = "Password123!";
const KNOWN_NTLM_2: &str = "2b576acbe6bcfda7294d6bd18041b8fe";

// Test that our NTLM implementation matches known test vectors
#[test]
fn test_ntlm_known_vectors() {
    assert_eq!(ntlm(""), KNOWN_EMPTY_NTLM);
    assert_eq!(ntlm(KNOWN_PASSWORD_1), KNOWN_NTLM_1);
    assert_eq!(ntlm(KNOWN_PASSWORD_2), KNOWN_NTLM_2);
    assert_eq!(ntlm("Summer2024!"), "72f0eefcc213ea8f350773b831cf2c9c");
    assert_eq!(ntlm("qwerty"), "2d20d252a479f485cdf5e171d93985bf");
}

// Non-ASCII input, including a surrogate pair, goes through UTF-16 as-is
#[test]
fn test_ntlm_non_ascii() {
    assert_eq!(ntlm("Ünïcödé"), "55c327f2127d9483d821e8f7668d7de0");
    assert_eq!(ntlm("密码"), "f900556f89880c4084e3c644c6c20b9c");
    assert_eq!(ntlm("🔑key"), "08636ad2dbbe22210305db7278de577f");
}

// 27 chars = 54 bytes fits one block, 28 chars = 56 bytes spills into a second
#[test]
fn test_ntlm_block_boundaries() {
    assert_eq!(ntlm(&"a".repeat(27)), "3f9798b4e3c435593074a9ef81662507");
    assert_eq!(ntlm(&"a".repeat(28)), "7d4a56633580793aa26ad0259f60280b");
    assert_eq!(ntlm(&"a".repeat(40)), "7efc1c22058c46e21f736fe63eb922e0");
}

#[test]
fn test_ntlm_bytes_matches_hex() {
    assert_eq!(
        ntlm_bytes(KNOWN_PASSWORD_1),
        hex!("8846f7eaee8fb117ad06bdd830b7586c")
    );
}

#[test]
fn test_normalize_hash() {
    assert_eq!(
        normalize_hash(" 8846F7EAEE8FB117AD06BDD830B7586C\n").unwrap(),
        KNOWN_NTLM_1
    );
    assert!(matches!(
        normalize_hash("8846f7eaee8fb117ad06bdd830b7586"),
        Err(CrackError::InvalidHash(_))
    ));
    assert!(matches!(
        normalize_hash("zz46f7eaee8fb117ad06bdd830b7586c"),
        Err(CrackError::InvalidHash(_))
    ));
    assert!(!is_ntlm_hex(""));
}

#[test]
fn test_decode_hash_ignores_case() {
    let lower = decode_hash(KNOWN_NTLM_1).unwrap();
    let upper = decode_hash(&KNOWN_NTLM_1.to_uppercase()).unwrap();
    assert_eq!(lower, upper);
    assert_eq!(lower, ntlm_bytes(KNOWN_PASSWORD_1));
}

// Property-based tests

// Property: NTLM hash should always be 32 lowercase hex characters
proptest! {
    #[test]
    fn ntlm_hash_always_valid_length(password in ".*") {
        let hash = ntlm(&password);
        prop_assert_eq!(hash.len(), 32);
        prop_assert!(is_ntlm_hex(&hash));
        prop_assert_eq!(hash.to_lowercase(), hash);
    }
}

// Property: NTLM hash should be identical for the same input
proptest! {
    #[test]
    fn ntlm_hash_deterministic(password in ".*") {
        let hash1 = ntlm(&password);
        let hash2 = ntlm(&password);
        prop_assert_eq!(hash1, hash2);
    }
}

// Property: agrees with the md4 crate over the UTF-16LE encoding
proptest! {
    #[test]
    fn ntlm_matches_reference_md4(password in ".{0,80}") {
        let encoded: Vec<u8> = password
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        let expected = hex::encode(Md4::digest(&encoded));
        prop_assert_eq!(ntlm(&password), expected);
    }
}

// Property: Different passwords should produce different NTLM hashes
// (This isn't absolutely guaranteed due to hash collisions, but should be true for our test cases)
proptest! {
    #[test]
    fn different_passwords_different_hashes(
        password1 in "[a-zA-Z0-9]{1,10}",
        password2 in "[a-zA-Z0-9]{1,10}"
    ) {
        prop_assume!(password1 != password2);

        let hash1 = ntlm(&password1);
        let hash2 = ntlm(&password2);
        prop_assert_ne!(hash1, hash2);
    }
}
