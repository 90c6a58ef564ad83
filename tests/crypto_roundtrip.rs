use taskvault::crypto::{decrypt_payload, encrypt_payload, ArchiveKey, CryptoError};

#[test]
fn crypto_roundtrip_encrypt_decrypt() {
    let key = ArchiveKey::from_passphrase("correct horse battery staple");

    let plaintext = b"ship the quarterly report";
    let blob = encrypt_payload(&key, plaintext).expect("encrypt");
    let decrypted = decrypt_payload(&key, &blob).expect("decrypt");
    assert_eq!(decrypted, plaintext);
}

#[test]
fn crypto_wire_format_is_nonce_colon_ciphertext() {
    let key = ArchiveKey::from_passphrase("pw");
    let blob = encrypt_payload(&key, b"x").expect("encrypt");

    let (nonce_hex, cipher_b64) = blob.split_once(':').expect("separator");
    assert_eq!(nonce_hex.len(), 48);
    assert!(nonce_hex.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(!cipher_b64.is_empty());
}

#[test]
fn crypto_wrong_key_fails() {
    let correct_key = ArchiveKey::from_passphrase("pw1");
    let wrong_key = ArchiveKey::from_passphrase("pw2");

    let blob = encrypt_payload(&correct_key, b"secret").expect("encrypt");
    let result = decrypt_payload(&wrong_key, &blob);
    assert!(result.is_err());
}

#[test]
fn crypto_tampered_ciphertext_fails_not_corrupts() {
    let key = ArchiveKey::from_passphrase("pw");
    let blob = encrypt_payload(&key, b"secret").expect("encrypt");

    let (nonce_hex, cipher_b64) = blob.split_once(':').expect("separator");

    // Flip one character of the ciphertext.
    let mut cipher_chars: Vec<char> = cipher_b64.chars().collect();
    cipher_chars[0] = if cipher_chars[0] == 'A' { 'B' } else { 'A' };
    let tampered_cipher: String = cipher_chars.into_iter().collect();
    let tampered = format!("{nonce_hex}:{tampered_cipher}");

    let err = decrypt_payload(&key, &tampered).expect_err("tampered ciphertext must fail");
    assert!(err.is::<CryptoError>());
}

#[test]
fn crypto_tampered_nonce_fails_not_corrupts() {
    let key = ArchiveKey::from_passphrase("pw");
    let blob = encrypt_payload(&key, b"secret").expect("encrypt");

    let (nonce_hex, cipher_b64) = blob.split_once(':').expect("separator");

    let mut nonce_chars: Vec<char> = nonce_hex.chars().collect();
    nonce_chars[0] = if nonce_chars[0] == '0' { '1' } else { '0' };
    let tampered_nonce: String = nonce_chars.into_iter().collect();
    let tampered = format!("{tampered_nonce}:{cipher_b64}");

    let err = decrypt_payload(&key, &tampered).expect_err("tampered nonce must fail");
    assert!(err.is::<CryptoError>());
}

#[test]
fn crypto_key_rotation_keeps_wire_format() {
    let rotated = ArchiveKey::from_bytes([42u8; 32]);

    let blob = encrypt_payload(&rotated, b"rotated secret").expect("encrypt");
    assert!(blob.contains(':'));
    let decrypted = decrypt_payload(&rotated, &blob).expect("decrypt");
    assert_eq!(decrypted, b"rotated secret");
}
