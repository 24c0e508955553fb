use base64::Engine;

/// Mint a fresh opaque bearer token: 256 random bits, base64url without
/// padding. The value carries no structure and is never parsed, only
/// exact-matched against the store.
pub fn generate_token() -> String {
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unpadded_base64url_of_32_bytes() {
        let t = generate_token();
        assert_eq!(t.len(), 43);
        assert!(!t.contains('='));
        assert!(t.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn tokens_do_not_repeat() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
    }
}
