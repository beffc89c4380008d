use shortly_kernel::{SAFE_ALPHABET, SLUG_ALPHABET, safe_nanoid, slug};

#[test]
fn generates_expected_length_and_charset() {
    let id = safe_nanoid!();
    assert_eq!(id.len(), 12);

    for ch in id.chars() {
        assert!(SAFE_ALPHABET.contains(&ch), "unexpected character in nanoid: {ch}");
    }
}

#[test]
fn custom_length() {
    let id = safe_nanoid!(20);
    assert_eq!(id.len(), 20);
}

#[test]
fn slugs_are_lowercase_alphanumeric() {
    for _ in 0..100 {
        let code = slug!();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| SLUG_ALPHABET.contains(&c)));
        assert!(code.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
    assert_eq!(slug!(10).len(), 10);
}
