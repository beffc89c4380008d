//! Kernel utilities shared across slices.
//! Keep this crate lightweight; it re-exports ergonomic helpers for IDs, config loading and tokens.
//! The `server` feature adds the HTTP plumbing every slice builds on.
//!
//! ## ID generation
//! Use `safe_nanoid!` for URL-safe, unambiguous IDs and `slug!` for short link codes:
//! ```rust
//! # use shortly_kernel::{safe_nanoid, slug};
//! assert_eq!(safe_nanoid!().len(), 12);
//! assert_eq!(slug!().len(), 6);
//! ```
//!
//! ## Config loading
//! ```rust,no_run
//! use shortly_kernel::config::load_config;
//! use shortly_kernel::domain::config::ApiConfig;
//!
//! let cfg: ApiConfig = load_config(Some("server.toml")).unwrap();
//! ```
pub mod config;
pub mod security;
#[cfg(feature = "server")]
pub mod server;

// Alphabet excludes visually ambiguous characters (I, O, l, 0, 1).
pub const SAFE_ALPHABET: &[char; 55] = &[
    '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L',
    'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f',
    'g', 'h', 'j', 'k', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Lowercase alphanumerics, used for link codes and user ids.
pub const SLUG_ALPHABET: &[char; 36] = &[
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

pub const DEFAULT_SLUG_LENGTH: usize = 6;

pub use nanoid::nanoid;
pub use shortly_domain as domain;

/// Generates an unambiguous `NanoID` (no visually confusing characters).
#[macro_export]
macro_rules! safe_nanoid {
    () => {
        $crate::nanoid!(12, $crate::SAFE_ALPHABET)
    };
    ($size:expr) => {
        $crate::nanoid!($size, $crate::SAFE_ALPHABET)
    };
}

/// Generates a lowercase alphanumeric slug (`[a-z0-9]`).
#[macro_export]
macro_rules! slug {
    () => {
        $crate::nanoid!($crate::DEFAULT_SLUG_LENGTH, $crate::SLUG_ALPHABET)
    };
    ($size:expr) => {
        $crate::nanoid!($size, $crate::SLUG_ALPHABET)
    };
}
