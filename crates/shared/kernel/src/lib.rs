//! Kernel utilities shared across slices.
//! Keep this crate lightweight; it holds ID generation, config loading,
//! the wire protocol types, and the system router.
//!
//! ## Identity generation
//! Use `safe_identity!` for URL-safe, unambiguous session identities:
//! ```rust
//! # use sanctum_kernel::safe_identity;
//! let id = safe_identity!();
//! assert_eq!(id.len(), 24);
//! ```
//! The default length of 24 matters: the first 16 bytes of an identity
//! double as cipher IV material downstream.
//!
//! ## Config loading
//! ```rust,ignore
//! use sanctum_kernel::config::load_config;
//! let cfg: AppConfig = load_config(Some("server")).unwrap();
//! ```

pub mod config;
pub mod prelude;
pub mod protocol;
#[cfg(feature = "server")]
pub mod server;

// Alphabet excludes visually ambiguous characters (I, O, l, 0, 1).
pub const SAFE_ALPHABET: &[char; 55] = &[
    '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L',
    'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f',
    'g', 'h', 'j', 'k', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

pub use nanoid::nanoid;

/// Generates an unambiguous session identity (no visually confusing
/// characters). The 24-character default keeps identities long enough to
/// serve as IV material.
#[macro_export]
macro_rules! safe_identity {
    () => {
        $crate::nanoid!(24, $crate::SAFE_ALPHABET)
    };
    ($size:expr) => {
        $crate::nanoid!($size, $crate::SAFE_ALPHABET)
    };
}
