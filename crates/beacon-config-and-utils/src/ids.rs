//! Opaque identifier generation.
//!
//! Identifiers look like `<prefix>_<unix-millis>_<suffix>` where the suffix is
//! nine random lowercase alphanumerics. The timestamp keeps ids roughly
//! sortable by creation time; the suffix keeps ids unique within a millisecond.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of the random suffix.
pub const ID_SUFFIX_LEN: usize = 9;

/// Generate a new identifier with the given prefix (e.g. `evt`, `sess`).
pub fn generate_id(prefix: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{prefix}_{millis}_{suffix}")
}

/// Check whether `id` has the `<prefix>_<digits>_<suffix>` shape.
pub fn is_valid_id(id: &str, prefix: &str) -> bool {
    let mut parts = id.splitn(3, '_');
    let (Some(head), Some(millis), Some(suffix)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    head == prefix
        && !millis.is_empty()
        && millis.chars().all(|c| c.is_ascii_digit())
        && suffix.len() == ID_SUFFIX_LEN
        && suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}
