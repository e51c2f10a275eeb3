//! Stable ids for items, chapters and pages.
//!
//! Ids are a polynomial rolling hash over the source name followed by the
//! relative url (or a numeric id). They are persisted by readers, so the
//! algorithm and seed must stay fixed. They are not collision-resistant.

use crate::model::Source;

const SEED: i64 = 1125899906842597;

fn seeded(source: Source) -> i64 {
    fold(SEED, source.name())
}

/// Folds UTF-16 code units, matching ids persisted by existing readers.
fn fold(mut h: i64, s: &str) -> i64 {
    for unit in s.encode_utf16() {
        h = h.wrapping_mul(31).wrapping_add(i64::from(unit));
    }
    h
}

/// Creates an id for an entity identified by a relative url.
///
/// `url` must not contain the domain, otherwise ids change when the user
/// switches to a mirror.
pub fn generate_uid(source: Source, url: &str) -> i64 {
    fold(seeded(source), url)
}

/// Creates an id for an entity identified by a numeric id on the site.
pub fn generate_uid_from_id(source: Source, id: i64) -> i64 {
    seeded(source).wrapping_mul(31).wrapping_add(id)
}
