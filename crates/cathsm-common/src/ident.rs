//! Filesystem-safe identifiers derived from sequence ids.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE_UNSAFE: Regex = Regex::new(r"[\W]+").unwrap();
}

/// Strip everything except word characters so the id can name cache files.
pub fn safe_id(id: &str) -> String {
    RE_UNSAFE.replace_all(id, "").into_owned()
}
