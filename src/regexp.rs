use regex::{Regex, RegexBuilder};

/// NAMESPACE_REGEXP is the repository name grammar of the OCI distribution API.
// Slash separated path components of lowercase alphanumerics, joined by a
// single period, one or two underscores, or any number of dashes.
pub const NAMESPACE_REGEXP: &str =
    r"^[a-z0-9]+(?:(?:\.|_|__|-+)[a-z0-9]+)*(?:/[a-z0-9]+(?:(?:\.|_|__|-+)[a-z0-9]+)*)*$";

/// Longest repository name accepted by common registry implementations
pub const NAMESPACE_TOTAL_LENGTH_MAX: usize = 255;

lazy_static! {
    pub static ref NAMESPACE: Regex = must_compile(NAMESPACE_REGEXP);
}

pub fn must_compile(r: &str) -> Regex {
    RegexBuilder::new(r)
        .size_limit(10 * (1 << 21))
        .build()
        .unwrap()
}

/// Checks `name` against the repository name grammar
pub fn is_valid_namespace(name: &str) -> bool {
    name.len() <= NAMESPACE_TOTAL_LENGTH_MAX && NAMESPACE.is_match(name)
}
