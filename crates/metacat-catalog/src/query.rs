//! Search query normalization.

/// One normalized search term. `prefix` terms match every indexed term they
/// are a prefix of; exact terms match only the full term.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchTerm {
    pub term: String,
    pub prefix: bool,
}

/// Splits a raw query into terms: whitespace around `:` is dropped so
/// `tags: tag1` parses as the single scoped term `tags:tag1`, the query is
/// lower-cased, and a trailing `*` marks a prefix match. The bare query `*`
/// becomes an empty prefix term, which scans a whole namespace.
pub fn parse_query(raw: &str) -> Vec<SearchTerm> {
    let joined = raw
        .split(':')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(":");
    joined
        .to_lowercase()
        .split_whitespace()
        .map(|token| match token.strip_suffix('*') {
            Some(stripped) => SearchTerm {
                term: stripped.to_string(),
                prefix: true,
            },
            None => SearchTerm {
                term: token.to_string(),
                prefix: false,
            },
        })
        .collect()
}
