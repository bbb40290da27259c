//! Term extraction for the inverted index.

use metacat_common::{MetadataEntry, TAGS_KEY};
use std::collections::BTreeSet;

/// Strategy turning a metadata row into the search terms it is findable
/// under. Swapping the indexer requires deleting and rebuilding the index,
/// since old postings are only removable by re-deriving their terms.
pub trait Indexer: Send + Sync {
    fn indexes(&self, entry: &MetadataEntry) -> BTreeSet<String>;
}

/// Default term extraction: the whole lower-cased value plus its tokens,
/// split on runs of whitespace, `,`, `-` and `_`. The tags row is treated
/// as a list: each whole tag is a term, plus the tag's tokens.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultIndexer;

impl Indexer for DefaultIndexer {
    fn indexes(&self, entry: &MetadataEntry) -> BTreeSet<String> {
        let mut terms = BTreeSet::new();
        if entry.key == TAGS_KEY {
            for tag in entry.value.split(',') {
                let tag = tag.trim();
                if tag.is_empty() {
                    continue;
                }
                terms.insert(tag.to_lowercase());
                tokenize(tag, &mut terms);
            }
        } else {
            terms.insert(entry.value.to_lowercase());
            tokenize(&entry.value, &mut terms);
        }
        terms
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ',' || c == '-' || c == '_'
}

fn tokenize(value: &str, terms: &mut BTreeSet<String>) {
    for token in value.split(is_separator) {
        if !token.is_empty() {
            terms.insert(token.to_lowercase());
        }
    }
}
