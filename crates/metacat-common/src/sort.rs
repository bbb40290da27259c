//! Search result ordering.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stored property a field sort orders by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBy {
    /// Relevance ranking, no stored field involved.
    None,
    /// The `name` system property.
    Name,
    /// The `create_time` system property.
    CreateTime,
}

impl SortBy {
    /// The property key consulted for this sort field, if any.
    #[must_use]
    pub fn property_key(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Name => Some("name"),
            Self::CreateTime => Some("create_time"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
    /// Rank by total match weight, descending.
    Weighted,
}

/// How search results are ordered. Parsed from the external
/// `"{field} {order}"` form, or the weighted default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortInfo {
    pub sort_by: SortBy,
    pub order: SortOrder,
}

impl SortInfo {
    pub const WEIGHTED: Self = Self {
        sort_by: SortBy::None,
        order: SortOrder::Weighted,
    };

    /// Parses `"{field} {order}"`, case-insensitively. Field must be `name`
    /// or `create_time`; order must be `asc` or `desc`.
    pub fn parse(raw: &str) -> Result<Self, SortParseError> {
        let mut parts = raw.split_whitespace();
        let (Some(field), Some(order), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(SortParseError::Malformed(raw.to_string()));
        };
        let sort_by = match field.to_lowercase().as_str() {
            "name" => SortBy::Name,
            "create_time" => SortBy::CreateTime,
            _ => return Err(SortParseError::UnknownField(field.to_string())),
        };
        let order = match order.to_lowercase().as_str() {
            "asc" => SortOrder::Asc,
            "desc" => SortOrder::Desc,
            _ => return Err(SortParseError::UnknownOrder(order.to_string())),
        };
        Ok(Self { sort_by, order })
    }
}

impl Default for SortInfo {
    fn default() -> Self {
        Self::WEIGHTED
    }
}

#[derive(Debug, Error)]
pub enum SortParseError {
    #[error("sort must be of the form '{{field}} {{order}}', got '{0}'")]
    Malformed(String),
    #[error("unknown sort field '{0}', expected 'name' or 'create_time'")]
    UnknownField(String),
    #[error("unknown sort order '{0}', expected 'asc' or 'desc'")]
    UnknownOrder(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(
            SortInfo::parse("name asc").unwrap(),
            SortInfo {
                sort_by: SortBy::Name,
                order: SortOrder::Asc,
            }
        );
        assert_eq!(
            SortInfo::parse("CREATE_TIME Desc").unwrap(),
            SortInfo {
                sort_by: SortBy::CreateTime,
                order: SortOrder::Desc,
            }
        );
        assert_eq!(
            SortInfo::parse("  name   desc  ").unwrap().order,
            SortOrder::Desc
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            SortInfo::parse("name"),
            Err(SortParseError::Malformed(_))
        ));
        assert!(matches!(
            SortInfo::parse("name asc extra"),
            Err(SortParseError::Malformed(_))
        ));
        assert!(matches!(
            SortInfo::parse("size asc"),
            Err(SortParseError::UnknownField(_))
        ));
        assert!(matches!(
            SortInfo::parse("name sideways"),
            Err(SortParseError::UnknownOrder(_))
        ));
    }

    #[test]
    fn test_default_is_weighted() {
        assert_eq!(SortInfo::default(), SortInfo::WEIGHTED);
        assert_eq!(SortInfo::WEIGHTED.sort_by.property_key(), None);
    }
}
