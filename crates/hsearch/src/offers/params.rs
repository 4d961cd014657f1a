use std::fmt;
use std::num::IntErrorKind;

use super::fields::{FieldSelection, OfferField};
use super::filter::{OfferFilter, OfferFilterParams};
use crate::config::ListingConfig;

/// Query string of the listing endpoint, before validation.
#[derive(Debug, Clone, Default)]
pub struct ListingParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub order: Option<String>,
    pub fields: Option<String>,
    pub filter: OfferFilterParams,
}

impl ListingParams {
    /// Collects decoded query pairs. A repeated key keeps its last value and
    /// unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let value = value.into();
            match key.as_ref() {
                "page" => params.page = Some(value),
                "per_page" => params.per_page = Some(value),
                "order" => params.order = Some(value),
                "fields" => params.fields = Some(value),
                other => params.filter.set(other, value),
            }
        }
        params
    }
}

/// Rejections reported back to the caller with a 400.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    #[error("The 'page' parameter must be an integer.")]
    InvalidPage,
    #[error("The 'per_page' parameter must be an integer.")]
    InvalidPerPage,
    #[error("The 'per_page' parameter must be a positive integer.")]
    NonPositivePerPage,
    #[error("Sorting can only be used on the following fields: {allowed}")]
    InvalidOrder { allowed: String },
}

/// Sort key of a listing, rendered back as `field` or `-field`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub field: OfferField,
    pub descending: bool,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Result<Self, ParamError> {
        let (name, descending) = match raw.strip_prefix('-') {
            Some(name) => (name, true),
            None => (raw, false),
        };

        OfferField::parse(name)
            .map(|field| Self { field, descending })
            .ok_or_else(|| ParamError::InvalidOrder {
                allowed: OfferField::allowed_names(),
            })
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            field: OfferField::Id,
            descending: false,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-{}", self.field.name())
        } else {
            f.write_str(self.field.name())
        }
    }
}

/// A validated listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRequest {
    /// 1-based; values outside the available pages yield an empty page.
    pub page: i64,
    pub per_page: i64,
    pub order: SortOrder,
    pub fields: FieldSelection,
    pub filter: OfferFilter,
}

impl ListingRequest {
    pub fn from_params(params: &ListingParams, defaults: ListingConfig) -> Result<Self, ParamError> {
        let page = match params.page.as_deref() {
            Some(raw) => parse_integer(raw).ok_or(ParamError::InvalidPage)?,
            None => 1,
        };

        let per_page = match params.per_page.as_deref() {
            Some(raw) => parse_integer(raw).ok_or(ParamError::InvalidPerPage)?,
            None => defaults.default_per_page,
        };
        if per_page < 1 {
            return Err(ParamError::NonPositivePerPage);
        }

        let order = match params.order.as_deref() {
            Some(raw) => SortOrder::parse(raw)?,
            None => SortOrder::default(),
        };

        Ok(Self {
            page,
            per_page,
            order,
            fields: FieldSelection::resolve(params.fields.as_deref()),
            filter: OfferFilter::from_params(&params.filter),
        })
    }

    /// Rows to skip before this page, valid only when the page exists.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// Integers beyond `i64` saturate, which leaves them out of range rather than invalid.
fn parse_integer(raw: &str) -> Option<i64> {
    match raw.trim().parse::<i64>() {
        Ok(value) => Some(value),
        Err(err) => match err.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(params: ListingParams) -> Result<ListingRequest, ParamError> {
        ListingRequest::from_params(&params, ListingConfig::default())
    }

    #[test]
    fn defaults_apply_when_params_missing() {
        let request = request(ListingParams::default()).expect("defaults are valid");
        assert_eq!(request.page, 1);
        assert_eq!(request.per_page, 100);
        assert_eq!(request.order.to_string(), "id");
        assert_eq!(request.fields, FieldSelection::everything());
        assert!(request.filter.is_empty());
    }

    #[test]
    fn configured_default_page_size_is_used() {
        let request = ListingRequest::from_params(
            &ListingParams::default(),
            ListingConfig {
                default_per_page: 25,
            },
        )
        .expect("valid");
        assert_eq!(request.per_page, 25);
    }

    #[test]
    fn non_integer_page_is_rejected() {
        let err = request(ListingParams {
            page: Some("abc".to_string()),
            ..ListingParams::default()
        })
        .expect_err("page must be numeric");
        assert_eq!(err, ParamError::InvalidPage);
        assert_eq!(err.to_string(), "The 'page' parameter must be an integer.");
    }

    #[test]
    fn non_integer_per_page_is_rejected() {
        let err = request(ListingParams {
            per_page: Some("ten".to_string()),
            ..ListingParams::default()
        })
        .expect_err("per_page must be numeric");
        assert_eq!(err.to_string(), "The 'per_page' parameter must be an integer.");
    }

    #[test]
    fn zero_per_page_is_rejected() {
        let err = request(ListingParams {
            per_page: Some("0".to_string()),
            ..ListingParams::default()
        })
        .expect_err("per_page must be positive");
        assert_eq!(err, ParamError::NonPositivePerPage);
    }

    #[test]
    fn negative_page_is_accepted() {
        let request = request(ListingParams {
            page: Some(" -2 ".to_string()),
            ..ListingParams::default()
        })
        .expect("out of range pages are not an error");
        assert_eq!(request.page, -2);
    }

    #[test]
    fn oversized_integers_saturate() {
        let saturated = request(ListingParams {
            page: Some("99999999999999999999".to_string()),
            per_page: Some("99999999999999999999".to_string()),
            ..ListingParams::default()
        })
        .expect("oversized integers are still integers");
        assert_eq!(saturated.page, i64::MAX);
        assert_eq!(saturated.per_page, i64::MAX);

        let err = request(ListingParams {
            per_page: Some("-99999999999999999999".to_string()),
            ..ListingParams::default()
        })
        .expect_err("negative page size");
        assert_eq!(err, ParamError::NonPositivePerPage);
    }

    #[test]
    fn descending_order_keeps_its_prefix() {
        let order = SortOrder::parse("-price").expect("valid order");
        assert_eq!(order.field, OfferField::Price);
        assert!(order.descending);
        assert_eq!(order.to_string(), "-price");
    }

    #[test]
    fn unknown_order_lists_the_allowed_fields() {
        for raw in ["nonexistent_field", "--id", "-", "images__path", "ID"] {
            let err = SortOrder::parse(raw).expect_err("invalid order");
            let message = err.to_string();
            assert!(message.starts_with("Sorting can only be used on the following fields: "));
            for field in OfferField::ALL {
                assert!(message.contains(field.name()), "{raw}: missing {}", field.name());
            }
        }
    }

    #[test]
    fn repeated_keys_keep_the_last_value() {
        let params = ListingParams::from_pairs([
            ("fields", "id"),
            ("page", "2"),
            ("fields", "price"),
            ("rooms", "1"),
            ("rooms", "2,3"),
            ("colour", "blue"),
        ]);
        assert_eq!(params.fields.as_deref(), Some("price"));
        assert_eq!(params.page.as_deref(), Some("2"));
        assert_eq!(params.filter.rooms.as_deref(), Some("2,3"));
        assert!(params.per_page.is_none());
    }

    #[test]
    fn offset_counts_whole_pages() {
        let mut request = request(ListingParams::default()).expect("valid");
        request.page = 3;
        request.per_page = 20;
        assert_eq!(request.offset(), 40);
    }
}
