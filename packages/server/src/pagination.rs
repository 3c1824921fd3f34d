//! `limit`/`offset` paging for list endpoints.

use park_map_catalog_models::Page;
use park_map_server_models::{ApiListMeta, list_uri};

use crate::error::ApiError;
use crate::resources::QueryParams;

/// Page size when `limit` is absent.
pub const DEFAULT_LIMIT: usize = 20;

/// Largest page a client can request. `limit=0` asks for this.
pub const MAX_LIMIT: usize = 1000;

/// Reads `limit` and `offset` from the query string.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] if either is not a non-negative
/// integer.
pub fn page_from_params(params: &QueryParams) -> Result<Page, ApiError> {
    let limit = match params.get("limit") {
        Some(raw) => match parse_count("limit", raw)? {
            0 => MAX_LIMIT,
            n => n.min(MAX_LIMIT),
        },
        None => DEFAULT_LIMIT,
    };

    let offset = match params.get("offset") {
        Some(raw) => parse_count("offset", raw)?,
        None => 0,
    };

    Ok(Page { limit, offset })
}

/// Builds the list metadata for a result of `total_count` rows.
///
/// `raw_query` is the request's query string. Its parameters other than
/// `limit` and `offset` are carried into the `next` and `previous` links
/// unchanged.
#[must_use]
pub fn list_meta(page: Page, resource: &str, raw_query: &str, total_count: usize) -> ApiListMeta {
    let link = |offset: usize| {
        let mut query: Vec<&str> = raw_query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| {
                let key = pair.split_once('=').map_or(*pair, |(k, _)| k);
                key != "limit" && key != "offset"
            })
            .collect();
        let paging = format!("limit={}&offset={offset}", page.limit);
        query.push(&paging);
        format!("{}?{}", list_uri(resource), query.join("&"))
    };

    let next = (page.next_offset() < total_count).then(|| link(page.next_offset()));
    let previous = (page.offset > 0).then(|| link(page.previous_offset()));

    ApiListMeta {
        limit: page.limit,
        offset: page.offset,
        total_count,
        next,
        previous,
    }
}

fn parse_count(key: &str, raw: &str) -> Result<usize, ApiError> {
    raw.trim().parse().map_err(|_| {
        ApiError::BadRequest(format!(
            "Invalid {key} '{raw}': expected a non-negative integer"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams::new(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[test]
    fn defaults_and_limits() {
        assert_eq!(
            page_from_params(&params(&[])).unwrap(),
            Page {
                limit: DEFAULT_LIMIT,
                offset: 0
            }
        );

        let page = page_from_params(&params(&[("limit", "0")])).unwrap();
        assert_eq!(page.limit, MAX_LIMIT);

        let page = page_from_params(&params(&[("limit", "5000"), ("offset", "7")])).unwrap();
        assert_eq!(
            page,
            Page {
                limit: MAX_LIMIT,
                offset: 7
            }
        );
    }

    #[test]
    fn rejects_bad_counts() {
        assert!(matches!(
            page_from_params(&params(&[("limit", "ten")])),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            page_from_params(&params(&[("offset", "-1")])),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn links_keep_other_parameters() {
        let page = Page { limit: 2, offset: 2 };
        let meta = list_meta(page, "park", "name__icontains=park&limit=2&offset=2", 6);

        assert_eq!(meta.total_count, 6);
        assert_eq!(
            meta.next.as_deref(),
            Some("/api/v1/park/?name__icontains=park&limit=2&offset=4")
        );
        assert_eq!(
            meta.previous.as_deref(),
            Some("/api/v1/park/?name__icontains=park&limit=2&offset=0")
        );
    }

    #[test]
    fn no_links_past_the_ends() {
        let page = Page {
            limit: DEFAULT_LIMIT,
            offset: 0,
        };
        let meta = list_meta(page, "activity", "", 5);
        assert!(meta.next.is_none());
        assert!(meta.previous.is_none());
    }

    #[test]
    fn largest_offset_does_not_overflow() {
        let raw = usize::MAX.to_string();
        let page = page_from_params(&params(&[("offset", &raw)])).unwrap();
        assert_eq!(page.offset, usize::MAX);

        let meta = list_meta(page, "park", &format!("offset={raw}"), 6);
        assert!(meta.next.is_none());
        assert_eq!(
            meta.previous,
            Some(format!("/api/v1/park/?limit=20&offset={}", usize::MAX - 20))
        );
    }
}
