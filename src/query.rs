//! Pagination parameters and the paged response envelope for show listings.

use crate::schema::FieldError;
use serde::Serialize;

pub const DEFAULT_OFFSET: i64 = 0;
pub const DEFAULT_LIMIT: i64 = 10;

/// Which slice of the id-ordered show list to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: i64,
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            offset: DEFAULT_OFFSET,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self { offset, limit }
    }

    /// Parses raw query-string values. Absent or blank values take the defaults.
    pub fn parse(offset: Option<&str>, limit: Option<&str>) -> Result<Self, Vec<FieldError>> {
        let parse = |field: &str, raw: Option<&str>, default: i64| {
            match raw.map(str::trim).filter(|s| !s.is_empty()) {
                None => Ok(default),
                Some(s) => s
                    .parse::<i64>()
                    .ok()
                    .filter(|n| *n >= 0)
                    .ok_or_else(|| FieldError::new(field, format!("{field} þarf að vera jákvæð heiltala"))),
            }
        };

        match (
            parse("offset", offset, DEFAULT_OFFSET),
            parse("limit", limit, DEFAULT_LIMIT),
        ) {
            (Ok(offset), Ok(limit)) => Ok(Self { offset, limit }),
            (offset, limit) => Err([offset.err(), limit.err()].into_iter().flatten().collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Links {
    #[serde(rename = "self")]
    pub self_link: Link,
    pub prev: Link,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Link>,
}

/// `{limit, offset, items, links}` envelope around one page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub limit: i64,
    pub offset: i64,
    pub items: Vec<T>,
    pub links: Links,
}

impl<T> Page<T> {
    /// Wraps `items` and derives the navigation links.
    ///
    /// `prev` is always present and has an empty href on the first page. `next`
    /// is only present when the page came back full, which may point at an
    /// empty page when the total is an exact multiple of `limit`.
    pub fn new(items: Vec<T>, request: PageRequest, base_url: &str, path: &str) -> Self {
        let PageRequest { offset, limit } = request;
        let href = |offset: i64| {
            format!(
                "{}{}?offset={}&limit={}",
                base_url.trim_end_matches('/'),
                path,
                offset,
                limit
            )
        };

        let prev = if offset > 0 {
            href((offset - limit).max(0))
        } else {
            String::new()
        };

        let next = (items.len() as i64 == limit).then(|| Link {
            href: href(offset + limit),
        });

        Page {
            limit,
            offset,
            links: Links {
                self_link: Link { href: href(offset) },
                prev: Link { href: prev },
                next,
            },
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Page, PageRequest};

    const BASE: &str = "http://localhost:3000/";

    #[test]
    fn test_parse_defaults() {
        assert_eq!(Ok(PageRequest::new(0, 10)), PageRequest::parse(None, None));
        assert_eq!(Ok(PageRequest::new(0, 10)), PageRequest::parse(Some(""), Some(" ")));
        assert_eq!(Ok(PageRequest::new(20, 5)), PageRequest::parse(Some("20"), Some("5")));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let errors = PageRequest::parse(Some("abc"), Some("-1")).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(vec!["offset", "limit"], fields);

        let errors = PageRequest::parse(Some("0"), Some("1.5")).unwrap_err();
        assert_eq!("limit", errors[0].field);
    }

    #[test]
    fn test_first_full_page() {
        let page = Page::new(vec![1, 2], PageRequest::new(0, 2), BASE, "/tv");

        assert_eq!("http://localhost:3000/tv?offset=0&limit=2", page.links.self_link.href);
        assert_eq!("", page.links.prev.href);
        assert_eq!(
            Some("http://localhost:3000/tv?offset=2&limit=2".to_string()),
            page.links.next.map(|l| l.href)
        );
    }

    #[test]
    fn test_last_partial_page() {
        let page = Page::new(vec![5], PageRequest::new(4, 2), BASE, "/tv");

        assert_eq!("http://localhost:3000/tv?offset=2&limit=2", page.links.prev.href);
        assert_eq!(None, page.links.next);
    }

    #[test]
    fn test_prev_never_negative() {
        let page = Page::new(vec![2, 3], PageRequest::new(1, 10), BASE, "/tv");

        assert_eq!("http://localhost:3000/tv?offset=0&limit=10", page.links.prev.href);
        assert_eq!(None, page.links.next);
    }

    #[test]
    fn test_serialized_shape() {
        let page = Page::new(Vec::<i32>::new(), PageRequest::new(0, 10), BASE, "/tv");
        let json = serde_json::to_value(&page).unwrap();

        assert_eq!(10, json["limit"]);
        assert_eq!(0, json["offset"]);
        assert!(json["items"].as_array().unwrap().is_empty());
        assert_eq!("", json["links"]["prev"]["href"]);
        assert!(json["links"].get("next").is_none());
        assert!(json["links"]["self"]["href"].is_string());
    }
}
