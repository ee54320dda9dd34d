use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Zero-based page selection, read from the `page` and `size` query
/// parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u64,
    size: u64,
}

impl Pagination {
    pub fn new(page: u64, size: u64) -> Result<Self, Error> {
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(Error::Status(
                Status::BadRequest,
                format!("Page size must be between 1 and {MAX_PAGE_SIZE}."),
            ));
        }
        // The database takes the skip count as an i64.
        match page.checked_mul(size) {
            Some(skip) if i64::try_from(skip).is_ok() => Ok(Self { page, size }),
            _ => Err(Error::Status(
                Status::BadRequest,
                "Page number is out of range.".to_string(),
            )),
        }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of items before this page.
    pub fn skip(&self) -> u64 {
        self.page * self.size
    }

    /// Wrap one page of items.
    pub fn page_of<T>(self, items: Vec<T>, total: u64) -> Page<T> {
        Page {
            polls: items,
            current_page: self.page,
            total_pages: (total + self.size - 1) / self.size,
            total_elements: total,
            page_size: self.size,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let bad_request = |what: &str| {
            request::Outcome::Failure((
                Status::BadRequest,
                Error::Status(Status::BadRequest, format!("Invalid {what}.")),
            ))
        };
        let Ok(page) = req.query_value::<u64>("page").unwrap_or(Ok(0)) else {
            return bad_request("page");
        };
        let Ok(size) = req.query_value::<u64>("size").unwrap_or(Ok(DEFAULT_PAGE_SIZE)) else {
            return bad_request("size");
        };
        match Self::new(page, size) {
            Ok(pagination) => request::Outcome::Success(pagination),
            Err(e) => request::Outcome::Failure((Status::BadRequest, e)),
        }
    }
}

/// One page of polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub polls: Vec<T>,
    pub current_page: u64,
    pub total_pages: u64,
    pub total_elements: u64,
    pub page_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_arithmetic() {
        let pagination = Pagination::new(2, 20).unwrap();
        assert_eq!(pagination.skip(), 40);

        let page = pagination.page_of(vec![1, 2, 3], 43);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_elements, 43);
        assert_eq!(page.page_size, 20);
    }

    #[test]
    fn empty_listing_has_no_pages() {
        let page = Pagination::new(0, 20).unwrap().page_of(Vec::<u32>::new(), 0);
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn page_size_is_bounded() {
        assert!(Pagination::new(0, 0).is_err());
        assert!(Pagination::new(0, MAX_PAGE_SIZE + 1).is_err());
        assert!(Pagination::new(0, MAX_PAGE_SIZE).is_ok());
    }

    #[test]
    fn huge_page_numbers_are_rejected() {
        let err = Pagination::new(u64::MAX, 20).unwrap_err();
        assert_eq!(err.status(), Status::BadRequest);
        let err = Pagination::new(i64::MAX as u64, 2).unwrap_err();
        assert_eq!(err.status(), Status::BadRequest);

        let last = Pagination::new(i64::MAX as u64, 1).unwrap();
        assert_eq!(last.skip(), i64::MAX as u64);
    }
}
