use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PAGE_SIZE: u32 = 10;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("Invalid page {page}, there are only {num_pages} pages.")]
pub struct PageOutOfRangeError {
    pub page: u32,
    pub num_pages: u32,
}

/// A 1-based page number, deserialized from `?page=`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageRequest(u32);

impl Default for PageRequest {
    fn default() -> Self {
        Self(1)
    }
}

impl PageRequest {
    #[must_use]
    pub fn new(page: u32) -> Self {
        Self(page.max(1))
    }

    #[must_use]
    pub fn number(self) -> u32 {
        self.0.max(1)
    }

    #[must_use]
    pub fn limit(self) -> i64 {
        PAGE_SIZE.into()
    }

    #[must_use]
    pub fn offset(self) -> i64 {
        i64::from(self.number() - 1) * i64::from(PAGE_SIZE)
    }
}

#[must_use]
pub fn num_pages(count: i64) -> u32 {
    let page_size = i64::from(PAGE_SIZE);
    let pages = (count.max(0) + page_size - 1) / page_size;
    u32::try_from(pages).unwrap_or(u32::MAX).max(1)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub page: u32,
    pub num_pages: u32,
    pub has_previous: bool,
    pub has_next: bool,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// The first page always exists, even when empty.
    pub fn new(results: Vec<T>, count: i64, request: PageRequest) -> Result<Self, PageOutOfRangeError> {
        let page = request.number();
        let num_pages = num_pages(count);
        if page > num_pages {
            return Err(PageOutOfRangeError { page, num_pages });
        }

        Ok(Self {
            count,
            page,
            num_pages,
            has_previous: page > 1,
            has_next: page < num_pages,
            results,
        })
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            page: self.page,
            num_pages: self.num_pages,
            has_previous: self.has_previous,
            has_next: self.has_next,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::page::{Page, PageOutOfRangeError, PageRequest, num_pages};

    #[test]
    fn offsets() {
        assert_eq!(PageRequest::default().offset(), 0);
        assert_eq!(PageRequest::new(3).offset(), 20);
        assert_eq!(PageRequest::new(0).number(), 1);
        assert_eq!(PageRequest::new(3).limit(), 10);
    }

    #[test]
    fn page_counts() {
        assert_eq!(num_pages(0), 1);
        assert_eq!(num_pages(10), 1);
        assert_eq!(num_pages(11), 2);
        assert_eq!(num_pages(95), 10);
    }

    #[test]
    fn out_of_range_pages_are_rejected() {
        let page = Page::new(vec![1, 2], 12, PageRequest::new(2)).unwrap();
        assert!(page.has_previous);
        assert!(!page.has_next);

        assert_eq!(
            Page::<u8>::new(Vec::new(), 12, PageRequest::new(3)),
            Err(PageOutOfRangeError {
                page: 3,
                num_pages: 2
            })
        );
        assert!(Page::<u8>::new(Vec::new(), 0, PageRequest::default()).is_ok());
    }
}
