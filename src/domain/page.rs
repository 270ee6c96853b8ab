//! Paging

use serde::{Deserialize, Serialize};

/// One page of results with the total number of matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }

    pub fn empty() -> Self {
        Self { items: Vec::new(), total: 0 }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

/// Cursor metadata returned alongside a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
    pub next_offset: Option<usize>,
}

impl PageInfo {
    pub fn new(offset: usize, limit: usize, returned: usize, total: u64) -> Self {
        let loaded = (offset + returned) as u64;
        let has_more = loaded < total;
        Self {
            offset,
            limit,
            has_more,
            next_offset: has_more.then_some(offset + returned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_info() {
        let info = PageInfo::new(0, 12, 12, 30);
        assert!(info.has_more);
        assert_eq!(info.next_offset, Some(12));

        let last = PageInfo::new(24, 12, 6, 30);
        assert!(!last.has_more);
        assert_eq!(last.next_offset, None);
    }
}
