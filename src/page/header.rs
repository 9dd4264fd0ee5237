use super::{get_u64, put_u64, PageCodec, PageNo, RawPage, PAGE_SIZE};
use crate::error::Result;

/// Page 0. Tracks the free-list head, the tree root, and the page count.
///
/// Unlike leaf/internal pages, the header carries no `is_leaf` tag; it is
/// identified purely by living at page 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPage {
    pub free_page_no: PageNo,
    pub root_page_no: PageNo,
    pub page_count: u64,
}

impl HeaderPage {
    /// A freshly initialized header for an empty database: one page (itself),
    /// no root, no free pages.
    pub fn fresh() -> Self {
        HeaderPage {
            free_page_no: 0,
            root_page_no: 0,
            page_count: 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_no == 0
    }
}

impl PageCodec for HeaderPage {
    fn decode(_page_no: PageNo, buf: &RawPage) -> Result<Self> {
        Ok(HeaderPage {
            free_page_no: get_u64(buf, 0),
            root_page_no: get_u64(buf, 8),
            page_count: get_u64(buf, 16),
        })
    }

    fn encode(&self, buf: &mut RawPage) {
        *buf = [0u8; PAGE_SIZE];
        put_u64(buf, 0, self.free_page_no);
        put_u64(buf, 8, self.root_page_no);
        put_u64(buf, 16, self.page_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let header = HeaderPage {
            free_page_no: 7,
            root_page_no: 3,
            page_count: 42,
        };
        let mut buf = [0u8; PAGE_SIZE];
        header.encode(&mut buf);
        let decoded = HeaderPage::decode(0, &buf).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn fresh_header_has_no_tree() {
        assert!(HeaderPage::fresh().is_empty());
    }
}
