use super::{get_u64, put_u64, PageCodec, PageNo, RawPage, PAGE_SIZE};
use crate::error::Result;

/// A page sitting on the free list. Only the first 8 bytes are meaningful;
/// the rest of the page's content is left as-is (the engine never zeroes a
/// freed page).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreePage {
    pub next_free_page_no: PageNo,
}

impl FreePage {
    pub fn new(next_free_page_no: PageNo) -> Self {
        FreePage { next_free_page_no }
    }
}

impl PageCodec for FreePage {
    fn decode(_page_no: PageNo, buf: &RawPage) -> Result<Self> {
        Ok(FreePage {
            next_free_page_no: get_u64(buf, 0),
        })
    }

    fn encode(&self, buf: &mut RawPage) {
        // Deliberately does not touch bytes [8..PAGE_SIZE): a freed page's
        // leftover content is undefined garbage, not zeroed.
        put_u64(buf, 0, self.next_free_page_no);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_only_touches_first_eight_bytes() {
        let mut buf = [0xABu8; PAGE_SIZE];
        FreePage::new(99).encode(&mut buf);
        assert_eq!(FreePage::decode(0, &buf).unwrap().next_free_page_no, 99);
        assert_eq!(buf[8], 0xAB);
    }
}
