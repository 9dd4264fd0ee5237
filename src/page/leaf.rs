use super::{corrupt, get_i64, get_u64, put_i64, put_u64, PageCodec, PageNo, RawPage, Value};
use super::{LEAF_MAX, PAGE_SIZE, VALUE_LEN};
use crate::error::Result;

const OFFSET_PARENT: usize = 0;
const OFFSET_IS_LEAF: usize = 8;
const OFFSET_KEY_COUNT: usize = 9;
const OFFSET_RIGHT_SIBLING: usize = 120;
const OFFSET_RECORDS: usize = 128;
const RECORD_LEN: usize = 8 + VALUE_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafRecord {
    pub key: i64,
    pub value: Value,
}

/// A leaf page: `key_count` live, sorted `(key, value)` records plus a
/// pointer to the next leaf in key order.
#[derive(Debug, Clone)]
pub struct LeafPage {
    pub parent_page_no: PageNo,
    pub right_sibling_page_no: PageNo,
    pub records: Vec<LeafRecord>,
}

impl LeafPage {
    pub fn new(parent_page_no: PageNo) -> Self {
        LeafPage {
            parent_page_no,
            right_sibling_page_no: 0,
            records: Vec::new(),
        }
    }

    pub fn key_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= LEAF_MAX
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `Ok(idx)` if `key` is present at `idx`; `Err(idx)` if absent, where
    /// `idx` is the sorted insertion point.
    pub fn find_index(&self, key: i64) -> std::result::Result<usize, usize> {
        self.records.binary_search_by_key(&key, |r| r.key)
    }

    pub fn find(&self, key: i64) -> Option<Value> {
        self.find_index(key).ok().map(|idx| self.records[idx].value)
    }

    /// Insert a new record at its sorted position. Caller must have already
    /// checked `!is_full()` and that `key` is absent.
    pub fn insert(&mut self, key: i64, value: Value) {
        let idx = self
            .find_index(key)
            .expect_err("duplicate key inserted into leaf");
        self.records.insert(idx, LeafRecord { key, value });
    }

    /// Remove the record at `idx`, returning it.
    pub fn remove_at(&mut self, idx: usize) -> LeafRecord {
        self.records.remove(idx)
    }

    pub fn smallest_key(&self) -> Option<i64> {
        self.records.first().map(|r| r.key)
    }

    /// Append all of `other`'s records after this page's own (used when
    /// coalescing `other`, the right neighbor, into `self`).
    pub fn append_all(&mut self, other: &LeafPage) {
        self.records.extend_from_slice(&other.records);
    }

    /// Move this page's last record to the front of `other` (redistribute,
    /// neighbor-is-left case: `self` is the left neighbor donating to the
    /// underflowed right page `other`).
    pub fn steal_high_into(&mut self, other: &mut LeafPage) {
        let record = self.records.pop().expect("steal from empty leaf");
        other.records.insert(0, record);
    }

    /// Move this page's first record to the back of `other` (redistribute,
    /// neighbor-is-right case).
    pub fn steal_low_into(&mut self, other: &mut LeafPage) {
        let record = self.records.remove(0);
        other.records.push(record);
    }
}

impl PageCodec for LeafPage {
    fn decode(page_no: PageNo, buf: &RawPage) -> Result<Self> {
        let parent_page_no = get_u64(buf, OFFSET_PARENT);
        if buf[OFFSET_IS_LEAF] == 0 {
            return Err(corrupt(page_no, "expected leaf page, found internal tag"));
        }
        let key_count = buf[OFFSET_KEY_COUNT] as usize;
        if key_count > LEAF_MAX {
            return Err(corrupt(page_no, format!("key_count {key_count} exceeds LEAF_MAX")));
        }
        let right_sibling_page_no = get_u64(buf, OFFSET_RIGHT_SIBLING);
        let mut records = Vec::with_capacity(key_count);
        for i in 0..key_count {
            let offset = OFFSET_RECORDS + i * RECORD_LEN;
            let key = get_i64(buf, offset);
            let value = Value::from_bytes(&buf[offset + 8..offset + RECORD_LEN]);
            records.push(LeafRecord { key, value });
        }
        Ok(LeafPage {
            parent_page_no,
            right_sibling_page_no,
            records,
        })
    }

    fn encode(&self, buf: &mut RawPage) {
        *buf = [0u8; PAGE_SIZE];
        put_u64(buf, OFFSET_PARENT, self.parent_page_no);
        buf[OFFSET_IS_LEAF] = 1;
        buf[OFFSET_KEY_COUNT] = self.records.len() as u8;
        put_u64(buf, OFFSET_RIGHT_SIBLING, self.right_sibling_page_no);
        for (i, record) in self.records.iter().enumerate() {
            let offset = OFFSET_RECORDS + i * RECORD_LEN;
            put_i64(buf, offset, record.key);
            buf[offset + 8..offset + RECORD_LEN].copy_from_slice(&record.value.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_with(keys: &[i64]) -> LeafPage {
        let mut leaf = LeafPage::new(0);
        for &k in keys {
            leaf.insert(k, Value::from("v"));
        }
        leaf
    }

    #[test]
    fn insert_keeps_sorted_order() {
        let leaf = leaf_with(&[30, 10, 20]);
        let keys: Vec<i64> = leaf.records.iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![10, 20, 30]);
    }

    #[test]
    fn round_trips_through_bytes() {
        let leaf = leaf_with(&[1, 2, 3]);
        let mut buf = [0u8; PAGE_SIZE];
        leaf.encode(&mut buf);
        let decoded = LeafPage::decode(5, &buf).unwrap();
        assert_eq!(decoded.parent_page_no, 0);
        let keys: Vec<i64> = decoded.records.iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![1, 2, 3]);
    }

    #[test]
    fn decode_rejects_internal_tag() {
        let mut buf = [0u8; PAGE_SIZE];
        buf[OFFSET_IS_LEAF] = 0;
        assert!(LeafPage::decode(1, &buf).is_err());
    }
}
