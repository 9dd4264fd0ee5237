use super::{corrupt, get_i64, get_u64, put_i64, put_u64, PageCodec, PageNo, RawPage};
use super::{INTL_MAX, NULL_PAGE, PAGE_SIZE};
use crate::error::Result;

const OFFSET_PARENT: usize = 0;
const OFFSET_IS_LEAF: usize = 8;
const OFFSET_KEY_COUNT: usize = 9;
const OFFSET_LEFT_SIBLING: usize = 120;
const OFFSET_RECORDS: usize = 128;
const RECORD_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalRecord {
    pub key: i64,
    pub child: PageNo,
}

/// Which pointer slot of an internal page a given child occupies.
///
/// `LeftSibling` replaces the reference implementation's `-1` sentinel for
/// "this is the leftmost child, with no key preceding it".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildSlot {
    LeftSibling,
    Record(usize),
}

/// An internal (directory) page. Holds `key_count` separator keys and
/// `key_count + 1` children: `left_sibling_page_no` followed by
/// `records[i].child` for `i` in `0..key_count`.
#[derive(Debug, Clone)]
pub struct InternalPage {
    pub parent_page_no: PageNo,
    pub left_sibling_page_no: PageNo,
    pub records: Vec<InternalRecord>,
}

impl InternalPage {
    pub fn new(parent_page_no: PageNo) -> Self {
        InternalPage {
            parent_page_no,
            left_sibling_page_no: NULL_PAGE,
            records: Vec::new(),
        }
    }

    pub fn key_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= INTL_MAX
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All `key_count + 1` children, left to right.
    pub fn children(&self) -> Vec<PageNo> {
        let mut out = Vec::with_capacity(self.records.len() + 1);
        out.push(self.left_sibling_page_no);
        out.extend(self.records.iter().map(|r| r.child));
        out
    }

    /// All `key_count` separator keys, left to right.
    pub fn keys(&self) -> Vec<i64> {
        self.records.iter().map(|r| r.key).collect()
    }

    /// Replace this page's contents from a flattened `(keys, children)` pair.
    /// `children.len()` must equal `keys.len() + 1`.
    pub fn rebuild(&mut self, keys: Vec<i64>, children: Vec<PageNo>) {
        debug_assert_eq!(children.len(), keys.len() + 1);
        self.left_sibling_page_no = children[0];
        self.records = keys
            .into_iter()
            .zip(children[1..].iter().copied())
            .map(|(key, child)| InternalRecord { key, child })
            .collect();
    }

    /// Find the slot for the child that the search for `key` should descend
    /// into: `left_sibling` if `key` precedes every record's key, otherwise
    /// the last record whose key is `<= key`.
    pub fn descend_slot(&self, key: i64) -> ChildSlot {
        match self.records.iter().rposition(|r| r.key <= key) {
            Some(idx) => ChildSlot::Record(idx),
            None => ChildSlot::LeftSibling,
        }
    }

    pub fn child_at(&self, slot: ChildSlot) -> PageNo {
        match slot {
            ChildSlot::LeftSibling => self.left_sibling_page_no,
            ChildSlot::Record(idx) => self.records[idx].child,
        }
    }

    /// Which slot holds a pointer to `child`, if any.
    pub fn slot_of(&self, child: PageNo) -> Option<ChildSlot> {
        if self.left_sibling_page_no == child {
            return Some(ChildSlot::LeftSibling);
        }
        self.records
            .iter()
            .position(|r| r.child == child)
            .map(ChildSlot::Record)
    }
}

impl PageCodec for InternalPage {
    fn decode(page_no: PageNo, buf: &RawPage) -> Result<Self> {
        let parent_page_no = get_u64(buf, OFFSET_PARENT);
        if buf[OFFSET_IS_LEAF] != 0 {
            return Err(corrupt(page_no, "expected internal page, found leaf tag"));
        }
        let key_count = buf[OFFSET_KEY_COUNT] as usize;
        if key_count > INTL_MAX {
            return Err(corrupt(page_no, format!("key_count {key_count} exceeds INTL_MAX")));
        }
        let left_sibling_page_no = get_u64(buf, OFFSET_LEFT_SIBLING);
        let mut records = Vec::with_capacity(key_count);
        for i in 0..key_count {
            let offset = OFFSET_RECORDS + i * RECORD_LEN;
            let key = get_i64(buf, offset);
            let child = get_u64(buf, offset + 8);
            records.push(InternalRecord { key, child });
        }
        Ok(InternalPage {
            parent_page_no,
            left_sibling_page_no,
            records,
        })
    }

    fn encode(&self, buf: &mut RawPage) {
        *buf = [0u8; PAGE_SIZE];
        put_u64(buf, OFFSET_PARENT, self.parent_page_no);
        buf[OFFSET_IS_LEAF] = 0;
        buf[OFFSET_KEY_COUNT] = self.records.len() as u8;
        put_u64(buf, OFFSET_LEFT_SIBLING, self.left_sibling_page_no);
        for (i, record) in self.records.iter().enumerate() {
            let offset = OFFSET_RECORDS + i * RECORD_LEN;
            put_i64(buf, offset, record.key);
            put_u64(buf, offset + 8, record.child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> InternalPage {
        let mut p = InternalPage::new(0);
        p.left_sibling_page_no = 2;
        p.records = vec![
            InternalRecord { key: 10, child: 3 },
            InternalRecord { key: 20, child: 4 },
        ];
        p
    }

    #[test]
    fn descend_slot_picks_left_sibling_below_first_key() {
        assert!(matches!(page().descend_slot(5), ChildSlot::LeftSibling));
    }

    #[test]
    fn descend_slot_picks_matching_record() {
        assert!(matches!(page().descend_slot(10), ChildSlot::Record(0)));
        assert!(matches!(page().descend_slot(15), ChildSlot::Record(0)));
        assert!(matches!(page().descend_slot(25), ChildSlot::Record(1)));
    }

    #[test]
    fn children_and_keys_flatten_correctly() {
        let p = page();
        assert_eq!(p.children(), vec![2, 3, 4]);
        assert_eq!(p.keys(), vec![10, 20]);
    }

    #[test]
    fn rebuild_restores_from_flattened_form() {
        let mut p = InternalPage::new(0);
        p.rebuild(vec![10, 20], vec![2, 3, 4]);
        assert_eq!(p.left_sibling_page_no, 2);
        assert_eq!(p.records[0], InternalRecord { key: 10, child: 3 });
        assert_eq!(p.records[1], InternalRecord { key: 20, child: 4 });
    }

    #[test]
    fn round_trips_through_bytes() {
        let p = page();
        let mut buf = [0u8; PAGE_SIZE];
        p.encode(&mut buf);
        let decoded = InternalPage::decode(9, &buf).unwrap();
        assert_eq!(decoded.left_sibling_page_no, 2);
        assert_eq!(decoded.records, p.records);
    }

    #[test]
    fn decode_rejects_leaf_tag() {
        let mut buf = [0u8; PAGE_SIZE];
        buf[OFFSET_IS_LEAF] = 1;
        assert!(InternalPage::decode(1, &buf).is_err());
    }
}
