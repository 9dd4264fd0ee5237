//! B+ Tree Engine: search, insert (with splits), delete (with delayed-merge
//! coalesce/redistribute), and range scans, all built on the Space Manager.

use std::path::Path;

use log::{debug, trace, warn};

use crate::error::Result;
use crate::page::{
    is_leaf_tag, ChildSlot, InternalPage, InternalRecord, LeafPage, PageCodec, PageNo, Value,
    INTL_MAX, LEAF_MAX, NULL_PAGE,
};
use crate::space::SpaceManager;

pub struct BTree {
    space: SpaceManager,
}

/// Snapshot of whole-file bookkeeping, for the CLI's `x` command.
#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub page_count: u64,
    pub free_page_count: u64,
    pub depth: Option<usize>,
}

impl BTree {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(BTree {
            space: SpaceManager::open(path)?,
        })
    }

    /// Number of internal levels between the root and the leaves; `0` for a
    /// single-leaf tree, `None` if the tree is empty.
    pub fn depth(&mut self) -> Result<Option<usize>> {
        let header = self.space.read_header()?;
        if header.root_page_no == NULL_PAGE {
            return Ok(None);
        }
        let mut current = header.root_page_no;
        let mut depth = 0;
        loop {
            let raw = self.space.read_raw(current)?;
            if is_leaf_tag(&raw) {
                return Ok(Some(depth));
            }
            let page = InternalPage::decode(current, &raw)?;
            current = page.left_sibling_page_no;
            depth += 1;
        }
    }

    pub fn stats(&mut self) -> Result<Stats> {
        let header = self.space.read_header()?;
        let mut free_page_count = 0u64;
        let mut cursor = header.free_page_no;
        while cursor != NULL_PAGE {
            free_page_count += 1;
            let free: crate::page::FreePage = self.space.read_page(cursor)?;
            cursor = free.next_free_page_no;
        }
        Ok(Stats {
            page_count: header.page_count,
            free_page_count,
            depth: self.depth()?,
        })
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Descend from the root to the leaf that would contain `key`, or
    /// `None` if the tree is empty.
    fn find_leaf(&mut self, key: i64) -> Result<Option<PageNo>> {
        let header = self.space.read_header()?;
        if header.root_page_no == NULL_PAGE {
            return Ok(None);
        }
        let mut current = header.root_page_no;
        loop {
            let raw = self.space.read_raw(current)?;
            if is_leaf_tag(&raw) {
                return Ok(Some(current));
            }
            let page = InternalPage::decode(current, &raw)?;
            current = page.child_at(page.descend_slot(key));
        }
    }

    pub fn find(&mut self, key: i64) -> Result<Option<Value>> {
        let Some(leaf_no) = self.find_leaf(key)? else {
            return Ok(None);
        };
        let leaf: LeafPage = self.space.read_page(leaf_no)?;
        Ok(leaf.find(key))
    }

    /// Inclusive range scan `[k1, k2]`, ascending by key.
    pub fn find_range(&mut self, k1: i64, k2: i64) -> Result<Vec<(i64, Value)>> {
        let mut out = Vec::new();
        let Some(mut leaf_no) = self.find_leaf(k1)? else {
            return Ok(out);
        };
        loop {
            let leaf: LeafPage = self.space.read_page(leaf_no)?;
            for record in &leaf.records {
                if record.key > k2 {
                    return Ok(out);
                }
                if record.key >= k1 {
                    out.push((record.key, record.value));
                }
            }
            if leaf.right_sibling_page_no == NULL_PAGE {
                break;
            }
            leaf_no = leaf.right_sibling_page_no;
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Insert
    // ------------------------------------------------------------------

    /// Insert `(key, value)`. Returns `Ok(false)` without mutating anything
    /// if `key` already exists (silent duplicate rejection).
    pub fn insert(&mut self, key: i64, value: Value) -> Result<bool> {
        if self.find(key)?.is_some() {
            debug!("insert: key {key} already present, ignoring");
            return Ok(false);
        }

        let header = self.space.read_header()?;
        if header.root_page_no == NULL_PAGE {
            let leaf_no = self.space.alloc()?;
            let mut leaf = LeafPage::new(NULL_PAGE);
            leaf.insert(key, value);
            self.space.write_page(leaf_no, &leaf)?;
            let mut header = header;
            header.root_page_no = leaf_no;
            self.space.write_header(&header)?;
            trace!("insert: started new tree with root leaf {leaf_no}");
            return Ok(true);
        }

        let leaf_no = self
            .find_leaf(key)?
            .expect("root is non-null, a leaf must exist");
        let mut leaf: LeafPage = self.space.read_page(leaf_no)?;
        if !leaf.is_full() {
            leaf.insert(key, value);
            self.space.write_page(leaf_no, &leaf)?;
        } else {
            self.split_leaf_and_insert(leaf_no, leaf, key, value)?;
        }
        Ok(true)
    }

    fn split_leaf_and_insert(
        &mut self,
        leaf_no: PageNo,
        mut leaf: LeafPage,
        key: i64,
        value: Value,
    ) -> Result<()> {
        debug_assert!(leaf.is_full());
        leaf.insert(key, value); // working array of LEAF_MAX + 1, sorted

        let total = leaf.records.len();
        let split = (total + 1) / 2; // ceil(total / 2)
        let right_records = leaf.records.split_off(split);

        let mut right = LeafPage::new(leaf.parent_page_no);
        let old_right_sibling = leaf.right_sibling_page_no;
        right.records = right_records;
        right.right_sibling_page_no = old_right_sibling;

        let right_no = self.space.alloc()?;
        leaf.right_sibling_page_no = right_no;

        let new_key = right
            .smallest_key()
            .expect("right leaf is non-empty after split");

        self.space.write_page(leaf_no, &leaf)?;
        self.space.write_page(right_no, &right)?;
        debug!("insert: split leaf {leaf_no} -> {leaf_no}, {right_no} at key {new_key}");

        self.insert_into_parent(leaf_no, leaf.parent_page_no, new_key, right_no)
    }

    /// Attach `right` to `left`'s parent under separator `key`, splitting
    /// the parent (recursively, up to a new root) if it is full.
    fn insert_into_parent(
        &mut self,
        left_no: PageNo,
        parent_no: PageNo,
        key: i64,
        right_no: PageNo,
    ) -> Result<()> {
        if parent_no == NULL_PAGE {
            let new_root_no = self.space.alloc()?;
            let mut root = InternalPage::new(NULL_PAGE);
            root.left_sibling_page_no = left_no;
            root.records.push(InternalRecord { key, child: right_no });
            self.space.write_page(new_root_no, &root)?;
            self.set_parent(left_no, new_root_no)?;
            self.set_parent(right_no, new_root_no)?;

            let mut header = self.space.read_header()?;
            header.root_page_no = new_root_no;
            self.space.write_header(&header)?;
            debug!("insert: promoted new root {new_root_no}");
            return Ok(());
        }

        let mut parent: InternalPage = self.space.read_page(parent_no)?;
        let left_slot = parent
            .slot_of(left_no)
            .expect("left child must be findable in its parent");

        if !parent.is_full() {
            let pos = match left_slot {
                ChildSlot::LeftSibling => 0,
                ChildSlot::Record(i) => i + 1,
            };
            parent.records.insert(pos, InternalRecord { key, child: right_no });
            self.space.write_page(parent_no, &parent)?;
            Ok(())
        } else {
            self.split_internal_and_insert(parent_no, parent, left_slot, key, right_no)
        }
    }

    fn split_internal_and_insert(
        &mut self,
        parent_no: PageNo,
        parent: InternalPage,
        insert_slot: ChildSlot,
        key: i64,
        child: PageNo,
    ) -> Result<()> {
        let mut keys = parent.keys();
        let mut children = parent.children();
        let insert_pos = match insert_slot {
            ChildSlot::LeftSibling => 0,
            ChildSlot::Record(i) => i + 1,
        };
        keys.insert(insert_pos, key);
        children.insert(insert_pos + 1, child);

        // split = ceil((INTL_MAX + 1) / 2); the pivot at keys[split - 1] is
        // promoted upward and kept in neither child.
        let split = (keys.len() + 1) / 2;
        let pivot = keys[split - 1];

        let mut left = parent;
        left.rebuild(keys[..split - 1].to_vec(), children[..split].to_vec());

        let mut right = InternalPage::new(left.parent_page_no);
        right.rebuild(keys[split..].to_vec(), children[split..].to_vec());

        self.space.write_page(parent_no, &left)?;
        let right_no = self.space.alloc()?;
        self.space.write_page(right_no, &right)?;
        debug!("insert: split internal {parent_no} -> {parent_no}, {right_no} at pivot {pivot}");

        for child_no in right.children() {
            self.set_parent(child_no, right_no)?;
        }

        self.insert_into_parent(parent_no, left.parent_page_no, pivot, right_no)
    }

    /// Set `page_no`'s `parent_page_no` field, regardless of whether it is
    /// currently a leaf or an internal page.
    fn set_parent(&mut self, page_no: PageNo, new_parent: PageNo) -> Result<()> {
        let raw = self.space.read_raw(page_no)?;
        if is_leaf_tag(&raw) {
            let mut leaf = LeafPage::decode(page_no, &raw)?;
            leaf.parent_page_no = new_parent;
            self.space.write_page(page_no, &leaf)
        } else {
            let mut internal = InternalPage::decode(page_no, &raw)?;
            internal.parent_page_no = new_parent;
            self.space.write_page(page_no, &internal)
        }
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete `key`. Returns `Ok(false)` if it was absent.
    pub fn delete(&mut self, key: i64) -> Result<bool> {
        let Some(leaf_no) = self.find_leaf(key)? else {
            return Ok(false);
        };
        let mut leaf: LeafPage = self.space.read_page(leaf_no)?;
        let idx = match leaf.find_index(key) {
            Ok(idx) => idx,
            Err(_) => return Ok(false),
        };
        leaf.remove_at(idx);
        self.space.write_page(leaf_no, &leaf)?;

        let header = self.space.read_header()?;
        if header.root_page_no == leaf_no {
            self.adjust_root(leaf_no)?;
        } else if leaf.is_empty() {
            self.rebalance_leaf(leaf_no)?;
        }
        Ok(true)
    }

    /// Fix up the root after a deletion emptied it: promote the sole child
    /// if the root is internal, or empty the tree if the root is a leaf.
    fn adjust_root(&mut self, root_no: PageNo) -> Result<()> {
        let raw = self.space.read_raw(root_no)?;
        if is_leaf_tag(&raw) {
            let leaf = LeafPage::decode(root_no, &raw)?;
            if leaf.key_count() > 0 {
                return Ok(());
            }
            let mut header = self.space.read_header()?;
            header.root_page_no = NULL_PAGE;
            self.space.write_header(&header)?;
            self.space.free(root_no)?;
            debug!("delete: tree emptied, freed root leaf {root_no}");
        } else {
            let internal = InternalPage::decode(root_no, &raw)?;
            if internal.key_count() > 0 {
                return Ok(());
            }
            let new_root_no = internal.left_sibling_page_no;
            self.set_parent(new_root_no, NULL_PAGE)?;
            let mut header = self.space.read_header()?;
            header.root_page_no = new_root_no;
            self.space.write_header(&header)?;
            self.space.free(root_no)?;
            debug!("delete: promoted {new_root_no} to new root, freed {root_no}");
        }
        Ok(())
    }

    /// `leaf_no` has just become empty and is not the root: coalesce it
    /// into a sibling, or redistribute one record across the boundary.
    fn rebalance_leaf(&mut self, leaf_no: PageNo) -> Result<()> {
        let leaf: LeafPage = self.space.read_page(leaf_no)?;
        debug_assert!(leaf.is_empty());
        let parent_no = leaf.parent_page_no;
        let mut parent: InternalPage = self.space.read_page(parent_no)?;
        let slot = parent
            .slot_of(leaf_no)
            .expect("leaf must be a child of its parent");

        match slot {
            ChildSlot::Record(idx) => {
                let left_no = if idx == 0 {
                    parent.left_sibling_page_no
                } else {
                    parent.records[idx - 1].child
                };
                let mut left: LeafPage = self.space.read_page(left_no)?;

                if left.key_count() + leaf.key_count() < LEAF_MAX {
                    left.append_all(&leaf);
                    left.right_sibling_page_no = leaf.right_sibling_page_no;
                    self.space.write_page(left_no, &left)?;
                    self.space.free(leaf_no)?;
                    debug!("delete: coalesced empty leaf {leaf_no} into left sibling {left_no}");
                    self.remove_parent_entry(parent_no, &mut parent, idx)?;
                } else {
                    let mut leaf = leaf;
                    left.steal_high_into(&mut leaf);
                    parent.records[idx].key =
                        leaf.smallest_key().expect("leaf non-empty after steal");
                    self.space.write_page(left_no, &left)?;
                    self.space.write_page(leaf_no, &leaf)?;
                    self.space.write_page(parent_no, &parent)?;
                    debug!("delete: redistributed from left sibling {left_no} into {leaf_no}");
                }
            }
            ChildSlot::LeftSibling => {
                if parent.key_count() == 0 {
                    warn!("delete: leftmost leaf {leaf_no}'s parent has no right sibling either");
                    return Ok(());
                }
                let right_no = parent.records[0].child;
                let mut right: LeafPage = self.space.read_page(right_no)?;

                if leaf.key_count() + right.key_count() < LEAF_MAX {
                    let mut leaf = leaf;
                    leaf.append_all(&right);
                    leaf.right_sibling_page_no = right.right_sibling_page_no;
                    self.space.write_page(leaf_no, &leaf)?;
                    self.space.free(right_no)?;
                    debug!("delete: coalesced right sibling {right_no} into leftmost leaf {leaf_no}");
                    self.remove_parent_entry(parent_no, &mut parent, 0)?;
                } else {
                    let mut leaf = leaf;
                    right.steal_low_into(&mut leaf);
                    parent.records[0].key =
                        right.smallest_key().expect("right non-empty after steal");
                    self.space.write_page(leaf_no, &leaf)?;
                    self.space.write_page(right_no, &right)?;
                    self.space.write_page(parent_no, &parent)?;
                    debug!("delete: redistributed from right sibling {right_no} into {leaf_no}");
                }
            }
        }
        Ok(())
    }

    /// `node_no` has just become an empty internal page and is not the
    /// root: coalesce it into a sibling, or redistribute one child across
    /// the boundary.
    fn rebalance_internal(&mut self, node_no: PageNo) -> Result<()> {
        let node: InternalPage = self.space.read_page(node_no)?;
        debug_assert!(node.is_empty());
        let parent_no = node.parent_page_no;
        let mut parent: InternalPage = self.space.read_page(parent_no)?;
        let slot = parent
            .slot_of(node_no)
            .expect("node must be a child of its parent");

        match slot {
            ChildSlot::Record(idx) => {
                let left_no = if idx == 0 {
                    parent.left_sibling_page_no
                } else {
                    parent.records[idx - 1].child
                };
                let mut left: InternalPage = self.space.read_page(left_no)?;
                let k_prime = parent.records[idx].key;

                if left.key_count() + node.key_count() < INTL_MAX {
                    let only_child = node.left_sibling_page_no;
                    left.records.push(InternalRecord { key: k_prime, child: only_child });
                    self.set_parent(only_child, left_no)?;
                    self.space.write_page(left_no, &left)?;
                    self.space.free(node_no)?;
                    debug!("delete: coalesced empty internal {node_no} into left sibling {left_no}");
                    self.remove_parent_entry(parent_no, &mut parent, idx)?;
                } else {
                    let mut left_keys = left.keys();
                    let mut left_children = left.children();
                    let moved_child = left_children.pop().expect("left has a rightmost child");
                    let promoted_key = left_keys.pop().expect("left has a rightmost key");
                    left.rebuild(left_keys, left_children);

                    let mut node = node;
                    let mut node_keys = node.keys();
                    let mut node_children = node.children();
                    node_children.insert(0, moved_child);
                    node_keys.insert(0, k_prime);
                    node.rebuild(node_keys, node_children);
                    self.set_parent(moved_child, node_no)?;

                    parent.records[idx].key = promoted_key;

                    self.space.write_page(left_no, &left)?;
                    self.space.write_page(node_no, &node)?;
                    self.space.write_page(parent_no, &parent)?;
                    debug!("delete: redistributed from left internal sibling {left_no} into {node_no}");
                }
            }
            ChildSlot::LeftSibling => {
                if parent.key_count() == 0 {
                    warn!("delete: leftmost internal {node_no}'s parent has no right sibling either");
                    return Ok(());
                }
                let right_no = parent.records[0].child;
                let right: InternalPage = self.space.read_page(right_no)?;
                let k_prime = parent.records[0].key;

                if node.key_count() + right.key_count() < INTL_MAX {
                    let mut node = node;
                    node.records
                        .push(InternalRecord { key: k_prime, child: right.left_sibling_page_no });
                    self.set_parent(right.left_sibling_page_no, node_no)?;
                    for record in &right.records {
                        node.records.push(*record);
                        self.set_parent(record.child, node_no)?;
                    }
                    self.space.write_page(node_no, &node)?;
                    self.space.free(right_no)?;
                    debug!("delete: coalesced right internal sibling {right_no} into leftmost {node_no}");
                    self.remove_parent_entry(parent_no, &mut parent, 0)?;
                } else {
                    let mut right = right;
                    let mut right_keys = right.keys();
                    let mut right_children = right.children();
                    let moved_child = right_children.remove(0);
                    let moved_key = right_keys.remove(0);
                    right.rebuild(right_keys, right_children);

                    let mut node = node;
                    node.records.push(InternalRecord { key: k_prime, child: moved_child });
                    self.set_parent(moved_child, node_no)?;

                    parent.records[0].key = moved_key;

                    self.space.write_page(node_no, &node)?;
                    self.space.write_page(right_no, &right)?;
                    self.space.write_page(parent_no, &parent)?;
                    debug!("delete: redistributed from right internal sibling {right_no} into {node_no}");
                }
            }
        }
        Ok(())
    }

    /// Remove `parent.records[idx]` (an entry that pointed at a just-freed
    /// child) and propagate underflow handling upward if needed.
    fn remove_parent_entry(
        &mut self,
        parent_no: PageNo,
        parent: &mut InternalPage,
        idx: usize,
    ) -> Result<()> {
        parent.records.remove(idx);
        self.space.write_page(parent_no, parent)?;

        let header = self.space.read_header()?;
        if header.root_page_no == parent_no {
            self.adjust_root(parent_no)
        } else if parent.is_empty() {
            self.rebalance_internal(parent_no)
        } else {
            Ok(())
        }
    }
}
