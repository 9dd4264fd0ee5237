//! Table registry: maps an opaque `table_id` to an open [`BTree`] handle.
//!
//! There is no persistent catalog; `table_id`s are assigned in
//! [`Database::open_table`] call order and only live for the process's
//! lifetime, per the single-table-per-open-call contract of the underlying
//! engine.

use std::path::Path;

use log::info;

use crate::btree::{BTree, Stats};
use crate::error::{Error, Result};
use crate::page::Value;

#[derive(Default)]
pub struct Database {
    tables: Vec<BTree>,
}

impl Database {
    pub fn new() -> Self {
        Database { tables: Vec::new() }
    }

    /// Open (or create) the file at `path` as a new table, returning the
    /// `table_id` future calls address it by.
    pub fn open_table(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let tree = BTree::open(path)?;
        self.tables.push(tree);
        let table_id = self.tables.len() - 1;
        info!("db: opened table {table_id}");
        Ok(table_id)
    }

    pub fn insert(&mut self, table_id: usize, key: i64, value: Value) -> Result<bool> {
        self.table_mut(table_id)?.insert(key, value)
    }

    pub fn find(&mut self, table_id: usize, key: i64) -> Result<Option<Value>> {
        self.table_mut(table_id)?.find(key)
    }

    pub fn delete(&mut self, table_id: usize, key: i64) -> Result<bool> {
        self.table_mut(table_id)?.delete(key)
    }

    pub fn find_range(&mut self, table_id: usize, k1: i64, k2: i64) -> Result<Vec<(i64, Value)>> {
        self.table_mut(table_id)?.find_range(k1, k2)
    }

    pub fn depth(&mut self, table_id: usize) -> Result<Option<usize>> {
        self.table_mut(table_id)?.depth()
    }

    pub fn stats(&mut self, table_id: usize) -> Result<Stats> {
        self.table_mut(table_id)?.stats()
    }

    fn table_mut(&mut self, table_id: usize) -> Result<&mut BTree> {
        self.tables
            .get_mut(table_id)
            .ok_or(Error::UnknownTable(table_id))
    }

    /// Thin int-coded adapter over the `Result`-returning API above,
    /// mirroring the external C-shaped interface: `0` on success,
    /// nonzero only on a fatal error. A duplicate key is a silent no-op,
    /// not a failure, so it also returns `0`. Intended for the CLI only;
    /// library callers should prefer the typed methods.
    pub fn db_insert_code(&mut self, table_id: usize, key: i64, value: &str) -> i32 {
        match self.insert(table_id, key, Value::from(value)) {
            Ok(true) | Ok(false) => 0,
            Err(_) => 1,
        }
    }

    /// Int-coded adapter over `find`: `0` and `*out_value` set on a hit,
    /// nonzero (and `*out_value` left untouched) on a miss or error.
    /// Mirrors the `db_find(key, out_value)` out-param shape.
    pub fn db_find_code(&mut self, table_id: usize, key: i64, out_value: &mut Value) -> i32 {
        match self.find(table_id, key) {
            Ok(Some(value)) => {
                *out_value = value;
                0
            }
            Ok(None) | Err(_) => 1,
        }
    }

    pub fn db_delete_code(&mut self, table_id: usize, key: i64) -> i32 {
        match self.delete(table_id, key) {
            Ok(true) => 0,
            Ok(false) | Err(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn fresh_path() -> NamedTempFile {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::remove_file(tmp.path()).unwrap();
        tmp
    }

    #[test]
    fn open_table_assigns_sequential_ids() {
        let mut db = Database::new();
        let t1 = fresh_path();
        let t2 = fresh_path();
        let id1 = db.open_table(t1.path()).unwrap();
        let id2 = db.open_table(t2.path()).unwrap();
        assert_eq!(id1, 0);
        assert_eq!(id2, 1);
    }

    #[test]
    fn operations_on_unknown_table_id_error() {
        let mut db = Database::new();
        assert!(matches!(db.find(0, 1), Err(Error::UnknownTable(0))));
    }

    #[test]
    fn insert_find_delete_are_routed_to_the_right_table() {
        let mut db = Database::new();
        let a = fresh_path();
        let b = fresh_path();
        let id_a = db.open_table(a.path()).unwrap();
        let id_b = db.open_table(b.path()).unwrap();

        db.insert(id_a, 1, Value::from("a")).unwrap();
        db.insert(id_b, 1, Value::from("b")).unwrap();

        assert_eq!(db.find(id_a, 1).unwrap().unwrap().as_str(), "a");
        assert_eq!(db.find(id_b, 1).unwrap().unwrap().as_str(), "b");

        assert!(db.delete(id_a, 1).unwrap());
        assert!(db.find(id_a, 1).unwrap().is_none());
        assert!(db.find(id_b, 1).unwrap().is_some());
    }

    #[test]
    fn db_insert_code_is_zero_for_duplicate_key() {
        let mut db = Database::new();
        let t = fresh_path();
        let id = db.open_table(t.path()).unwrap();

        assert_eq!(db.db_insert_code(id, 1, "a"), 0);
        assert_eq!(db.db_insert_code(id, 1, "b"), 0);
        assert_eq!(db.find(id, 1).unwrap().unwrap().as_str(), "a");
    }

    #[test]
    fn db_find_code_sets_out_value_on_hit_only() {
        let mut db = Database::new();
        let t = fresh_path();
        let id = db.open_table(t.path()).unwrap();
        db.insert(id, 1, Value::from("a")).unwrap();

        let mut out = Value::from("");
        assert_eq!(db.db_find_code(id, 1, &mut out), 0);
        assert_eq!(out.as_str(), "a");

        let mut miss = Value::from("untouched");
        assert_eq!(db.db_find_code(id, 2, &mut miss), 1);
        assert_eq!(miss.as_str(), "untouched");
    }
}
