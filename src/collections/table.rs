//! Table Module
//!
//! Two-level `row -> column -> value` storage.

use std::collections::HashMap;
use std::hash::Hash;

// == Table ==
/// A map of rows, each holding a map of columns.
///
/// A row exists only while it has at least one column: removing the last
/// cell prunes the row, and `set_row` with an empty map removes it.
#[derive(Debug, Clone)]
pub struct Table<R, C, V> {
    rows: HashMap<R, HashMap<C, V>>,
}

impl<R, C, V> Default for Table<R, C, V> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }
}

impl<R, C, V> Table<R, C, V>
where
    R: Eq + Hash,
    C: Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    // == Set ==
    /// Stores `value` at `(row, column)`, creating the row if needed.
    ///
    /// # Returns
    /// The value previously stored in that cell.
    pub fn set(&mut self, row: R, column: C, value: V) -> Option<V> {
        self.rows.entry(row).or_default().insert(column, value)
    }

    // == Get ==
    pub fn get(&self, row: &R, column: &C) -> Option<&V> {
        self.rows.get(row).and_then(|columns| columns.get(column))
    }

    pub fn contains(&self, row: &R, column: &C) -> bool {
        self.get(row, column).is_some()
    }

    // == Remove ==
    /// Removes one cell, pruning the row if it becomes empty.
    pub fn remove(&mut self, row: &R, column: &C) -> Option<V> {
        let columns = self.rows.get_mut(row)?;
        let removed = columns.remove(column);
        if columns.is_empty() {
            self.rows.remove(row);
        }
        removed
    }

    // == Rows ==
    /// Replaces a whole row.
    ///
    /// # Returns
    /// The previous columns of the row, if it existed.
    pub fn set_row(&mut self, row: R, columns: HashMap<C, V>) -> Option<HashMap<C, V>> {
        if columns.is_empty() {
            return self.rows.remove(&row);
        }
        self.rows.insert(row, columns)
    }

    pub fn get_row(&self, row: &R) -> Option<&HashMap<C, V>> {
        self.rows.get(row)
    }

    pub fn remove_row(&mut self, row: &R) -> Option<HashMap<C, V>> {
        self.rows.remove(row)
    }

    /// Iterates over the row keys.
    pub fn row_keys(&self) -> impl Iterator<Item = &R> {
        self.rows.keys()
    }

    /// Iterates over every cell value, row by row.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.rows.values().flat_map(|columns| columns.values())
    }

    // == Length ==
    /// Returns the number of occupied cells.
    pub fn len(&self) -> usize {
        self.rows.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_set_and_get() {
        let mut table = Table::new();

        assert_eq!(table.set("alice", "age", 30), None);
        assert_eq!(table.set("alice", "age", 31), Some(30));

        assert_eq!(table.get(&"alice", &"age"), Some(&31));
        assert_eq!(table.get(&"alice", &"height"), None);
        assert_eq!(table.get(&"bob", &"age"), None);
    }

    #[test]
    fn test_table_rows_created_lazily() {
        let mut table: Table<&str, &str, i32> = Table::new();
        assert!(table.get_row(&"alice").is_none());

        table.set("alice", "age", 30);

        assert_eq!(table.get_row(&"alice").map(HashMap::len), Some(1));
        assert_eq!(table.row_keys().count(), 1);
    }

    #[test]
    fn test_table_set_row_replaces_columns() {
        let mut table = Table::new();
        table.set("alice", "age", 30);
        table.set("alice", "weight", 60);

        let replacement = HashMap::from([("height", 170)]);
        let old = table.set_row("alice", replacement).unwrap();

        assert_eq!(old.len(), 2);
        assert_eq!(table.get(&"alice", &"age"), None);
        assert_eq!(table.get(&"alice", &"height"), Some(&170));
    }

    #[test]
    fn test_table_empty_set_row_removes_row() {
        let mut table = Table::new();
        table.set("alice", "age", 30);

        let old = table.set_row("alice", HashMap::new());

        assert!(old.is_some());
        assert!(table.is_empty());
        assert_eq!(table.row_keys().count(), 0);
    }

    #[test]
    fn test_table_remove_last_cell_prunes_row() {
        let mut table = Table::new();
        table.set("alice", "age", 30);
        table.set("bob", "age", 40);

        assert_eq!(table.remove(&"alice", &"age"), Some(30));
        assert_eq!(table.remove(&"alice", &"age"), None);

        let rows: Vec<_> = table.row_keys().collect();
        assert_eq!(rows, vec![&"bob"]);
    }

    #[test]
    fn test_table_values_flatten_all_cells() {
        let mut table = Table::new();
        table.set(1, 'a', 10);
        table.set(1, 'b', 20);
        table.set(2, 'a', 30);
        table.set(1, 'a', 11);

        let mut values: Vec<i32> = table.values().copied().collect();
        values.sort_unstable();

        assert_eq!(values, vec![11, 20, 30]);
        assert_eq!(table.len(), 3);
    }
}
