// ABOUTME: Declared table set with per-table capability and deprecation flags
// ABOUTME: Also carries the fixed list of tables that make up chain state

use serde::Deserialize;
use std::collections::BTreeMap;

/// Whether a table holds one value per key or an ordered set of values per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Plain,
    /// dupsort: one key maps to several distinct values kept in ascending order
    MultiValue,
}

impl TableKind {
    pub fn from_dupsort(dupsort: bool) -> Self {
        if dupsort {
            TableKind::MultiValue
        } else {
            TableKind::Plain
        }
    }

    pub fn is_multi_value(self) -> bool {
        self == TableKind::MultiValue
    }
}

/// A table declaration, either built in or supplied through the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableDecl {
    pub name: String,
    #[serde(default)]
    pub dupsort: bool,
    #[serde(default)]
    pub deprecated: bool,
}

impl TableDecl {
    fn builtin(name: &str, dupsort: bool, deprecated: bool) -> Self {
        Self {
            name: name.to_string(),
            dupsort,
            deprecated,
        }
    }

    pub fn kind(&self) -> TableKind {
        TableKind::from_dupsort(self.dupsort)
    }
}

/// Tables that jointly constitute account/storage state, history and auxiliary indices.
pub const STATE_TABLES: &[&str] = &[
    "HashedAccount",
    "HashedStorage",
    "HashedCodeHash",
    "PlainState",
    "AccountChangeSet",
    "StorageChangeSet",
    "PlainCodeHash",
    "IncarnationMap",
    "Code",
    "TrieAccount",
    "TrieStorage",
    "AccountHistory",
    "StorageHistory",
    "TxLookup",
    "TEVMCode",
];

const DUPSORT_TABLES: &[&str] = &[
    "HashedStorage",
    "PlainState",
    "AccountChangeSet",
    "StorageChangeSet",
];

/// Old layouts kept only so that bulk operations know to skip them.
const DEPRECATED_TABLES: &[&str] = &["SSP", "SSU", "CST", "PLAIN-CST", "iTh", "CST2"];

/// Known tables keyed by name.
#[derive(Debug, Clone)]
pub struct Catalog {
    tables: BTreeMap<String, TableDecl>,
}

impl Default for Catalog {
    fn default() -> Self {
        let mut tables = BTreeMap::new();
        for name in STATE_TABLES {
            let decl = TableDecl::builtin(name, DUPSORT_TABLES.contains(name), false);
            tables.insert(decl.name.clone(), decl);
        }
        for name in DEPRECATED_TABLES {
            let decl = TableDecl::builtin(name, false, true);
            tables.insert(decl.name.clone(), decl);
        }
        Self { tables }
    }
}

impl Catalog {
    /// Catalog holding no declarations at all.
    pub fn empty() -> Self {
        Self {
            tables: BTreeMap::new(),
        }
    }

    /// Add or replace declarations; later entries win.
    pub fn extend(&mut self, decls: impl IntoIterator<Item = TableDecl>) {
        for decl in decls {
            self.tables.insert(decl.name.clone(), decl);
        }
    }

    pub fn get(&self, name: &str) -> Option<&TableDecl> {
        self.tables.get(name)
    }

    /// Declared kind of `name`, if the table is known.
    pub fn kind_of(&self, name: &str) -> Option<TableKind> {
        self.get(name).map(TableDecl::kind)
    }

    /// Unknown tables are never deprecated.
    pub fn is_deprecated(&self, name: &str) -> bool {
        self.get(name).is_some_and(|decl| decl.deprecated)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableDecl> {
        self.tables.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_declares_state_tables() {
        let catalog = Catalog::default();
        for name in STATE_TABLES {
            assert!(catalog.get(name).is_some(), "{} should be declared", name);
            assert!(!catalog.is_deprecated(name));
        }
        assert_eq!(catalog.kind_of("PlainState"), Some(TableKind::MultiValue));
        assert_eq!(catalog.kind_of("Code"), Some(TableKind::Plain));
        assert_eq!(catalog.kind_of("NoSuchTable"), None);
    }

    #[test]
    fn test_deprecated_tables() {
        let catalog = Catalog::default();
        assert!(catalog.is_deprecated("CST2"));
        assert!(!catalog.is_deprecated("unknown"));
    }

    #[test]
    fn test_extend_overrides_builtin() {
        let mut catalog = Catalog::default();
        catalog.extend(vec![
            TableDecl {
                name: "Code".to_string(),
                dupsort: false,
                deprecated: true,
            },
            TableDecl {
                name: "Receipts".to_string(),
                dupsort: true,
                deprecated: false,
            },
        ]);
        assert!(catalog.is_deprecated("Code"));
        assert_eq!(catalog.kind_of("Receipts"), Some(TableKind::MultiValue));
    }
}
