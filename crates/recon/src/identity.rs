//! Unit keys and per-unit student identity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::StudentId;

/// Characters the store refuses in keys.
const ILLEGAL_KEY_CHARS: [char; 6] = ['.', '$', '#', '[', ']', '/'];

/// Derive the store key for a unit display name.
///
/// Trimmed, lowercased, whitespace runs collapsed to `-`, illegal key
/// characters dropped. Deterministic.
pub fn unit_id_for(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let mut id = String::with_capacity(lowered.len());
    let mut in_space = false;

    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_space {
                id.push('-');
                in_space = true;
            }
            continue;
        }
        in_space = false;
        if !ILLEGAL_KEY_CHARS.contains(&c) {
            id.push(c);
        }
    }

    id
}

/// Student id to display name, one entry per exact trimmed spelling.
///
/// Entries are only ever added. The same spelling always maps back to the
/// same id; different spellings never share one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentRegistry {
    names: BTreeMap<StudentId, String>,
}

impl StudentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Existing id for a name, if any.
    pub fn id_for(&self, name: &str) -> Option<StudentId> {
        let name = name.trim();
        self.names
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| id.clone())
    }

    pub fn name_of(&self, id: &StudentId) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Existing id for the name, or a freshly issued one.
    pub fn issue(&mut self, name: &str) -> StudentId {
        if let Some(id) = self.id_for(name) {
            return id;
        }
        let id = StudentId::issue();
        self.names.insert(id.clone(), name.trim().to_string());
        id
    }

    /// Entries present here but not in `older`.
    pub fn added_since(&self, older: &StudentRegistry) -> Vec<(StudentId, String)> {
        self.names
            .iter()
            .filter(|(id, _)| !older.names.contains_key(*id))
            .map(|(id, name)| (id.clone(), name.clone()))
            .collect()
    }

    /// Merge entries from `other` without overwriting existing ids.
    pub fn merge(&mut self, other: &StudentRegistry) {
        for (id, name) in &other.names {
            self.names.entry(id.clone()).or_insert_with(|| name.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StudentId, &str)> {
        self.names.iter().map(|(id, name)| (id, name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_id_is_deterministic() {
        assert_eq!(unit_id_for("Unidade Centro"), "unidade-centro");
        assert_eq!(unit_id_for("  Unidade   Centro \t"), "unidade-centro");
        assert_eq!(unit_id_for("Unidade Centro"), unit_id_for("unidade centro"));
    }

    #[test]
    fn unit_id_strips_illegal_key_chars() {
        assert_eq!(unit_id_for("St. Mary's [North]/B#1 $"), "st-mary's-northb1-");
        assert_eq!(unit_id_for("a.b"), "ab");
    }

    #[test]
    fn same_spelling_same_id() {
        let mut registry = StudentRegistry::new();
        let a = registry.issue("Ana Silva");
        let b = registry.issue(" Ana Silva ");
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.name_of(&a), Some("Ana Silva"));
    }

    #[test]
    fn different_spellings_never_share() {
        let mut registry = StudentRegistry::new();
        let a = registry.issue("Ana Silva");
        let b = registry.issue("Ana  Silva");
        let c = registry.issue("ana silva");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn added_since_and_merge() {
        let mut old = StudentRegistry::new();
        let ana = old.issue("Ana Silva");

        let mut new = old.clone();
        let bruno = new.issue("Bruno Costa");

        let added = new.added_since(&old);
        assert_eq!(added, vec![(bruno.clone(), "Bruno Costa".to_string())]);

        old.merge(&new);
        assert_eq!(old.id_for("Ana Silva"), Some(ana));
        assert_eq!(old.id_for("Bruno Costa"), Some(bruno));
    }

    #[test]
    fn serializes_as_plain_map() {
        let mut registry = StudentRegistry::new();
        let id = registry.issue("Ana Silva");
        let json = serde_json::to_value(&registry).unwrap();
        assert_eq!(json[id.as_str()], "Ana Silva");

        let back: StudentRegistry = serde_json::from_value(json).unwrap();
        assert_eq!(back, registry);
    }
}
