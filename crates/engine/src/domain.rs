//! Class domain: the set of classification labels under analysis

use serde::{Deserialize, Serialize};

use gridshift_core::{Error, Result};

/// The set of class labels participating in a change-matrix computation.
///
/// Labels are stored sorted ascending and deduplicated, which fixes the
/// enumeration order of the matrix cross product. Label 0 is reserved for
/// no-data pixels and cannot be part of a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDomain {
    classes: Vec<u16>,
}

impl ClassDomain {
    /// Build a domain from an arbitrary label collection.
    ///
    /// Duplicates are collapsed. Fails on an empty collection and on the
    /// reserved label 0.
    pub fn new(labels: impl IntoIterator<Item = u16>) -> Result<Self> {
        let mut classes: Vec<u16> = labels.into_iter().collect();
        classes.sort_unstable();
        classes.dedup();

        if classes.is_empty() {
            return Err(Error::InvalidParameter {
                name: "classes",
                value: "[]".into(),
                reason: "class domain must not be empty".into(),
            });
        }
        if classes[0] == 0 {
            return Err(Error::InvalidParameter {
                name: "classes",
                value: "0".into(),
                reason: "label 0 is reserved for no-data".into(),
            });
        }

        Ok(Self { classes })
    }

    /// Number of labels in the domain
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the domain is empty (never true for a constructed domain)
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Whether `class` participates in the computation
    pub fn contains(&self, class: u16) -> bool {
        self.classes.binary_search(&class).is_ok()
    }

    /// Dense index of `class` within the sorted domain
    pub fn index_of(&self, class: u16) -> Option<usize> {
        self.classes.binary_search(&class).ok()
    }

    /// Label at dense index `idx`
    pub fn class_at(&self, idx: usize) -> Option<u16> {
        self.classes.get(idx).copied()
    }

    /// Iterate labels in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.classes.iter().copied()
    }

    /// The sorted label slice
    pub fn as_slice(&self) -> &[u16] {
        &self.classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_deduplicated() {
        let domain = ClassDomain::new([3, 1, 2, 3, 1]).unwrap();
        assert_eq!(domain.as_slice(), &[1, 2, 3]);
        assert_eq!(domain.len(), 3);
    }

    #[test]
    fn test_rejects_empty() {
        assert!(ClassDomain::new([]).is_err());
    }

    #[test]
    fn test_rejects_nodata_label() {
        assert!(ClassDomain::new([0, 1, 2]).is_err());
    }

    #[test]
    fn test_lookup() {
        let domain = ClassDomain::new([10, 20, 30]).unwrap();
        assert!(domain.contains(20));
        assert!(!domain.contains(15));
        assert_eq!(domain.index_of(30), Some(2));
        assert_eq!(domain.index_of(0), None);
        assert_eq!(domain.class_at(0), Some(10));
        assert_eq!(domain.class_at(3), None);
    }

    #[test]
    fn test_iteration_order_is_ascending() {
        let domain = ClassDomain::new([7, 2, 9]).unwrap();
        let order: Vec<u16> = domain.iter().collect();
        assert_eq!(order, vec![2, 7, 9]);
    }
}
