//! Union Find
//!
//! Arena of disjoint sets addressed by index, with path compression in [`UnionFindGeneric::find`] and a
//! payload-driven union rule: the payload decides which root survives, so that weighted union by size is
//! expressed by the node type itself.
//!

use crate::serde::{Deserialize, Serialize};
use std::iter::FromIterator;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UnionFindGeneric<NodeType: UnionNodeTrait> {
    /// tree structure, each node has a parent
    pub link_parent: Vec<usize>,
    /// the node information, has the same length as `link_parent`; only meaningful at roots
    pub payload: Vec<NodeType>,
    /// internal cache of parent list when calling `find`
    find_parent_list: Vec<usize>,
}

pub trait UnionNodeTrait {
    /// return `is_left`, `after_union`
    fn union(left: &Self, right: &Self) -> (bool, Self);
    /// reset to a singleton set
    fn clear(&mut self);
    /// singleton set
    fn default() -> Self
    where
        Self: std::marker::Sized;
}

impl<NodeType: UnionNodeTrait> FromIterator<NodeType> for UnionFindGeneric<NodeType> {
    #[inline]
    fn from_iter<T: IntoIterator<Item = NodeType>>(iterator: T) -> Self {
        let mut uf = Self {
            link_parent: vec![],
            payload: vec![],
            find_parent_list: Vec::new(),
        };
        uf.extend(iterator);
        uf
    }
}

impl<NodeType: UnionNodeTrait> Extend<NodeType> for UnionFindGeneric<NodeType> {
    #[inline]
    fn extend<T: IntoIterator<Item = NodeType>>(&mut self, iterable: T) {
        let len = self.payload.len();
        self.payload.extend(iterable);
        let new_len = self.payload.len();
        self.link_parent.extend(len..new_len);
        self.find_parent_list.reserve(self.link_parent.len());
    }
}

impl<NodeType: UnionNodeTrait> UnionFindGeneric<NodeType> {
    #[inline]
    pub fn new(len: usize) -> Self {
        Self::from_iter((0..len).map(|_| NodeType::default()))
    }

    /// merge the sets of the two keys, returning `(surviving root, absorbed root)` if they were disjoint
    #[inline]
    pub fn union(&mut self, key0: usize, key1: usize) -> Option<(usize, usize)> {
        let k0 = self.find(key0);
        let k1 = self.find(key1);
        if k0 == k1 {
            return None;
        }
        let (parent, child, val) = match NodeType::union(&self.payload[k0], &self.payload[k1]) {
            (true, val) => (k0, k1, val),  // left
            (false, val) => (k1, k0, val), // right
        };
        self.payload[parent] = val;
        self.link_parent[child] = parent;
        Some((parent, child))
    }

    #[inline]
    pub fn find(&mut self, key: usize) -> usize {
        let mut k = key;
        let mut p = self.link_parent[k];
        while p != k {
            self.find_parent_list.push(k);
            k = p;
            p = self.link_parent[p];
        }
        let root = k;
        for k in self.find_parent_list.iter() {
            self.link_parent[*k] = root; // path compression
        }
        self.find_parent_list.clear();
        root
    }

    #[inline]
    pub fn get_mut(&mut self, key: usize) -> &mut NodeType {
        let root_key = self.find(key);
        &mut self.payload[root_key]
    }

    /// reset every node to a singleton set without reallocating
    pub fn clear(&mut self) {
        debug_assert!(self.payload.len() == self.link_parent.len());
        for (i, (parent, node)) in self.link_parent.iter_mut().zip(self.payload.iter_mut()).enumerate() {
            *parent = i;
            node.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct SizeNode {
        set_size: usize,
    }

    impl UnionNodeTrait for SizeNode {
        fn union(left: &Self, right: &Self) -> (bool, Self) {
            let result = Self {
                set_size: left.set_size + right.set_size,
            };
            (left.set_size >= right.set_size, result)
        }
        fn clear(&mut self) {
            self.set_size = 1;
        }
        fn default() -> Self {
            Self { set_size: 1 }
        }
    }

    #[test]
    fn union_find_algorithm_test_1() {  // cargo test union_find_algorithm_test_1 -- --nocapture
        let mut uf = UnionFindGeneric::<SizeNode>::new(100);
        assert_eq!(1, uf.get_mut(0).set_size);
        assert!(uf.find(0) != uf.find(1));
        assert_eq!(uf.union(0, 1), Some((0, 1)));
        assert!(uf.find(0) == uf.find(1));
        assert_eq!(2, uf.get_mut(1).set_size);
        assert_eq!(1, uf.get_mut(2).set_size);
        assert_eq!(uf.union(0, 1), None);
        // the larger set survives
        assert_eq!(uf.union(2, 1), Some((0, 2)));
        assert_eq!(3, uf.get_mut(2).set_size);
        assert_eq!(uf.union(99, 98), Some((99, 98)));
        assert_eq!(uf.union(98, 2), Some((0, 99)));
        assert_eq!(5, uf.get_mut(98).set_size);
        // path compression links every visited key directly to the root
        assert_eq!(uf.find(98), 0);
        assert_eq!(uf.link_parent[98], 0);
        uf.clear();
        assert_eq!(1, uf.get_mut(98).set_size);
        assert_eq!(uf.find(2), 2);
    }
}
