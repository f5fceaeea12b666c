mod attributes;

pub use attributes::{AttrSet, Attribute};

use crate::origin::Tokid;
use crate::source_files::FileKey;
use indexmap::IndexMap;
use std::collections::HashMap;

/*
   Equivalence classes over origin coordinates.

   Every classified `Tokid` belongs to exactly one class; unification
   merges classes. The forest is weighted quick-union with path
   compression over dense indices, with a side map from `Tokid` to its
   node. Class records live for the lifetime of the store; a merged-away
   class becomes a forward pointer to the survivor.
*/

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EcId(u32);

impl EcId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
pub struct EClass {
    len: u32,
    attrs: AttrSet,
    members: Vec<Tokid>,
}

impl EClass {
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn attrs(&self) -> AttrSet {
        self.attrs
    }

    pub fn test_attr(&self, attribute: Attribute) -> bool {
        self.attrs.test(attribute)
    }

    pub fn members(&self) -> &[Tokid] {
        &self.members
    }

    /// The lowest member coordinate, stable under merge order.
    pub fn representative(&self) -> Tokid {
        *self
            .members
            .iter()
            .min()
            .expect("equivalence class has at least one member")
    }

    /// Member offsets grouped per file, each list sorted.
    pub fn members_by_file(&self) -> IndexMap<FileKey, Vec<u32>> {
        let mut by_file = IndexMap::new();

        for member in self.members.iter() {
            by_file
                .entry(member.file)
                .or_insert_with(Vec::new)
                .push(member.offset);
        }

        for offsets in by_file.values_mut() {
            offsets.sort_unstable();
        }

        by_file.sort_keys();
        by_file
    }
}

#[derive(Debug)]
enum Node {
    Forward(EcId),
    Root(EClass),
}

#[derive(Debug, Default)]
pub struct EcStore {
    by_tokid: HashMap<Tokid, EcId>,
    nodes: Vec<Node>,
}

impl EcStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tokid` as the start of an identifier spanning `len`
    /// bytes. Returns the existing class when the coordinate was already
    /// classified.
    pub fn classify(&mut self, tokid: Tokid, len: u32) -> EcId {
        if let Some(&id) = self.by_tokid.get(&tokid) {
            let root = self.find(id);
            let class = self.class(root);
            assert!(
                class.len == len,
                "{} already classified with length {}, cannot reclassify as {}",
                tokid,
                class.len,
                len
            );
            return root;
        }

        let id = EcId(u32::try_from(self.nodes.len()).expect("class index fits in u32"));
        self.nodes.push(Node::Root(EClass {
            len,
            attrs: AttrSet::new(),
            members: vec![tokid],
        }));
        self.by_tokid.insert(tokid, id);
        id
    }

    /// Root lookup with path compression.
    pub fn find(&mut self, id: EcId) -> EcId {
        let mut root = id;
        loop {
            match &self.nodes[root.index()] {
                Node::Forward(next) => root = *next,
                Node::Root(_) => break,
            }
        }

        let mut walk = id;
        while walk != root {
            match &mut self.nodes[walk.index()] {
                Node::Forward(next) => {
                    walk = *next;
                    *next = root;
                }
                Node::Root(_) => break,
            }
        }

        root
    }

    /// Root lookup without mutating the forest.
    pub fn lookup(&self, tokid: Tokid) -> Option<EcId> {
        let mut id = *self.by_tokid.get(&tokid)?;
        loop {
            match &self.nodes[id.index()] {
                Node::Forward(next) => id = *next,
                Node::Root(_) => return Some(id),
            }
        }
    }

    pub fn class_of(&self, tokid: Tokid) -> Option<&EClass> {
        self.lookup(tokid).map(|id| self.class(id))
    }

    pub fn class(&self, id: EcId) -> &EClass {
        match &self.nodes[id.index()] {
            Node::Root(class) => class,
            Node::Forward(_) => panic!("class reference not resolved to a root"),
        }
    }

    fn class_mut(&mut self, id: EcId) -> &mut EClass {
        match &mut self.nodes[id.index()] {
            Node::Root(class) => class,
            Node::Forward(_) => panic!("class reference not resolved to a root"),
        }
    }

    pub fn set_attr(&mut self, id: EcId, attribute: Attribute) {
        let root = self.find(id);
        self.class_mut(root).attrs.set(attribute);
    }

    /// Merge the classes of `a` and `b`; the larger membership survives.
    pub fn merge(&mut self, a: EcId, b: EcId) -> EcId {
        let a = self.find(a);
        let b = self.find(b);

        if a == b {
            return a;
        }

        assert!(
            self.class(a).len == self.class(b).len,
            "cannot merge equivalence classes of lengths {} and {}",
            self.class(a).len,
            self.class(b).len
        );

        let (winner, loser) = if self.class(a).size() >= self.class(b).size() {
            (a, b)
        } else {
            (b, a)
        };

        let Node::Root(retired) =
            std::mem::replace(&mut self.nodes[loser.index()], Node::Forward(winner))
        else {
            unreachable!("loser was resolved to a root above");
        };

        let survivor = self.class_mut(winner);
        survivor.attrs.union_with(retired.attrs);
        survivor.members.extend(retired.members);
        winner
    }

    /// All live classes.
    pub fn classes(&self) -> impl Iterator<Item = (EcId, &EClass)> {
        self.nodes.iter().enumerate().filter_map(|(index, node)| match node {
            Node::Root(class) => Some((EcId(index as u32), class)),
            Node::Forward(_) => None,
        })
    }

    pub fn class_count(&self) -> usize {
        self.classes().count()
    }
}
