#![forbid(unsafe_code)]

//! Binding tables and the key-chord resolver.
//!
//! A [`BindingTable`] maps chord sequences to actions and is stored as a
//! trie, so one binding may be a strict prefix of another. The
//! [`ChordResolver`] walks the trie one chord at a time:
//!
//! - exact match: dispatch, even when longer bindings share the prefix
//! - strict prefix of some binding: wait for the next chord
//! - no match: report the chords as unbound and start over
//!
//! # Example
//!
//! ```
//! use fline_core::binding::{BindingTable, ChordResolver, Resolution};
//! use fline_core::key::KeyChord;
//!
//! let mut table = BindingTable::new();
//! table.bind("d,d", "delete-line").unwrap();
//!
//! let mut resolver = ChordResolver::new();
//! assert_eq!(resolver.resolve(&table, KeyChord::char('d')), Resolution::Pending);
//! assert_eq!(
//!     resolver.resolve(&table, KeyChord::char('d')),
//!     Resolution::Action("delete-line")
//! );
//! ```

use std::collections::BTreeMap;

use crate::descriptor::{self, DescriptorError};
use crate::key::KeyChord;

#[derive(Debug, Clone)]
struct TrieNode<A> {
    action: Option<A>,
    children: BTreeMap<KeyChord, TrieNode<A>>,
}

impl<A> Default for TrieNode<A> {
    fn default() -> Self {
        Self {
            action: None,
            children: BTreeMap::new(),
        }
    }
}

impl<A> TrieNode<A> {
    fn is_empty(&self) -> bool {
        self.action.is_none() && self.children.is_empty()
    }

    fn remove(&mut self, sequence: &[KeyChord]) -> Option<A> {
        let Some((first, rest)) = sequence.split_first() else {
            return self.action.take();
        };
        let child = self.children.get_mut(first)?;
        let removed = child.remove(rest);
        if child.is_empty() {
            self.children.remove(first);
        }
        removed
    }

    fn collect(&self, prefix: &mut Vec<KeyChord>, out: &mut Vec<(Vec<KeyChord>, A)>)
    where
        A: Clone,
    {
        if let Some(action) = &self.action {
            out.push((prefix.clone(), action.clone()));
        }
        for (chord, child) in &self.children {
            prefix.push(*chord);
            child.collect(prefix, out);
            prefix.pop();
        }
    }
}

/// Result of looking a chord sequence up in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a, A> {
    /// The sequence is bound. `extends` tells whether longer bindings share it.
    Exact {
        /// The bound action.
        action: &'a A,
        /// Longer bindings start with this sequence.
        extends: bool,
    },
    /// The sequence is a strict prefix of at least one binding.
    Prefix,
    /// Nothing is bound along this path.
    None,
}

/// Chord-sequence to action bindings for one key map.
#[derive(Debug, Clone)]
pub struct BindingTable<A> {
    root: TrieNode<A>,
    len: usize,
}

impl<A> Default for BindingTable<A> {
    fn default() -> Self {
        Self {
            root: TrieNode::default(),
            len: 0,
        }
    }
}

impl<A> BindingTable<A> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bound sequences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bind a descriptor such as `"Ctrl+x,Ctrl+u"`.
    ///
    /// Returns the action previously bound to the identical sequence.
    pub fn bind(&mut self, descriptor: &str, action: A) -> Result<Option<A>, DescriptorError> {
        let sequence = descriptor::parse_sequence(descriptor)?;
        Ok(self.bind_sequence(&sequence, action))
    }

    /// Bind an already parsed chord sequence.
    ///
    /// An empty sequence is ignored.
    pub fn bind_sequence(&mut self, sequence: &[KeyChord], action: A) -> Option<A> {
        if sequence.is_empty() {
            return None;
        }
        let mut node = &mut self.root;
        for chord in sequence {
            node = node.children.entry(*chord).or_default();
        }
        let previous = node.action.replace(action);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Remove the binding for a descriptor.
    pub fn unbind(&mut self, descriptor: &str) -> Result<Option<A>, DescriptorError> {
        let sequence = descriptor::parse_sequence(descriptor)?;
        Ok(self.unbind_sequence(&sequence))
    }

    /// Remove the binding for a chord sequence.
    pub fn unbind_sequence(&mut self, sequence: &[KeyChord]) -> Option<A> {
        if sequence.is_empty() {
            return None;
        }
        let removed = self.root.remove(sequence);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Look up a chord sequence.
    #[must_use]
    pub fn lookup(&self, sequence: &[KeyChord]) -> Lookup<'_, A> {
        let mut node = &self.root;
        for chord in sequence {
            match node.children.get(chord) {
                Some(child) => node = child,
                None => return Lookup::None,
            }
        }
        match &node.action {
            Some(action) => Lookup::Exact {
                action,
                extends: !node.children.is_empty(),
            },
            None if !node.children.is_empty() => Lookup::Prefix,
            None => Lookup::None,
        }
    }

    /// The action bound to exactly this sequence.
    #[must_use]
    pub fn get(&self, sequence: &[KeyChord]) -> Option<&A> {
        match self.lookup(sequence) {
            Lookup::Exact { action, .. } => Some(action),
            Lookup::Prefix | Lookup::None => None,
        }
    }

    /// All bindings in chord order.
    #[must_use]
    pub fn bindings(&self) -> Vec<(Vec<KeyChord>, A)>
    where
        A: Clone,
    {
        let mut out = Vec::with_capacity(self.len);
        self.root.collect(&mut Vec::new(), &mut out);
        out
    }

    /// Canonical descriptor text for a chord sequence.
    #[must_use]
    pub fn describe(sequence: &[KeyChord]) -> String {
        descriptor::describe(sequence)
    }
}

/// Outcome of feeding one chord to the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<A> {
    /// The chords seen so far are bound to this action.
    Action(A),
    /// More chords are needed.
    Pending,
    /// The chords seen so far match nothing; the resolver has reset.
    Unbound(Vec<KeyChord>),
}

/// Cursor into a binding trie, kept across chords.
#[derive(Debug, Clone, Default)]
pub struct ChordResolver {
    pending: Vec<KeyChord>,
}

impl ChordResolver {
    /// Create a resolver with nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chord against `table`.
    pub fn resolve<A: Clone>(&mut self, table: &BindingTable<A>, chord: KeyChord) -> Resolution<A> {
        self.pending.push(chord);
        match table.lookup(&self.pending) {
            Lookup::Exact { action, .. } => {
                self.pending.clear();
                Resolution::Action(action.clone())
            }
            Lookup::Prefix => Resolution::Pending,
            Lookup::None => Resolution::Unbound(std::mem::take(&mut self.pending)),
        }
    }

    /// Whether a multi-chord sequence is in progress.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Chords collected toward an incomplete sequence.
    #[must_use]
    pub fn pending(&self) -> &[KeyChord] {
        &self.pending
    }

    /// Drop any partial sequence.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}
