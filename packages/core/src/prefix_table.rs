//! A prefix table keyed by path segments.
//!
//! Prefixes are stored in a trie so lookups walk at most as many nodes as
//! the path has segments. A lookup returns the deepest (longest) registered
//! prefix along the path, together with the part of the path below it.

use std::collections::BTreeMap;

use crate::path;

/// A trie of path prefixes, each holding one value.
#[derive(Debug, Clone)]
pub struct PrefixTable<T> {
    value: Option<(String, T)>,
    children: BTreeMap<String, PrefixTable<T>>,
}

impl<T> Default for PrefixTable<T> {
    fn default() -> Self {
        Self {
            value: None,
            children: BTreeMap::new(),
        }
    }
}

/// Result of a longest-prefix lookup.
#[derive(Debug, PartialEq, Eq)]
pub struct PrefixMatch<'a, T> {
    /// The prefix exactly as it was registered.
    pub prefix: &'a str,
    pub value: &'a T,
    /// The rest of the path, absolute and normalized.
    pub remainder: String,
}

impl<T> PrefixTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, prefix: &str) -> Option<&PrefixTable<T>> {
        let mut current = self;
        for segment in path::segments(prefix) {
            current = current.children.get(segment)?;
        }
        Some(current)
    }

    /// Register a value under a prefix. Returns the value it replaced.
    pub fn insert(&mut self, prefix: &str, value: T) -> Option<T> {
        let mut current = self;
        for segment in path::segments(prefix) {
            current = current.children.entry(segment.to_string()).or_default();
        }
        current
            .value
            .replace((prefix.to_string(), value))
            .map(|(_, old)| old)
    }

    /// Exact lookup of a registered prefix.
    pub fn get(&self, prefix: &str) -> Option<&T> {
        self.node(prefix)?.value.as_ref().map(|(_, v)| v)
    }

    /// Find the longest registered prefix of `path`.
    pub fn longest_match(&self, path: &str) -> Option<PrefixMatch<'_, T>> {
        let segments: Vec<&str> = path::segments(path).collect();
        let mut current = self;
        let mut best = self.value.as_ref().map(|entry| (entry, 0));

        for (depth, segment) in segments.iter().enumerate() {
            match current.children.get(*segment) {
                Some(child) => {
                    current = child;
                    if let Some(entry) = current.value.as_ref() {
                        best = Some((entry, depth + 1));
                    }
                }
                None => break,
            }
        }

        best.map(|((prefix, value), depth)| PrefixMatch {
            prefix: prefix.as_str(),
            value,
            remainder: path::join(segments[depth..].iter().copied()),
        })
    }

    /// All registered prefixes, in trie order.
    pub fn prefixes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_prefixes(&mut out);
        out
    }

    fn collect_prefixes<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some((prefix, _)) = &self.value {
            out.push(prefix.as_str());
        }
        for child in self.children.values() {
            child.collect_prefixes(out);
        }
    }

    pub fn len(&self) -> usize {
        let own = usize::from(self.value.is_some());
        own + self.children.values().map(|c| c.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
