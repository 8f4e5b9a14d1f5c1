use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::engine::Point;

#[derive(Debug)]
struct TrieNode {
    point: Point,
    /// Set on the last node of a stored configuration.
    end: AtomicBool,
    children: Mutex<Vec<Arc<TrieNode>>>,
}

impl TrieNode {
    fn new(point: Point) -> Self {
        TrieNode {
            point,
            end: AtomicBool::new(false),
            children: Mutex::new(Vec::new()),
        }
    }

    fn children(&self) -> MutexGuard<'_, Vec<Arc<TrieNode>>> {
        // Child lists are only ever appended to, so a list left behind by a
        // panicking thread is still well formed.
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn child(&self, point: Point) -> Option<Arc<TrieNode>> {
        self.children().iter().find(|c| c.point == point).cloned()
    }

    fn child_or_insert(&self, point: Point) -> Arc<TrieNode> {
        let mut children = self.children();
        if let Some(child) = children.iter().find(|c| c.point == point) {
            return Arc::clone(child);
        }
        let child = Arc::new(TrieNode::new(point));
        children.push(Arc::clone(&child));
        child
    }
}

/// Append-only prefix tree of every configuration explored during a run,
/// shared by all workers.
///
/// A configuration is the figure position followed by all box positions in
/// rank order; each element is one level of the tree. Every child list has
/// its own lock, so workers only contend when they extend the same node.
#[derive(Debug)]
pub struct VisitedTrie {
    root: Arc<TrieNode>,
    len: AtomicUsize,
}

impl Default for VisitedTrie {
    fn default() -> Self {
        VisitedTrie::new()
    }
}

impl VisitedTrie {
    pub fn new() -> Self {
        VisitedTrie {
            root: Arc::new(TrieNode::new(Point::new(-1, -1))),
            len: AtomicUsize::new(0),
        }
    }

    /// Number of distinct configurations stored.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True only if the complete configuration has been stored before.
    pub fn ever_been_here(&self, config: &[Point]) -> bool {
        let mut node = Arc::clone(&self.root);
        for &point in config {
            match node.child(point) {
                Some(child) => node = child,
                None => return false,
            }
        }
        !config.is_empty() && node.end.load(Ordering::Acquire)
    }

    /// Store a configuration, appending whatever suffix is not yet present.
    pub fn add_history(&self, config: &[Point]) {
        self.visit(config);
    }

    /// Store a configuration and report whether it was new. When several
    /// workers race on the same configuration exactly one of them gets `true`.
    pub fn visit(&self, config: &[Point]) -> bool {
        if config.is_empty() {
            return false;
        }
        let mut node = Arc::clone(&self.root);
        for &point in config {
            node = node.child_or_insert(point);
        }
        let seen = node.end.swap(true, Ordering::AcqRel);
        if !seen {
            self.len.fetch_add(1, Ordering::Relaxed);
        }
        !seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn config(points: &[(i16, i16)]) -> Vec<Point> {
        points.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn test_add_then_visited() {
        let trie = VisitedTrie::new();
        let a = config(&[(1, 1), (2, 1), (3, 3)]);
        assert!(!trie.ever_been_here(&a));
        trie.add_history(&a);
        assert!(trie.ever_been_here(&a));
        assert_eq!(trie.len(), 1);

        // Adding the same configuration again changes nothing.
        trie.add_history(&a);
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_shared_prefix() {
        let trie = VisitedTrie::new();
        let a = config(&[(1, 1), (2, 1), (3, 3)]);
        let b = config(&[(1, 1), (2, 1), (4, 3)]);
        let c = config(&[(1, 2), (2, 1), (3, 3)]);
        assert!(trie.visit(&a));
        assert!(!trie.ever_been_here(&b));
        assert!(trie.visit(&b));
        assert!(!trie.ever_been_here(&c));
        assert!(trie.visit(&c));
        assert!(!trie.visit(&a));
        assert_eq!(trie.len(), 3);
    }

    #[test]
    fn test_prefix_is_not_visited() {
        let trie = VisitedTrie::new();
        trie.add_history(&config(&[(1, 1), (2, 1), (3, 3)]));
        assert!(!trie.ever_been_here(&config(&[(1, 1), (2, 1)])));
        assert!(!trie.ever_been_here(&[]));
    }

    #[test]
    fn test_order_matters() {
        let trie = VisitedTrie::new();
        trie.add_history(&config(&[(1, 1), (2, 1), (3, 3)]));
        assert!(!trie.ever_been_here(&config(&[(1, 1), (3, 3), (2, 1)])));
    }

    #[test]
    fn test_concurrent_visits_insert_once() {
        let trie = VisitedTrie::new();
        let configs: Vec<Vec<Point>> = (0..200)
            .map(|i| config(&[(i % 7, i % 5), (i % 11, 2), (3, i % 13)]))
            .collect();
        let mut distinct = configs.clone();
        distinct.sort();
        distinct.dedup();

        let winners = AtomicUsize::new(0);
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for c in &configs {
                        if trie.visit(c) {
                            winners.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(winners.load(Ordering::Relaxed), distinct.len());
        assert_eq!(trie.len(), distinct.len());
        for c in &distinct {
            assert!(trie.ever_been_here(c));
        }
    }
}
