//! Subtree dumper: annotates a pre-order row sequence with nesting information.
//!
//! Rows must arrive ordered by `left` ascending. The nesting level follows from
//! consecutive `left` values alone: one step deeper advances `left` by one,
//! and every level closed in between consumes one more index, so
//! `level += previous_left - left + 2`.

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::{Node, NodeKey};

/// One node of a dumped subtree with its position annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpEntry {
    pub node: Node,
    pub key: NodeKey,
    /// Nesting level; the first emitted generation is 0
    pub level: usize,
    /// Key of the enclosing emitted node; `None` on the top level of the dump
    pub parent: Option<NodeKey>,
    /// Title path from the top level of the dump down, when titles are configured
    pub path: Option<String>,
    /// First of its sibling group
    pub first: bool,
    /// Last of its sibling group
    pub last: bool,
}

#[derive(Debug)]
struct Frame {
    key: NodeKey,
    left: i64,
    right: i64,
    title: String,
}

/// Lazy, one-shot sequence of annotated nodes.
///
/// Stops after the first `InvariantViolation`.
#[derive(Debug)]
pub struct Dump<I> {
    rows: I,
    root: Frame,
    root_node: Option<Node>,
    include_root: bool,
    with_paths: bool,
    level: i64,
    last_left: i64,
    stack: Vec<Frame>,
    done: bool,
}

impl<I> Dump<I>
where
    I: Iterator<Item = Node>,
{
    /// Start a dump below `root`. `rows` holds the fetched subtree, including
    /// the root row when `include_root` is set.
    pub fn new(root: &Node, rows: I, include_root: bool, with_paths: bool) -> DomainResult<Self> {
        let key = root
            .key()
            .ok_or_else(|| DomainError::invalid("dump root is not saved"))?;
        let (left, right) = root
            .bounds()
            .ok_or_else(|| DomainError::invalid("dump root has no indices"))?;
        Ok(Self {
            rows,
            root: Frame {
                key,
                left,
                right,
                title: root.title.clone().unwrap_or_default(),
            },
            root_node: None,
            include_root,
            with_paths,
            level: 0,
            last_left: left,
            stack: Vec::new(),
            done: false,
        })
    }

    fn path_with(&self, title: &str) -> Option<String> {
        if !self.with_paths {
            return None;
        }
        let mut path = String::new();
        if self.include_root {
            path.push('/');
            path.push_str(&self.root.title);
        }
        for frame in &self.stack {
            path.push('/');
            path.push_str(&frame.title);
        }
        path.push('/');
        path.push_str(title);
        Some(path)
    }

    /// Levels count from the dump root, or from its children when the root
    /// is not emitted.
    fn reported_level(&self) -> usize {
        let offset = if self.include_root { 0 } else { 1 };
        (self.level - offset) as usize
    }

    fn root_entry(&mut self, node: Node) -> DumpEntry {
        self.root_node = Some(node.clone());
        DumpEntry {
            key: self.root.key,
            level: 0,
            parent: None,
            path: self.with_paths.then(|| format!("/{}", self.root.title)),
            first: true,
            last: true,
            node,
        }
    }

    fn annotate(&mut self, node: Node) -> DomainResult<DumpEntry> {
        let key = node
            .key()
            .ok_or_else(|| DomainError::violation("dumped row has no key"))?;
        let (left, right) = node
            .bounds()
            .ok_or_else(|| DomainError::violation(format!("row {} has no indices", key)))?;

        if left == self.root.left {
            if self.include_root && self.level == 0 && self.root_node.is_none() {
                return Ok(self.root_entry(node));
            }
            return Err(DomainError::violation(format!(
                "row {} repeats the dump root position {}",
                key, left
            )));
        }
        if left <= self.last_left {
            return Err(DomainError::violation(format!(
                "rows are not ordered by left: {} after {}",
                left, self.last_left
            )));
        }

        self.level += self.last_left - left + 2;
        self.last_left = left;
        if self.level < 1 {
            return Err(DomainError::violation(format!(
                "row {} at left {} climbs above the dump root",
                key, left
            )));
        }

        // stack holds the ancestors below the dump root; its depth is level - 1
        let depth = (self.level - 1) as usize;
        if depth > self.stack.len() {
            return Err(DomainError::violation(format!(
                "row {} skips a nesting level",
                key
            )));
        }
        self.stack.truncate(depth);

        let (parent_key, parent_left, parent_right) = match self.stack.last() {
            Some(frame) => (Some(frame.key), frame.left, frame.right),
            None => (
                self.include_root.then_some(self.root.key),
                self.root.left,
                self.root.right,
            ),
        };
        if left <= parent_left || right >= parent_right || right <= left {
            return Err(DomainError::violation(format!(
                "row {} [{}, {}] is not nested inside [{}, {}]",
                key, left, right, parent_left, parent_right
            )));
        }

        let title = node.title.clone().unwrap_or_default();
        let entry = DumpEntry {
            key,
            level: self.reported_level(),
            parent: parent_key,
            path: self.path_with(&title),
            first: left == parent_left + 1,
            last: right == parent_right - 1,
            node,
        };
        self.stack.push(Frame {
            key,
            left,
            right,
            title,
        });
        Ok(entry)
    }
}

impl<I> Iterator for Dump<I>
where
    I: Iterator<Item = Node>,
{
    type Item = DomainResult<DumpEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let node = self.rows.next()?;
        let entry = self.annotate(node);
        if entry.is_err() {
            self.done = true;
        }
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: u64, left: i64, right: i64, title: &str) -> Node {
        let mut node = Node::restore(NodeKey(key), Some(left), Some(right), None);
        node.title = Some(title.to_string());
        node
    }

    // root(1,10)
    // ├── a(2,7)
    // │   ├── a1(3,4)
    // │   └── a2(5,6)
    // └── b(8,9)
    fn sample() -> Vec<Node> {
        vec![
            row(1, 1, 10, "root"),
            row(2, 2, 7, "a"),
            row(3, 3, 4, "a1"),
            row(4, 5, 6, "a2"),
            row(5, 8, 9, "b"),
        ]
    }

    #[test]
    fn given_full_tree_when_dumping_with_root_then_levels_and_parents_follow_nesting() {
        let rows = sample();
        let root = rows[0].clone();
        let entries: Vec<DumpEntry> = Dump::new(&root, rows.into_iter(), true, true)
            .unwrap()
            .collect::<DomainResult<_>>()
            .unwrap();

        let levels: Vec<usize> = entries.iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![0, 1, 2, 2, 1]);

        let parents: Vec<Option<u64>> = entries.iter().map(|e| e.parent.map(|k| k.0)).collect();
        assert_eq!(parents, vec![None, Some(1), Some(2), Some(2), Some(1)]);

        assert_eq!(entries[0].path.as_deref(), Some("/root"));
        assert_eq!(entries[3].path.as_deref(), Some("/root/a/a2"));
        assert_eq!(entries[4].path.as_deref(), Some("/root/b"));
    }

    #[test]
    fn given_full_tree_when_dumping_then_first_and_last_flags_mark_sibling_groups() {
        let rows = sample();
        let root = rows[0].clone();
        let flags: Vec<(bool, bool)> = Dump::new(&root, rows.into_iter(), true, false)
            .unwrap()
            .map(|e| e.map(|e| (e.first, e.last)))
            .collect::<DomainResult<_>>()
            .unwrap();
        assert_eq!(
            flags,
            vec![
                (true, true),
                (true, false),
                (true, false),
                (false, true),
                (false, true)
            ]
        );
    }

    #[test]
    fn given_skip_root_when_dumping_then_children_form_the_top_level() {
        let rows = sample();
        let root = rows[0].clone();
        let entries: Vec<DumpEntry> = Dump::new(&root, rows.into_iter().skip(1), false, true)
            .unwrap()
            .collect::<DomainResult<_>>()
            .unwrap();
        assert_eq!(entries.len(), 4);

        let levels: Vec<usize> = entries.iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![0, 1, 1, 0]);

        let parents: Vec<Option<u64>> = entries.iter().map(|e| e.parent.map(|k| k.0)).collect();
        assert_eq!(parents, vec![None, Some(2), Some(2), None]);

        assert_eq!(entries[0].path.as_deref(), Some("/a"));
        assert_eq!(entries[2].path.as_deref(), Some("/a/a2"));
        assert_eq!(entries[3].path.as_deref(), Some("/b"));
        assert!(entries[0].first && !entries[0].last);
        assert!(!entries[3].first && entries[3].last);
    }

    #[test]
    fn given_paths_disabled_when_dumping_then_path_is_absent() {
        let rows = sample();
        let root = rows[0].clone();
        let first = Dump::new(&root, rows.into_iter(), true, false)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(first.path, None);
    }

    #[test]
    fn given_unordered_rows_when_dumping_then_reports_violation_and_stops() {
        let mut rows = sample();
        rows.swap(2, 3);
        let root = rows[0].clone();
        let results: Vec<_> = Dump::new(&root, rows.into_iter(), true, false)
            .unwrap()
            .collect();
        assert_eq!(results.len(), 3);
        assert!(matches!(
            results.last(),
            Some(Err(DomainError::InvariantViolation(_)))
        ));
    }

    #[test]
    fn given_gap_in_numbering_when_dumping_then_reports_violation() {
        // b starts at 9 instead of 8, which reads as a node above the root
        let rows = vec![
            row(1, 1, 10, "root"),
            row(2, 2, 3, "a"),
            row(3, 6, 9, "b"),
        ];
        let root = rows[0].clone();
        let results: Vec<_> = Dump::new(&root, rows.into_iter(), true, false)
            .unwrap()
            .collect();
        assert!(results.iter().any(|r| r.is_err()));
    }

    #[test]
    fn given_unsaved_root_when_starting_dump_then_rejected() {
        let err = Dump::new(&Node::titled("x"), Vec::new().into_iter(), true, false).unwrap_err();
        assert!(matches!(err, DomainError::InvalidOperand(_)));
    }
}
