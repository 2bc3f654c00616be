//! Dump entries to `termtree` for display.

use termtree::Tree;

use crate::domain::DumpEntry;

pub trait TreeRender {
    fn to_tree_string(&self) -> Option<Tree<String>>;
}

impl TreeRender for [DumpEntry] {
    /// Entries must come from one dump that includes its root.
    fn to_tree_string(&self) -> Option<Tree<String>> {
        let mut open: Vec<Tree<String>> = Vec::new();
        for entry in self {
            while open.len() > entry.level.max(1) {
                close_last(&mut open);
            }
            open.push(Tree::new(label(entry)));
        }
        while open.len() > 1 {
            close_last(&mut open);
        }
        open.pop()
    }
}

fn close_last(open: &mut Vec<Tree<String>>) {
    if let Some(done) = open.pop() {
        if let Some(parent) = open.last_mut() {
            parent.push(done);
        }
    }
}

pub fn label(entry: &DumpEntry) -> String {
    let title = entry.node.title.as_deref().unwrap_or("-");
    match entry.node.bounds() {
        Some((l, r)) => format!("{} #{} [{}, {}]", title, entry.key, l, r),
        None => format!("{} #{}", title, entry.key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dump, Node, NodeKey};

    fn row(key: u64, left: i64, right: i64, title: &str) -> Node {
        let mut node = Node::restore(NodeKey(key), Some(left), Some(right), None);
        node.title = Some(title.to_string());
        node
    }

    #[test]
    fn given_dump_when_rendering_then_children_nest_under_parents() {
        let rows = vec![
            row(1, 1, 8, "root"),
            row(2, 2, 5, "a"),
            row(3, 3, 4, "a1"),
            row(4, 6, 7, "b"),
        ];
        let root = rows[0].clone();
        let entries: Vec<DumpEntry> = Dump::new(&root, rows.into_iter(), true, false)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        let tree = entries.to_tree_string().unwrap();
        let rendered = tree.to_string();

        assert!(rendered.starts_with("root #1 [1, 8]"));
        let a = rendered.find("a #2").unwrap();
        let a1 = rendered.find("a1 #3").unwrap();
        let b = rendered.find("b #4").unwrap();
        assert!(a < a1 && a1 < b);
        assert_eq!(tree.leaves.len(), 2);
        assert_eq!(tree.leaves[0].leaves.len(), 1);
    }

    #[test]
    fn given_no_entries_when_rendering_then_none() {
        let entries: Vec<DumpEntry> = Vec::new();
        assert!(entries.to_tree_string().is_none());
    }
}
