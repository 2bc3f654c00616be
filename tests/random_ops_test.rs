use std::collections::HashMap;
use std::sync::Arc;

use nestset::application::services::{Placement, TreeService};
use nestset::domain::{Node, NodeKey, Partition, Query, TreeConfig, TreeMode};
use nestset::infrastructure::{MemoryStore, NodeStore};
use nestset::util::testing::{init_test_setup, snapshot};
use rstest::rstest;

/// Small deterministic generator so failures replay with the same seed.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }

    fn placement(&mut self) -> Placement {
        match self.below(4) {
            0 => Placement::NextSiblingOf,
            1 => Placement::PreviousSiblingOf,
            2 => Placement::FirstChildOf,
            _ => Placement::LastChildOf,
        }
    }
}

fn all_rows(store: &MemoryStore) -> Vec<Node> {
    store
        .fetch_many(Partition::Whole, &Query::new())
        .unwrap()
}

fn pick(rng: &mut XorShift, rows: &[Node]) -> Node {
    rows[rng.below(rows.len())].clone()
}

fn titled_tree(titles: &[(&str, Option<&str>)]) -> (Arc<MemoryStore>, TreeService) {
    let store = Arc::new(MemoryStore::new());
    let trees = TreeService::new(
        store.clone(),
        Arc::new(TreeConfig::default().with_title("title")),
    )
    .unwrap();

    let mut by_title: HashMap<String, Node> = HashMap::new();
    for (title, parent) in titles {
        let mut node = Node::titled(*title);
        match parent {
            None => {
                trees.new_root(&mut node).unwrap();
            }
            Some(parent) => {
                let parent = trees.refresh(&by_title[*parent]).unwrap();
                trees
                    .insert(&mut node, Placement::LastChildOf, &parent)
                    .unwrap();
            }
        }
        by_title.insert(title.to_string(), node);
    }
    (store, trees)
}

//  root
//  ├── a
//  │   ├── a1
//  │   │   └── a1x
//  │   └── a2
//  ├── b
//  └── c
//      └── c1
fn sample() -> (Arc<MemoryStore>, TreeService) {
    titled_tree(&[
        ("root", None),
        ("a", Some("root")),
        ("a1", Some("a")),
        ("a1x", Some("a1")),
        ("a2", Some("a")),
        ("b", Some("root")),
        ("c", Some("root")),
        ("c1", Some("c")),
    ])
}

#[rstest]
#[case(0x9e37_79b9_7f4a_7c15)]
#[case(0x2545_f491_4f6c_dd1d)]
#[case(42)]
fn given_random_mutations_when_applied_then_numbering_stays_contiguous(#[case] seed: u64) {
    init_test_setup();
    let mut rng = XorShift(seed);
    let store = Arc::new(MemoryStore::new());
    let trees = TreeService::new(store.clone(), Arc::new(TreeConfig::default())).unwrap();
    trees.new_root(&mut Node::titled("root")).unwrap();
    let mut expected = 1usize;

    for step in 0..200 {
        let rows = all_rows(&store);
        if rows.is_empty() {
            trees.new_root(&mut Node::titled("root")).unwrap();
            expected = 1;
            continue;
        }

        let outcome = match rng.below(10) {
            0..=4 => {
                let target = pick(&mut rng, &rows);
                let placement = rng.placement();
                trees
                    .insert(&mut Node::titled(format!("n{}", step)), placement, &target)
                    .map(|_| expected += 1)
            }
            5..=7 => {
                let mut node = pick(&mut rng, &rows);
                let target = pick(&mut rng, &rows);
                let placement = rng.placement();
                trees.move_to(&mut node, placement, &target)
            }
            8 => {
                let node = pick(&mut rng, &rows);
                trees.delete_subtree(&node).map(|n| expected -= n)
            }
            _ => {
                let node = pick(&mut rng, &rows);
                trees.delete_node(&node).map(|_| expected -= 1)
            }
        };

        if let Err(e) = outcome {
            assert!(e.is_invalid_operand(), "step {}: {}", step, e);
        }
        assert_eq!(
            trees.verify(Partition::Whole).unwrap(),
            expected,
            "step {}",
            step
        );
        assert!(!store.in_batch().unwrap());
    }
}

#[rstest]
#[case(Placement::LastChildOf)]
#[case(Placement::FirstChildOf)]
#[case(Placement::NextSiblingOf)]
#[case(Placement::PreviousSiblingOf)]
fn given_completed_move_when_repeated_then_tree_is_unchanged(#[case] placement: Placement) {
    init_test_setup();
    let (store, trees) = sample();
    let rows = all_rows(&store);
    let by_title = |t: &str| {
        rows.iter()
            .find(|n| n.title.as_deref() == Some(t))
            .cloned()
            .unwrap()
    };

    let mut a1 = by_title("a1");
    let c = by_title("c");
    trees.move_to(&mut a1, placement, &c).unwrap();
    let once = snapshot(store.as_ref(), Partition::Whole);

    trees.move_to(&mut a1, placement, &c).unwrap();

    assert_eq!(snapshot(store.as_ref(), Partition::Whole), once);
    assert_eq!(trees.verify(Partition::Whole).unwrap(), 8);
}

#[test]
fn given_any_node_when_counting_descendants_then_matches_traversal() {
    init_test_setup();
    let (store, trees) = sample();
    let nav = trees.navigator();

    fn descendants(trees: &TreeService, node: &Node) -> u64 {
        trees
            .navigator()
            .children(node)
            .unwrap()
            .iter()
            .map(|child| 1 + descendants(trees, child))
            .sum()
    }

    for node in all_rows(&store) {
        let counted = TreeMode::Single.child_count(&node).unwrap();
        assert_eq!(counted, descendants(&trees, &node), "{}", node);

        let children = nav.children(&node).unwrap();
        if children.iter().all(|c| TreeMode::Single.is_leaf(c)) {
            assert_eq!(counted, children.len() as u64, "{}", node);
        }
    }
}

#[test]
fn given_dump_when_rebuilding_paths_from_parents_then_paths_agree() {
    init_test_setup();
    let (_store, trees) = sample();
    let root = trees.root(Some(Partition::Whole)).unwrap().unwrap();

    let entries: Vec<_> = trees
        .dump(&root, true)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(entries.len(), 8);

    let mut paths: HashMap<NodeKey, (String, usize)> = HashMap::new();
    for entry in &entries {
        let title = entry.node.title.clone().unwrap_or_default();
        let (rebuilt, level) = match entry.parent {
            None => (format!("/{}", title), 0),
            Some(parent) => {
                let (parent_path, parent_level) = &paths[&parent];
                (format!("{}/{}", parent_path, title), parent_level + 1)
            }
        };
        assert_eq!(entry.path.as_deref(), Some(rebuilt.as_str()));
        assert_eq!(entry.level, level);
        paths.insert(entry.key, (rebuilt, level));
    }
    assert_eq!(paths[&entries[3].key].0, "/root/a/a1/a1x");
}

#[test]
fn given_dump_when_reading_sibling_flags_then_they_match_navigation() {
    init_test_setup();
    let (_store, trees) = sample();
    let nav = trees.navigator();
    let root = trees.root(Some(Partition::Whole)).unwrap().unwrap();

    for entry in trees.dump(&root, false).unwrap() {
        let entry = entry.unwrap();
        assert_eq!(entry.first, !nav.has_previous_sibling(&entry.node).unwrap());
        assert_eq!(entry.last, !nav.has_next_sibling(&entry.node).unwrap());
        // the dump root is not emitted, so its children sit on level 0
        assert_eq!(nav.depth(&entry.node).unwrap(), entry.level + 1);
        assert_eq!(entry.parent.is_none(), entry.level == 0);
    }
}

#[test]
fn given_dump_without_root_when_reading_top_level_then_paths_start_below_root() {
    init_test_setup();
    let (_store, trees) = sample();
    let root = trees.root(Some(Partition::Whole)).unwrap().unwrap();

    let top: Vec<_> = trees
        .dump(&root, false)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
        .into_iter()
        .filter(|e| e.level == 0)
        .map(|e| (e.parent, e.path))
        .collect();

    assert_eq!(
        top,
        vec![
            (None, Some("/a".to_string())),
            (None, Some("/b".to_string())),
            (None, Some("/c".to_string())),
        ]
    );
}

#[test]
fn given_node_when_listing_ancestors_then_root_first_and_depth_matches() {
    init_test_setup();
    let (store, trees) = sample();
    let nav = trees.navigator();
    let a1x = all_rows(&store)
        .into_iter()
        .find(|n| n.title.as_deref() == Some("a1x"))
        .unwrap();

    let titles: Vec<_> = nav
        .ancestors(&a1x)
        .unwrap()
        .into_iter()
        .filter_map(|n| n.title)
        .collect();

    assert_eq!(titles, vec!["root", "a", "a1"]);
    assert_eq!(nav.depth(&a1x).unwrap(), 3);
    assert!(nav.parent(&a1x).unwrap().is_some_and(|p| p.title.as_deref() == Some("a1")));
    assert!(!nav.has_children(&a1x));
    assert!(nav.has_parent(&a1x));
}
