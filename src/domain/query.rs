//! Typed range/equality predicates handed to the row store

use std::cmp::Ordering;
use std::fmt;

use crate::domain::node::Nested;

/// Index column a predicate or ordering refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Left,
    Right,
}

impl Field {
    fn value<N: Nested + ?Sized>(&self, node: &N) -> Option<i64> {
        match self {
            Field::Left => node.left(),
            Field::Right => node.right(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Left => write!(f, "left"),
            Field::Right => write!(f, "right"),
        }
    }
}

/// Comparison of one index column against a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Eq(Field, i64),
    Lt(Field, i64),
    Le(Field, i64),
    Gt(Field, i64),
    Ge(Field, i64),
}

impl Predicate {
    pub fn field(&self) -> Field {
        match *self {
            Predicate::Eq(f, _)
            | Predicate::Lt(f, _)
            | Predicate::Le(f, _)
            | Predicate::Gt(f, _)
            | Predicate::Ge(f, _) => f,
        }
    }

    /// Rows without the referenced index never match.
    pub fn matches<N: Nested + ?Sized>(&self, node: &N) -> bool {
        let Some(v) = self.field().value(node) else {
            return false;
        };
        match *self {
            Predicate::Eq(_, c) => v == c,
            Predicate::Lt(_, c) => v < c,
            Predicate::Le(_, c) => v <= c,
            Predicate::Gt(_, c) => v > c,
            Predicate::Ge(_, c) => v >= c,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (op, c) = match *self {
            Predicate::Eq(_, c) => ("=", c),
            Predicate::Lt(_, c) => ("<", c),
            Predicate::Le(_, c) => ("<=", c),
            Predicate::Gt(_, c) => (">", c),
            Predicate::Ge(_, c) => (">=", c),
        };
        write!(f, "{} {} {}", self.field(), op, c)
    }
}

/// Conjunction of predicates plus an optional ascending ordering.
///
/// Partition scoping is passed next to the query, not inside it, so every
/// store call states which tree it touches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub predicates: Vec<Predicate>,
    pub order_by: Option<Field>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, field: Field) -> Self {
        self.order_by = Some(field);
        self
    }

    pub fn matches<N: Nested + ?Sized>(&self, node: &N) -> bool {
        self.predicates.iter().all(|p| p.matches(node))
    }

    /// Ascending comparison on the requested order column, for backends that
    /// sort in memory.
    pub fn compare<N: Nested + ?Sized>(&self, a: &N, b: &N) -> Ordering {
        match self.order_by {
            Some(field) => field.value(a).cmp(&field.value(b)),
            None => Ordering::Equal,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.predicates.is_empty() {
            write!(f, "all rows")?;
        } else {
            let parts: Vec<String> = self.predicates.iter().map(|p| p.to_string()).collect();
            write!(f, "{}", parts.join(" and "))?;
        }
        if let Some(field) = self.order_by {
            write!(f, " order by {}", field)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::{Node, NodeKey};

    #[test]
    fn given_conjunction_when_matching_then_all_predicates_must_hold() {
        let node = Node::restore(NodeKey(1), Some(2), Some(5), None);
        let query = Query::new()
            .filter(Predicate::Gt(Field::Left, 1))
            .filter(Predicate::Lt(Field::Right, 6));
        assert!(query.matches(&node));

        let query = query.filter(Predicate::Eq(Field::Left, 3));
        assert!(!query.matches(&node));
    }

    #[test]
    fn given_unpositioned_node_when_matching_then_never_matches() {
        let node = Node::new();
        assert!(!Predicate::Ge(Field::Left, i64::MIN).matches(&node));
    }

    #[test]
    fn given_query_when_displaying_then_reads_like_a_where_clause() {
        let query = Query::new()
            .filter(Predicate::Lt(Field::Left, 4))
            .filter(Predicate::Gt(Field::Right, 5))
            .order_by(Field::Right);
        assert_eq!(query.to_string(), "left < 4 and right > 5 order by right");
    }
}
