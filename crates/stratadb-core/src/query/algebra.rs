use crate::{
    hash::hash_parts,
    index::Bitmap,
    obs::sink::{self, MetricsEvent},
};
use std::collections::HashMap;
use std::fmt;

const TAG_EMPTY: u8 = 0x01;
const TAG_CONSTANT: u8 = 0x02;
const TAG_AND: u8 = 0x03;
const TAG_OR: u8 = 0x04;
const TAG_NOT: u8 = 0x05;
const TAG_DEFERRED: u8 = 0x06;
const TAG_MAPPING: u8 = 0x07;

///
/// QueryExecutionContext
///
/// Holds the fingerprint-keyed result cache for one query execution. The
/// cache is discarded with the context once the query completes; formula
/// trees are never shared across executions.
///

#[derive(Debug, Default)]
pub struct QueryExecutionContext {
    cache: HashMap<u64, Bitmap>,
}

impl QueryExecutionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

///
/// Formula
///
/// Lazily evaluated node of the boolean algebra over bitmaps. Each node
/// carries a structural fingerprint composed from its operands; computation
/// is memoized per fingerprint within one execution context, so repeated
/// sub-expressions across sibling branches evaluate exactly once.
///

pub struct Formula<'a> {
    fingerprint: u64,
    kind: FormulaKind<'a>,
}

enum FormulaKind<'a> {
    Empty,
    Constant(Bitmap),
    And(Vec<Formula<'a>>),
    Or(Vec<Formula<'a>>),
    Not {
        subtracted: Box<Formula<'a>>,
        superset: Box<Formula<'a>>,
    },
    Deferred {
        supplier: Box<dyn Fn() -> Bitmap + 'a>,
    },
    Mapping {
        child: Box<Formula<'a>>,
        transform: Box<dyn Fn(&Bitmap) -> Bitmap + 'a>,
    },
}

impl<'a> Formula<'a> {
    /// The unique zero element: AND with it is empty, OR with it is
    /// identity.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            fingerprint: hash_parts(TAG_EMPTY, &[]),
            kind: FormulaKind::Empty,
        }
    }

    /// Wrap a precomputed bitmap; an empty bitmap collapses to the zero
    /// element.
    #[must_use]
    pub fn constant(bitmap: Bitmap) -> Self {
        if bitmap.is_empty() {
            return Self::empty();
        }
        Self {
            fingerprint: hash_parts(TAG_CONSTANT, &[bitmap.fingerprint()]),
            kind: FormulaKind::Constant(bitmap),
        }
    }

    /// Conjunction. Same-kind children are flattened; any empty operand
    /// collapses the whole node.
    #[must_use]
    pub fn and(children: Vec<Self>) -> Self {
        let mut flattened = Vec::with_capacity(children.len());
        for child in children {
            match child.kind {
                FormulaKind::Empty => return Self::empty(),
                FormulaKind::And(grandchildren) => flattened.extend(grandchildren),
                _ => flattened.push(child),
            }
        }
        match flattened.len() {
            0 => Self::empty(),
            1 => flattened.into_iter().next().unwrap_or_else(Self::empty),
            _ => {
                let parts: Vec<u64> = flattened.iter().map(|child| child.fingerprint).collect();
                Self {
                    fingerprint: hash_parts(TAG_AND, &parts),
                    kind: FormulaKind::And(flattened),
                }
            }
        }
    }

    /// Disjunction. Empty operands are dropped, same-kind children
    /// flattened.
    #[must_use]
    pub fn or(children: Vec<Self>) -> Self {
        let mut flattened = Vec::with_capacity(children.len());
        for child in children {
            match child.kind {
                FormulaKind::Empty => {}
                FormulaKind::Or(grandchildren) => flattened.extend(grandchildren),
                _ => flattened.push(child),
            }
        }
        match flattened.len() {
            0 => Self::empty(),
            1 => flattened.into_iter().next().unwrap_or_else(Self::empty),
            _ => {
                let parts: Vec<u64> = flattened.iter().map(|child| child.fingerprint).collect();
                Self {
                    fingerprint: hash_parts(TAG_OR, &parts),
                    kind: FormulaKind::Or(flattened),
                }
            }
        }
    }

    /// `superset − subtracted`. The algebra tracks no implicit universe;
    /// callers supply the superset explicitly.
    #[must_use]
    pub fn not(subtracted: Self, superset: Self) -> Self {
        if matches!(superset.kind, FormulaKind::Empty) {
            return Self::empty();
        }
        let fingerprint = hash_parts(TAG_NOT, &[subtracted.fingerprint, superset.fingerprint]);
        Self {
            fingerprint,
            kind: FormulaKind::Not {
                subtracted: Box::new(subtracted),
                superset: Box::new(superset),
            },
        }
    }

    /// Wrap an expensive computation (typically a nested sub-query) so it
    /// runs only when an enclosing node demands it, and at most once per
    /// execution. `context_fingerprint` must identify the index set,
    /// constraint sub-tree and schema context producing the result.
    #[must_use]
    pub fn deferred(context_fingerprint: u64, supplier: impl Fn() -> Bitmap + 'a) -> Self {
        Self {
            fingerprint: hash_parts(TAG_DEFERRED, &[context_fingerprint]),
            kind: FormulaKind::Deferred {
                supplier: Box::new(supplier),
            },
        }
    }

    /// Apply a bitmap-to-bitmap transform to the child's result, e.g. the
    /// hop from referenced-entity PKs back into the referencing space.
    #[must_use]
    pub fn mapping(
        context_fingerprint: u64,
        child: Self,
        transform: impl Fn(&Bitmap) -> Bitmap + 'a,
    ) -> Self {
        let fingerprint = hash_parts(TAG_MAPPING, &[context_fingerprint, child.fingerprint]);
        Self {
            fingerprint,
            kind: FormulaKind::Mapping {
                child: Box::new(child),
                transform: Box::new(transform),
            },
        }
    }

    #[must_use]
    pub const fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Number of nodes in this tree.
    #[must_use]
    pub fn node_count(&self) -> u64 {
        1 + match &self.kind {
            FormulaKind::Empty | FormulaKind::Constant(_) | FormulaKind::Deferred { .. } => 0,
            FormulaKind::And(children) | FormulaKind::Or(children) => {
                children.iter().map(Self::node_count).sum()
            }
            FormulaKind::Not {
                subtracted,
                superset,
            } => subtracted.node_count() + superset.node_count(),
            FormulaKind::Mapping { child, .. } => child.node_count(),
        }
    }

    /// Evaluate the node, memoizing the result in the execution context.
    #[must_use]
    pub fn compute(&self, exec: &mut QueryExecutionContext) -> Bitmap {
        match &self.kind {
            FormulaKind::Empty => Bitmap::new(),
            FormulaKind::Constant(bitmap) => bitmap.clone(),
            _ => {
                if let Some(hit) = exec.cache.get(&self.fingerprint) {
                    sink::emit(MetricsEvent::FormulaCacheHit);
                    return hit.clone();
                }
                sink::emit(MetricsEvent::FormulaCacheMiss);
                let result = self.compute_uncached(exec);
                exec.cache.insert(self.fingerprint, result.clone());
                result
            }
        }
    }

    fn compute_uncached(&self, exec: &mut QueryExecutionContext) -> Bitmap {
        match &self.kind {
            FormulaKind::Empty => Bitmap::new(),
            FormulaKind::Constant(bitmap) => bitmap.clone(),
            FormulaKind::And(children) => {
                let mut iter = children.iter();
                let Some(first) = iter.next() else {
                    return Bitmap::new();
                };
                let mut result = first.compute(exec);
                for child in iter {
                    if result.is_empty() {
                        return result;
                    }
                    result &= &child.compute(exec);
                }
                result
            }
            FormulaKind::Or(children) => {
                let mut result = Bitmap::new();
                for child in children {
                    result |= &child.compute(exec);
                }
                result
            }
            FormulaKind::Not {
                subtracted,
                superset,
            } => &superset.compute(exec) - &subtracted.compute(exec),
            FormulaKind::Deferred { supplier } => supplier(),
            FormulaKind::Mapping { child, transform } => transform(&child.compute(exec)),
        }
    }
}

impl fmt::Debug for Formula<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.kind {
            FormulaKind::Empty => "Empty",
            FormulaKind::Constant(_) => "Constant",
            FormulaKind::And(_) => "And",
            FormulaKind::Or(_) => "Or",
            FormulaKind::Not { .. } => "Not",
            FormulaKind::Deferred { .. } => "Deferred",
            FormulaKind::Mapping { .. } => "Mapping",
        };
        write!(f, "{name}({:#018x})", self.fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;

    fn compute(formula: &Formula<'_>) -> Vec<u32> {
        let mut exec = QueryExecutionContext::new();
        formula.compute(&mut exec).to_vec()
    }

    fn arb_bitmap() -> impl Strategy<Value = Bitmap> {
        prop::collection::btree_set(0u32..64, 0..16).prop_map(Bitmap::of)
    }

    #[test]
    fn and_with_empty_is_empty() {
        let formula = Formula::and(vec![
            Formula::constant(Bitmap::of([1, 2, 3])),
            Formula::empty(),
        ]);
        assert_eq!(compute(&formula), Vec::<u32>::new());
    }

    #[test]
    fn or_with_empty_is_identity() {
        let formula = Formula::or(vec![
            Formula::constant(Bitmap::of([1, 2, 3])),
            Formula::empty(),
        ]);
        assert_eq!(compute(&formula), vec![1, 2, 3]);
    }

    #[test]
    fn not_subtracts_from_superset() {
        let formula = Formula::not(
            Formula::constant(Bitmap::of([2, 3])),
            Formula::constant(Bitmap::of([1, 2, 3, 4])),
        );
        assert_eq!(compute(&formula), vec![1, 4]);
    }

    #[test]
    fn nested_same_kind_nodes_flatten() {
        let inner = Formula::or(vec![
            Formula::constant(Bitmap::of([1])),
            Formula::constant(Bitmap::of([2])),
        ]);
        let formula = Formula::or(vec![inner, Formula::constant(Bitmap::of([3]))]);
        assert_eq!(compute(&formula), vec![1, 2, 3]);
    }

    #[test]
    fn deferred_supplier_runs_exactly_once_per_execution() {
        let calls = Cell::new(0u32);
        let make_deferred = || {
            Formula::deferred(42, || {
                calls.set(calls.get() + 1);
                Bitmap::of([7, 8])
            })
        };
        // the same sub-expression appears in two sibling branches
        let formula = Formula::or(vec![
            Formula::and(vec![make_deferred(), Formula::constant(Bitmap::of([7]))]),
            Formula::and(vec![make_deferred(), Formula::constant(Bitmap::of([8]))]),
        ]);

        let mut exec = QueryExecutionContext::new();
        assert_eq!(formula.compute(&mut exec).to_vec(), vec![7, 8]);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn distinct_context_fingerprints_do_not_share_results() {
        let first = Formula::deferred(1, || Bitmap::of([1]));
        let second = Formula::deferred(2, || Bitmap::of([2]));
        let formula = Formula::or(vec![first, second]);
        assert_eq!(compute(&formula), vec![1, 2]);
    }

    proptest! {
        #[test]
        fn and_is_commutative(a in arb_bitmap(), b in arb_bitmap()) {
            let left = Formula::and(vec![
                Formula::constant(a.clone()),
                Formula::constant(b.clone()),
            ]);
            let right = Formula::and(vec![Formula::constant(b), Formula::constant(a)]);
            prop_assert_eq!(compute(&left), compute(&right));
        }

        #[test]
        fn or_is_commutative(a in arb_bitmap(), b in arb_bitmap()) {
            let left = Formula::or(vec![
                Formula::constant(a.clone()),
                Formula::constant(b.clone()),
            ]);
            let right = Formula::or(vec![Formula::constant(b), Formula::constant(a)]);
            prop_assert_eq!(compute(&left), compute(&right));
        }

        #[test]
        fn and_absorbs_or(a in arb_bitmap(), b in arb_bitmap()) {
            // AND(A, OR(A, B)) == A
            let formula = Formula::and(vec![
                Formula::constant(a.clone()),
                Formula::or(vec![
                    Formula::constant(a.clone()),
                    Formula::constant(b),
                ]),
            ]);
            prop_assert_eq!(compute(&formula), a.to_vec());
        }
    }
}
