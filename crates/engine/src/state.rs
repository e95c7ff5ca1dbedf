//! State-space algebra (spec §4.1): representations and operations on the
//! mixed scalar-range/enumerated-set spaces that every conductor carries.
//!
//! A [`Dimension`] is either a closed integer range or a finite set of
//! integers. An [`Option_`] is a tuple of dimensions -- one value per
//! conductor dimension. A [`StateSpace`] is a disjunction of options: a
//! "single-option" space (one element) or a "multi-option" space (several,
//! semantically ORed). Empty spaces (`lo > hi`, or an empty set) denote
//! infeasibility and are never materialised as empty `Dimension` values;
//! they surface as `Err(EngineError::StateSpace(..))` instead.

use crate::error::{EngineError, EngineResult};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    Range(i64, i64),
    Set(BTreeSet<i64>),
}

impl Dimension {
    pub fn range(lo: i64, hi: i64) -> Self {
        Dimension::Range(lo, hi)
    }

    pub fn set(values: impl IntoIterator<Item = i64>) -> Self {
        Dimension::Set(values.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Dimension::Range(lo, hi) => lo > hi,
            Dimension::Set(s) => s.is_empty(),
        }
    }

    pub fn intersect(&self, other: &Dimension) -> EngineResult<Dimension> {
        match (self, other) {
            (Dimension::Range(lo1, hi1), Dimension::Range(lo2, hi2)) => {
                let lo = *lo1.max(lo2);
                let hi = *hi1.min(hi2);
                if lo > hi {
                    Err(EngineError::StateSpace(format!(
                        "empty range intersection: ({lo1},{hi1}) ∩ ({lo2},{hi2})"
                    )))
                } else {
                    Ok(Dimension::Range(lo, hi))
                }
            }
            (Dimension::Set(a), Dimension::Set(b)) => {
                let s: BTreeSet<i64> = a.intersection(b).copied().collect();
                if s.is_empty() {
                    Err(EngineError::StateSpace("empty set intersection".into()))
                } else {
                    Ok(Dimension::Set(s))
                }
            }
            _ => Err(EngineError::StateSpace("dimension shape mismatch".into())),
        }
    }

    pub fn union(&self, other: &Dimension) -> EngineResult<Dimension> {
        match (self, other) {
            (Dimension::Range(lo1, hi1), Dimension::Range(lo2, hi2)) => {
                Ok(Dimension::Range(*lo1.min(lo2), *hi1.max(hi2)))
            }
            (Dimension::Set(a), Dimension::Set(b)) => {
                Ok(Dimension::Set(a.union(b).copied().collect()))
            }
            _ => Err(EngineError::StateSpace("dimension shape mismatch".into())),
        }
    }

    /// Subtracts `other` from `self`, producing zero, one or two disjoint
    /// pieces (a range split in two by removing a sub-range from its
    /// middle cannot be represented by a single `Dimension`).
    fn difference(&self, other: &Dimension) -> Vec<Dimension> {
        match (self, other) {
            (Dimension::Range(lo1, hi1), Dimension::Range(lo2, hi2)) => {
                let olo = *lo1.max(lo2);
                let ohi = *hi1.min(hi2);
                if olo > ohi {
                    return vec![self.clone()];
                }
                let mut pieces = Vec::with_capacity(2);
                if lo1 < &olo {
                    pieces.push(Dimension::Range(*lo1, olo - 1));
                }
                if hi1 > &ohi {
                    pieces.push(Dimension::Range(ohi + 1, *hi1));
                }
                pieces
            }
            (Dimension::Set(a), Dimension::Set(b)) => {
                let d: BTreeSet<i64> = a.difference(b).copied().collect();
                if d.is_empty() {
                    vec![]
                } else {
                    vec![Dimension::Set(d)]
                }
            }
            _ => vec![self.clone()],
        }
    }
}

/// One tuple of dimensions -- a single option of a conductor's state space.
pub type Option_ = Vec<Dimension>;

/// A disjunction of options. Non-empty; an infeasible result is an error,
/// never an empty `Vec`.
pub type StateSpace = Vec<Option_>;

/// Per spec §4.1: true iff `s` is a multi-option (more than one disjunct).
pub fn is_possibility(s: &StateSpace) -> bool {
    s.len() > 1
}

fn option_intersect(a: &Option_, b: &Option_) -> EngineResult<Option_> {
    if a.len() != b.len() {
        return Err(EngineError::StateSpace("option arity mismatch".into()));
    }
    a.iter().zip(b.iter()).map(|(x, y)| x.intersect(y)).collect()
}

/// Largest space contained in `a ∩ b`, preserving multi-option disjunction:
/// every pairwise-compatible combination of options from `a` and `b` is
/// tried, and every successful (non-empty) intersection survives as one
/// disjunct of the result.
pub fn intersect(a: &StateSpace, b: &StateSpace) -> EngineResult<StateSpace> {
    let mut out = Vec::new();
    for oa in a {
        for ob in b {
            if let Ok(combined) = option_intersect(oa, ob) {
                out.push(combined);
            }
        }
    }
    if out.is_empty() {
        Err(EngineError::StateSpace(format!(
            "empty intersection of {a:?} and {b:?}"
        )))
    } else {
        Ok(out)
    }
}

fn option_union(a: &Option_, b: &Option_) -> EngineResult<Option_> {
    if a.len() != b.len() {
        return Err(EngineError::StateSpace("option arity mismatch".into()));
    }
    a.iter().zip(b.iter()).map(|(x, y)| x.union(y)).collect()
}

/// Per-dimension hull: range union becomes the enclosing range, set union
/// becomes the set union. Operates option-by-option in declaration order;
/// `a` and `b` must have the same number of options.
pub fn state_union(a: &StateSpace, b: &StateSpace) -> EngineResult<StateSpace> {
    if a.len() != b.len() {
        return Err(EngineError::StateSpace(
            "state_union requires equal option counts".into(),
        ));
    }
    a.iter().zip(b.iter()).map(|(x, y)| option_union(x, y)).collect()
}

/// Splinters of `a` (a single-option tuple) that exclude `b` (also a
/// single-option tuple). For each dimension index `i`, the dimension-wise
/// difference of `a[i]` and `b[i]` yields zero, one or two surviving
/// pieces; each piece becomes one splinter, with dimensions before `i`
/// narrowed to `a ∩ b` (the overlap already excluded by an earlier
/// splinter) and dimensions after `i` left at `a`'s original value.
pub fn state_difference(a: &Option_, b: &Option_) -> Vec<Option_> {
    if a.len() != b.len() {
        return vec![a.clone()];
    }
    let mut result = Vec::new();
    for i in 0..a.len() {
        for piece in a[i].difference(&b[i]) {
            let mut splinter = Vec::with_capacity(a.len());
            let mut viable = true;
            for (j, dim) in a.iter().enumerate() {
                match j.cmp(&i) {
                    std::cmp::Ordering::Less => match dim.intersect(&b[j]) {
                        Ok(d) => splinter.push(d),
                        Err(_) => {
                            viable = false;
                            break;
                        }
                    },
                    std::cmp::Ordering::Equal => splinter.push(piece.clone()),
                    std::cmp::Ordering::Greater => splinter.push(dim.clone()),
                }
            }
            if viable {
                result.push(splinter);
            }
        }
    }
    result
}

pub(crate) fn select_dimension(d: &Dimension) -> Dimension {
    match d {
        Dimension::Range(lo, hi) => {
            let mid = (lo + hi).div_euclid(2);
            Dimension::Range(mid, mid)
        }
        Dimension::Set(s) => {
            if s.contains(&0) && s.contains(&1) {
                Dimension::Set(BTreeSet::from([0]))
            } else {
                let v = *s.iter().next().expect("non-empty by invariant");
                Dimension::Set(BTreeSet::from([v]))
            }
        }
    }
}

/// Picks one concrete representative out of a (possibly multi-option)
/// state space: the first option, with every dimension narrowed to a
/// single value per the selection policy (midpoint of a range; `{0}` for
/// a `{0,1}` set; arbitrary single element otherwise).
pub fn select_state(s: &StateSpace) -> EngineResult<Option_> {
    let option = s
        .first()
        .ok_or_else(|| EngineError::StateSpace("select_state on empty space".into()))?;
    Ok(option.iter().map(select_dimension).collect())
}

pub type StateDict = std::collections::BTreeMap<String, StateSpace>;

/// Merges `e` into `d` by per-key intersection, mutating `d` in place.
/// Raises on the first key whose intersection is empty.
pub fn unite_dict(d: &mut StateDict, e: &StateDict) -> EngineResult<()> {
    for (k, v) in e {
        match d.get(k) {
            Some(existing) => {
                let merged = intersect(existing, v)
                    .map_err(|_| EngineError::state_space(k, "unite_dict conflict"))?;
                d.insert(k.clone(), merged);
            }
            None => {
                d.insert(k.clone(), v.clone());
            }
        }
    }
    Ok(())
}

/// Same as [`unite_dict`] but returns a fresh merged dict, leaving both
/// inputs untouched.
pub fn unite_dict_return(d: &StateDict, e: &StateDict) -> EngineResult<StateDict> {
    let mut out = d.clone();
    unite_dict(&mut out, e)?;
    Ok(out)
}

/// Non-raising union merge used by the backtracker to accumulate an
/// "avoid" dictionary across failed branches: per-key [`state_union`],
/// skipping (rather than aborting on) any key whose shapes disagree --
/// such a key simply contributes nothing new to the avoid set.
pub fn state_union_dict(d: &mut StateDict, e: &StateDict) {
    for (k, v) in e {
        match d.get(k) {
            Some(existing) => {
                if let Ok(merged) = state_union(existing, v) {
                    d.insert(k.clone(), merged);
                }
            }
            None => {
                d.insert(k.clone(), v.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng(lo: i64, hi: i64) -> Dimension {
        Dimension::Range(lo, hi)
    }

    #[test]
    fn intersect_is_commutative() {
        let a: StateSpace = vec![vec![rng(4, 9), rng(25, 60)]];
        let b: StateSpace = vec![vec![rng(5, 12), rng(20, 44)]];
        let ab = intersect(&a, &b).unwrap();
        let ba = intersect(&b, &a).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn intersect_with_self_is_identity() {
        let a: StateSpace = vec![vec![rng(4, 9)]];
        assert_eq!(intersect(&a, &a).unwrap(), a);
    }

    #[test]
    fn empty_intersection_errors() {
        let a: StateSpace = vec![vec![rng(0, 1)]];
        let b: StateSpace = vec![vec![rng(4, 9)]];
        assert!(intersect(&a, &b).is_err());
    }

    #[test]
    fn select_state_range_picks_midpoint() {
        let s: StateSpace = vec![vec![rng(4, 9)]];
        let sel = select_state(&s).unwrap();
        assert_eq!(sel, vec![rng(6, 6)]);
    }

    #[test]
    fn select_state_prefers_off_for_binary_set() {
        let s: StateSpace = vec![vec![Dimension::set([0, 1])]];
        let sel = select_state(&s).unwrap();
        assert_eq!(sel, vec![Dimension::set([0])]);
    }

    #[test]
    fn state_difference_excludes_b() {
        let a: Option_ = vec![rng(0, 10)];
        let b: Option_ = vec![rng(3, 5)];
        let splinters = state_difference(&a, &b);
        for s in &splinters {
            let so: StateSpace = vec![s.clone()];
            let bo: StateSpace = vec![b.clone()];
            assert!(intersect(&so, &bo).is_err());
        }
        // (0,10) minus (3,5) => (0,2) and (6,10)
        assert_eq!(splinters, vec![vec![rng(0, 2)], vec![rng(6, 10)]]);
    }

    #[test]
    fn state_difference_multi_dimension_narrows_prefix() {
        let a: Option_ = vec![rng(0, 10), Dimension::set([0, 1, 2])];
        let b: Option_ = vec![rng(3, 5), Dimension::set([1])];
        let splinters = state_difference(&a, &b);
        // first dimension splits into two splinters (prefix empty, so second
        // dim kept at a's value); second dimension splits into one splinter
        // (prefix narrowed to the overlap of dim0).
        assert_eq!(splinters.len(), 3);
    }
}
