// # Predicate Primitives
//
// `Domain` (a per-column value set) and `TupleDomain<C>` (a conjunction of
// per-column domains). In the coordinator this crate was carved out of,
// these live in a separate predicate-algebra crate and are merely consumed
// here; this module is a self-contained stand-in with the same contract
// so the service can be built, exercised, and tested on its own.
//
// `Domain` is a sorted, non-overlapping list of inclusive value ranges plus
// an `All` marker. A single-point range (`low == high`) represents one
// discrete equality value, which is the common case for join keys.

use crate::common::Value;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// An inclusive range of scalar values. `low` and `high` are expected to be
/// the same `Value` variant (domains are per-column, hence per-type).
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRange {
    pub low: Value,
    pub high: Value,
}

impl ValueRange {
    pub fn single(v: Value) -> Self {
        Self {
            low: v.clone(),
            high: v,
        }
    }

    /// True if the two ranges share at least one value. Unlike a
    /// type-specific domain implementation, this does not merge merely
    /// *touching* discrete ranges (e.g. `[1,1]` and `[2,2]`) since `Value`
    /// has no generic successor function to detect that.
    fn overlaps(&self, other: &ValueRange) -> bool {
        self.low <= other.high && other.low <= self.high
    }

    fn union_with(&self, other: &ValueRange) -> ValueRange {
        ValueRange {
            low: if self.low <= other.low {
                self.low.clone()
            } else {
                other.low.clone()
            },
            high: if self.high >= other.high {
                self.high.clone()
            } else {
                other.high.clone()
            },
        }
    }

    fn intersect_with(&self, other: &ValueRange) -> Option<ValueRange> {
        let low = if self.low >= other.low {
            self.low.clone()
        } else {
            other.low.clone()
        };
        let high = if self.high <= other.high {
            self.high.clone()
        } else {
            other.high.clone()
        };
        if low <= high {
            Some(ValueRange { low, high })
        } else {
            None
        }
    }
}

/// A value set over one column's type.
///
/// Obeys: `union(x, ALL) = ALL`, `intersect(x, ALL) = x`, `union`/`intersect`
/// are associative and commutative, `is_all(ALL) = true`.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// The universe: every value is possibly present.
    All,
    /// A sorted, merged (no overlapping entries), possibly empty list of
    /// inclusive ranges. An empty list is the bottom element
    /// (no value can satisfy this domain) — reachable in principle, though
    /// nothing in this service ever constructs it deliberately.
    Ranges(Vec<ValueRange>),
}

impl Domain {
    pub fn all() -> Self {
        Domain::All
    }

    pub fn none() -> Self {
        Domain::Ranges(Vec::new())
    }

    pub fn single(v: Value) -> Self {
        Domain::Ranges(vec![ValueRange::single(v)])
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let mut ranges: Vec<ValueRange> = values.into_iter().map(ValueRange::single).collect();
        normalize(&mut ranges);
        Domain::Ranges(ranges)
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Domain::All)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Domain::Ranges(r) if r.is_empty())
    }

    /// Number of disjuncts (ranges) making up this domain. `All` has no
    /// meaningful disjunct count.
    pub fn range_count(&self) -> usize {
        match self {
            Domain::All => 0,
            Domain::Ranges(r) => r.len(),
        }
    }

    /// Number of disjuncts that are single discrete values (`low == high`).
    pub fn discrete_value_count(&self) -> usize {
        match self {
            Domain::All => 0,
            Domain::Ranges(r) => r.iter().filter(|rg| rg.low == rg.high).count(),
        }
    }

    pub fn union(&self, other: &Domain) -> Domain {
        match (self, other) {
            (Domain::All, _) | (_, Domain::All) => Domain::All,
            (Domain::Ranges(a), Domain::Ranges(b)) => {
                let mut merged = a.clone();
                merged.extend(b.iter().cloned());
                normalize(&mut merged);
                Domain::Ranges(merged)
            }
        }
    }

    pub fn union_all<'a>(domains: impl IntoIterator<Item = &'a Domain>) -> Domain {
        domains
            .into_iter()
            .fold(Domain::none(), |acc, d| acc.union(d))
    }

    pub fn intersect(&self, other: &Domain) -> Domain {
        match (self, other) {
            (Domain::All, d) | (d, Domain::All) => d.clone(),
            (Domain::Ranges(a), Domain::Ranges(b)) => {
                let mut out = Vec::new();
                for ra in a {
                    for rb in b {
                        if let Some(r) = ra.intersect_with(rb) {
                            out.push(r);
                        }
                    }
                }
                normalize(&mut out);
                Domain::Ranges(out)
            }
        }
    }

    /// A lossy, conservative over-approximation with at most `threshold`
    /// disjuncts, for compact display (EXPLAIN/UI). Never widens `All` to
    /// anything, and never collapses to `All` unless it already was one —
    /// a single bounding range is strictly more informative.
    pub fn simplify(&self, threshold: usize) -> Domain {
        match self {
            Domain::All => Domain::All,
            Domain::Ranges(ranges) if ranges.len() <= threshold => Domain::Ranges(ranges.clone()),
            Domain::Ranges(ranges) => {
                if ranges.is_empty() {
                    return Domain::Ranges(Vec::new());
                }
                let low = ranges.first().unwrap().low.clone();
                let high = ranges.last().unwrap().high.clone();
                Domain::Ranges(vec![ValueRange { low, high }])
            }
        }
    }
}

fn normalize(ranges: &mut Vec<ValueRange>) {
    ranges.sort_by(|a, b| a.low.cmp(&b.low).then_with(|| a.high.cmp(&b.high)));
    let mut merged: Vec<ValueRange> = Vec::with_capacity(ranges.len());
    for r in ranges.drain(..) {
        match merged.last_mut() {
            Some(last) if last.overlaps(&r) => {
                *last = last.union_with(&r);
            }
            _ => merged.push(r),
        }
    }
    *ranges = merged;
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::All => write!(f, "ALL"),
            Domain::Ranges(ranges) if ranges.is_empty() => write!(f, "NONE"),
            Domain::Ranges(ranges) => {
                let parts: Vec<String> = ranges
                    .iter()
                    .map(|r| {
                        if r.low == r.high {
                            r.low.to_display_string()
                        } else {
                            format!("[{}, {}]", r.low, r.high)
                        }
                    })
                    .collect();
                write!(f, "{}", parts.join(" OR "))
            }
        }
    }
}

/// A conjunction of per-column domains.
///
/// Absent columns are implicitly `Domain::All` (the identity element under
/// `intersect`), so `all()` is represented by an empty constraint map rather
/// than a separate variant.
#[derive(Debug, Clone)]
pub struct TupleDomain<C: Eq + Hash + Clone> {
    column_domains: HashMap<C, Domain>,
}

impl<C: Eq + Hash + Clone> TupleDomain<C> {
    pub fn all() -> Self {
        Self {
            column_domains: HashMap::new(),
        }
    }

    pub fn with_column_domains(domains: HashMap<C, Domain>) -> Self {
        Self {
            column_domains: domains,
        }
    }

    pub fn is_all(&self) -> bool {
        self.column_domains.values().all(Domain::is_all)
    }

    pub fn domain(&self, column: &C) -> Domain {
        self.column_domains
            .get(column)
            .cloned()
            .unwrap_or(Domain::All)
    }

    pub fn column_domains(&self) -> &HashMap<C, Domain> {
        &self.column_domains
    }

    /// Conjunction: the intersection of two tuple domains, column by
    /// column. A column present in only one operand carries over unchanged
    /// (it is implicitly `All` in the other).
    pub fn intersect(&self, other: &TupleDomain<C>) -> TupleDomain<C> {
        let mut merged = self.column_domains.clone();
        for (col, domain) in &other.column_domains {
            merged
                .entry(col.clone())
                .and_modify(|existing| *existing = existing.intersect(domain))
                .or_insert_with(|| domain.clone());
        }
        TupleDomain {
            column_domains: merged,
        }
    }
}
