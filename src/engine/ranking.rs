//! Candidate ranking.

use std::cmp::Ordering;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::index::RankedCandidate;

/// One ranking criterion. Rules are applied in order; a later rule only
/// separates candidates the earlier ones consider equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum RankingRule {
    /// Nearer links first; direct declarations before bundle members
    ScopeNearness,
    NonGenericFirst,
    /// Provided type equal to the request before widened matches
    ExactMatch,
}

impl RankingRule {
    pub fn name(self) -> &'static str {
        match self {
            RankingRule::ScopeNearness => "scope_nearness",
            RankingRule::NonGenericFirst => "non_generic_first",
            RankingRule::ExactMatch => "exact_match",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "scope_nearness" => Some(RankingRule::ScopeNearness),
            "non_generic_first" => Some(RankingRule::NonGenericFirst),
            "exact_match" => Some(RankingRule::ExactMatch),
            _ => None,
        }
    }

    /// `Greater` when `a` ranks above `b`
    fn compare(self, a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
        match self {
            RankingRule::ScopeNearness => a.precedence.cmp_nearness(&b.precedence),
            RankingRule::NonGenericFirst => b.generic.cmp(&a.generic),
            RankingRule::ExactMatch => a.exact.cmp(&b.exact),
        }
    }
}

/// Ordered ranking rules.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(transparent))]
pub struct RankingPolicy {
    rules: Vec<RankingRule>,
}

/// Outcome of ranking a non-empty candidate list.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Chosen(RankedCandidate),
    /// Top group has more than one member; sorted by callable id
    Tied(Vec<RankedCandidate>),
}

impl RankingPolicy {
    pub fn new(rules: Vec<RankingRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[RankingRule] {
        &self.rules
    }

    pub fn compare(&self, a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
        self.rules
            .iter()
            .map(|rule| rule.compare(a, b))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }

    /// Picks the single best candidate, or reports the tied top group
    pub fn select(&self, candidates: Vec<RankedCandidate>) -> Option<Selection> {
        let mut top: Vec<RankedCandidate> = Vec::new();
        for candidate in candidates {
            match top.first().map(|best| self.compare(&candidate, best)) {
                None | Some(Ordering::Equal) => top.push(candidate),
                Some(Ordering::Greater) => {
                    top.clear();
                    top.push(candidate);
                }
                Some(Ordering::Less) => {}
            }
        }

        if top.len() > 1 {
            top.sort_by(|a, b| a.callable.id.cmp(&b.callable.id));
            return Some(Selection::Tied(top));
        }
        top.pop().map(Selection::Chosen)
    }
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self::new(vec![
            RankingRule::ScopeNearness,
            RankingRule::NonGenericFirst,
            RankingRule::ExactMatch,
        ])
    }
}
