//! Declarative label rules mapping StatCan labels to aggregation buckets

use crate::ingestion::table::Table;
use regex::Regex;
use std::collections::BTreeMap;

/// How a rule recognizes a label
#[derive(Debug, Clone, Copy)]
pub enum LabelMatch {
    Exact(&'static str),
    Pattern(&'static str),
    ContainsIgnoreCase(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct Rule<B> {
    pub bucket: B,
    pub matcher: LabelMatch,
}

impl<B> Rule<B> {
    pub const fn exact(bucket: B, label: &'static str) -> Self {
        Self {
            bucket,
            matcher: LabelMatch::Exact(label),
        }
    }

    pub const fn pattern(bucket: B, pattern: &'static str) -> Self {
        Self {
            bucket,
            matcher: LabelMatch::Pattern(pattern),
        }
    }

    pub const fn contains(bucket: B, needle: &'static str) -> Self {
        Self {
            bucket,
            matcher: LabelMatch::ContainsIgnoreCase(needle),
        }
    }
}

#[derive(Debug)]
enum Compiled {
    Exact(&'static str),
    Pattern(Regex),
    Contains(String),
}

impl Compiled {
    fn matches(&self, label: &str) -> bool {
        match self {
            Compiled::Exact(expected) => label == *expected,
            Compiled::Pattern(re) => re.is_match(label),
            Compiled::Contains(needle) => label.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// Rule table compiled once per extraction
#[derive(Debug)]
pub struct Classifier<B> {
    rules: Vec<(B, Compiled)>,
}

impl<B: Copy + Ord> Classifier<B> {
    pub fn new(rules: &[Rule<B>]) -> Result<Self, regex::Error> {
        let rules = rules
            .iter()
            .map(|rule| {
                let compiled = match rule.matcher {
                    LabelMatch::Exact(label) => Compiled::Exact(label),
                    LabelMatch::Pattern(pattern) => Compiled::Pattern(Regex::new(pattern)?),
                    LabelMatch::ContainsIgnoreCase(needle) => {
                        Compiled::Contains(needle.to_lowercase())
                    }
                };
                Ok((rule.bucket, compiled))
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self { rules })
    }

    /// Distinct buckets whose rules match, in rule order
    pub fn buckets(&self, label: &str) -> Vec<B> {
        let mut found = Vec::new();
        for (bucket, matcher) in &self.rules {
            if !found.contains(bucket) && matcher.matches(label) {
                found.push(*bucket);
            }
        }
        found
    }

    /// First matching bucket, for ordered category maps
    pub fn first(&self, label: &str) -> Option<B> {
        self.rules
            .iter()
            .find(|(_, matcher)| matcher.matches(label))
            .map(|(bucket, _)| *bucket)
    }

    pub fn matches_any(&self, label: &str) -> bool {
        self.rules.iter().any(|(_, matcher)| matcher.matches(label))
    }

    /// Per-bucket sum of `value_col` over `rows`; a row counts once per bucket
    pub fn sum_by_bucket(
        &self,
        table: &Table,
        label_col: usize,
        value_col: usize,
        rows: &[usize],
    ) -> BTreeMap<B, f64> {
        let mut sums = BTreeMap::new();

        for &row in rows {
            let Some(value) = table.number(row, value_col) else {
                continue;
            };
            let label = table.cell(row, label_col).unwrap_or_default();
            for bucket in self.buckets(label) {
                *sums.entry(bucket).or_insert(0.0) += value;
            }
        }

        sums
    }
}
