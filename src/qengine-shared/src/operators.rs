//! Operator vocabulary
//!
//! Comparison and logical operators are closed enums. Every consumer
//! (validator, builder, backends) matches on them exhaustively, so adding
//! an operator is a compile error everywhere it is not yet handled.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison applied to a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComparisonOperator {
    /// Equal
    #[serde(rename = "$eq")]
    Eq,
    /// Not equal
    #[serde(rename = "$ne")]
    Ne,
    /// Greater than
    #[serde(rename = "$gt")]
    Gt,
    /// Greater than or equal
    #[serde(rename = "$gte")]
    Gte,
    /// Less than
    #[serde(rename = "$lt")]
    Lt,
    /// Less than or equal
    #[serde(rename = "$lte")]
    Lte,
    /// Member of a list
    #[serde(rename = "$in")]
    In,
    /// Not a member of a list
    #[serde(rename = "$nin")]
    Nin,
    /// Matches a regular expression
    #[serde(rename = "$regex")]
    Regex,
    /// Field presence
    #[serde(rename = "$exists")]
    Exists,
    /// Array length
    #[serde(rename = "$size")]
    Size,
    /// Stored value type
    #[serde(rename = "$type")]
    Type,
}

impl ComparisonOperator {
    /// Every comparison operator, in declaration order
    pub const ALL: [ComparisonOperator; 12] = [
        ComparisonOperator::Eq,
        ComparisonOperator::Ne,
        ComparisonOperator::Gt,
        ComparisonOperator::Gte,
        ComparisonOperator::Lt,
        ComparisonOperator::Lte,
        ComparisonOperator::In,
        ComparisonOperator::Nin,
        ComparisonOperator::Regex,
        ComparisonOperator::Exists,
        ComparisonOperator::Size,
        ComparisonOperator::Type,
    ];

    /// Wire symbol, e.g. `$gt`
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "$eq",
            ComparisonOperator::Ne => "$ne",
            ComparisonOperator::Gt => "$gt",
            ComparisonOperator::Gte => "$gte",
            ComparisonOperator::Lt => "$lt",
            ComparisonOperator::Lte => "$lte",
            ComparisonOperator::In => "$in",
            ComparisonOperator::Nin => "$nin",
            ComparisonOperator::Regex => "$regex",
            ComparisonOperator::Exists => "$exists",
            ComparisonOperator::Size => "$size",
            ComparisonOperator::Type => "$type",
        }
    }

    /// Look up an operator by its exact wire symbol
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    /// Range bound operators (`$gt`, `$gte`, `$lt`, `$lte`)
    pub fn is_range(self) -> bool {
        matches!(
            self,
            ComparisonOperator::Gt
                | ComparisonOperator::Gte
                | ComparisonOperator::Lt
                | ComparisonOperator::Lte
        )
    }

    /// Lower bound operators (`$gt`, `$gte`)
    pub fn is_lower_bound(self) -> bool {
        matches!(self, ComparisonOperator::Gt | ComparisonOperator::Gte)
    }

    /// Operators whose operand must be an array
    pub fn takes_array(self) -> bool {
        matches!(self, ComparisonOperator::In | ComparisonOperator::Nin)
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Boolean combinator over child conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogicalOperator {
    /// All children hold
    #[serde(rename = "$and")]
    And,
    /// At least one child holds
    #[serde(rename = "$or")]
    Or,
    /// No child holds
    #[serde(rename = "$nor")]
    Nor,
}

impl LogicalOperator {
    /// Every logical operator
    pub const ALL: [LogicalOperator; 3] = [LogicalOperator::And, LogicalOperator::Or, LogicalOperator::Nor];

    /// Wire symbol, e.g. `$and`
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOperator::And => "$and",
            LogicalOperator::Or => "$or",
            LogicalOperator::Nor => "$nor",
        }
    }

    /// Look up an operator by its exact wire symbol
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    /// `$and` and `$or` may be flattened into a parent of the same kind
    pub fn is_associative(self) -> bool {
        !matches!(self, LogicalOperator::Nor)
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Any operator key that may appear in a `where` mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKey {
    /// A comparison on a field
    Comparison(ComparisonOperator),
    /// A logical combinator
    Logical(LogicalOperator),
}

impl OperatorKey {
    /// Look up an exact wire symbol
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        ComparisonOperator::from_symbol(symbol)
            .map(OperatorKey::Comparison)
            .or_else(|| LogicalOperator::from_symbol(symbol).map(OperatorKey::Logical))
    }

    /// Wire symbol
    pub fn symbol(self) -> &'static str {
        match self {
            OperatorKey::Comparison(op) => op.symbol(),
            OperatorKey::Logical(op) => op.symbol(),
        }
    }
}

/// Resolve a user-written operator key to its canonical form.
///
/// Accepts the `$`-less alias (`gt` for `$gt`). With `case_sensitive` unset
/// the key is also case-folded, so `$GT` and `Gt` resolve as well.
pub fn canonical_operator(key: &str, case_sensitive: bool) -> Option<OperatorKey> {
    let folded;
    let key = if case_sensitive {
        key
    } else {
        folded = key.to_ascii_lowercase();
        folded.as_str()
    };
    if key.starts_with('$') {
        return OperatorKey::from_symbol(key);
    }
    if key.is_empty() {
        return None;
    }
    OperatorKey::from_symbol(&format!("${key}"))
}
