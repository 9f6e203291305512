// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Filter predicate trees
//!
//! The optimizer translates a scalar filter into this tree before asking
//! for statistics. Every node names the column it restricts, or `None` if
//! it spans several columns. Boolean nodes compute their column once when
//! built: it is the children's common column, if they share one.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::core::{CmpType, ColumnId, Point, Value};

/// A filter predicate understood by the estimator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Predicate {
    /// All children hold
    Conjunction {
        children: Vec<Predicate>,
        column: Option<ColumnId>,
    },
    /// At least one child holds
    Disjunction {
        children: Vec<Predicate>,
        column: Option<ColumnId>,
    },
    /// `column <cmp> point`
    Point {
        column: ColumnId,
        cmp: CmpType,
        point: Point,
    },
    /// `column LIKE pattern`
    Like { column: ColumnId },
    /// Anything else, with a scale factor chosen by the caller
    Unsupported {
        column: Option<ColumnId>,
        scale_factor: f64,
    },
}

impl Predicate {
    /// Conjunction of the children
    pub fn and(children: Vec<Predicate>) -> Self {
        let column = common_column(&children);
        Predicate::Conjunction { children, column }
    }

    /// Disjunction of the children
    pub fn or(children: Vec<Predicate>) -> Self {
        let column = common_column(&children);
        Predicate::Disjunction { children, column }
    }

    /// Comparison of a column with a constant
    pub fn point(column: ColumnId, cmp: CmpType, value: impl Into<Value>) -> Self {
        Predicate::Point {
            column,
            cmp,
            point: Point::new(value),
        }
    }

    /// Pattern match on a column
    pub fn like(column: ColumnId) -> Self {
        Predicate::Like { column }
    }

    /// Predicate the histograms cannot model
    pub fn unsupported(column: Option<ColumnId>, scale_factor: f64) -> Self {
        Predicate::Unsupported {
            column,
            scale_factor,
        }
    }

    /// Column restricted by this predicate, None for cross-column predicates
    pub fn column(&self) -> Option<ColumnId> {
        match self {
            Predicate::Conjunction { column, .. }
            | Predicate::Disjunction { column, .. }
            | Predicate::Unsupported { column, .. } => *column,
            Predicate::Point { column, .. } | Predicate::Like { column } => Some(*column),
        }
    }

    /// Children of a boolean node, empty for leaves
    pub fn children(&self) -> &[Predicate] {
        match self {
            Predicate::Conjunction { children, .. } | Predicate::Disjunction { children, .. } => {
                children
            }
            _ => &[],
        }
    }

    pub fn is_conj_or_disj(&self) -> bool {
        matches!(
            self,
            Predicate::Conjunction { .. } | Predicate::Disjunction { .. }
        )
    }

    pub fn is_disjunction(&self) -> bool {
        matches!(self, Predicate::Disjunction { .. })
    }

    /// Unsupported predicate that restricts no single column
    pub fn is_unsupported_without_column(&self) -> bool {
        matches!(self, Predicate::Unsupported { column: None, .. })
    }

    /// Children in processing order: by column, cross-column children last
    ///
    /// The sort is stable so children on the same column keep their order.
    pub fn sorted_children(&self) -> Vec<&Predicate> {
        let mut sorted: Vec<&Predicate> = self.children().iter().collect();
        sorted.sort_by_key(|child| {
            let column = child.column();
            (column.is_none(), column)
        });
        sorted
    }

    /// Every column referenced anywhere in the tree
    ///
    /// Unsupported predicates without a column reference nothing.
    pub fn used_columns(&self) -> FxHashSet<ColumnId> {
        let mut columns = FxHashSet::default();
        self.collect_used_columns(&mut columns);
        columns
    }

    fn collect_used_columns(&self, columns: &mut FxHashSet<ColumnId>) {
        match self {
            Predicate::Conjunction { children, .. } | Predicate::Disjunction { children, .. } => {
                for child in children {
                    child.collect_used_columns(columns);
                }
            }
            Predicate::Point { column, .. } | Predicate::Like { column } => {
                columns.insert(*column);
            }
            Predicate::Unsupported { column, .. } => {
                if let Some(column) = column {
                    columns.insert(*column);
                }
            }
        }
    }
}

/// The column shared by every child, if there is one
fn common_column(children: &[Predicate]) -> Option<ColumnId> {
    let (first, rest) = children.split_first()?;
    let column = first.column()?;
    rest.iter()
        .all(|child| child.column() == Some(column))
        .then_some(column)
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Predicate], op: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", op)?;
        }
        write!(f, "{}", child)?;
    }
    write!(f, ")")
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Conjunction { children, .. } => write_joined(f, children, "AND"),
            Predicate::Disjunction { children, .. } => write_joined(f, children, "OR"),
            Predicate::Point { column, cmp, point } => write!(f, "#{} {} {}", column, cmp, point),
            Predicate::Like { column } => write!(f, "#{} LIKE ...", column),
            Predicate::Unsupported {
                column: Some(column),
                scale_factor,
            } => write!(f, "#{} UNSUPPORTED(sf={})", column, scale_factor),
            Predicate::Unsupported {
                column: None,
                scale_factor,
            } => write!(f, "UNSUPPORTED(sf={})", scale_factor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_column() {
        let same = Predicate::and(vec![
            Predicate::point(1, CmpType::Gt, 5i64),
            Predicate::point(1, CmpType::Lt, 10i64),
        ]);
        assert_eq!(same.column(), Some(1));

        let mixed = Predicate::or(vec![
            Predicate::point(1, CmpType::Eq, 5i64),
            Predicate::like(2),
        ]);
        assert_eq!(mixed.column(), None);

        let with_unsupported = Predicate::and(vec![
            Predicate::point(1, CmpType::Eq, 5i64),
            Predicate::unsupported(None, 3.0),
        ]);
        assert_eq!(with_unsupported.column(), None);
        assert_eq!(Predicate::and(vec![]).column(), None);
    }

    #[test]
    fn test_sorted_children_puts_cross_column_last() {
        let pred = Predicate::and(vec![
            Predicate::unsupported(None, 2.0),
            Predicate::point(3, CmpType::Eq, 1i64),
            Predicate::like(1),
            Predicate::point(3, CmpType::Lt, 9i64),
        ]);
        let order: Vec<Option<ColumnId>> =
            pred.sorted_children().iter().map(|c| c.column()).collect();
        assert_eq!(order, vec![Some(1), Some(3), Some(3), None]);

        // Stable within a column
        let sorted = pred.sorted_children();
        assert!(matches!(sorted[1], Predicate::Point { cmp: CmpType::Eq, .. }));
        assert!(matches!(sorted[2], Predicate::Point { cmp: CmpType::Lt, .. }));
    }

    #[test]
    fn test_used_columns() {
        let pred = Predicate::or(vec![
            Predicate::and(vec![
                Predicate::point(1, CmpType::Eq, 1i64),
                Predicate::point(2, CmpType::Eq, 2i64),
            ]),
            Predicate::unsupported(None, 4.0),
            Predicate::unsupported(Some(7), 4.0),
        ]);
        let mut used: Vec<ColumnId> = pred.used_columns().into_iter().collect();
        used.sort_unstable();
        assert_eq!(used, vec![1, 2, 7]);
    }

    #[test]
    fn test_display() {
        let pred = Predicate::or(vec![
            Predicate::point(1, CmpType::Eq, 5i64),
            Predicate::like(2),
        ]);
        assert_eq!(pred.to_string(), "(#1 = 5 OR #2 LIKE ...)");
    }
}
