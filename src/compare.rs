// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed comparison of raw state text against a condition.
//!
//! A [`Condition`] pairs a [`Comparison`] with an [`Operand`]. The operand's
//! kind decides how the observed text is coerced before comparing: a text
//! operand compares text, an integer operand parses the observed value as an
//! integer, and so on. The observed value is always the left-hand side, so
//! `Condition::new(Comparison::Greater, 100)` holds when the state is above
//! 100.
//!
//! # Examples
//!
//! ```
//! use hubsocket::compare::{Comparison, Condition, compare};
//!
//! let above = Condition::new(Comparison::Greater, 100);
//! assert_eq!(compare(&above, "99"), Ok(false));
//!
//! let one_of = Condition::new(Comparison::In, [1, 2, 3]);
//! assert_eq!(compare(&one_of, "2"), Ok(true));
//! ```

use std::fmt;

use crate::error::CompareError;
use crate::types::{parse_bool, parse_f64, parse_i64};

/// The relation a condition checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// Observed equals operand.
    Equals,
    /// Observed differs from operand.
    NotEquals,
    /// Observed is strictly greater.
    Greater,
    /// Observed is greater or equal.
    GreaterOrEqual,
    /// Observed is strictly less.
    Less,
    /// Observed is less or equal.
    LessOrEqual,
    /// Observed is one of the listed values.
    In,
    /// Observed is none of the listed values.
    NotIn,
}

impl Comparison {
    /// Returns true if this comparison is defined for the operand kind.
    #[must_use]
    pub fn applies_to(self, kind: OperandKind) -> bool {
        match self {
            Self::Equals | Self::NotEquals => !kind.is_list(),
            Self::Greater | Self::GreaterOrEqual | Self::Less | Self::LessOrEqual => {
                matches!(kind, OperandKind::Text | OperandKind::Integer | OperandKind::Float)
            }
            Self::In | Self::NotIn => kind.is_list(),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Equals => "equals",
            Self::NotEquals => "not equals",
            Self::Greater => "greater",
            Self::GreaterOrEqual => "greater or equal",
            Self::Less => "less",
            Self::LessOrEqual => "less or equal",
            Self::In => "in",
            Self::NotIn => "not in",
        };
        f.write_str(name)
    }
}

/// The value a condition compares against.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Compared as text.
    Text(String),
    /// Observed value is parsed as an integer.
    Integer(i64),
    /// Observed value is parsed as a float.
    Float(f64),
    /// Observed value is parsed with the on/off vocabularies.
    Bool(bool),
    /// Membership among text values.
    TextList(Vec<String>),
    /// Membership among integers.
    IntegerList(Vec<i64>),
    /// Membership among floats.
    FloatList(Vec<f64>),
    /// Membership among booleans.
    BoolList(Vec<bool>),
}

impl Operand {
    /// Returns the kind of this operand.
    #[must_use]
    pub fn kind(&self) -> OperandKind {
        match self {
            Self::Text(_) => OperandKind::Text,
            Self::Integer(_) => OperandKind::Integer,
            Self::Float(_) => OperandKind::Float,
            Self::Bool(_) => OperandKind::Bool,
            Self::TextList(_) => OperandKind::TextList,
            Self::IntegerList(_) => OperandKind::IntegerList,
            Self::FloatList(_) => OperandKind::FloatList,
            Self::BoolList(_) => OperandKind::BoolList,
        }
    }
}

/// Discriminant of an [`Operand`], used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// A string.
    Text,
    /// A signed integer.
    Integer,
    /// A float.
    Float,
    /// A boolean.
    Bool,
    /// A list of strings.
    TextList,
    /// A list of signed integers.
    IntegerList,
    /// A list of floats.
    FloatList,
    /// A list of booleans.
    BoolList,
}

impl OperandKind {
    /// Returns true for list operands.
    #[must_use]
    pub fn is_list(self) -> bool {
        matches!(
            self,
            Self::TextList | Self::IntegerList | Self::FloatList | Self::BoolList
        )
    }
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::TextList => "text list",
            Self::IntegerList => "integer list",
            Self::FloatList => "float list",
            Self::BoolList => "bool list",
        };
        f.write_str(name)
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Operand {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for Operand {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for Operand {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<Vec<String>> for Operand {
    fn from(value: Vec<String>) -> Self {
        Self::TextList(value)
    }
}

impl From<Vec<&str>> for Operand {
    fn from(value: Vec<&str>) -> Self {
        Self::TextList(value.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Operand {
    fn from(value: [&str; N]) -> Self {
        Self::TextList(value.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<f64>> for Operand {
    fn from(value: Vec<f64>) -> Self {
        Self::FloatList(value)
    }
}

impl<const N: usize> From<[f64; N]> for Operand {
    fn from(value: [f64; N]) -> Self {
        Self::FloatList(value.to_vec())
    }
}

impl From<Vec<bool>> for Operand {
    fn from(value: Vec<bool>) -> Self {
        Self::BoolList(value)
    }
}

impl<const N: usize> From<[bool; N]> for Operand {
    fn from(value: [bool; N]) -> Self {
        Self::BoolList(value.to_vec())
    }
}

macro_rules! integer_operand {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    Self::Integer(i64::from(value))
                }
            }

            impl From<Vec<$ty>> for Operand {
                fn from(value: Vec<$ty>) -> Self {
                    Self::IntegerList(value.into_iter().map(i64::from).collect())
                }
            }

            impl<const N: usize> From<[$ty; N]> for Operand {
                fn from(value: [$ty; N]) -> Self {
                    Self::IntegerList(value.into_iter().map(i64::from).collect())
                }
            }
        )*
    };
}

integer_operand!(i8, i16, i32, i64, u8, u16, u32);

/// A comparison paired with its operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    comparison: Comparison,
    operand: Operand,
}

impl Condition {
    /// Creates a new condition.
    #[must_use]
    pub fn new(comparison: Comparison, operand: impl Into<Operand>) -> Self {
        Self {
            comparison,
            operand: operand.into(),
        }
    }

    /// Returns the comparison.
    #[must_use]
    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    /// Returns the operand.
    #[must_use]
    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    /// Evaluates the condition against observed state text.
    ///
    /// # Errors
    ///
    /// See [`compare`].
    pub fn evaluate(&self, observed: &str) -> Result<bool, CompareError> {
        compare(self, observed)
    }
}

/// Compares observed state text against a condition.
///
/// # Errors
///
/// Returns `CompareError::UnsupportedComparison` if the comparison is not
/// defined for the operand kind (ordering on booleans, membership on
/// scalars, equality on lists), and `CompareError::Coercion` if the observed
/// text cannot be read as the operand's type.
pub fn compare(condition: &Condition, observed: &str) -> Result<bool, CompareError> {
    let comparison = condition.comparison;
    let kind = condition.operand.kind();
    if !comparison.applies_to(kind) {
        return Err(CompareError::UnsupportedComparison {
            comparison,
            operand: kind,
        });
    }

    let result = match &condition.operand {
        Operand::Text(expected) => ordered(comparison, observed, expected.as_str()),
        Operand::Integer(expected) => ordered(comparison, &parse_i64(observed)?, expected),
        Operand::Float(expected) => ordered(comparison, &parse_f64(observed)?, expected),
        Operand::Bool(expected) => ordered(comparison, &parse_bool(observed)?, expected),
        Operand::TextList(items) => membership(comparison, items.iter().any(|i| i == observed)),
        Operand::IntegerList(items) => {
            let value = parse_i64(observed)?;
            membership(comparison, items.contains(&value))
        }
        Operand::FloatList(items) => {
            let value = parse_f64(observed)?;
            #[allow(clippy::float_cmp)]
            let found = items.iter().any(|i| *i == value);
            membership(comparison, found)
        }
        Operand::BoolList(items) => {
            let value = parse_bool(observed)?;
            membership(comparison, items.contains(&value))
        }
    };
    Ok(result)
}

#[allow(clippy::float_cmp)]
fn ordered<T: PartialOrd + ?Sized>(comparison: Comparison, observed: &T, expected: &T) -> bool {
    match comparison {
        Comparison::Equals => observed == expected,
        Comparison::NotEquals => observed != expected,
        Comparison::Greater => observed > expected,
        Comparison::GreaterOrEqual => observed >= expected,
        Comparison::Less => observed < expected,
        Comparison::LessOrEqual => observed <= expected,
        // Rejected by `applies_to` before coercion.
        Comparison::In | Comparison::NotIn => false,
    }
}

fn membership(comparison: Comparison, found: bool) -> bool {
    match comparison {
        Comparison::In => found,
        Comparison::NotIn => !found,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValueError;

    #[test]
    fn text_equality() {
        let c = Condition::new(Comparison::Equals, "123");
        assert_eq!(compare(&c, "123"), Ok(true));
        assert_eq!(compare(&c, "124"), Ok(false));

        let c = Condition::new(Comparison::NotEquals, "off");
        assert_eq!(compare(&c, "on"), Ok(true));
    }

    #[test]
    fn text_ordering_is_lexical() {
        let c = Condition::new(Comparison::Less, "b");
        assert_eq!(compare(&c, "a"), Ok(true));
        assert_eq!(compare(&c, "c"), Ok(false));
    }

    #[test]
    fn integer_ordering_uses_observed_as_left_side() {
        let c = Condition::new(Comparison::Greater, 100);
        assert_eq!(compare(&c, "99"), Ok(false));
        assert_eq!(compare(&c, "101"), Ok(true));
        assert_eq!(compare(&c, "100"), Ok(false));

        let c = Condition::new(Comparison::GreaterOrEqual, 100);
        assert_eq!(compare(&c, "100"), Ok(true));

        let c = Condition::new(Comparison::LessOrEqual, -5);
        assert_eq!(compare(&c, "-6"), Ok(true));
    }

    #[test]
    fn float_ordering() {
        let c = Condition::new(Comparison::Less, 21.5);
        assert_eq!(compare(&c, "20.9"), Ok(true));
        assert_eq!(compare(&c, "22"), Ok(false));
    }

    #[test]
    fn bool_equality_uses_vocabularies() {
        let c = Condition::new(Comparison::Equals, true);
        assert_eq!(compare(&c, "on"), Ok(true));
        assert_eq!(compare(&c, "locked"), Ok(true));
        assert_eq!(compare(&c, "closed"), Ok(false));
    }

    #[test]
    fn membership() {
        let c = Condition::new(Comparison::In, [1, 2, 3]);
        assert_eq!(compare(&c, "2"), Ok(true));
        assert_eq!(compare(&c, "4"), Ok(false));

        let c = Condition::new(Comparison::NotIn, ["heat", "cool"]);
        assert_eq!(compare(&c, "off"), Ok(true));
        assert_eq!(compare(&c, "heat"), Ok(false));

        let c = Condition::new(Comparison::In, vec![1.5, 2.5]);
        assert_eq!(compare(&c, "2.5"), Ok(true));

        let c = Condition::new(Comparison::In, [true]);
        assert_eq!(compare(&c, "open"), Ok(true));
    }

    #[test]
    fn ordering_on_bool_is_rejected() {
        let c = Condition::new(Comparison::Greater, true);
        assert_eq!(
            compare(&c, "on"),
            Err(CompareError::UnsupportedComparison {
                comparison: Comparison::Greater,
                operand: OperandKind::Bool,
            })
        );
    }

    #[test]
    fn membership_on_scalar_and_equality_on_list_are_rejected() {
        let c = Condition::new(Comparison::In, 3);
        assert!(matches!(
            compare(&c, "3"),
            Err(CompareError::UnsupportedComparison { .. })
        ));

        let c = Condition::new(Comparison::Equals, [1, 2]);
        assert!(matches!(
            compare(&c, "1"),
            Err(CompareError::UnsupportedComparison { .. })
        ));
    }

    #[test]
    fn coercion_failure_is_an_error() {
        let c = Condition::new(Comparison::Equals, 5);
        assert_eq!(
            compare(&c, "five"),
            Err(CompareError::Coercion(ValueError::NotConvertible {
                value: "five".to_string(),
                target: "integer",
            }))
        );

        let c = Condition::new(Comparison::Equals, false);
        assert!(matches!(
            compare(&c, "maybe"),
            Err(CompareError::Coercion(_))
        ));
    }

    #[test]
    fn error_display_names_comparison_and_kind() {
        let err = CompareError::UnsupportedComparison {
            comparison: Comparison::GreaterOrEqual,
            operand: OperandKind::TextList,
        };
        assert_eq!(
            err.to_string(),
            "greater or equal is not supported for text list operands"
        );
    }
}
