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

//! Core type definitions for cardest
//!
//! This module defines the fundamental types: DataType, CmpType and ColumnId

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::Error;

/// Identifier of a column inside a `Statistics` object
pub type ColumnId = u32;

/// Data types understood by the built-in catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    /// NULL data type, used for unknown/unspecified types
    #[default]
    Null = 0,

    /// 64-bit signed integer
    Integer = 1,

    /// 64-bit floating point number
    Float = 2,

    /// UTF-8 text string
    Text = 3,

    /// Boolean true/false
    Boolean = 4,

    /// Timestamp with timezone (stored as UTC)
    Timestamp = 5,
}

impl DataType {
    /// Returns true if this type is numeric (INTEGER or FLOAT)
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Float)
    }

    /// Returns true if every value of this type maps onto an integer, so
    /// that a value has a well-defined successor
    pub fn has_integer_mapping(&self) -> bool {
        matches!(
            self,
            DataType::Integer | DataType::Boolean | DataType::Timestamp
        )
    }

    /// Width in bytes of a value of this type, None for variable length types
    pub fn fixed_width(&self) -> Option<f64> {
        match self {
            DataType::Integer | DataType::Float | DataType::Timestamp => Some(8.0),
            DataType::Boolean => Some(1.0),
            DataType::Null | DataType::Text => None,
        }
    }

    /// Returns the type ID as u8 for serialization
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Create DataType from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DataType::Null),
            1 => Some(DataType::Integer),
            2 => Some(DataType::Float),
            3 => Some(DataType::Text),
            4 => Some(DataType::Boolean),
            5 => Some(DataType::Timestamp),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Null => write!(f, "NULL"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Text => write!(f, "TEXT"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NULL" => Ok(DataType::Null),
            "INTEGER" | "INT" | "BIGINT" | "SMALLINT" | "TINYINT" => Ok(DataType::Integer),
            "FLOAT" | "DOUBLE" | "REAL" | "DECIMAL" | "NUMERIC" => Ok(DataType::Float),
            "TEXT" | "VARCHAR" | "CHAR" | "STRING" => Ok(DataType::Text),
            "BOOLEAN" | "BOOL" => Ok(DataType::Boolean),
            "TIMESTAMP" | "DATETIME" | "DATE" | "TIME" => Ok(DataType::Timestamp),
            _ => Err(Error::UnknownDataType(s.to_string())),
        }
    }
}

/// Comparison types of point predicates and join conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CmpType {
    /// Equality (=)
    Eq = 0,

    /// Inequality (<>)
    NEq = 1,

    /// Less than (<)
    Lt = 2,

    /// Less than or equal (<=)
    LEq = 3,

    /// Greater than (>)
    Gt = 4,

    /// Greater than or equal (>=)
    GEq = 5,

    /// IS DISTINCT FROM
    IDF = 6,

    /// IS NOT DISTINCT FROM
    INDF = 7,

    /// Any comparison the histograms cannot model
    Other = 8,
}

impl CmpType {
    /// Returns true for `=` and `IS NOT DISTINCT FROM`
    pub fn is_equality(&self) -> bool {
        matches!(self, CmpType::Eq | CmpType::INDF)
    }

    /// Returns true for `<>` and `IS DISTINCT FROM`
    pub fn is_inequality(&self) -> bool {
        matches!(self, CmpType::NEq | CmpType::IDF)
    }

    /// Returns true for `<`, `<=`, `>` and `>=`
    pub fn is_range(&self) -> bool {
        matches!(self, CmpType::Lt | CmpType::LEq | CmpType::Gt | CmpType::GEq)
    }

    /// Returns true if a histogram filter supports this comparison
    pub fn is_filter_supported(&self) -> bool {
        !matches!(self, CmpType::Other)
    }

    /// Returns the comparison with its operands swapped
    pub fn commute(&self) -> Self {
        match self {
            CmpType::Lt => CmpType::Gt,
            CmpType::LEq => CmpType::GEq,
            CmpType::Gt => CmpType::Lt,
            CmpType::GEq => CmpType::LEq,
            other => *other,
        }
    }

    /// Returns the type ID as u8 for serialization
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for CmpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmpType::Eq => write!(f, "="),
            CmpType::NEq => write!(f, "<>"),
            CmpType::Lt => write!(f, "<"),
            CmpType::LEq => write!(f, "<="),
            CmpType::Gt => write!(f, ">"),
            CmpType::GEq => write!(f, ">="),
            CmpType::IDF => write!(f, "IS DISTINCT FROM"),
            CmpType::INDF => write!(f, "IS NOT DISTINCT FROM"),
            CmpType::Other => write!(f, "OTHER"),
        }
    }
}

impl FromStr for CmpType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "=" | "==" => Ok(CmpType::Eq),
            "!=" | "<>" => Ok(CmpType::NEq),
            "<" => Ok(CmpType::Lt),
            "<=" => Ok(CmpType::LEq),
            ">" => Ok(CmpType::Gt),
            ">=" => Ok(CmpType::GEq),
            "IS DISTINCT FROM" | "IDF" => Ok(CmpType::IDF),
            "IS NOT DISTINCT FROM" | "INDF" => Ok(CmpType::INDF),
            "OTHER" => Ok(CmpType::Other),
            _ => Err(Error::parse(format!("unknown comparison: {}", s))),
        }
    }
}
