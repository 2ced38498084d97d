//! Tool record model
//!
//! This module provides:
//! - The fixed set of tool table columns and their labels
//! - Typed column values
//! - The per-tool record with its default, sentinel and new-tool forms

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Tool number of the "no tool loaded" sentinel record
pub const NO_TOOL_NUMBER: i32 = 0;

/// Tool number of a row whose `T` token is absent or malformed
pub const INVALID_TOOL_NUMBER: i32 = -1;

/// Remark carried by the sentinel record
pub const NO_TOOL_REMARK: &str = "No Tool Loaded";

/// Remark given to freshly created tools
pub const NEW_TOOL_REMARK: &str = "New Tool";

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Whole number (tool, pocket, orientation)
    Integer,
    /// Floating point (offsets, diameter, angles)
    Float,
    /// Free text (remark, model path, path color)
    Text,
}

/// Tool table column identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Column {
    /// Tool number
    T,
    /// Pocket number
    P,
    /// X offset
    X,
    /// Y offset
    Y,
    /// Z offset
    Z,
    /// A offset
    A,
    /// B offset
    B,
    /// C offset
    C,
    /// U offset
    U,
    /// V offset
    V,
    /// W offset
    W,
    /// Diameter
    D,
    /// Front angle
    I,
    /// Back angle
    J,
    /// Orientation
    Q,
    /// Remark
    R,
    /// Tool model (STL) path
    Stl,
    /// Tool path color
    Color,
}

impl Column {
    /// Get all columns in file order
    pub fn all() -> &'static [Column] {
        &[
            Column::T,
            Column::P,
            Column::X,
            Column::Y,
            Column::Z,
            Column::A,
            Column::B,
            Column::C,
            Column::U,
            Column::V,
            Column::W,
            Column::D,
            Column::I,
            Column::J,
            Column::Q,
            Column::R,
            Column::Stl,
            Column::Color,
        ]
    }

    /// Identifier as written in column specifications
    pub fn id(&self) -> &'static str {
        match self {
            Column::T => "T",
            Column::P => "P",
            Column::X => "X",
            Column::Y => "Y",
            Column::Z => "Z",
            Column::A => "A",
            Column::B => "B",
            Column::C => "C",
            Column::U => "U",
            Column::V => "V",
            Column::W => "W",
            Column::D => "D",
            Column::I => "I",
            Column::J => "J",
            Column::Q => "Q",
            Column::R => "R",
            Column::Stl => "STL",
            Column::Color => "COLOR",
        }
    }

    /// Human readable column title
    pub fn label(&self) -> &'static str {
        match self {
            Column::T => "Tool",
            Column::P => "Pocket",
            Column::X => "X Offset",
            Column::Y => "Y Offset",
            Column::Z => "Z Offset",
            Column::A => "A Offset",
            Column::B => "B Offset",
            Column::C => "C Offset",
            Column::U => "U Offset",
            Column::V => "V Offset",
            Column::W => "W Offset",
            Column::D => "Diameter",
            Column::I => "Fnt Ang",
            Column::J => "Bak Ang",
            Column::Q => "Orient",
            Column::R => "Remark",
            Column::Stl => "Tool STL Model",
            Column::Color => "Tool Path Color",
        }
    }

    /// Storage type of the column
    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::T | Column::P | Column::Q => ColumnKind::Integer,
            Column::R | Column::Stl | Column::Color => ColumnKind::Text,
            _ => ColumnKind::Float,
        }
    }

    /// Whether the column is written as a `<letter><value>` token
    pub fn is_numeric(&self) -> bool {
        self.kind() != ColumnKind::Text
    }

    /// Look up a column by its exact identifier (case-insensitive)
    pub fn from_id(id: &str) -> Option<Column> {
        let id = id.trim();
        Column::all()
            .iter()
            .copied()
            .find(|c| c.id().eq_ignore_ascii_case(id))
    }

    /// Look up a numeric column from a row token descriptor letter
    pub fn from_descriptor(letter: char) -> Option<Column> {
        Column::all()
            .iter()
            .copied()
            .filter(Column::is_numeric)
            .find(|c| c.id().len() == 1 && c.id().starts_with(letter))
    }

    /// Resolve a data item key such as `"Z"`, `"z_offset"` or `"stl"`.
    ///
    /// The multi-letter extension identifiers match in full; any other key
    /// resolves by its first character.
    pub fn from_key(key: &str) -> Option<Column> {
        let key = key.trim();
        if let Some(column) = Column::from_id(key) {
            return Some(column);
        }
        let first = key.chars().next()?.to_ascii_uppercase();
        Column::all()
            .iter()
            .copied()
            .find(|c| c.id().len() == 1 && c.id().starts_with(first))
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// A single typed column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolValue {
    /// Integer value
    Int(i32),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
}

impl ToolValue {
    /// Integer content, if any
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ToolValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric content widened to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ToolValue::Int(v) => Some(f64::from(*v)),
            ToolValue::Float(v) => Some(*v),
            ToolValue::Text(_) => None,
        }
    }

    /// Text content, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ToolValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ToolValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolValue::Int(v) => write!(f, "{}", v),
            ToolValue::Float(v) => write!(f, "{}", v),
            ToolValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for ToolValue {
    fn from(v: i32) -> Self {
        ToolValue::Int(v)
    }
}

impl From<f64> for ToolValue {
    fn from(v: f64) -> Self {
        ToolValue::Float(v)
    }
}

impl From<&str> for ToolValue {
    fn from(v: &str) -> Self {
        ToolValue::Text(v.to_string())
    }
}

impl From<String> for ToolValue {
    fn from(v: String) -> Self {
        ToolValue::Text(v)
    }
}

/// Offset and geometry record for one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    /// Tool number
    pub tool_number: i32,
    /// Tool changer pocket
    pub pocket: i32,

    // Offsets
    /// X offset
    pub x_offset: f64,
    /// Y offset
    pub y_offset: f64,
    /// Z (length) offset
    pub z_offset: f64,
    /// A offset
    pub a_offset: f64,
    /// B offset
    pub b_offset: f64,
    /// C offset
    pub c_offset: f64,
    /// U offset
    pub u_offset: f64,
    /// V offset
    pub v_offset: f64,
    /// W offset
    pub w_offset: f64,

    // Geometry
    /// Cutting diameter
    pub diameter: f64,
    /// Lathe front angle
    pub front_angle: f64,
    /// Lathe back angle
    pub back_angle: f64,
    /// Lathe orientation
    pub orientation: i32,

    // Metadata
    /// Free text remark
    pub remark: String,
    /// Tool model path
    pub model_path: String,
    /// Tool path color (`#RRGGBB`)
    pub path_color: String,
}

impl Default for ToolRecord {
    fn default() -> Self {
        Self {
            tool_number: INVALID_TOOL_NUMBER,
            pocket: 0,
            x_offset: 0.0,
            y_offset: 0.0,
            z_offset: 0.0,
            a_offset: 0.0,
            b_offset: 0.0,
            c_offset: 0.0,
            u_offset: 0.0,
            v_offset: 0.0,
            w_offset: 0.0,
            diameter: 0.0,
            front_angle: 0.0,
            back_angle: 0.0,
            orientation: 1,
            remark: String::new(),
            model_path: String::new(),
            path_color: String::new(),
        }
    }
}

impl ToolRecord {
    /// The "no tool loaded" sentinel
    pub fn no_tool() -> Self {
        Self {
            tool_number: NO_TOOL_NUMBER,
            remark: NO_TOOL_REMARK.to_string(),
            ..Self::default()
        }
    }

    /// Fresh record for a new tool, pocket matching the tool number
    pub fn new_tool(tool_number: i32) -> Self {
        Self {
            tool_number,
            pocket: tool_number,
            remark: NEW_TOOL_REMARK.to_string(),
            ..Self::default()
        }
    }

    /// Whether this is the sentinel record
    pub fn is_no_tool(&self) -> bool {
        self.tool_number == NO_TOOL_NUMBER
    }

    /// Read a single column
    pub fn get(&self, column: Column) -> ToolValue {
        match column {
            Column::T => ToolValue::Int(self.tool_number),
            Column::P => ToolValue::Int(self.pocket),
            Column::X => ToolValue::Float(self.x_offset),
            Column::Y => ToolValue::Float(self.y_offset),
            Column::Z => ToolValue::Float(self.z_offset),
            Column::A => ToolValue::Float(self.a_offset),
            Column::B => ToolValue::Float(self.b_offset),
            Column::C => ToolValue::Float(self.c_offset),
            Column::U => ToolValue::Float(self.u_offset),
            Column::V => ToolValue::Float(self.v_offset),
            Column::W => ToolValue::Float(self.w_offset),
            Column::D => ToolValue::Float(self.diameter),
            Column::I => ToolValue::Float(self.front_angle),
            Column::J => ToolValue::Float(self.back_angle),
            Column::Q => ToolValue::Int(self.orientation),
            Column::R => ToolValue::Text(self.remark.clone()),
            Column::Stl => ToolValue::Text(self.model_path.clone()),
            Column::Color => ToolValue::Text(self.path_color.clone()),
        }
    }

    /// Write a single column
    ///
    /// Integers widen into float columns; any other type mismatch is
    /// rejected with [`Error::InvalidValue`].
    pub fn set(&mut self, column: Column, value: ToolValue) -> Result<()> {
        match (column.kind(), value) {
            (ColumnKind::Integer, ToolValue::Int(v)) => {
                *self.int_field(column) = v;
                Ok(())
            }
            (ColumnKind::Float, ToolValue::Float(v)) => {
                *self.float_field(column) = v;
                Ok(())
            }
            (ColumnKind::Float, ToolValue::Int(v)) => {
                *self.float_field(column) = f64::from(v);
                Ok(())
            }
            (ColumnKind::Text, ToolValue::Text(s)) => {
                *self.text_field(column) = s;
                Ok(())
            }
            (kind, value) => Err(Error::InvalidValue {
                column,
                reason: format!("{:?} column cannot hold {:?}", kind, value),
            }),
        }
    }

    /// Shallow overwrite of the given fields onto a copy of this record
    pub fn merged<I>(&self, overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Column, ToolValue)>,
    {
        let mut record = self.clone();
        for (column, value) in overrides {
            record.set(column, value)?;
        }
        Ok(record)
    }

    fn int_field(&mut self, column: Column) -> &mut i32 {
        match column {
            Column::T => &mut self.tool_number,
            Column::P => &mut self.pocket,
            _ => &mut self.orientation,
        }
    }

    fn float_field(&mut self, column: Column) -> &mut f64 {
        match column {
            Column::X => &mut self.x_offset,
            Column::Y => &mut self.y_offset,
            Column::Z => &mut self.z_offset,
            Column::A => &mut self.a_offset,
            Column::B => &mut self.b_offset,
            Column::C => &mut self.c_offset,
            Column::U => &mut self.u_offset,
            Column::V => &mut self.v_offset,
            Column::W => &mut self.w_offset,
            Column::D => &mut self.diameter,
            Column::I => &mut self.front_angle,
            _ => &mut self.back_angle,
        }
    }

    fn text_field(&mut self, column: Column) -> &mut String {
        match column {
            Column::Stl => &mut self.model_path,
            Column::Color => &mut self.path_color,
            _ => &mut self.remark,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record() {
        let tool = ToolRecord::default();
        assert_eq!(tool.tool_number, INVALID_TOOL_NUMBER);
        assert_eq!(tool.pocket, 0);
        assert_eq!(tool.orientation, 1);
        assert_eq!(tool.diameter, 0.0);
        assert!(tool.remark.is_empty());
    }

    #[test]
    fn test_sentinel_and_new_tool() {
        let none = ToolRecord::no_tool();
        assert!(none.is_no_tool());
        assert_eq!(none.remark, "No Tool Loaded");

        let tool = ToolRecord::new_tool(5);
        assert_eq!(tool.tool_number, 5);
        assert_eq!(tool.pocket, 5);
        assert_eq!(tool.remark, "New Tool");
        assert_eq!(tool.z_offset, 0.0);
    }

    #[test]
    fn test_merged_overrides() {
        let base = ToolRecord::default();
        let tool = base
            .merged([
                (Column::T, ToolValue::Int(3)),
                (Column::Z, ToolValue::Float(-1.25)),
                (Column::D, ToolValue::Int(6)),
                (Column::R, ToolValue::from("drill")),
            ])
            .unwrap();
        assert_eq!(tool.tool_number, 3);
        assert_eq!(tool.z_offset, -1.25);
        assert_eq!(tool.diameter, 6.0);
        assert_eq!(tool.remark, "drill");
        // base untouched
        assert_eq!(base.tool_number, INVALID_TOOL_NUMBER);
    }

    #[test]
    fn test_set_rejects_type_mismatch() {
        let mut tool = ToolRecord::default();
        assert!(tool.set(Column::T, ToolValue::Float(1.5)).is_err());
        assert!(tool.set(Column::X, ToolValue::from("abc")).is_err());
        assert!(tool.set(Column::R, ToolValue::Int(1)).is_err());
    }

    #[test]
    fn test_get_set_every_column() {
        let mut tool = ToolRecord::default();
        for column in Column::all() {
            let value = match column.kind() {
                ColumnKind::Integer => ToolValue::Int(9),
                ColumnKind::Float => ToolValue::Float(2.5),
                ColumnKind::Text => ToolValue::from(column.id()),
            };
            tool.set(*column, value.clone()).unwrap();
            assert_eq!(tool.get(*column), value, "column {}", column);
        }
    }

    #[test]
    fn test_column_from_key() {
        assert_eq!(Column::from_key("Z"), Some(Column::Z));
        assert_eq!(Column::from_key("z"), Some(Column::Z));
        assert_eq!(Column::from_key("x_offset"), Some(Column::X));
        assert_eq!(Column::from_key("stl"), Some(Column::Stl));
        assert_eq!(Column::from_key("Color"), Some(Column::Color));
        assert_eq!(Column::from_key("remark"), Some(Column::R));
        assert_eq!(Column::from_key("k"), None);
        assert_eq!(Column::from_key(""), None);
    }

    #[test]
    fn test_column_from_descriptor() {
        assert_eq!(Column::from_descriptor('T'), Some(Column::T));
        assert_eq!(Column::from_descriptor('J'), Some(Column::J));
        assert_eq!(Column::from_descriptor('R'), None);
        assert_eq!(Column::from_descriptor('S'), None);
        assert_eq!(Column::from_descriptor('t'), None);
    }

    #[test]
    fn test_tool_value_serializes_untagged() {
        let json = serde_json::to_string(&ToolValue::Float(1.5)).unwrap();
        assert_eq!(json, "1.5");
        let json = serde_json::to_string(&ToolValue::from("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }
}
