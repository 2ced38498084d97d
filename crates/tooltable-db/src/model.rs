//! Stored tool row.
//!
//! Field correspondence with [`ToolRecord`]: `tool_no`→T, `pocket`→P,
//! `x_offset`..`w_offset`, `diameter`→D, `i_offset`→I, `j_offset`→J,
//! `q_offset`→Q, `remark`→R. Model path and path color are not stored.

use tooltable_core::ToolRecord;

/// Identifier of the single tool table every row belongs to
pub const TOOL_TABLE_ID: i64 = 1;

/// Database row representation of a tool.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ToolRow {
    pub tool_no: i64,
    pub in_use: bool,
    pub pocket: i64,
    pub x_offset: f64,
    pub y_offset: f64,
    pub z_offset: f64,
    pub a_offset: f64,
    pub b_offset: f64,
    pub c_offset: f64,
    pub u_offset: f64,
    pub v_offset: f64,
    pub w_offset: f64,
    pub i_offset: f64,
    pub j_offset: f64,
    pub q_offset: i64,
    pub diameter: f64,
    pub remark: String,
    pub tool_table_id: i64,
}

impl ToolRow {
    /// Row for a record. `in_use` is always written false.
    pub fn from_record(tool: &ToolRecord) -> Self {
        Self {
            tool_no: i64::from(tool.tool_number),
            in_use: false,
            pocket: i64::from(tool.pocket),
            x_offset: tool.x_offset,
            y_offset: tool.y_offset,
            z_offset: tool.z_offset,
            a_offset: tool.a_offset,
            b_offset: tool.b_offset,
            c_offset: tool.c_offset,
            u_offset: tool.u_offset,
            v_offset: tool.v_offset,
            w_offset: tool.w_offset,
            i_offset: tool.front_angle,
            j_offset: tool.back_angle,
            q_offset: i64::from(tool.orientation),
            diameter: tool.diameter,
            remark: tool.remark.clone(),
            tool_table_id: TOOL_TABLE_ID,
        }
    }

    /// The part of a record the store can hold
    pub fn stored_view(tool: &ToolRecord) -> ToolRecord {
        ToolRecord {
            model_path: String::new(),
            path_color: String::new(),
            ..tool.clone()
        }
    }
}

/// Tool number for error reports, saturated to the `i32` range
pub(crate) fn tool_number(tool_no: i64) -> i32 {
    i32::try_from(tool_no).unwrap_or(if tool_no < 0 { i32::MIN } else { i32::MAX })
}

impl TryFrom<ToolRow> for ToolRecord {
    type Error = crate::error::DbError;

    fn try_from(row: ToolRow) -> Result<Self, Self::Error> {
        let narrow = |field: &str, value: i64| {
            i32::try_from(value).map_err(|_| crate::error::DbError::InvalidRow {
                tool_number: i32::try_from(row.tool_no).unwrap_or(i32::MAX),
                reason: format!("{} {} out of range", field, value),
            })
        };

        Ok(ToolRecord {
            tool_number: narrow("tool_no", row.tool_no)?,
            pocket: narrow("pocket", row.pocket)?,
            x_offset: row.x_offset,
            y_offset: row.y_offset,
            z_offset: row.z_offset,
            a_offset: row.a_offset,
            b_offset: row.b_offset,
            c_offset: row.c_offset,
            u_offset: row.u_offset,
            v_offset: row.v_offset,
            w_offset: row.w_offset,
            diameter: row.diameter,
            front_angle: row.i_offset,
            back_angle: row.j_offset,
            orientation: narrow("q_offset", row.q_offset)?,
            remark: row.remark,
            model_path: String::new(),
            path_color: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_correspondence() {
        let mut tool = ToolRecord::new_tool(7);
        tool.front_angle = 30.0;
        tool.back_angle = 60.0;
        tool.orientation = 4;
        tool.diameter = 1.5;
        tool.model_path = "drill.stl".to_string();

        let row = ToolRow::from_record(&tool);
        assert_eq!(row.tool_no, 7);
        assert_eq!(row.i_offset, 30.0);
        assert_eq!(row.j_offset, 60.0);
        assert_eq!(row.q_offset, 4);
        assert!(!row.in_use);
        assert_eq!(row.tool_table_id, TOOL_TABLE_ID);

        let back = ToolRecord::try_from(row).unwrap();
        assert_eq!(back, ToolRow::stored_view(&tool));
        assert!(back.model_path.is_empty());
    }

    #[test]
    fn test_out_of_range_row() {
        let mut row = ToolRow::from_record(&ToolRecord::new_tool(1));
        row.pocket = i64::MAX;
        let err = ToolRecord::try_from(row).unwrap_err();
        assert!(err.to_string().contains("pocket"));
    }
}
