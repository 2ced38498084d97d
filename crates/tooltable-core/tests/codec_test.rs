//! Tests for the tool table codec

use tooltable_core::codec::{
    decode, encode, read_table_file, render_header_at, write_table_file, HeaderBlock,
    HeaderTemplate,
};
use tooltable_core::{Column, ColumnSet, ToolRecord, ToolTable, ToolValue};

use chrono::{Local, TimeZone};

const SAMPLE: &str = "\
My shop tool table
Keep the long drills in pocket 9

---
Generated by: old version

;Tool  Pocket X Offset    Z Offset     Diameter     Remark
T1     P1     X+0.000000   Z-1.500000   D+0.250000   ; [toolA.stl][#FF0000]end mill
T2     P2     X+0.000000   Z+0.125000   D+0.125000   ; spot drill
T7 P9 Z2.5 ;long drill
";

fn tool(number: i32, z: f64, diameter: f64, remark: &str) -> ToolRecord {
    ToolRecord::default()
        .merged([
            (Column::T, ToolValue::Int(number)),
            (Column::P, ToolValue::Int(number)),
            (Column::Z, ToolValue::Float(z)),
            (Column::D, ToolValue::Float(diameter)),
            (Column::R, ToolValue::from(remark)),
        ])
        .unwrap()
}

#[test]
fn test_decode_sample() {
    let decoded = decode(SAMPLE);
    let table = &decoded.table;

    assert_eq!(table.len(), 4);
    assert!(decoded.diagnostics.is_empty());

    let t1 = table.tool(1).unwrap();
    assert_eq!(t1.pocket, 1);
    assert_eq!(t1.z_offset, -1.5);
    assert_eq!(t1.diameter, 0.25);
    assert_eq!(t1.remark, "end mill");
    assert_eq!(t1.model_path, "toolA.stl");
    assert_eq!(t1.path_color, "#FF0000");

    let t7 = table.tool(7).unwrap();
    assert_eq!(t7.pocket, 9);
    assert_eq!(t7.z_offset, 2.5);
    assert_eq!(t7.remark, "long drill");
}

#[test]
fn test_sentinel_always_present() {
    for text in ["", "garbage", ";Tool\n", SAMPLE, ";Tool\nT0 P5 ;overridden\n"] {
        let table = decode(text).table;
        let sentinel = table.get(0).expect("sentinel");
        assert_eq!(sentinel.tool_number, 0);
        assert_eq!(sentinel.remark, "No Tool Loaded");
        assert_eq!(sentinel.pocket, 0);
    }
}

#[test]
fn test_rows_without_tool_number_are_excluded() {
    let decoded = decode(";Tool\nP3 Z1.0 ;no tool\nT3 P3\n\nT-1 P4\n");
    let numbers: Vec<i32> = decoded.table.tool_numbers().collect();
    assert_eq!(numbers, vec![0, 3]);
}

#[test]
fn test_last_occurrence_wins() {
    let decoded = decode(";Tool\nT3 Z1.0 ;first\nT3 Z2.0 ;second\n");
    let t3 = decoded.table.tool(3).unwrap();
    assert_eq!(t3.z_offset, 2.0);
    assert_eq!(t3.remark, "second");
}

#[test]
fn test_last_marker_starts_rows() {
    let decoded = decode("; a comment line\nT1 P1\n;Tool Pocket\nT2 P2\n");
    let numbers: Vec<i32> = decoded.table.tool_numbers().collect();
    assert_eq!(numbers, vec![0, 2]);
    assert_eq!(decoded.header.lines(), ["; a comment line", "T1 P1"]);
}

#[test]
fn test_malformed_field_defaults_rest_of_row() {
    let decoded = decode(";Tool\nT5 P5 D0.5.5 Z3.0 ;bad diameter\nT6 P6 Z1.0\n");
    assert_eq!(decoded.diagnostics.len(), 1);
    assert_eq!(decoded.diagnostics[0].line_number(), 2);

    let t5 = decoded.table.tool(5).unwrap();
    assert_eq!(t5.diameter, 0.0);
    assert_eq!(t5.z_offset, 0.0);
    assert_eq!(t5.remark, "bad diameter");

    assert_eq!(decoded.table.tool(6).unwrap().z_offset, 1.0);
}

#[test]
fn test_header_preserved_across_load_save() {
    let decoded = decode(SAMPLE);
    assert_eq!(
        decoded.header.lines(),
        ["My shop tool table", "Keep the long drills in pocket 9", ""]
    );

    let columns = ColumnSet::all();
    let text = encode(&decoded.table, &columns, decoded.header.lines());
    let reloaded = decode(&text);

    assert_eq!(reloaded.header, decoded.header);
    assert!(!text.contains("---"));
    assert!(!reloaded
        .header
        .lines()
        .iter()
        .any(|l| l.starts_with(';')));
}

#[test]
fn test_template_appended_after_preserved_header() {
    let decoded = decode(SAMPLE);
    let template = HeaderTemplate::new(
        "LinuxCNC Tool Table\n-------------------\n\n---\nGenerated by: ({version})\nGenerated on: {datetime:%Y-%m-%d}\n",
    );
    let now = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let header = render_header_at(&decoded.header, Some(&template), "9.9.9", &now);
    assert_eq!(
        header,
        vec![
            "My shop tool table",
            "Keep the long drills in pocket 9",
            "",
            "---",
            "Generated by: (9.9.9)",
            "Generated on: 2024-01-02",
            "",
        ]
    );

    let text = encode(&decoded.table, &ColumnSet::all(), &header);
    let reloaded = decode(&text);
    assert_eq!(reloaded.header, decoded.header);
}

#[test]
fn test_round_trip_all_columns() {
    let mut table = ToolTable::with_sentinel();
    let mut t1 = tool(1, -1.5, 0.25, "end mill");
    t1.x_offset = 0.001;
    t1.y_offset = -12.345678;
    t1.a_offset = 90.0;
    t1.w_offset = 0.5;
    t1.front_angle = 30.0;
    t1.back_angle = -15.25;
    t1.orientation = 3;
    t1.model_path = "models/mill.stl".to_string();
    t1.path_color = "#00FF7F".to_string();
    table.insert(t1);
    table.insert(tool(12, 101.25, 3.175, ""));
    table.insert(tool(30, 0.0, 0.0, "a remark; with a semicolon"));

    let columns = ColumnSet::all();
    let text = encode(&table, &columns, &[]);
    let reloaded = decode(&text).table;

    assert_eq!(reloaded.len(), table.len());
    for original in table.tools() {
        let copy = reloaded.tool(original.tool_number).unwrap();
        for column in columns.iter() {
            match (original.get(column).as_f64(), copy.get(column).as_f64()) {
                (Some(a), Some(b)) => {
                    assert!((a - b).abs() < 1e-6, "column {} {} != {}", column, a, b)
                }
                _ => assert_eq!(original.get(column), copy.get(column), "column {}", column),
            }
        }
    }
}

#[test]
fn test_restricted_columns_omit_others() {
    let mut table = ToolTable::with_sentinel();
    let mut t1 = tool(1, -1.5, 0.25, "end mill");
    t1.x_offset = 4.0;
    t1.a_offset = 1.0;
    table.insert(t1);

    let columns = ColumnSet::parse("PTDZR").unwrap();
    let text = encode(&table, &columns, &[]);
    let row = text.lines().nth(1).unwrap();

    assert_eq!(row, "P1     T1     D+0.250000   Z-1.500000   ; end mill");
    for letter in ['X', 'Y', 'A', 'B', 'C', 'U', 'V', 'W', 'I', 'J', 'Q'] {
        assert!(!row.contains(letter), "row contains {}: {}", letter, row);
    }

    let reloaded = decode(&text).table;
    let t1 = reloaded.tool(1).unwrap();
    assert_eq!(t1.x_offset, 0.0);
    assert_eq!(t1.z_offset, -1.5);
}

#[test]
fn test_bracketed_remarks_survive_round_trip() {
    let mut table = ToolTable::with_sentinel();
    table.insert(tool(1, 0.0, 0.5, "[rough] 1/2 end mill"));
    table.insert(tool(2, 0.0, 0.25, "[finish.stl] ball nose"));
    table.insert(tool(3, 0.0, 0.125, "[#FF0000] marker"));

    let plain = ColumnSet::parse("TPZR").unwrap();
    let with_meta = ColumnSet::from_ids(["T", "P", "Z", "R", "STL", "COLOR"]).unwrap();
    for columns in [plain, with_meta] {
        let text = encode(&table, &columns, &[]);
        let reloaded = decode(&text).table;

        for original in table.tools() {
            let copy = reloaded.tool(original.tool_number).unwrap();
            assert_eq!(copy.remark, original.remark, "in {}", text);
            assert!(copy.model_path.is_empty());
            assert!(copy.path_color.is_empty());
        }
    }

    let text = encode(&table, &ColumnSet::parse("TR").unwrap(), &[]);
    assert!(text.contains("T1     ; [rough] 1/2 end mill"));
    assert!(text.contains("T2     ; [][finish.stl] ball nose"));
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tool.tbl");

    write_table_file(&path, SAMPLE).unwrap();
    let decoded = read_table_file(&path).unwrap();
    assert_eq!(decoded.table.len(), 4);
    assert_eq!(decoded.header, HeaderBlock::from_raw(SAMPLE.lines().take(3)));
}
