use printflow_settings::{Margins, SettingsError, SettingsSnapshot};
use std::fs;
use tempfile::tempdir;

#[test]
fn load_missing_file_is_an_error_unless_defaults_are_requested() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("print.json");

    let err = SettingsSnapshot::load(&path).unwrap_err();
    assert!(matches!(err, SettingsError::Io { .. }));

    let snapshot = SettingsSnapshot::load_or_default(&path).expect("defaults");
    assert_eq!(snapshot, SettingsSnapshot::default());
}

#[test]
fn save_and_reload_roundtrip() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("print.json");

    let mut snapshot = SettingsSnapshot::default();
    snapshot.line_numbers = true;
    snapshot.wrap = false;
    snapshot.margins = Margins::uniform(24.0);
    snapshot.footer = "&r&p / &P".into();
    snapshot.save(&path).expect("save");

    let reloaded = SettingsSnapshot::load(&path).expect("reload");
    assert_eq!(reloaded, snapshot);
}

#[test]
fn loaded_values_are_sanitized() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("print.json");
    fs::write(
        &path,
        r#"{ "font": { "size_pt": 0, "line_height_pt": -1 }, "margins": { "left": 5000 } }"#,
    )
    .expect("write");

    let snapshot = SettingsSnapshot::load(&path).expect("load");
    assert_eq!(snapshot.font.size_pt, 10.0);
    assert_eq!(snapshot.font.line_height_pt, None);
    assert_eq!(snapshot.font.line_height(), 12.0);
    assert_eq!(snapshot.margins.left, 288.0);
    assert_eq!(snapshot.margins.right, 36.0);
}

#[test]
fn malformed_file_reports_parse_error() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("print.json");
    fs::write(&path, "{ \"wrap\": ").expect("write");

    let err = SettingsSnapshot::load(&path).unwrap_err();
    assert!(matches!(err, SettingsError::Parse { .. }));
}
