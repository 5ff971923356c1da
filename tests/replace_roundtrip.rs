//! Parse a recorded event stream, then replace through the results.
//!
//! No search binary is needed: the stream below is what `rg --json strange`
//! prints for `text_sub.txt`.

use rg_replace::replace::{apply_replacements, FileCheckpoints};
use rg_replace::search::parse_events;
use rg_replace::{Checkpoint, ReplaceRequest, SearchReplace, WorkspaceGuard};
use std::fs;
use tempfile::TempDir;

const CONTENT: &str = "Unicode strange sub file, very strange\nsecond line\nIs that 位 strange enough?\n";

const STREAM: &str = r#"{"type":"begin","data":{"path":{"text":"text_sub.txt"}}}
{"type":"match","data":{"path":{"text":"text_sub.txt"},"lines":{"text":"Unicode strange sub file, very strange\n"},"line_number":1,"absolute_offset":0,"submatches":[{"match":{"text":"strange"},"start":8,"end":15},{"match":{"text":"strange"},"start":31,"end":38}]}}
{"type":"match","data":{"path":{"text":"text_sub.txt"},"lines":{"text":"Is that 位 strange enough?\n"},"line_number":3,"absolute_offset":51,"submatches":[{"match":{"text":"strange"},"start":12,"end":19}]}}
{"type":"end","data":{"path":{"text":"text_sub.txt"},"binary_offset":null,"stats":{"elapsed":{"secs":0,"nanos":1,"human":"0s"},"searches":1,"searches_with_match":1,"bytes_searched":78,"bytes_printed":512,"matched_lines":2,"matches":3}}}
{"type":"summary","data":{"elapsed_total":{"secs":0,"nanos":1,"human":"0s"},"stats":{"elapsed":{"secs":0,"nanos":1,"human":"0s"},"searches":1,"searches_with_match":1,"bytes_searched":78,"bytes_printed":512,"matched_lines":2,"matches":3}}}
"#;

fn setup_root() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("text_sub.txt"), CONTENT).unwrap();
    fs::write(dir.path().join("untouched.txt"), "strange\n").unwrap();
    dir
}

#[test]
fn test_parsed_offsets() {
    let files = parse_events(STREAM);
    assert_eq!(files.len(), 1);
    let matches = &files[0].matches;
    assert_eq!(matches.len(), 3);
    assert_eq!((matches[0].start, matches[0].end), (8, 15));
    assert_eq!((matches[1].start, matches[1].end), (31, 38));
    assert_eq!((matches[2].start, matches[2].end), (12, 19));
    assert_eq!((matches[2].start_char, matches[2].end_char), (10, 17));
    assert_eq!(matches[2].absolute_offset, 51);
}

#[test]
fn test_replace_first_line_only() {
    let dir = setup_root();
    let guard = WorkspaceGuard::new(dir.path()).unwrap();

    let mut files = parse_events(STREAM);
    for m in files[0].matches.iter_mut().filter(|m| m.line_number == 1) {
        m.replacement = Some("hello".to_string());
    }

    let results = apply_replacements(&files, "", &guard, None);
    assert!(results.iter().all(|(_, r)| r.is_ok()));

    assert_eq!(
        fs::read_to_string(dir.path().join("text_sub.txt")).unwrap(),
        "Unicode hello sub file, very hello\nsecond line\nIs that 位 strange enough?\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("untouched.txt")).unwrap(),
        "strange\n"
    );
}

#[test]
fn test_replace_multibyte_line() {
    let dir = setup_root();
    let guard = WorkspaceGuard::new(dir.path()).unwrap();

    let mut files = parse_events(STREAM);
    files[0].replace_all("odd");

    let checkpoints = FileCheckpoints::default();
    let results = apply_replacements(&files, "", &guard, Some(&checkpoints as &dyn Checkpoint));
    assert!(results[0].1.is_ok());

    assert_eq!(
        fs::read_to_string(dir.path().join("text_sub.txt")).unwrap(),
        "Unicode odd sub file, very odd\nsecond line\nIs that 位 odd enough?\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join(".checkpoints/text_sub-checkpoint.txt")).unwrap(),
        CONTENT
    );

    checkpoints
        .restore_checkpoint(&dir.path().join("text_sub.txt"))
        .unwrap();
    assert_eq!(
        fs::read_to_string(dir.path().join("text_sub.txt")).unwrap(),
        CONTENT
    );
}

#[test]
fn test_stale_matches_fail_without_writing() {
    let dir = setup_root();
    fs::write(dir.path().join("text_sub.txt"), "short\n").unwrap();
    let guard = WorkspaceGuard::new(dir.path()).unwrap();

    let mut files = parse_events(STREAM);
    files[0].replace_all("hello");

    let results = apply_replacements(&files, "", &guard, None);
    assert!(results[0].1.is_err());
    assert_eq!(
        fs::read_to_string(dir.path().join("text_sub.txt")).unwrap(),
        "short\n"
    );
}

#[tokio::test]
async fn test_service_replace_from_search_json() {
    let dir = setup_root();
    let service = SearchReplace::new(dir.path()).unwrap();

    // The search response body, edited by a client, is a valid request
    let body = serde_json::json!({
        "matches": [{
            "path": "text_sub.txt",
            "matches": [{
                "line": "Unicode strange sub file, very strange\n",
                "match": "strange",
                "start": 31,
                "end": 38,
                "start_utf8": 31,
                "end_utf8": 38,
                "line_number": 1,
                "absolute_offset": 0,
                "replace": "hello"
            }]
        }]
    });
    let request: ReplaceRequest = serde_json::from_value(body).unwrap();
    let report = service.replace(request).await.unwrap();

    assert_eq!(report.replacements(), 1);
    assert_eq!(
        fs::read_to_string(dir.path().join("text_sub.txt")).unwrap(),
        "Unicode strange sub file, very hello\nsecond line\nIs that 位 strange enough?\n"
    );
}
