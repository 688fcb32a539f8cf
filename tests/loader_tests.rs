use proxyip_validator::{LoadError, ProxyParser};
use std::io::Write;
use tempfile::NamedTempFile;

fn scratch_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn text_list_drops_malformed_and_duplicates() {
    let file = scratch_file(
        ".txt",
        "1.2.3.4:8080\n1.2.3.4,8080\nbad-line\n5.6.7.8:443\n",
    );
    let candidates = ProxyParser::parse_file(file.path()).expect("load ok");
    assert_eq!(candidates, vec!["1.2.3.4:8080", "5.6.7.8:443"]);
}

#[test]
fn json_list_is_detected() {
    let file = scratch_file(
        ".json",
        r#"  [{"proxy":"1.2.3.4","port":"443"},{"proxy":"1.2.3.4","port":443}]"#,
    );
    let candidates = ProxyParser::parse_file(file.path()).expect("load ok");
    assert_eq!(candidates, vec!["1.2.3.4:443"]);
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.txt");
    match ProxyParser::parse_file(&path) {
        Err(LoadError::NotFound(p)) => assert_eq!(p, path),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[test]
fn corrupt_json_is_reported() {
    let file = scratch_file(".json", "[{\"proxy\": \"1.2.3.4\",");
    assert!(matches!(
        ProxyParser::parse_file(file.path()),
        Err(LoadError::Json { .. })
    ));
}

#[test]
fn json_list_skips_stray_elements() {
    let file = scratch_file(
        ".json",
        r#"["1.1.1.1:443", 42, null, {"proxy":"1.2.3.4","port":443}, ["5.6.7.8", 443]]"#,
    );
    let candidates = ProxyParser::parse_file(file.path()).expect("load ok");
    assert_eq!(candidates, vec!["1.2.3.4:443"]);
}
