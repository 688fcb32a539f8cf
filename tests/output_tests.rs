use proxyip_validator::output::{write_all, OutputPaths};
use proxyip_validator::ProbeResult;
use std::fs;

fn result(host: &str, country: Option<&str>, org: &str) -> ProbeResult {
    ProbeResult {
        host: host.to_string(),
        port: 443,
        client_ip: "9.9.9.9".to_string(),
        latency_ms: 87,
        country: country.map(String::from),
        organization: Some(org.to_string()),
        city: Some("Frankfurt".to_string()),
        colo: Some("FRA".to_string()),
    }
}

#[test]
fn writes_every_format() {
    let dir = tempfile::tempdir().unwrap();
    let paths = OutputPaths::in_dir(dir.path());

    let results = vec![
        result("1.1.1.1", Some("DE"), "Hetzner Online GmbH"),
        result("2.2.2.2", Some("us"), "Acme, Inc."),
        result("3.3.3.3", None, "Mystery   Net!"),
    ];
    let summary = write_all(&results, &paths).expect("write ok");
    assert_eq!(summary.records, 3);
    assert_eq!(summary.country_files, 3);

    let txt = fs::read_to_string(&paths.txt).unwrap();
    assert_eq!(
        txt,
        "1.1.1.1,443,DE,Hetzner Online GmbH\n2.2.2.2,443,us,Acme Inc\n3.3.3.3,443,UNK,Mystery Net"
    );
    assert_eq!(fs::read_to_string(&paths.csv).unwrap(), txt);

    let us = fs::read_to_string(paths.country_dir.join("US.txt")).unwrap();
    assert_eq!(us, "2.2.2.2,443,us,Acme Inc");
    assert!(paths.country_dir.join("UNK.txt").exists());

    let json: Vec<ProbeResult> =
        serde_json::from_str(&fs::read_to_string(&paths.json).unwrap()).unwrap();
    assert_eq!(json, results);
}

#[test]
fn empty_run_still_writes_files() {
    let dir = tempfile::tempdir().unwrap();
    let paths = OutputPaths::in_dir(dir.path());

    let summary = write_all(&[], &paths).expect("write ok");
    assert_eq!(summary.records, 0);
    assert_eq!(fs::read_to_string(&paths.json).unwrap(), "[]");
    assert_eq!(fs::read_to_string(&paths.txt).unwrap(), "");
}

#[test]
fn unwritable_destination_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let paths = OutputPaths::in_dir(dir.path().join("missing-parent"));
    assert!(write_all(&[], &paths).is_err());
}
