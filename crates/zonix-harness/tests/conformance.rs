#![forbid(unsafe_code)]

use std::path::Path;
use zonix::memory::ROOT;
use zonix_harness::{ScenarioRun, load_scenario, run_scenario, sample_scenario};

fn scenario_path(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(Path::parent)
        .expect("workspace root")
        .join("conformance")
        .join("scenarios")
        .join(name)
}

fn run_fixture(name: &str) -> ScenarioRun {
    let scenario = load_scenario(&scenario_path(name)).expect("fixture loads");
    let run = run_scenario(&scenario).expect("fixture runs");
    assert_eq!(run.report.failed, 0, "{name}: {:#?}", run.report.steps);
    assert_eq!(run.report.leaked_holds, 0, "{name}: leaked holds");
    run
}

#[test]
fn unlink_policies_conform() {
    let run = run_fixture("unlink_policies.json");
    let fs = &run.fs;

    // Deny lifted once its marker was removed.
    let deny = fs.resolve(ROOT, "deny").expect("deny dir");
    assert_eq!(fs.entry_names(deny), vec![".", ".."]);

    // Two-step: armed then deleted.
    let twostep = fs.resolve(ROOT, "twostep").expect("twostep dir");
    assert!(fs.resolve(twostep, "doc").is_none());

    // Backup: doc went aside and the aside was then deleted; doc2 and its
    // pre-existing backup both survive; doc3's directory backup blocked it.
    let backup = fs.resolve(ROOT, "backup").expect("backup dir");
    assert!(fs.resolve(backup, "doc").is_none());
    assert!(fs.resolve(backup, "doc.bak").is_none());
    assert!(fs.resolve(backup, "doc2").is_some());
    assert!(fs.resolve(backup, "doc2.bak").is_some());
    assert!(fs.resolve(backup, "doc3").is_some());
    assert!(
        fs.resolve(
            backup,
            "annual-report-with-an-uncomfortably-long-file-name-draft9"
        )
        .is_some(),
        "a name too long to back up stays put"
    );
}

#[test]
fn rename_semantics_conform() {
    let run = run_fixture("rename_semantics.json");
    let fs = &run.fs;

    // The twice-renamed file ended up as d1/f, replacing the first mover.
    let d1 = fs.resolve(ROOT, "d1").expect("d1");
    assert!(fs.resolve(d1, "f").is_some());

    // The moved directory sits under d2 with its parent link rewritten.
    let d2 = fs.resolve(ROOT, "d2").expect("d2");
    let c = fs.resolve(d2, "c").expect("moved dir");
    assert_eq!(fs.resolve(c, ".."), Some(d2));
    assert_eq!(fs.inode_of(d2).expect("d2 inode").link_count, 3);

    // The cycle attempt left the source tree in place, and a/b was
    // removable afterwards.
    let a = fs.resolve(ROOT, "a").expect("a");
    assert!(fs.resolve(a, "b").is_none());
}

#[test]
fn hole_reclamation_conforms() {
    let run = run_fixture("hole_reclamation.json");
    let fs = &run.fs;

    let data = fs.resolve(ROOT, "data").expect("data dir");
    let big = fs.resolve(data, "big").expect("big file");
    let small = fs.resolve(data, "small").expect("small file");

    assert_eq!(fs.inode_of(big).expect("big inode").size, 20_000);
    assert_eq!(fs.inode_of(small).expect("small inode").size, 0);

    // Everything big once held was punched or truncated away.
    assert!(fs.read_bytes(big, 0, 20_000).iter().all(|&b| b == 0));
    for zone in 0..4 {
        assert!(!fs.zone_mapped(big, zone));
    }

    assert_eq!(
        run.report.steps[8].detail.as_deref(),
        Some("data/big"),
        "readlink target"
    );
}

#[test]
fn scenarios_round_trip_through_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sample.json");
    let text = serde_json::to_string_pretty(&sample_scenario()).expect("serialize");
    std::fs::write(&path, text).expect("write scenario");

    let scenario = load_scenario(&path).expect("reload");
    let run = run_scenario(&scenario).expect("run reloaded");
    assert_eq!(run.report.failed, 0, "{:#?}", run.report.steps);
    assert_eq!(run.report.leaked_holds, 0);
}
