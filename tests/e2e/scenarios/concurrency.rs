use crate::harness::workspace::TestWorkspace;
use depot_core::{Decision, DepotRepo, MemoryRemote, PathState};
use std::sync::Arc;
use std::thread;

const JAR: &str = "org/foo/bar/1.0/bar-1.0.jar";
const THREADS: usize = 8;

fn depot() -> (TestWorkspace, Arc<MemoryRemote>, DepotRepo) {
    let workspace = TestWorkspace::from_fixture("default").unwrap();
    let remote = Arc::new(MemoryRemote::new());
    let depot = workspace.open_depot(remote.clone()).unwrap();
    (workspace, remote, depot)
}

#[test]
fn test_concurrent_misses_fetch_once() {
    let (workspace, remote, depot) = depot();
    remote.serve(JAR, b"hello world".to_vec());
    let path = depot.path("storage0", "central", JAR).unwrap();

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| depot.resolve(&path, false).unwrap());
        }
    });

    assert_eq!(remote.request_count(JAR), 1);
    assert_eq!(
        workspace.read_repository_file("storage0", "central", JAR).unwrap(),
        b"hello world"
    );
    assert_eq!(depot.artifacts().find_by_repository("storage0", "central").unwrap().len(), 1);
}

#[test]
fn test_concurrent_deploys_of_distinct_paths() {
    let (_workspace, _remote, depot) = depot();

    thread::scope(|s| {
        for i in 0..THREADS {
            let depot = &depot;
            s.spawn(move || {
                let relative = format!("org/foo/lib{i}/1.0/lib{i}-1.0.jar");
                let path = depot.path("storage0", "releases", &relative).unwrap();
                let content = format!("lib {i}");
                depot.deploy(&path, &mut content.as_bytes()).unwrap().unwrap();
            });
        }
    });

    let artifacts = depot.artifacts().find_by_repository("storage0", "releases").unwrap();
    assert_eq!(artifacts.len(), THREADS);
}

#[test]
fn test_expiry_races_with_readers() {
    let (workspace, remote, depot) = depot();
    let metadata = "org/foo/bar/maven-metadata.xml";
    remote.serve(metadata, b"<metadata>v1</metadata>".to_vec());
    let path = depot.path("storage0", "central", metadata).unwrap();
    depot.resolve(&path, false).unwrap();

    remote.serve(metadata, b"<metadata>v2</metadata>".to_vec());
    remote.serve(&format!("{metadata}.sha1"), b"ffffffffffffffffffffffffffffffffffffffff".to_vec());

    thread::scope(|s| {
        let expiry = s.spawn(|| depot.expire(&path));
        for _ in 0..THREADS {
            s.spawn(|| {
                // Readers see either version, never a partial file
                let local = depot.resolve(&path, false).unwrap();
                let content = std::fs::read(local).unwrap();
                assert!(content == b"<metadata>v1</metadata>" || content == b"<metadata>v2</metadata>");
            });
        }
        let report = expiry.join().unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].result, Ok(Decision::Fetch));
    });

    assert_eq!(
        workspace.read_repository_file("storage0", "central", metadata).unwrap(),
        b"<metadata>v2</metadata>"
    );
}

#[test]
fn test_cached_flag_follows_content_when_fetch_races_trash() {
    let (_workspace, remote, depot) = depot();
    remote.serve(JAR, b"hello world".to_vec());
    let path = depot.path("storage0", "central", JAR).unwrap();
    depot.resolve(&path, false).unwrap();

    for _ in 0..20 {
        thread::scope(|s| {
            // Either side may find nothing to act on; only the end state matters
            s.spawn(|| {
                let _ = depot.delete(&path, false);
            });
            s.spawn(|| depot.resolve(&path, true).unwrap());
        });

        let cached = depot.show(&path).unwrap().unwrap().is_cached();
        match depot.state(&path).unwrap() {
            PathState::Active => assert_eq!(cached, Some(true)),
            PathState::Trashed => assert_eq!(cached, Some(false)),
            PathState::Absent => panic!("content lost"),
        }
    }
}
