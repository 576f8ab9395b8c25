use crate::harness::{Assertion, Scenario};
use depot_core::{PathState, PATH_NOT_FOUND, REPOSITORY_NOT_FOUND, STORAGE_NOT_FOUND};

const JAR: &str = "org/foo/bar/1.0/bar-1.0.jar";
const POM: &str = "org/foo/bar/1.0/bar-1.0.pom";

#[test]
fn test_delete_then_undelete_path() {
    Scenario::new("delete_undelete")
        .from_fixture("default")
        .in_repo("storage0", "releases")
        .deploy(JAR, b"jar")
        .delete(JAR)
        .assert_state(JAR, PathState::Trashed)
        .assert_artifact(JAR)
        .undelete(JAR, 200)
        .assert_state(JAR, PathState::Active)
        .assert_content(JAR, b"jar")
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_repository_trash_round_trip() {
    Scenario::new("repository_trash")
        .from_fixture("default")
        .in_repo("storage0", "releases")
        .deploy(JAR, b"jar")
        .deploy(POM, b"<project/>")
        .delete_trash(200)
        .assert_state(JAR, PathState::Trashed)
        .assert_state(POM, PathState::Trashed)
        .undelete_trash(200)
        .assert_state(JAR, PathState::Active)
        .assert_state(POM, PathState::Active)
        .assert_content(POM, b"<project/>")
        .run()
        .unwrap();
}

#[test]
fn test_trash_all_repositories() {
    Scenario::new("trash_all")
        .from_fixture("default")
        .in_repo("storage0", "central")
        .remote_serves(JAR, b"remote jar")
        .resolve(JAR)
        .in_repo("storage0", "releases")
        .deploy(JAR, b"local jar")
        .delete_trash_all()
        .assert_state(JAR, PathState::Trashed)
        .in_repo("storage0", "central")
        .assert_state(JAR, PathState::Trashed)
        .assert_cached(JAR, false)
        .undelete_trash_all()
        .assert_state(JAR, PathState::Active)
        .assert_cached(JAR, true)
        .assert_content(JAR, b"remote jar")
        .run()
        .unwrap();
}

#[test]
fn test_not_found_responses() {
    Scenario::new("trash_not_found")
        .from_fixture("default")
        .in_repo("storage0", "releases")
        .delete_trash_of("nope", "releases", 404)
        .assert(Assertion::LastBody(STORAGE_NOT_FOUND.to_string()))
        .delete_trash_of("storage0", "nope", 404)
        .assert(Assertion::LastBody(REPOSITORY_NOT_FOUND.to_string()))
        .undelete("never/trashed.jar", 404)
        .assert(Assertion::LastBody(PATH_NOT_FOUND.to_string()))
        .in_repo("nope", "releases")
        .undelete_trash(404)
        .assert(Assertion::LastBody(STORAGE_NOT_FOUND.to_string()))
        .run()
        .unwrap();
}

#[test]
fn test_trash_disabled_deletes_permanently() {
    Scenario::new("trash_disabled")
        .from_fixture("default")
        .in_repo("storage0", "files")
        .deploy("docs/readme.txt", b"hello")
        .assert_artifact("docs/readme.txt")
        .delete("docs/readme.txt")
        .assert_state("docs/readme.txt", PathState::Absent)
        .assert_no_artifact("docs/readme.txt")
        .undelete("docs/readme.txt", 404)
        .run()
        .unwrap();
}

#[test]
fn test_force_delete_bypasses_trash() {
    Scenario::new("force_delete")
        .from_fixture("default")
        .in_repo("storage0", "releases")
        .deploy(JAR, b"jar")
        .force_delete(JAR)
        .assert_state(JAR, PathState::Absent)
        .assert_no_artifact(JAR)
        .run()
        .unwrap();
}

#[test]
fn test_purge_is_permanent() {
    Scenario::new("purge")
        .from_fixture("default")
        .in_repo("storage0", "releases")
        .deploy(JAR, b"jar")
        .deploy(POM, b"<project/>")
        .delete(JAR)
        .purge_trash()
        .assert_state(JAR, PathState::Absent)
        .assert_no_artifact(JAR)
        .assert_state(POM, PathState::Active)
        .assert_artifact(POM)
        .undelete(JAR, 404)
        .run()
        .unwrap();
}

#[test]
fn test_redeploy_discards_trashed_copy() {
    Scenario::new("redeploy_over_trash")
        .from_fixture("default")
        .in_repo("storage0", "releases")
        .deploy(JAR, b"old")
        .delete(JAR)
        .deploy(JAR, b"new")
        .assert_state(JAR, PathState::Active)
        .undelete(JAR, 404)
        .assert_content(JAR, b"new")
        .run()
        .unwrap();
}

#[test]
fn test_trash_survives_reopen() {
    Scenario::new("trash_reopen")
        .from_fixture("default")
        .in_repo("storage0", "releases")
        .deploy(JAR, b"jar")
        .delete(JAR)
        .reopen()
        .assert_state(JAR, PathState::Trashed)
        .undelete(JAR, 200)
        .assert_content(JAR, b"jar")
        .assert_artifact(JAR)
        .run()
        .unwrap();
}
