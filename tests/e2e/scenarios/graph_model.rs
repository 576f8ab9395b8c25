use crate::harness::{Assertion, Scenario};
use depot_core::{ChecksumAlgorithm, DepotError, RepositoryConfig, RepositoryLayout};

const JAR: &str = "org/foo/bar/1.0/bar-1.0.jar";

#[test]
fn test_deploy_records_checksums() {
    Scenario::new("deploy_checksums")
        .from_fixture("default")
        .in_repo("storage0", "releases")
        .deploy(JAR, b"hello world")
        .assert_artifact(JAR)
        .assert(Assertion::ArtifactChecksum {
            target: target("releases"),
            path: JAR.to_string(),
            algorithm: ChecksumAlgorithm::Sha1,
            digest: "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed".to_string(),
        })
        .assert(Assertion::ArtifactCount {
            target: target("releases"),
            count: 1,
        })
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_redeploy_updates_one_artifact() {
    Scenario::new("redeploy")
        .from_fixture("default")
        .in_repo("storage0", "releases")
        .deploy(JAR, b"hello world")
        .assert(Assertion::Custom(Box::new(|depot| {
            let path = depot.path("storage0", "releases", JAR)?;
            let first = depot.show(&path)?.ok_or_else(|| anyhow::anyhow!("not recorded"))?;
            depot.deploy(&path, &mut &b"something else"[..])?;
            let second = depot.show(&path)?.ok_or_else(|| anyhow::anyhow!("not recorded"))?;

            anyhow::ensure!(first.uuid == second.uuid, "uuid changed on redeploy");
            anyhow::ensure!(first.created == second.created, "creation time changed");
            anyhow::ensure!(second.size_in_bytes == Some(14), "size {:?}", second.size_in_bytes);
            anyhow::ensure!(first.checksums["md5"] != second.checksums["md5"], "checksums not updated");
            Ok(())
        })))
        .assert(Assertion::ArtifactCount {
            target: target("releases"),
            count: 1,
        })
        .run()
        .unwrap();
}

#[test]
fn test_non_artifact_files_are_not_recorded() {
    Scenario::new("non_artifacts")
        .from_fixture("default")
        .in_repo("storage0", "releases")
        .deploy(&format!("{}.sha1", JAR), b"2aae6c35c94fcfb415dbe95f408b9ce91ee846ed")
        .deploy("org/foo/bar/maven-metadata.xml", b"<metadata/>")
        .deploy("not/a/maven/path.txt", b"text")
        .assert(Assertion::ArtifactCount {
            target: target("releases"),
            count: 0,
        })
        .run()
        .unwrap();
}

#[test]
fn test_artifacts_survive_reopen() {
    Scenario::new("graph_reopen")
        .from_fixture("default")
        .in_repo("storage0", "central")
        .remote_serves(JAR, b"hello world")
        .resolve(JAR)
        .reopen()
        .assert_artifact(JAR)
        .assert_cached(JAR, true)
        .run()
        .unwrap();
}

#[test]
fn test_generic_id_spans_repositories() {
    Scenario::new("generic_id")
        .from_fixture("default")
        .with_repository(
            "storage0",
            RepositoryConfig::hosted("staging", RepositoryLayout::Maven2),
        )
        .in_repo("storage0", "releases")
        .deploy(JAR, b"release")
        .in_repo("storage0", "staging")
        .deploy(JAR, b"staged")
        .assert(Assertion::Custom(Box::new(|depot| {
            let artifacts = depot.artifacts().find_by_generic_id(JAR)?;
            let mut repositories: Vec<_> = artifacts.iter().map(|a| a.repository_id.as_str()).collect();
            repositories.sort_unstable();
            anyhow::ensure!(repositories == ["releases", "staging"], "got {:?}", repositories);
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_deploy_into_proxy_is_unsupported() {
    Scenario::new("deploy_into_proxy")
        .from_fixture("default")
        .assert(Assertion::Custom(Box::new(|depot| {
            let path = depot.path("storage0", "central", JAR)?;
            match depot.deploy(&path, &mut &b"x"[..]) {
                Err(DepotError::Unsupported(_)) => Ok(()),
                other => anyhow::bail!("expected Unsupported, got {:?}", other.map(|a| a.is_some())),
            }
        })))
        .run()
        .unwrap();
}

#[test]
fn test_invalid_paths_are_rejected() {
    Scenario::new("invalid_paths")
        .from_fixture("default")
        .assert(Assertion::Custom(Box::new(|depot| {
            for bad in ["../escape.jar", ".trash/x.jar", ""] {
                anyhow::ensure!(
                    depot.path("storage0", "releases", bad).is_err(),
                    "{:?} was accepted",
                    bad
                );
            }
            Ok(())
        })))
        .run()
        .unwrap();
}

fn target(repository: &str) -> crate::harness::steps::Target {
    crate::harness::steps::Target {
        storage: "storage0".to_string(),
        repository: repository.to_string(),
    }
}
