use super::assertions::Assertion;
use super::steps::{ScenarioStep, Scope, Target};
use super::workspace::TestWorkspace;
use anyhow::{anyhow, Context, Result};
use depot_core::{
    ApiResponse, ChecksumAlgorithm, ChecksumCache, Decision, DepotRepo, ErrorClass, MemoryRemote,
    RepositoryConfig, RepositoryPath,
};
use std::fs;
use std::sync::Arc;

/// Executes scenarios against a real depot with an in-memory remote
pub struct ScenarioRunner {
    workspace: TestWorkspace,
    depot: Option<DepotRepo>,
    remote: Arc<MemoryRemote>,
    last_response: Option<ApiResponse>,
    current_step: usize,
}

impl ScenarioRunner {
    /// Create a new runner, optionally from a fixture root
    pub fn new(fixture: Option<&str>) -> Result<Self> {
        let workspace = match fixture {
            Some(name) => TestWorkspace::from_fixture(name)?,
            None => TestWorkspace::empty()?,
        };
        let remote = Arc::new(MemoryRemote::new());
        let depot = workspace.open_depot(remote.clone())?;

        Ok(Self {
            workspace,
            depot: Some(depot),
            remote,
            last_response: None,
            current_step: 0,
        })
    }

    /// Get current step number
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Execute all steps in sequence
    pub fn execute(&mut self, steps: &[ScenarioStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.current_step = i;
            self.execute_step(step)
                .with_context(|| format!("Step {}: {:?}", i, step))?;
        }
        Ok(())
    }

    /// Execute a single step
    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::AddRepository { storage, config } => self.handle_add_repository(storage, config),

            ScenarioStep::RemoteServes { path, body } => {
                self.remote.serve(path, body.clone());
                Ok(())
            }
            ScenarioStep::RemoteBehaves { path, behavior } => {
                self.remote.script(path, behavior.clone());
                Ok(())
            }
            ScenarioStep::RemoteForgets { path } => {
                self.remote.remove(path);
                Ok(())
            }

            ScenarioStep::Deploy { target, path, content } => self.handle_deploy(target, path, content),
            ScenarioStep::Resolve { target, path, force } => self.handle_resolve(target, path, *force),
            ScenarioStep::ResolveFails { target, path, class } => {
                self.handle_resolve_fails(target, path, *class)
            }
            ScenarioStep::Expire {
                target,
                path,
                expected,
            } => self.handle_expire(target, path, *expected),
            ScenarioStep::Delete { target, path, force } => {
                let depot = self.depot()?;
                let path = depot.path(&target.storage, &target.repository, path)?;
                depot.delete(&path, *force)?;
                Ok(())
            }

            ScenarioStep::DeleteTrash { scope, status } => {
                let api = self.depot()?.trash_api();
                let response = match scope {
                    Scope::Repository(target) => api.delete_trash(&target.storage, &target.repository),
                    Scope::All => api.delete_trash_all(),
                };
                self.expect_status(response, *status)
            }
            ScenarioStep::UndeleteTrash { scope, status } => {
                let api = self.depot()?.trash_api();
                let response = match scope {
                    Scope::Repository(target) => api.undelete_trash(&target.storage, &target.repository),
                    Scope::All => api.undelete_trash_all(),
                };
                self.expect_status(response, *status)
            }
            ScenarioStep::UndeletePath { target, path, status } => {
                let response = self
                    .depot()?
                    .trash_api()
                    .undelete(&target.storage, &target.repository, path);
                self.expect_status(response, *status)
            }
            ScenarioStep::PurgeTrash { scope } => {
                let trash = self.depot()?.trash();
                match scope {
                    Scope::Repository(target) => trash.purge_trash(&target.storage, &target.repository)?,
                    Scope::All => trash.purge_trash_all()?,
                };
                Ok(())
            }

            ScenarioStep::Reopen => self.handle_reopen(),

            ScenarioStep::Assert { assertion } => self.handle_assertion(assertion),
        }
    }

    fn depot(&self) -> Result<&DepotRepo> {
        self.depot.as_ref().ok_or_else(|| anyhow!("Depot not available"))
    }

    fn path(&self, target: &Target, path: &str) -> Result<RepositoryPath> {
        Ok(self.depot()?.path(&target.storage, &target.repository, path)?)
    }

    // ===== Step handlers =====

    fn handle_add_repository(&mut self, storage: &str, config: &RepositoryConfig) -> Result<()> {
        let depot = self
            .depot
            .as_mut()
            .ok_or_else(|| anyhow!("Depot not available"))?;
        depot.add_repository(storage, config.clone())?;
        Ok(())
    }

    fn handle_deploy(&mut self, target: &Target, path: &str, content: &[u8]) -> Result<()> {
        let path = self.path(target, path)?;
        let mut reader = content;
        self.depot()?.deploy(&path, &mut reader)?;
        Ok(())
    }

    fn handle_resolve(&mut self, target: &Target, path: &str, force: bool) -> Result<()> {
        let path = self.path(target, path)?;
        let local = self.depot()?.resolve(&path, force)?;
        if !local.is_file() {
            return Err(anyhow!("Resolved path is not a file: {}", local.display()));
        }
        Ok(())
    }

    fn handle_resolve_fails(&mut self, target: &Target, path: &str, class: ErrorClass) -> Result<()> {
        let path = self.path(target, path)?;
        match self.depot()?.resolve(&path, false) {
            Ok(local) => Err(anyhow!("Expected {:?} failure, resolved {}", class, local.display())),
            Err(e) if e.class() == class => Ok(()),
            Err(e) => Err(anyhow!("Expected {:?} failure, got {:?}: {}", class, e.class(), e)),
        }
    }

    fn handle_expire(&mut self, target: &Target, path: &str, expected: Option<Decision>) -> Result<()> {
        let path = self.path(target, path)?;
        let report = self.depot()?.expire(&path);

        match expected {
            None if report.outcomes.is_empty() => Ok(()),
            None => Err(anyhow!("Expected no handler, got {:?}", report.outcomes)),
            Some(decision) => match report.outcomes.as_slice() {
                [outcome] if outcome.result == Ok(decision) => Ok(()),
                outcomes => Err(anyhow!("Expected a single {} decision, got {:?}", decision, outcomes)),
            },
        }
    }

    fn handle_reopen(&mut self) -> Result<()> {
        // The graph database holds an exclusive lock until dropped
        self.depot = None;
        self.depot = Some(self.workspace.open_depot(self.remote.clone())?);
        Ok(())
    }

    fn expect_status(&mut self, response: ApiResponse, status: u16) -> Result<()> {
        let actual = response.status;
        self.last_response = Some(response);
        if actual != status {
            return Err(anyhow!(
                "Status mismatch: expected {}, got {} ({:?})",
                status,
                actual,
                self.last_response
            ));
        }
        Ok(())
    }

    // ===== Assertions =====

    fn handle_assertion(&mut self, assertion: &Assertion) -> Result<()> {
        match assertion {
            Assertion::PathState { target, path, state } => {
                let path = self.path(target, path)?;
                let actual = self.depot()?.state(&path)?;
                if actual != *state {
                    return Err(anyhow!("State mismatch for {}: expected {:?}, got {:?}", path, state, actual));
                }
                Ok(())
            }
            Assertion::LocalContent { target, path, content } => {
                let actual = self
                    .workspace
                    .read_repository_file(&target.storage, &target.repository, path)?;
                if actual != *content {
                    return Err(anyhow!(
                        "Content mismatch for {}: expected {:?}, got {:?}",
                        path,
                        String::from_utf8_lossy(content),
                        String::from_utf8_lossy(&actual)
                    ));
                }
                Ok(())
            }
            Assertion::NoTempFiles(target) => self.assert_no_temp_files(target),
            Assertion::RemoteRequests { path, count } => {
                let actual = self.remote.request_count(path);
                if actual != *count {
                    return Err(anyhow!(
                        "Request count mismatch for {}: expected {}, got {}",
                        path,
                        count,
                        actual
                    ));
                }
                Ok(())
            }
            Assertion::ArtifactRecorded { target, path } => {
                self.find_artifact(target, path)?
                    .ok_or_else(|| anyhow!("No artifact recorded at {}", path))?;
                Ok(())
            }
            Assertion::NoArtifact { target, path } => match self.find_artifact(target, path)? {
                Some(artifact) => Err(anyhow!("Unexpected artifact at {}: {:?}", path, artifact.uuid)),
                None => Ok(()),
            },
            Assertion::ArtifactCached { target, path, cached } => {
                let artifact = self
                    .find_artifact(target, path)?
                    .ok_or_else(|| anyhow!("No artifact recorded at {}", path))?;
                if artifact.is_cached() != Some(*cached) {
                    return Err(anyhow!(
                        "Cached flag mismatch for {}: expected {}, got {:?}",
                        path,
                        cached,
                        artifact.is_cached()
                    ));
                }
                Ok(())
            }
            Assertion::ArtifactChecksum {
                target,
                path,
                algorithm,
                digest,
            } => {
                let artifact = self
                    .find_artifact(target, path)?
                    .ok_or_else(|| anyhow!("No artifact recorded at {}", path))?;
                match artifact.checksums.get(algorithm.name()) {
                    Some(actual) if actual == digest => Ok(()),
                    actual => Err(anyhow!(
                        "Checksum mismatch for {}: expected {}, got {:?}",
                        path,
                        digest,
                        actual
                    )),
                }
            }
            Assertion::ArtifactCount { target, count } => {
                let artifacts = self
                    .depot()?
                    .artifacts()
                    .find_by_repository(&target.storage, &target.repository)?;
                if artifacts.len() != *count {
                    return Err(anyhow!(
                        "Artifact count mismatch: expected {}, got {}",
                        count,
                        artifacts.len()
                    ));
                }
                Ok(())
            }
            Assertion::CachedChecksum {
                target,
                path,
                algorithm,
                digest,
            } => self.assert_cached_checksum(target, path, *algorithm, digest.as_deref()),
            Assertion::LastBody(body) => {
                let response = self
                    .last_response
                    .as_ref()
                    .ok_or_else(|| anyhow!("No endpoint called yet"))?;
                if response.body != *body {
                    return Err(anyhow!("Body mismatch: expected {:?}, got {:?}", body, response.body));
                }
                Ok(())
            }
            // Custom assertions get mutable access
            Assertion::Custom(f) => {
                let depot = self
                    .depot
                    .as_mut()
                    .ok_or_else(|| anyhow!("Depot not available"))?;
                f(depot)
            }
        }
    }

    fn find_artifact(&self, target: &Target, path: &str) -> Result<Option<depot_core::Artifact>> {
        let path = self.path(target, path)?;
        Ok(self.depot()?.show(&path)?)
    }

    fn assert_cached_checksum(
        &self,
        target: &Target,
        path: &str,
        algorithm: ChecksumAlgorithm,
        expected: Option<&str>,
    ) -> Result<()> {
        let path = self.path(target, path)?;
        let actual = self.depot()?.checksums().get(&path, algorithm);
        if actual.as_deref() != expected {
            return Err(anyhow!(
                "Cached {} mismatch for {}: expected {:?}, got {:?}",
                algorithm.name(),
                path,
                expected,
                actual
            ));
        }
        Ok(())
    }

    fn assert_no_temp_files(&self, target: &Target) -> Result<()> {
        let repository = self
            .depot()?
            .storages()
            .get_repository(&target.storage, &target.repository)?;
        let temp_dir = repository.temp_dir();
        if !temp_dir.exists() {
            return Ok(());
        }
        let leftovers: Vec<_> = fs::read_dir(&temp_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect();
        if !leftovers.is_empty() {
            return Err(anyhow!("Temporary files left behind: {:?}", leftovers));
        }
        Ok(())
    }
}
