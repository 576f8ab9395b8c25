use super::assertions::Assertion;
use super::runner::ScenarioRunner;
use super::steps::{ScenarioStep, Scope, Target};
use depot_core::{ChecksumAlgorithm, Decision, ErrorClass, PathState, RemoteBehavior, RepositoryConfig};

/// Fluent DSL for building test scenarios.
///
/// Content steps apply to the repository chosen with [`Scenario::in_repo`].
pub struct Scenario {
    name: String,
    fixture: Option<String>,
    target: Target,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create a new scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fixture: None,
            target: Target {
                storage: "storage0".to_string(),
                repository: "releases".to_string(),
            },
            steps: Vec::new(),
        }
    }

    // ===== Initial setup =====

    /// Start from a depot root copied from fixtures
    pub fn from_fixture(mut self, fixture_name: &str) -> Self {
        self.fixture = Some(fixture_name.to_string());
        self
    }

    /// Add a repository to the configuration
    pub fn with_repository(mut self, storage: &str, config: RepositoryConfig) -> Self {
        self.steps.push(ScenarioStep::AddRepository {
            storage: storage.to_string(),
            config,
        });
        self
    }

    /// Direct the following content steps at a repository
    pub fn in_repo(mut self, storage: &str, repository: &str) -> Self {
        self.target = Target {
            storage: storage.to_string(),
            repository: repository.to_string(),
        };
        self
    }

    // ===== Remote origin =====

    /// Remote answers `path` with `body`
    pub fn remote_serves(mut self, path: &str, body: &[u8]) -> Self {
        self.steps.push(ScenarioStep::RemoteServes {
            path: path.to_string(),
            body: body.to_vec(),
        });
        self
    }

    /// Remote answers `path` with a scripted behavior
    pub fn remote_behaves(mut self, path: &str, behavior: RemoteBehavior) -> Self {
        self.steps.push(ScenarioStep::RemoteBehaves {
            path: path.to_string(),
            behavior,
        });
        self
    }

    /// Remote answers `path` with not found
    pub fn remote_forgets(mut self, path: &str) -> Self {
        self.steps.push(ScenarioStep::RemoteForgets {
            path: path.to_string(),
        });
        self
    }

    // ===== Content operations =====

    /// Deploy content into the current repository
    pub fn deploy(mut self, path: &str, content: &[u8]) -> Self {
        self.steps.push(ScenarioStep::Deploy {
            target: self.target.clone(),
            path: path.to_string(),
            content: content.to_vec(),
        });
        self
    }

    /// Resolve a path, expecting success
    pub fn resolve(mut self, path: &str) -> Self {
        self.steps.push(ScenarioStep::Resolve {
            target: self.target.clone(),
            path: path.to_string(),
            force: false,
        });
        self
    }

    /// Resolve a path, fetching even over a local copy
    pub fn force_resolve(mut self, path: &str) -> Self {
        self.steps.push(ScenarioStep::Resolve {
            target: self.target.clone(),
            path: path.to_string(),
            force: true,
        });
        self
    }

    /// Resolve a path, expecting an error of `class`
    pub fn resolve_fails(mut self, path: &str, class: ErrorClass) -> Self {
        self.steps.push(ScenarioStep::ResolveFails {
            target: self.target.clone(),
            path: path.to_string(),
            class,
        });
        self
    }

    /// Raise an expiry event and expect one handler deciding `decision`
    pub fn expire(mut self, path: &str, decision: Decision) -> Self {
        self.steps.push(ScenarioStep::Expire {
            target: self.target.clone(),
            path: path.to_string(),
            expected: Some(decision),
        });
        self
    }

    /// Raise an expiry event that no handler picks up
    pub fn expire_unhandled(mut self, path: &str) -> Self {
        self.steps.push(ScenarioStep::Expire {
            target: self.target.clone(),
            path: path.to_string(),
            expected: None,
        });
        self
    }

    /// Delete a path, into the trash when enabled
    pub fn delete(mut self, path: &str) -> Self {
        self.steps.push(ScenarioStep::Delete {
            target: self.target.clone(),
            path: path.to_string(),
            force: false,
        });
        self
    }

    /// Delete a path permanently
    pub fn force_delete(mut self, path: &str) -> Self {
        self.steps.push(ScenarioStep::Delete {
            target: self.target.clone(),
            path: path.to_string(),
            force: true,
        });
        self
    }

    // ===== Trash endpoints =====

    /// `DELETE /trash/{storage}/{repository}` on the current repository
    pub fn delete_trash(mut self, status: u16) -> Self {
        self.steps.push(ScenarioStep::DeleteTrash {
            scope: Scope::Repository(self.target.clone()),
            status,
        });
        self
    }

    /// `DELETE /trash/{storage}/{repository}` on any repository
    pub fn delete_trash_of(mut self, storage: &str, repository: &str, status: u16) -> Self {
        self.steps.push(ScenarioStep::DeleteTrash {
            scope: Scope::Repository(Target {
                storage: storage.to_string(),
                repository: repository.to_string(),
            }),
            status,
        });
        self
    }

    /// `DELETE /trash`
    pub fn delete_trash_all(mut self) -> Self {
        self.steps.push(ScenarioStep::DeleteTrash {
            scope: Scope::All,
            status: 200,
        });
        self
    }

    /// `POST /trash/{storage}/{repository}` on the current repository
    pub fn undelete_trash(mut self, status: u16) -> Self {
        self.steps.push(ScenarioStep::UndeleteTrash {
            scope: Scope::Repository(self.target.clone()),
            status,
        });
        self
    }

    /// `POST /trash`
    pub fn undelete_trash_all(mut self) -> Self {
        self.steps.push(ScenarioStep::UndeleteTrash {
            scope: Scope::All,
            status: 200,
        });
        self
    }

    /// `POST /trash/{storage}/{repository}/{path}` on the current repository
    pub fn undelete(mut self, path: &str, status: u16) -> Self {
        self.steps.push(ScenarioStep::UndeletePath {
            target: self.target.clone(),
            path: path.to_string(),
            status,
        });
        self
    }

    /// Permanently empty the current repository's trash
    pub fn purge_trash(mut self) -> Self {
        self.steps.push(ScenarioStep::PurgeTrash {
            scope: Scope::Repository(self.target.clone()),
        });
        self
    }

    // ===== Process lifecycle =====

    /// Drop the depot handle and open the root again
    pub fn reopen(mut self) -> Self {
        self.steps.push(ScenarioStep::Reopen);
        self
    }

    // ===== Assertions =====

    /// Add a general assertion
    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.steps.push(ScenarioStep::Assert { assertion });
        self
    }

    /// Assert where a path's content lives
    pub fn assert_state(self, path: &str, state: PathState) -> Self {
        let target = self.target.clone();
        self.assert(Assertion::PathState {
            target,
            path: path.to_string(),
            state,
        })
    }

    /// Assert the live content of a path
    pub fn assert_content(self, path: &str, content: &[u8]) -> Self {
        let target = self.target.clone();
        self.assert(Assertion::LocalContent {
            target,
            path: path.to_string(),
            content: content.to_vec(),
        })
    }

    /// Assert the remote saw `count` requests for `path`
    pub fn assert_requests(self, path: &str, count: usize) -> Self {
        self.assert(Assertion::RemoteRequests {
            path: path.to_string(),
            count,
        })
    }

    /// Assert an artifact is recorded at a path
    pub fn assert_artifact(self, path: &str) -> Self {
        let target = self.target.clone();
        self.assert(Assertion::ArtifactRecorded {
            target,
            path: path.to_string(),
        })
    }

    /// Assert no artifact is recorded at a path
    pub fn assert_no_artifact(self, path: &str) -> Self {
        let target = self.target.clone();
        self.assert(Assertion::NoArtifact {
            target,
            path: path.to_string(),
        })
    }

    /// Assert the cached flag of a remote artifact
    pub fn assert_cached(self, path: &str, cached: bool) -> Self {
        let target = self.target.clone();
        self.assert(Assertion::ArtifactCached {
            target,
            path: path.to_string(),
            cached,
        })
    }

    /// Assert the last observed checksum of a path
    pub fn assert_cached_checksum(self, path: &str, algorithm: ChecksumAlgorithm, digest: Option<&str>) -> Self {
        let target = self.target.clone();
        self.assert(Assertion::CachedChecksum {
            target,
            path: path.to_string(),
            algorithm,
            digest: digest.map(str::to_string),
        })
    }

    /// Assert the staging area of the current repository is empty
    pub fn assert_no_temp_files(self) -> Self {
        let target = self.target.clone();
        self.assert(Assertion::NoTempFiles(target))
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        let mut runner = match ScenarioRunner::new(self.fixture.as_deref()) {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name.clone(),
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {}", e)),
                }
            }
        };

        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}
