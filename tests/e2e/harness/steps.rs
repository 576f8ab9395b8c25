use depot_core::{Decision, ErrorClass, RemoteBehavior, RepositoryConfig};

use super::assertions::Assertion;

/// A repository selected by storage and repository id
#[derive(Debug, Clone)]
pub struct Target {
    pub storage: String,
    pub repository: String,
}

/// Which part of the trash a bulk operation covers
#[derive(Debug, Clone)]
pub enum Scope {
    Repository(Target),
    All,
}

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Configuration
    AddRepository {
        storage: String,
        config: RepositoryConfig,
    },

    // Remote origin control
    RemoteServes {
        path: String,
        body: Vec<u8>,
    },
    RemoteBehaves {
        path: String,
        behavior: RemoteBehavior,
    },
    RemoteForgets {
        path: String,
    },

    // Content operations
    Deploy {
        target: Target,
        path: String,
        content: Vec<u8>,
    },
    Resolve {
        target: Target,
        path: String,
        force: bool,
    },
    ResolveFails {
        target: Target,
        path: String,
        class: ErrorClass,
    },
    Expire {
        target: Target,
        path: String,
        expected: Option<Decision>,
    },
    Delete {
        target: Target,
        path: String,
        force: bool,
    },

    // Trash lifecycle through the endpoint contract
    DeleteTrash {
        scope: Scope,
        status: u16,
    },
    UndeleteTrash {
        scope: Scope,
        status: u16,
    },
    UndeletePath {
        target: Target,
        path: String,
        status: u16,
    },
    PurgeTrash {
        scope: Scope,
    },

    // Process lifecycle
    Reopen,

    // Assertions (can be interspersed)
    Assert {
        assertion: Assertion,
    },
}
