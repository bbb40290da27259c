//! Entity identifiers for platform resources.
//!
//! Every resource the catalog can annotate is addressed by an [`EntityId`],
//! a tagged union with one variant per resource kind. The canonical string
//! encoding is used uniformly wherever an identifier becomes a storage or
//! index key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the reserved namespace that hosts platform entities. Entities in
/// this namespace are visible from every namespace's search.
pub const SYSTEM_NAMESPACE: &str = "system";

/// Kind of a platform resource, used for search target-type filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Namespace,
    Application,
    Program,
    Dataset,
    Stream,
    StreamView,
    Artifact,
}

impl EntityKind {
    /// Stable lowercase name, used in canonical entity encodings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Application => "application",
            Self::Program => "program",
            Self::Dataset => "dataset",
            Self::Stream => "stream",
            Self::StreamView => "stream_view",
            Self::Artifact => "artifact",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of a program within an application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProgramType {
    Flow,
    MapReduce,
    Spark,
    Workflow,
    Service,
    Worker,
}

impl ProgramType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flow => "flow",
            Self::MapReduce => "mapreduce",
            Self::Spark => "spark",
            Self::Workflow => "workflow",
            Self::Service => "service",
            Self::Worker => "worker",
        }
    }
}

impl fmt::Display for ProgramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a namespaced platform resource.
///
/// Created by the upstream resource lifecycle; the catalog never creates or
/// destroys entities, it only annotates them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityId {
    Namespace {
        namespace: String,
    },
    Application {
        namespace: String,
        application: String,
    },
    Program {
        namespace: String,
        application: String,
        program_type: ProgramType,
        program: String,
    },
    Dataset {
        namespace: String,
        dataset: String,
    },
    Stream {
        namespace: String,
        stream: String,
    },
    StreamView {
        namespace: String,
        stream: String,
        view: String,
    },
    Artifact {
        namespace: String,
        artifact: String,
        version: String,
    },
}

impl EntityId {
    #[must_use]
    pub fn namespace_id(namespace: impl Into<String>) -> Self {
        Self::Namespace {
            namespace: namespace.into(),
        }
    }

    #[must_use]
    pub fn application(namespace: impl Into<String>, application: impl Into<String>) -> Self {
        Self::Application {
            namespace: namespace.into(),
            application: application.into(),
        }
    }

    #[must_use]
    pub fn program(
        namespace: impl Into<String>,
        application: impl Into<String>,
        program_type: ProgramType,
        program: impl Into<String>,
    ) -> Self {
        Self::Program {
            namespace: namespace.into(),
            application: application.into(),
            program_type,
            program: program.into(),
        }
    }

    #[must_use]
    pub fn dataset(namespace: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self::Dataset {
            namespace: namespace.into(),
            dataset: dataset.into(),
        }
    }

    #[must_use]
    pub fn stream(namespace: impl Into<String>, stream: impl Into<String>) -> Self {
        Self::Stream {
            namespace: namespace.into(),
            stream: stream.into(),
        }
    }

    #[must_use]
    pub fn stream_view(
        namespace: impl Into<String>,
        stream: impl Into<String>,
        view: impl Into<String>,
    ) -> Self {
        Self::StreamView {
            namespace: namespace.into(),
            stream: stream.into(),
            view: view.into(),
        }
    }

    #[must_use]
    pub fn artifact(
        namespace: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self::Artifact {
            namespace: namespace.into(),
            artifact: artifact.into(),
            version: version.into(),
        }
    }

    /// The kind tag of this entity.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Namespace { .. } => EntityKind::Namespace,
            Self::Application { .. } => EntityKind::Application,
            Self::Program { .. } => EntityKind::Program,
            Self::Dataset { .. } => EntityKind::Dataset,
            Self::Stream { .. } => EntityKind::Stream,
            Self::StreamView { .. } => EntityKind::StreamView,
            Self::Artifact { .. } => EntityKind::Artifact,
        }
    }

    /// The namespace this entity belongs to. For a namespace entity this is
    /// the namespace itself.
    #[must_use]
    pub fn namespace(&self) -> &str {
        match self {
            Self::Namespace { namespace }
            | Self::Application { namespace, .. }
            | Self::Program { namespace, .. }
            | Self::Dataset { namespace, .. }
            | Self::Stream { namespace, .. }
            | Self::StreamView { namespace, .. }
            | Self::Artifact { namespace, .. } => namespace,
        }
    }

    /// The entity's own name (the last component of its key fields).
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Namespace { namespace } => namespace,
            Self::Application { application, .. } => application,
            Self::Program { program, .. } => program,
            Self::Dataset { dataset, .. } => dataset,
            Self::Stream { stream, .. } => stream,
            Self::StreamView { view, .. } => view,
            Self::Artifact { artifact, .. } => artifact,
        }
    }

    /// Canonical string encoding, e.g. `application:ns1.app1`. Used as the
    /// entity component of every storage and index key.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Namespace { namespace } => format!("namespace:{namespace}"),
            Self::Application {
                namespace,
                application,
            } => format!("application:{namespace}.{application}"),
            Self::Program {
                namespace,
                application,
                program_type,
                program,
            } => format!("program:{namespace}.{application}.{program_type}.{program}"),
            Self::Dataset { namespace, dataset } => format!("dataset:{namespace}.{dataset}"),
            Self::Stream { namespace, stream } => format!("stream:{namespace}.{stream}"),
            Self::StreamView {
                namespace,
                stream,
                view,
            } => format!("stream_view:{namespace}.{stream}.{view}"),
            Self::Artifact {
                namespace,
                artifact,
                version,
            } => format!("artifact:{namespace}.{artifact}.{version}"),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_encoding() {
        let app = EntityId::application("ns1", "app1");
        assert_eq!(app.canonical(), "application:ns1.app1");
        let flow = EntityId::program("ns1", "app1", ProgramType::Flow, "flow1");
        assert_eq!(flow.canonical(), "program:ns1.app1.flow.flow1");
        let view = EntityId::stream_view("ns1", "s1", "v1");
        assert_eq!(view.canonical(), "stream_view:ns1.s1.v1");
        let artifact = EntityId::artifact("ns1", "a1", "1.0.0");
        assert_eq!(artifact.canonical(), "artifact:ns1.a1.1.0.0");
    }

    #[test]
    fn test_kind_and_namespace() {
        let ds = EntityId::dataset("ns2", "ds1");
        assert_eq!(ds.kind(), EntityKind::Dataset);
        assert_eq!(ds.namespace(), "ns2");
        assert_eq!(ds.name(), "ds1");

        let ns = EntityId::namespace_id(SYSTEM_NAMESPACE);
        assert_eq!(ns.namespace(), "system");
        assert_eq!(ns.name(), "system");
    }

    #[test]
    fn test_serde_round_trip() {
        let flow = EntityId::program("ns1", "app1", ProgramType::Flow, "flow1");
        let json = serde_json::to_string(&flow).unwrap();
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(flow, back);
    }
}
