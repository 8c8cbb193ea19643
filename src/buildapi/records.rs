//! Build API response records.

use serde::{Deserialize, Serialize};

use crate::types::{BuildId, BuilderName, RequestId};

/// One build or build request recorded for a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub buildername: BuilderName,
    #[serde(default)]
    pub build_id: Option<BuildId>,
    #[serde(default)]
    pub request_id: Option<RequestId>,
}

impl BuildRecord {
    pub fn build(builder: impl Into<String>, id: u64) -> Self {
        BuildRecord {
            buildername: BuilderName::new(builder),
            build_id: Some(BuildId(id)),
            request_id: None,
        }
    }

    pub fn request(builder: impl Into<String>, id: u64) -> Self {
        BuildRecord {
            buildername: BuilderName::new(builder),
            build_id: None,
            request_id: Some(RequestId(id)),
        }
    }
}

/// What to rebuild: a finished/running build or a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildTarget {
    Build(BuildId),
    Request(RequestId),
}

impl RebuildTarget {
    /// Path segment under `{root}/{branch}/` that accepts this target.
    pub fn endpoint(&self) -> &'static str {
        match self {
            RebuildTarget::Build(_) => "build",
            RebuildTarget::Request(_) => "request",
        }
    }

    /// Form field carrying the identifier.
    pub fn field(&self) -> &'static str {
        match self {
            RebuildTarget::Build(_) => "build_id",
            RebuildTarget::Request(_) => "request_id",
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            RebuildTarget::Build(id) => id.0,
            RebuildTarget::Request(id) => id.0,
        }
    }
}

/// A revision's lookup results, reduced to what one builder's trigger needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LookupSummary {
    /// Records for the target builder.
    pub builder_total: usize,
    /// Records for the whole revision.
    pub rev_total: usize,
    /// First build id among the target builder's records.
    pub build_id: Option<BuildId>,
    /// First request id among the target builder's records.
    pub request_id: Option<RequestId>,
}

impl LookupSummary {
    pub fn summarize(records: &[BuildRecord], builder: &BuilderName) -> Self {
        let mut summary = LookupSummary {
            rev_total: records.len(),
            ..Default::default()
        };

        for record in records.iter().filter(|r| &r.buildername == builder) {
            summary.builder_total += 1;
            summary.build_id = summary.build_id.or(record.build_id);
            summary.request_id = summary.request_id.or(record.request_id);
        }

        summary
    }

    /// The identifier to rebuild with. Build ids are preferred.
    pub fn target(&self) -> Option<RebuildTarget> {
        self.build_id
            .map(RebuildTarget::Build)
            .or(self.request_id.map(RebuildTarget::Request))
    }
}
