//! Collaborator traits for the build API.
//!
//! The engine and scheduler only see these traits. [`super::BuildApiClient`]
//! and [`super::VisibilityClient`] implement them over HTTP; tests use the
//! in-memory implementations in `test_utils`.

use std::collections::HashSet;
use std::future::Future;

use serde::{Deserialize, Serialize};

use super::error::BuildApiError;
use super::records::{BuildRecord, RebuildTarget};
use crate::types::{Branch, BuilderName, Revision};

/// Looks up the builds and requests recorded for a revision.
pub trait BuildLookup: Send + Sync {
    /// Returns every record for the revision, possibly none.
    ///
    /// An undecodable response is reported as a
    /// [`BuildApiErrorKind::Malformed`](super::BuildApiErrorKind::Malformed)
    /// error, never as an empty list.
    fn lookup(
        &self,
        branch: &Branch,
        revision: &Revision,
    ) -> impl Future<Output = Result<Vec<BuildRecord>, BuildApiError>> + Send;
}

/// Enqueues additional runs of an existing build or request.
pub trait RebuildTrigger: Send + Sync {
    fn trigger(
        &self,
        branch: &Branch,
        target: RebuildTarget,
        count: u32,
    ) -> impl Future<Output = Result<(), BuildApiError>> + Send;
}

/// Visibility of one builder for a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderVisibilityRecord {
    pub buildername: BuilderName,
    #[serde(default)]
    pub hidden: bool,
}

/// Reports which builders operators have hidden.
pub trait BuilderVisibility: Send + Sync {
    fn builders(
        &self,
        branch: &Branch,
        revision: &Revision,
    ) -> impl Future<Output = Result<Vec<BuilderVisibilityRecord>, BuildApiError>> + Send;

    fn hidden_builders(
        &self,
        branch: &Branch,
        revision: &Revision,
    ) -> impl Future<Output = Result<HashSet<BuilderName>, BuildApiError>> + Send {
        async move {
            let records = self.builders(branch, revision).await?;
            Ok(records
                .into_iter()
                .filter(|r| r.hidden)
                .map(|r| r.buildername)
                .collect())
        }
    }

    fn visible_builders(
        &self,
        branch: &Branch,
        revision: &Revision,
    ) -> impl Future<Output = Result<HashSet<BuilderName>, BuildApiError>> + Send {
        async move {
            let records = self.builders(branch, revision).await?;
            Ok(records
                .into_iter()
                .filter(|r| !r.hidden)
                .map(|r| r.buildername)
                .collect())
        }
    }
}
