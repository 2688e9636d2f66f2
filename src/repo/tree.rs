//! Recursive directory tree of the package.
//!
//! Subdirectories that fail to list become error nodes instead of failing
//! the whole tree. Recursion stops once a directory path has
//! [`MAX_TREE_DEPTH`] segments; deeper directories are marked truncated.

use std::collections::BTreeMap;

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tracing::warn;

use super::Repository;
use crate::github::{DirectoryListing, EntryKind, RepoEntry, SourceError};

/// Directories are expanded only while their path has fewer segments than this.
pub const MAX_TREE_DEPTH: usize = 6;

const TRUNCATED_NOTE: &str = "Depth limit reached";
const FAILED_ERROR: &str = "Failed to fetch contents";

/// One node of the tree.
///
/// A directory carries exactly one of `children`, `note` or `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    File {
        path: String,
        name: String,
        #[serde(rename = "url")]
        download_url: Option<String>,
        sha: Option<String>,
    },
    Directory {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        children: Option<BTreeMap<String, TreeNode>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl TreeNode {
    fn file(entry: &RepoEntry) -> Self {
        Self::File {
            path: entry.path.clone(),
            name: entry.name.clone(),
            download_url: entry.download_url.clone(),
            sha: entry.sha.clone(),
        }
    }

    fn expanded(path: String, children: BTreeMap<String, Self>) -> Self {
        Self::Directory {
            path,
            children: Some(children),
            note: None,
            error: None,
        }
    }

    fn truncated(path: String) -> Self {
        Self::Directory {
            path,
            children: None,
            note: Some(TRUNCATED_NOTE.to_string()),
            error: None,
        }
    }

    fn failed(path: String) -> Self {
        Self::Directory {
            path,
            children: None,
            note: None,
            error: Some(FAILED_ERROR.to_string()),
        }
    }

    /// Repository path of this node.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::File { path, .. } | Self::Directory { path, .. } => path,
        }
    }

    /// Children of an expanded directory.
    #[must_use]
    pub const fn children(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Directory { children, .. } => children.as_ref(),
            Self::File { .. } => None,
        }
    }

    /// Returns `true` for a directory cut off by the depth limit.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        matches!(self, Self::Directory { note: Some(_), .. })
    }

    /// Returns `true` for a directory whose listing failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Directory { error: Some(_), .. })
    }
}

fn depth(path: &str) -> usize {
    path.split('/').count()
}

impl Repository {
    /// Builds the tree rooted at `path` (relative to the package root, or
    /// the package root itself when `None`).
    ///
    /// # Errors
    ///
    /// Fails only when the root itself cannot be listed.
    pub async fn directory_tree(&self, path: Option<&str>) -> Result<TreeNode, SourceError> {
        let root = self.layout.resolve(path.unwrap_or_default());
        self.tree_node(root).await
    }

    fn tree_node(&self, path: String) -> BoxFuture<'_, Result<TreeNode, SourceError>> {
        async move {
            let entries = match self.listing(&path).await? {
                DirectoryListing::Directory(entries) => entries,
                DirectoryListing::File(entry) => return Ok(TreeNode::file(&entry)),
            };

            let expand = depth(&path) < MAX_TREE_DEPTH;
            let mut children = BTreeMap::new();
            for entry in entries {
                let node = match entry.kind {
                    EntryKind::File => TreeNode::file(&entry),
                    EntryKind::Dir if expand => match self.tree_node(entry.path.clone()).await {
                        Ok(node) => node,
                        Err(err) => {
                            warn!(path = %entry.path, error = %err, "Failed to list subdirectory");
                            TreeNode::failed(entry.path.clone())
                        }
                    },
                    EntryKind::Dir => TreeNode::truncated(entry.path.clone()),
                    EntryKind::Symlink | EntryKind::Submodule => continue,
                };
                children.insert(entry.name, node);
            }
            Ok(TreeNode::expanded(path, children))
        }
        .boxed()
    }
}
