//! Directory tree construction
//!
//! The tree is built as a fold: every call returns its node together with a
//! [`TreeDelta`] for the subtree, and the caller merges the deltas of its
//! children. Siblings are built concurrently.

use std::cmp::Ordering;
use std::collections::HashSet;

use futures::future::{join_all, BoxFuture, FutureExt};
use vellum_permissions::path as repo_path;

use crate::fs::FsMetadata;
use crate::models::{file_extension, Entry, TreeDelta, TreeNode};
use crate::query::{normalize_extensions, TreeQuery};
use crate::traversal::{Child, TraversalContext};

/// Levels expanded even when lazy loading is on
pub const AUTO_EXPAND_LEVEL: usize = 2;

/// Tree query reduced to what node construction needs
pub struct TreeOptions {
    max_depth: usize,
    lazy_load: bool,
    expand_paths: HashSet<String>,
    include_files: bool,
    extensions: Vec<String>,
    include_counts: bool,
    include_permissions: bool,
}

impl TreeOptions {
    pub fn from_query(query: &TreeQuery) -> Self {
        Self {
            max_depth: query.max_depth,
            lazy_load: query.lazy_load,
            expand_paths: query
                .expand_paths
                .iter()
                .map(|path| repo_path::normalize_path(path))
                .collect(),
            include_files: query.include_files,
            extensions: normalize_extensions(&query.file_extensions),
            include_counts: query.include_counts,
            include_permissions: query.include_permissions,
        }
    }

    /// Whether the children of the directory at `path` are built
    pub fn should_expand(&self, path: &str, level: usize) -> bool {
        if level >= self.max_depth {
            return false;
        }
        !self.lazy_load || level < AUTO_EXPAND_LEVEL || self.expand_paths.contains(path)
    }

    fn keeps(&self, child: &Child) -> bool {
        if child.meta.is_dir {
            return true;
        }
        self.include_files
            && (self.extensions.is_empty()
                || file_extension(&child.name).map_or(false, |ext| self.extensions.contains(&ext)))
    }

    /// Counting by name alone is exact when no file filter applies
    fn filters_files(&self) -> bool {
        !self.include_files || !self.extensions.is_empty()
    }
}

/// Build the node for `path` and, when expanded, its subtree
pub fn build_node<'a>(
    ctx: &'a TraversalContext,
    options: &'a TreeOptions,
    name: String,
    path: String,
    meta: FsMetadata,
    level: usize,
) -> BoxFuture<'a, (TreeNode, TreeDelta)> {
    async move {
        let mut entry = Entry::new(name, repo_path::to_repository_path(&path), &meta);
        if options.include_permissions {
            entry.permissions = Some(ctx.engine().resolve(ctx.role(), &path));
        }
        let own = TreeDelta::node(meta.is_dir, level);

        if !meta.is_dir {
            return (leaf(entry, level), own);
        }

        let expand = options.should_expand(&path, level);
        let (child_count, children, delta) = if expand {
            let visible: Vec<Child> = ctx
                .visible_children(&path)
                .await
                .into_iter()
                .filter(|child| options.keeps(child))
                .collect();
            let count = visible.len();

            let built = join_all(visible.into_iter().map(|child| {
                build_node(ctx, options, child.name, child.path, child.meta, level + 1)
            }))
            .await;

            let mut nodes = Vec::with_capacity(built.len());
            let mut delta = own;
            for (node, child_delta) in built {
                delta = delta.merge(child_delta);
                nodes.push(node);
            }
            nodes.sort_by(compare_nodes);
            (count, nodes, delta)
        } else {
            (count_children(ctx, options, &path).await, Vec::new(), own)
        };

        if options.include_counts {
            entry.child_count = Some(child_count);
        }
        let node = TreeNode {
            entry,
            children,
            level,
            is_expanded: expand,
            is_leaf: child_count == 0,
            has_children: child_count > 0,
        };
        (node, delta)
    }
    .boxed()
}

async fn count_children(ctx: &TraversalContext, options: &TreeOptions, path: &str) -> usize {
    if options.filters_files() {
        ctx.visible_children(path)
            .await
            .iter()
            .filter(|child| options.keeps(child))
            .count()
    } else {
        ctx.visible_names(path).await.len()
    }
}

fn leaf(entry: Entry, level: usize) -> TreeNode {
    TreeNode {
        entry,
        children: Vec::new(),
        level,
        is_expanded: false,
        is_leaf: true,
        has_children: false,
    }
}

/// Directories first, then by name
fn compare_nodes(a: &TreeNode, b: &TreeNode) -> Ordering {
    b.entry
        .is_dir()
        .cmp(&a.entry.is_dir())
        .then_with(|| a.entry.name.to_lowercase().cmp(&b.entry.name.to_lowercase()))
        .then_with(|| a.entry.name.cmp(&b.entry.name))
}
