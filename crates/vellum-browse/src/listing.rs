//! Flat directory listings

use std::cmp::Ordering;

use futures::future::{join_all, BoxFuture, FutureExt};
use vellum_permissions::path as repo_path;

use crate::models::{file_extension, Entry, FileListResponse, ListingStats};
use crate::query::{normalize_extensions, EntryTypeFilter, FileListQuery, SortBy, SortOrder};
use crate::traversal::{Child, TraversalContext};

/// Query-derived filters applied after permission filtering
pub struct ListingFilter {
    entry_type: EntryTypeFilter,
    extensions: Vec<String>,
    excludes: Vec<glob::Pattern>,
}

impl ListingFilter {
    /// Build from a validated query; unparsable globs are ignored
    pub fn from_query(query: &FileListQuery) -> Self {
        Self {
            entry_type: query.entry_type,
            extensions: normalize_extensions(&query.extensions),
            excludes: query
                .exclude_patterns
                .iter()
                .filter_map(|pattern| glob::Pattern::new(pattern).ok())
                .collect(),
        }
    }

    /// Excluded entries are dropped and never descended into
    pub fn is_excluded(&self, name: &str, path: &str) -> bool {
        self.excludes
            .iter()
            .any(|pattern| pattern.matches(name) || pattern.matches(path))
    }

    /// Type and extension checks
    pub fn keeps(&self, child: &Child) -> bool {
        let type_ok = match self.entry_type {
            EntryTypeFilter::All => true,
            EntryTypeFilter::File => !child.meta.is_dir,
            EntryTypeFilter::Directory => child.meta.is_dir,
        };
        if !type_ok {
            return false;
        }
        if child.meta.is_dir || self.extensions.is_empty() {
            return true;
        }
        file_extension(&child.name).map_or(false, |ext| self.extensions.contains(&ext))
    }
}

/// Walk `dir` down to `max_level` levels, returning every kept entry
///
/// `level` is the depth of the children being listed, starting at 1.
pub fn collect_entries<'a>(
    ctx: &'a TraversalContext,
    filter: &'a ListingFilter,
    query: &'a FileListQuery,
    dir: String,
    level: usize,
) -> BoxFuture<'a, Vec<Entry>> {
    async move {
        let children = ctx.visible_children(&dir).await;
        let descend = level < query.effective_depth();

        let per_child = join_all(children.into_iter().map(|child| async move {
            if filter.is_excluded(&child.name, &child.path) {
                return Vec::new();
            }

            let mut found = Vec::new();
            if filter.keeps(&child) {
                found.push(build_entry(ctx, query, &child, level).await);
            }
            if descend && child.meta.is_dir {
                found.extend(collect_entries(ctx, filter, query, child.path.clone(), level + 1).await);
            }
            found
        }))
        .await;

        per_child.into_iter().flatten().collect()
    }
    .boxed()
}

async fn build_entry(
    ctx: &TraversalContext,
    query: &FileListQuery,
    child: &Child,
    level: usize,
) -> Entry {
    let mut entry = Entry::new(
        child.name.clone(),
        repo_path::to_repository_path(&child.path),
        &child.meta,
    );
    if child.meta.is_dir {
        entry.child_count = Some(ctx.visible_names(&child.path).await.len());
    }
    if query.include_permissions {
        entry.permissions = Some(ctx.engine().resolve(ctx.role(), &child.path));
    }
    if query.include_metadata {
        entry = entry.with_metadata(&child.meta, level);
    }
    entry
}

/// Directories first, then the requested key and direction, then name
pub fn sort_entries(entries: &mut [Entry], sort_by: SortBy, order: SortOrder) {
    entries.sort_by(|a, b| {
        b.is_dir()
            .cmp(&a.is_dir())
            .then_with(|| {
                let ordering = compare_by(a, b, sort_by);
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            })
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.path.cmp(&b.path))
    });
}

fn compare_by(a: &Entry, b: &Entry, sort_by: SortBy) -> Ordering {
    match sort_by {
        SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortBy::Modified => a.modified.cmp(&b.modified),
        SortBy::Created => a.created.cmp(&b.created),
        SortBy::Size => a.size.cmp(&b.size),
        SortBy::Type => a.extension().cmp(&b.extension()),
    }
}

/// Sort, aggregate and cut one page out of the filtered entries
pub fn paginate(
    mut entries: Vec<Entry>,
    query: &FileListQuery,
    parent_path: Option<String>,
    permissions: vellum_permissions::ResolvedPermission,
) -> FileListResponse {
    let stats = ListingStats::from_entries(&entries);
    sort_entries(&mut entries, query.sort_by, query.sort_order);

    let total_count = entries.len();
    let total_pages = total_count.div_ceil(query.per_page);
    let start = (query.page - 1).saturating_mul(query.per_page);
    let page_entries: Vec<Entry> = entries
        .into_iter()
        .skip(start)
        .take(query.per_page)
        .collect();

    FileListResponse {
        entries: page_entries,
        total_count,
        total_pages,
        page: query.page,
        per_page: query.per_page,
        has_next: query.page < total_pages,
        has_previous: query.page > 1,
        stats,
        parent_path,
        permissions,
    }
}
