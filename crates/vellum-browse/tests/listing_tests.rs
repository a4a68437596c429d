//! Integration tests for flat directory listings

mod common;

use vellum_browse::{
    EntryType, EntryTypeFilter, ErrorKind, FileListQuery, SortBy, SortOrder,
};
use vellum_permissions::Role;

fn names(response: &vellum_browse::FileListResponse) -> Vec<&str> {
    response.entries.iter().map(|e| e.name.as_str()).collect()
}

#[tokio::test]
async fn test_guest_listing_omits_restricted_child() {
    let repo = common::repository();
    let service = common::service(repo.path());

    let guest = service
        .get_files(&FileListQuery::default(), Role::Guest)
        .await
        .unwrap();
    assert_eq!(names(&guest), vec!["docs", "images", "notes.txt", "README.md"]);
    assert_eq!(guest.total_count, 4);
    assert_eq!(guest.stats.directory_count, 2);
    assert_eq!(guest.parent_path, None);
    assert!(guest.permissions.read);
    assert!(!guest.permissions.write);

    let admin = service
        .get_files(&FileListQuery::default(), Role::Admin)
        .await
        .unwrap();
    assert_eq!(admin.total_count, 5);
    assert_eq!(admin.entries[0].name, "admin");
}

#[tokio::test]
async fn test_hidden_and_reserved_entries_skipped() {
    let repo = common::repository();
    let service = common::service(repo.path());

    let response = service
        .get_files(&FileListQuery::default(), Role::Admin)
        .await
        .unwrap();
    assert!(response.entries.iter().all(|e| e.name != ".hidden" && e.name != "_index.md"));
}

#[tokio::test]
async fn test_second_page_of_three() {
    let repo = common::repository();
    let service = common::service(repo.path());
    std::fs::write(repo.path().join("images/a.png"), "a").unwrap();
    std::fs::write(repo.path().join("images/b.png"), "b").unwrap();

    let query = FileListQuery {
        path: "/images".to_string(),
        page: 2,
        per_page: 1,
        ..Default::default()
    };
    let response = service.get_files(&query, Role::Guest).await.unwrap();

    assert_eq!(names(&response), vec!["b.png"]);
    assert_eq!(response.total_count, 3);
    assert_eq!(response.total_pages, 3);
    assert!(response.has_next);
    assert!(response.has_previous);
    assert_eq!(response.stats.file_count, 3);
    assert_eq!(response.parent_path.as_deref(), Some("/"));
}

#[tokio::test]
async fn test_recursive_listing_respects_depth() {
    let repo = common::repository();
    let service = common::service(repo.path());

    let query = FileListQuery {
        path: "/docs".to_string(),
        recursive: true,
        depth: 2,
        ..Default::default()
    };
    let response = service.get_files(&query, Role::Guest).await.unwrap();

    assert_eq!(names(&response), vec!["deep", "guide", "intro.md", "setup.md"]);
    let setup = response.entries.iter().find(|e| e.name == "setup.md").unwrap();
    assert_eq!(setup.path, "/docs/guide/setup.md");
    assert!(setup.id.starts_with("file_"));
}

#[tokio::test]
async fn test_type_extension_and_exclude_filters() {
    let repo = common::repository();
    let service = common::service(repo.path());

    let query = FileListQuery {
        recursive: true,
        depth: 10,
        entry_type: EntryTypeFilter::File,
        extensions: vec![".MD".to_string()],
        exclude_patterns: vec!["deep".to_string()],
        ..Default::default()
    };
    let response = service.get_files(&query, Role::Guest).await.unwrap();

    assert_eq!(names(&response), vec!["intro.md", "README.md", "setup.md"]);
    assert!(response.entries.iter().all(|e| e.entry_type == EntryType::File));

    let admin = service.get_files(&query, Role::Admin).await.unwrap();
    assert_eq!(admin.total_count, 4);
}

#[tokio::test]
async fn test_exclude_matches_relative_paths() {
    let repo = common::repository();
    let service = common::service(repo.path());

    let query = FileListQuery {
        recursive: true,
        depth: 10,
        exclude_patterns: vec!["docs/guide".to_string(), "*.txt".to_string()],
        ..Default::default()
    };
    let response = service.get_files(&query, Role::Guest).await.unwrap();
    assert_eq!(names(&response), vec!["docs", "images", "intro.md", "logo.png", "README.md"]);
}

#[tokio::test]
async fn test_directories_first_for_every_sort() {
    let repo = common::repository();
    let service = common::service(repo.path());

    for sort_by in [SortBy::Name, SortBy::Modified, SortBy::Created, SortBy::Size, SortBy::Type] {
        for sort_order in [SortOrder::Asc, SortOrder::Desc] {
            let query = FileListQuery {
                sort_by,
                sort_order,
                ..Default::default()
            };
            let response = service.get_files(&query, Role::Admin).await.unwrap();
            let first_file = response
                .entries
                .iter()
                .position(|e| !e.is_dir())
                .unwrap_or(response.entries.len());
            assert!(
                response.entries[first_file..].iter().all(|e| !e.is_dir()),
                "{:?} {:?}",
                sort_by,
                sort_order
            );
        }
    }
}

#[tokio::test]
async fn test_sort_by_size_desc() {
    let repo = common::repository();
    let service = common::service(repo.path());

    let query = FileListQuery {
        sort_by: SortBy::Size,
        sort_order: SortOrder::Desc,
        ..Default::default()
    };
    let response = service.get_files(&query, Role::Guest).await.unwrap();
    // README.md is 9 bytes, notes.txt is 5.
    assert_eq!(names(&response), vec!["docs", "images", "README.md", "notes.txt"]);
    assert_eq!(response.stats.total_size, 14);
}

#[tokio::test]
async fn test_directory_child_counts_are_role_filtered() {
    let repo = common::repository();
    let service = common::service(repo.path());
    std::fs::write(repo.path().join("docs/_index.md"), "index").unwrap();

    let response = service
        .get_files(&FileListQuery::default(), Role::Guest)
        .await
        .unwrap();
    let docs = response.entries.iter().find(|e| e.name == "docs").unwrap();
    assert_eq!(docs.child_count, Some(2));
    assert_eq!(docs.size, None);
}

#[tokio::test]
async fn test_optional_metadata_and_permissions() {
    let repo = common::repository();
    let service = common::service(repo.path());

    let plain = service
        .get_files(&FileListQuery::for_path("/images"), Role::Guest)
        .await
        .unwrap();
    assert!(plain.entries[0].metadata.is_none());
    assert!(plain.entries[0].permissions.is_none());

    let query = FileListQuery {
        path: "/images".to_string(),
        include_metadata: true,
        include_permissions: true,
        ..Default::default()
    };
    let detailed = service.get_files(&query, Role::Guest).await.unwrap();
    let logo = &detailed.entries[0];
    let metadata = logo.metadata.as_ref().unwrap();
    assert_eq!(metadata.mime_type.as_deref(), Some("image/png"));
    assert_eq!(metadata.extension.as_deref(), Some("png"));
    assert_eq!(metadata.depth, 1);
    assert!(logo.permissions.as_ref().unwrap().read);
}

#[tokio::test]
async fn test_request_errors() {
    let repo = common::repository();
    let service = common::service(repo.path());

    let missing = service
        .get_files(&FileListQuery::for_path("/nope"), Role::Admin)
        .await
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);

    let file = service
        .get_files(&FileListQuery::for_path("/README.md"), Role::Admin)
        .await
        .unwrap_err();
    assert_eq!(file.kind(), ErrorKind::InvalidParameter);

    let denied = service
        .get_files(&FileListQuery::for_path("/admin"), Role::Guest)
        .await
        .unwrap_err();
    assert_eq!(denied.kind(), ErrorKind::PermissionDenied);

    let invalid = FileListQuery {
        per_page: 500,
        ..Default::default()
    };
    let err = service.get_files(&invalid, Role::Admin).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert_eq!(service.cache_stats().await.misses, 3);
}

#[tokio::test]
async fn test_traversal_cannot_escape_root() {
    let repo = common::repository();
    let service = common::service(&repo.path().join("docs"));

    let response = service
        .get_files(&FileListQuery::for_path("/../../"), Role::Guest)
        .await
        .unwrap();
    assert_eq!(names(&response), vec!["guide", "intro.md"]);
}

#[tokio::test]
async fn test_cached_listing_until_invalidated() {
    let repo = common::repository();
    let service = common::service(repo.path());
    let query = FileListQuery::for_path("/docs");

    let first = service.get_files(&query, Role::Guest).await.unwrap();
    std::fs::write(repo.path().join("docs/new.md"), "new").unwrap();

    let second = service.get_files(&query, Role::Guest).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(service.cache_stats().await.hits, 1);

    assert!(service.invalidate_path("/docs/new.md").await.unwrap() >= 1);
    let third = service.get_files(&query, Role::Guest).await.unwrap();
    assert_eq!(third.total_count, first.total_count + 1);
}

#[tokio::test]
async fn test_concurrent_roles_get_distinct_cache_entries() {
    let repo = common::repository();
    let service = common::service(repo.path());
    let query = FileListQuery::default();

    let (guest, admin) = tokio::join!(
        service.get_files(&query, Role::Guest),
        service.get_files(&query, Role::Admin)
    );
    assert_eq!(guest.unwrap().total_count, 4);
    assert_eq!(admin.unwrap().total_count, 5);
    assert_eq!(service.cache().len().await, 2);

    // Served from the cache, still role-specific.
    let anonymous = service.get_files(&query, Role::Anonymous).await.unwrap();
    assert_eq!(anonymous.total_count, 4);
    let admin_again = service.get_files(&query, Role::Admin).await.unwrap();
    assert_eq!(admin_again.total_count, 5);
    assert_eq!(service.cache_stats().await.hits, 1);
}

#[tokio::test]
async fn test_unreadable_subdirectory_yields_partial_listing() {
    let repo = common::repository();
    let service = common::flaky_service(repo.path(), "docs/guide", false);

    let query = FileListQuery {
        recursive: true,
        depth: 5,
        ..Default::default()
    };
    let response = service.get_files(&query, Role::Guest).await.unwrap();

    let names = names(&response);
    assert!(names.contains(&"guide"));
    assert!(names.contains(&"intro.md"));
    assert!(!names.contains(&"setup.md"));
    let guide = response.entries.iter().find(|e| e.name == "guide").unwrap();
    assert_eq!(guide.child_count, Some(0));
}

#[tokio::test]
async fn test_timed_out_subdirectory_yields_partial_listing() {
    let repo = common::repository();
    let service = common::flaky_service(repo.path(), "docs", true);

    let query = FileListQuery {
        recursive: true,
        depth: 3,
        ..Default::default()
    };
    let response = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        service.get_files(&query, Role::Guest),
    )
    .await
    .expect("timed out calls must not stall the request")
    .unwrap();

    let names = names(&response);
    assert!(names.contains(&"docs"));
    assert!(names.contains(&"logo.png"));
    assert!(!names.contains(&"intro.md"));
}
