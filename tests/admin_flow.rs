//! End-to-end admin scenarios against a local store: write through the
//! admin operations, rebuild, then read back through the index.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use folio::admin::{Admin, ImageUpload, PostRequest};
use folio::config::SiteConfig;
use folio::navigate::{Resolution, resolve, split_path};
use folio::rebuild::{RebuildOutcome, Rebuilder};
use folio::scan;
use folio::store::{LocalStore, Store};
use folio::types::FolderNode;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use walkdir::WalkDir;

fn fixture_site() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    for entry in WalkDir::new(&src).into_iter().filter_map(|e| e.ok()) {
        let rel = entry.path().strip_prefix(&src).unwrap();
        let dest = tmp.path().join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest).unwrap();
        } else {
            std::fs::copy(entry.path(), &dest).unwrap();
        }
    }
    tmp
}

fn admin_for(root: &Path) -> Admin {
    let config = SiteConfig::default();
    let store: Arc<dyn Store> = Arc::new(LocalStore::new(root));
    Admin::new(store, Rebuilder::for_site(&config, root, false), &config)
}

fn index(root: &Path) -> FolderNode {
    scan::load_index(&root.join("posts/index.json")).unwrap()
}

#[tokio::test]
async fn created_post_resolves_through_index() {
    let site = fixture_site();
    let admin = admin_for(site.path());

    let saved = admin
        .create_or_update(PostRequest {
            title: "Trip".into(),
            body: "Went places.".into(),
            filename: Some("trip".into()),
            location: Some("2025".into()),
            date: Some("2025-06-01".into()),
            ..PostRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(saved.path, "posts/2025/trip.md");
    assert_eq!(saved.rebuild, RebuildOutcome::Success { files: 7, folders: 4 });

    let tree = index(site.path());
    match resolve(&tree, &split_path("/posts/2025/trip", "posts")) {
        Resolution::File { file, parent } => {
            assert_eq!(file.display_name(), "Trip");
            assert_eq!(file.path, "2025/trip");
            assert_eq!(parent, vec!["2025".to_string()]);
        }
        other => panic!("expected file, got {other:?}"),
    }
    // The new folder is now the most recent one at the root.
    assert_eq!(tree.mtime_ms, tree.folders["2025"].mtime_ms);
}

#[tokio::test]
async fn deleted_folder_disappears_from_index() {
    let site = fixture_site();
    let admin = admin_for(site.path());
    admin.rebuild_index().await;
    assert!(matches!(
        resolve(&index(site.path()), &split_path("travel", "posts")),
        Resolution::Folder { .. }
    ));

    let deletion = admin.delete_folder("travel").await.unwrap();
    assert_eq!(deletion.results.len(), 3);
    assert_eq!(deletion.rebuild, RebuildOutcome::Success { files: 3, folders: 1 });

    let tree = index(site.path());
    assert_eq!(resolve(&tree, &split_path("travel", "posts")), Resolution::NotFound);
    assert_eq!(
        resolve(&tree, &split_path("travel/japan/tokyo", "posts")),
        Resolution::NotFound
    );
}

#[tokio::test]
async fn rebuild_is_idempotent() {
    let site = fixture_site();
    let admin = admin_for(site.path());

    assert!(admin.rebuild_index().await.is_success());
    let first = std::fs::read_to_string(site.path().join("posts/index.json")).unwrap();
    assert!(admin.rebuild_index().await.is_success());
    let second = std::fs::read_to_string(site.path().join("posts/index.json")).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn uploaded_dotted_image_becomes_post_cover() {
    let site = fixture_site();
    let admin = admin_for(site.path());
    for name in ["trip.png", "2025.trip.png"] {
        admin
            .upload_image(ImageUpload {
                filename: Some(name.into()),
                content: STANDARD.encode(b"png"),
                ..ImageUpload::default()
            })
            .await
            .unwrap();
    }
    admin
        .create_or_update(PostRequest {
            title: "Trip".into(),
            filename: Some("trip".into()),
            location: Some("2025".into()),
            ..PostRequest::default()
        })
        .await
        .unwrap();

    let tree = index(site.path());
    let file = &tree.folders["2025"].files[0];
    assert_eq!(file.cover.as_deref(), Some("/public/posts/2025.trip.png"));
}

#[tokio::test]
async fn edit_keeps_post_readable_with_new_body() {
    let site = fixture_site();
    let admin = admin_for(site.path());

    let before = admin.get_post("travel/lisbon.md").await.unwrap();
    admin
        .create_or_update(PostRequest {
            title: before.meta["Title"].clone(),
            description: before.meta["Description"].clone(),
            image_url: before.meta.get("ImageURL").cloned(),
            date: before.meta.get("Date").cloned(),
            body: "Rewritten.".into(),
            filename: Some("lisbon".into()),
            location: Some("travel".into()),
        })
        .await
        .unwrap();

    let after = admin.get_post("travel/lisbon.md").await.unwrap();
    assert_eq!(after.meta, before.meta);
    assert_eq!(after.body, "Rewritten.\n");
    assert_ne!(after.sha, before.sha);
}

#[tokio::test]
async fn hello_in_blog_then_delete_blog() {
    let site = fixture_site();
    let admin = admin_for(site.path());

    admin
        .create_or_update(PostRequest {
            title: "Hello".into(),
            body: "World".into(),
            location: Some("blog".into()),
            ..PostRequest::default()
        })
        .await
        .unwrap();
    let hello = split_path("blog/hello", "posts");
    match resolve(&index(site.path()), &hello) {
        Resolution::File { file, .. } => assert_eq!(file.meta["Title"], "Hello"),
        other => panic!("expected file, got {other:?}"),
    }

    let deletion = admin.delete_folder("blog").await.unwrap();
    assert!(deletion.results.iter().all(|r| r.ok));
    assert_eq!(resolve(&index(site.path()), &hello), Resolution::NotFound);
}
