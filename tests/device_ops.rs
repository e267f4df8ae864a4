//! Device file operation sequences against a scripted fake device.

mod common;

use common::MockTransport;
use remsync::device::{paths, DeviceOps};
use std::sync::Arc;
use tempfile::TempDir;

fn store_path(name: &str) -> String {
    format!("{}/{}", paths::DOCUMENT_STORE, name)
}

#[tokio::test]
async fn listing_applies_the_blacklist() {
    let transport = MockTransport::new().with_listing(
        paths::DOCUMENT_STORE,
        &[
            "./",
            "../",
            ".tree",
            "thumbnails/",
            "cache/",
            "lost+found/",
            "abc.thumbnails/",
            "abc.metadata",
        ],
    );
    let ops = DeviceOps::new(transport);

    let listing = ops
        .list_directory_entries(paths::DOCUMENT_STORE)
        .await
        .unwrap();
    assert_eq!(listing.dirs, vec!["abc.thumbnails"]);
    assert_eq!(listing.files, vec!["abc.metadata"]);
}

#[tokio::test]
async fn recursive_download_finishes_subdirectories_before_own_files() {
    let local = TempDir::new().unwrap();
    let transport = Arc::new(
        MockTransport::new()
            .with_listing(paths::DOCUMENT_STORE, &["abc.thumbnails/", "abc.metadata"])
            .with_listing(&store_path("abc.thumbnails"), &["0.jpg"])
            .with_file(&store_path("abc.thumbnails/0.jpg"), b"jpg")
            .with_file(&store_path("abc.metadata"), b"{}"),
    );
    let ops = DeviceOps::new(Arc::clone(&transport));

    ops.download_document_store(local.path()).await.unwrap();

    let log = transport.log_entries();
    assert_eq!(
        log,
        vec![
            format!("ls {}", paths::DOCUMENT_STORE),
            format!("ls {}", store_path("abc.thumbnails")),
            format!("get {}", store_path("abc.thumbnails/0.jpg")),
            format!("get {}", store_path("abc.metadata")),
        ]
    );
    assert!(local.path().join("abc.thumbnails/0.jpg").is_file());
    assert!(local.path().join("abc.metadata").is_file());
}

#[tokio::test]
async fn upload_deletes_an_existing_remote_file_first() {
    let local = TempDir::new().unwrap();
    let file = local.path().join("abc.pdf");
    std::fs::write(&file, b"pdf").unwrap();

    let transport = Arc::new(MockTransport::new().with_existing(&store_path("abc.pdf")));
    let ops = DeviceOps::new(Arc::clone(&transport));

    ops.upload_file(&file, &store_path("abc.pdf")).await.unwrap();
    assert_eq!(
        transport.log_entries(),
        vec![
            format!("rm {}", store_path("abc.pdf")),
            format!("put {}", store_path("abc.pdf")),
        ]
    );
}

#[tokio::test]
async fn upload_skips_the_delete_when_nothing_is_there() {
    let local = TempDir::new().unwrap();
    let file = local.path().join("abc.pdf");
    std::fs::write(&file, b"pdf").unwrap();

    let transport = Arc::new(MockTransport::new());
    let ops = DeviceOps::new(Arc::clone(&transport));

    ops.upload_file(&file, &store_path("abc.pdf")).await.unwrap();
    assert_eq!(
        transport.log_entries(),
        vec![format!("put {}", store_path("abc.pdf"))]
    );
    assert!(transport.remote_has(&store_path("abc.pdf")));
}

#[tokio::test]
async fn bundle_upload_follows_the_fixed_member_order() {
    let mirror = TempDir::new().unwrap();
    // Created out of order on purpose.
    std::fs::write(mirror.path().join("abc.content"), b"c").unwrap();
    std::fs::write(mirror.path().join("abc.pdf"), b"p").unwrap();
    std::fs::write(mirror.path().join("abc.metadata"), b"m").unwrap();
    std::fs::create_dir(mirror.path().join("abc.thumbnails")).unwrap();
    std::fs::write(mirror.path().join("abc.thumbnails/0.jpg"), b"t").unwrap();
    std::fs::create_dir(mirror.path().join("abc")).unwrap();
    std::fs::write(mirror.path().join("abc/page1.rm"), b"r").unwrap();

    let transport = Arc::new(MockTransport::new());
    let ops = DeviceOps::new(Arc::clone(&transport));

    let uploaded = ops
        .upload_document_bundle(&"abc".to_string(), mirror.path())
        .await
        .unwrap();
    assert!(uploaded);
    assert_eq!(
        transport.log_entries(),
        vec![
            format!("put {}", store_path("abc.pdf")),
            format!("put {}", store_path("abc.metadata")),
            format!("put {}", store_path("abc.content")),
            format!("mkdir {}", store_path("abc.thumbnails")),
            format!("put {}", store_path("abc.thumbnails/0.jpg")),
            format!("mkdir {}", store_path("abc")),
            format!("put {}", store_path("abc/page1.rm")),
        ]
    );
}

#[tokio::test]
async fn bundle_upload_with_no_local_members_is_a_no_op() {
    let mirror = TempDir::new().unwrap();
    let transport = Arc::new(MockTransport::new());
    let ops = DeviceOps::new(Arc::clone(&transport));

    let uploaded = ops
        .upload_document_bundle(&"missing".to_string(), mirror.path())
        .await
        .unwrap();
    assert!(!uploaded);
    assert!(transport.log_entries().is_empty());
}

#[tokio::test]
async fn template_download_fetches_the_catalog_then_every_image() {
    let local = TempDir::new().unwrap();
    let transport = Arc::new(
        MockTransport::new()
            .with_listing(
                paths::TEMPLATE_STORE,
                &["templates.json", "P Lines.png", "notes.txt"],
            )
            .with_file(paths::TEMPLATE_CATALOG, br#"{"templates":[]}"#)
            .with_file(
                &format!("{}/P Lines.png", paths::TEMPLATE_STORE),
                b"png",
            ),
    );
    let ops = DeviceOps::new(Arc::clone(&transport));

    ops.download_templates(local.path()).await.unwrap();

    let log = transport.log_entries();
    assert_eq!(log[0], format!("get {}", paths::TEMPLATE_CATALOG));
    assert!(log.contains(&format!("get {}/P Lines.png", paths::TEMPLATE_STORE)));
    assert!(!log.iter().any(|l| l.contains("notes.txt")));
    assert!(local.path().join("templates.json").is_file());
    assert!(local.path().join("P Lines.png").is_file());
}

#[tokio::test]
async fn splashscreen_download_takes_only_png_files() {
    let local = TempDir::new().unwrap();
    let transport = Arc::new(
        MockTransport::new()
            .with_listing(
                paths::SPLASHSCREEN_STORE,
                &["templates/", "suspended.png", "poweroff.png", "version.txt"],
            )
            .with_file(
                &format!("{}/suspended.png", paths::SPLASHSCREEN_STORE),
                b"png",
            )
            .with_file(
                &format!("{}/poweroff.png", paths::SPLASHSCREEN_STORE),
                b"png",
            ),
    );
    let ops = DeviceOps::new(Arc::clone(&transport));

    ops.download_splashscreens(local.path()).await.unwrap();

    let log = transport.log_entries();
    assert!(log.contains(&format!("get {}/suspended.png", paths::SPLASHSCREEN_STORE)));
    assert!(log.contains(&format!("get {}/poweroff.png", paths::SPLASHSCREEN_STORE)));
    assert!(!log.iter().any(|l| l.contains("version.txt")));
    assert!(local.path().join("suspended.png").is_file());
}
