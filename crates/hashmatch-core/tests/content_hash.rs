//! Content hashes depend on file bytes and relative paths only.

use std::path::Path;

use hashmatch_core::compute_content_hash;
use hashmatch_core::provenance::DEFAULT_EXCLUDE_EXTENSIONS;

const FILES: [(&str, &str); 4] = [
    ("scenario/rules.rs", "pub fn rules() {}\n"),
    ("scenario/map/layout.rs", "pub const ROOMS: u32 = 4;\n"),
    ("agent/brain.rs", "pub fn think() {}\n"),
    ("agent/brain.rs.map", "{\"version\":3}"),
];

fn populate(root: &Path, order: &[usize]) {
    for &i in order {
        let (rel, body) = FILES[i];
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }
}

#[tokio::test]
async fn hash_ignores_creation_and_include_order() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    populate(a.path(), &[0, 1, 2, 3]);
    populate(b.path(), &[3, 2, 1, 0]);

    let ha = compute_content_hash(a.path(), &["scenario", "agent"], &DEFAULT_EXCLUDE_EXTENSIONS)
        .await
        .unwrap();
    let hb = compute_content_hash(b.path(), &["agent", "scenario"], &DEFAULT_EXCLUDE_EXTENSIONS)
        .await
        .unwrap();
    assert_eq!(ha, hb);
    assert!(ha.starts_with("sha256:"));
}

#[tokio::test]
async fn hash_changes_with_semantic_bytes_only() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path(), &[0, 1, 2, 3]);
    let include = ["scenario", "agent"];
    let before = compute_content_hash(dir.path(), &include, &DEFAULT_EXCLUDE_EXTENSIONS)
        .await
        .unwrap();

    std::fs::write(dir.path().join("agent/brain.rs.map"), "{\"version\":4}").unwrap();
    let after_map = compute_content_hash(dir.path(), &include, &DEFAULT_EXCLUDE_EXTENSIONS)
        .await
        .unwrap();
    assert_eq!(before, after_map);

    std::fs::write(dir.path().join("scenario/rules.rs"), "pub fn rules() { }\n").unwrap();
    let after_edit = compute_content_hash(dir.path(), &include, &DEFAULT_EXCLUDE_EXTENSIONS)
        .await
        .unwrap();
    assert_ne!(before, after_edit);
}

#[tokio::test]
async fn renaming_a_file_changes_the_hash() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    populate(a.path(), &[0]);
    std::fs::create_dir_all(b.path().join("scenario")).unwrap();
    std::fs::write(b.path().join("scenario/other.rs"), FILES[0].1).unwrap();
    let ha = compute_content_hash(a.path(), &["scenario"], &[]).await.unwrap();
    let hb = compute_content_hash(b.path(), &["scenario"], &[]).await.unwrap();
    assert_ne!(ha, hb);
}
