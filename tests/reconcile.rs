//! Store ⇄ disk scenarios through the public library API.

use docsync::config::SyncConfig;
use docsync::model::NewPage;
use docsync::storage::SqliteStorage;
use docsync::sync::{SyncEngine, SyncError};
use docsync::Error;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn engine(root: &Path) -> SyncEngine {
    let storage = SqliteStorage::open_memory().unwrap();
    SyncEngine::new(storage, SyncConfig::new(root), "tester")
}

#[test]
fn file_moved_on_disk_follows_new_directory() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let mut engine = engine(root);

    let guide = engine.create_page(&NewPage::new("Guide", "All guides.")).unwrap();
    engine.create_page(&NewPage::new("Setup", "Install it.")).unwrap();
    assert!(root.join("setup.md").exists());

    // Someone moves the file under the guide directory and commits it.
    fs::create_dir_all(root.join("guide")).unwrap();
    fs::rename(root.join("setup.md"), root.join("guide/setup.md")).unwrap();

    let stats = engine.reconcile().unwrap();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.relinked, 1);
    assert_eq!(stats.pruned, 1);

    let storage = engine.storage();
    let moved = storage.get_page_by_path("guide/setup.md").unwrap().unwrap();
    assert_eq!(moved.parent_id, Some(guide.id));
    assert_eq!(moved.content_md, "Install it.");
    assert!(storage.get_page_by_path("setup.md").unwrap().is_none());
    assert_eq!(storage.page_count().unwrap(), 2);

    assert!(engine.reconcile().unwrap().is_empty());
}

#[test]
fn removing_a_directory_prunes_the_subtree() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let mut engine = engine(root);

    let api = engine.create_page(&NewPage::new("API", "Reference.")).unwrap();
    let auth = engine
        .create_page(&NewPage::new("Auth", "Tokens.").with_parent(api.id))
        .unwrap();
    engine
        .create_page(&NewPage::new("Scopes", "Read, write.").with_parent(auth.id))
        .unwrap();
    let keep = engine.create_page(&NewPage::new("Home", "Welcome.")).unwrap();

    fs::remove_file(root.join("api.md")).unwrap();
    fs::remove_dir_all(root.join("api")).unwrap();

    let stats = engine.reconcile().unwrap();
    assert_eq!(stats.pruned, 3);

    let remaining: Vec<i64> = engine
        .storage()
        .list_pages()
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(remaining, vec![keep.id]);
}

#[test]
fn disk_links_become_backlinks() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let mut engine = engine(root);

    let target = engine.create_page(&NewPage::new("Login", "How to log in.")).unwrap();
    let source = engine.create_page(&NewPage::new("Start", "Begin here.")).unwrap();

    fs::write(
        root.join("start.md"),
        format!("---\ntitle: Start\n---\n\nSee [login](doc://{}).", target.id),
    )
    .unwrap();

    let stats = engine.reconcile().unwrap();
    assert_eq!(stats.updated, 1);

    let storage = engine.storage();
    let backlinks: Vec<i64> = storage
        .backlinks(target.id)
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(backlinks, vec![source.id]);

    let rendered = storage.get_page(source.id).unwrap().unwrap().body_html;
    assert!(rendered.contains(&format!("active_id={}", target.id)));
}

#[test]
fn reconcile_without_repository_is_a_config_error() {
    let temp = TempDir::new().unwrap();
    let mut engine = engine(&temp.path().join("missing"));

    let err = engine.reconcile().unwrap_err();
    assert!(matches!(err, Error::Sync(SyncError::RepositoryMissing(_))));
    assert_eq!(err.exit_code(), 7);
}

#[test]
fn nested_file_stays_parentless_until_parent_appears() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let mut engine = engine(root);

    fs::create_dir_all(root.join("guides")).unwrap();
    fs::write(root.join("guides/setup.md"), "---\ntitle: Setup\n---\n\nInstall it.").unwrap();

    let stats = engine.reconcile().unwrap();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.relinked, 0);
    let setup = engine.storage().get_page_by_path("guides/setup.md").unwrap().unwrap();
    assert_eq!(setup.parent_id, None);

    assert!(engine.reconcile().unwrap().is_empty());
    let setup = engine.storage().get_page(setup.id).unwrap().unwrap();
    assert_eq!(setup.parent_id, None);

    fs::write(root.join("guides.md"), "---\ntitle: Guides\n---\n\nAll guides.").unwrap();

    let stats = engine.reconcile().unwrap();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.relinked, 1);
    let storage = engine.storage();
    let guides = storage.get_page_by_path("guides.md").unwrap().unwrap();
    let setup = storage.get_page(setup.id).unwrap().unwrap();
    assert_eq!(setup.parent_id, Some(guides.id));
    assert_eq!(setup.file_path, "guides/setup.md");
}

#[test]
fn written_tree_rebuilds_an_empty_store() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    let mut source = engine(root);
    let guide = source.create_page(&NewPage::new("User Guide", "# Guide\n\nStart here.")).unwrap();
    let setup = source
        .create_page(&NewPage::new("Setup", "Install it.").with_parent(guide.id))
        .unwrap();
    source
        .create_page(&NewPage::new("Linux", "Use the package.").with_parent(setup.id))
        .unwrap();
    source.create_page(&NewPage::new("FAQ", "Questions.")).unwrap();
    source.write_all().unwrap();
    let originals = source.storage().list_pages().unwrap();

    let mut fresh = engine(root);
    let stats = fresh.reconcile().unwrap();
    assert_eq!(stats.created, originals.len());
    assert_eq!(stats.pruned, 0);

    let storage = fresh.storage();
    assert_eq!(storage.page_count().unwrap(), originals.len());
    for original in &originals {
        let copy = storage.get_page_by_path(&original.file_path).unwrap().unwrap();
        assert_eq!(copy.title, original.title);
        assert_eq!(copy.content_md, original.content_md);

        let original_parent = original.parent_id.map(|id| {
            originals
                .iter()
                .find(|p| p.id == id)
                .unwrap()
                .file_path
                .clone()
        });
        let copy_parent = copy
            .parent_id
            .map(|id| storage.get_page(id).unwrap().unwrap().file_path);
        assert_eq!(copy_parent, original_parent, "parent of {}", original.file_path);
    }

    assert!(fresh.reconcile().unwrap().is_empty());
}
