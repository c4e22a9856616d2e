//! End-to-end tests for the indexing pipeline on the `basic` fixture.

use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use structmap::*;

fn fixture_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("basic")
}

fn copy_fixture() -> tempfile::TempDir {
    let src_root = fixture_root();
    let temp = tempfile::tempdir().expect("tempdir");

    for entry in walkdir::WalkDir::new(&src_root) {
        let entry = entry.expect("walkdir entry");
        let path = entry.path();
        let rel = path.strip_prefix(&src_root).expect("strip prefix");
        let dest = temp.path().join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).expect("create dir");
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).expect("create parent");
            }
            fs::copy(path, &dest).expect("copy file");
        }
    }

    temp
}

fn indexer(root: &Path) -> Indexer {
    let config = StructmapConfig::load_for_root(root).expect("config");
    Indexer::new(config).with_timestamp(1_700_000_000)
}

fn find<'a>(doc: &'a StructuralDocument, uid: &str) -> &'a EnrichedEntity {
    doc.entities()
        .find(|e| e.uid == uid)
        .unwrap_or_else(|| panic!("no entity {uid}"))
}

#[tokio::test]
async fn indexes_every_bundled_language() {
    let temp = copy_fixture();
    let run = indexer(temp.path()).index(temp.path()).await.unwrap();

    let uids: Vec<&str> = run.document.modules.iter().map(|m| m.uid()).collect();
    assert_eq!(
        uids,
        vec!["accounts#module", "accounts.users#module", "billing#module", "web.cart#module"]
    );
    assert_eq!(run.document.metadata.project_name, "basic");
    assert_eq!(run.document.metadata.goals, vec!["Exercise every bundled scanner"]);
    assert_eq!(
        run.document.metadata.stats,
        DocumentStats {
            module_count: 4,
            function_count: 3,
            class_count: 3,
            method_count: 5,
            call_edges_count: 9,
        }
    );
    assert_eq!(run.report.files_scanned, 4);
    assert!(run.report.files_unsupported >= 2, "README and structmap.toml");
    assert!(run.report.failures.is_empty());

    find(&run.document, "accounts.users.User.rename");
    find(&run.document, "billing.Line.new");
    find(&run.document, "web.cart.Cart.sum");
}

#[tokio::test]
async fn documented_and_heuristic_summaries() {
    let temp = copy_fixture();
    let run = indexer(temp.path()).index(temp.path()).await.unwrap();

    let documented = find(&run.document, "accounts.users.load_user#function");
    assert_eq!(documented.summary.source, SummarySource::Docstring);
    assert_eq!(documented.summary.confidence, 0.9);
    assert_eq!(documented.summary.text, "Load a user record by id.");

    let undocumented = find(&run.document, "accounts.users.get_user_name#function");
    assert_eq!(undocumented.summary.source, SummarySource::Heuristic);
    assert_eq!(undocumented.summary.confidence, 0.3);
    assert!(!undocumented.summary.text.is_empty());
}

#[tokio::test]
async fn call_edges_match_call_graphs() {
    let temp = copy_fixture();
    let run = indexer(temp.path()).index(temp.path()).await.unwrap();

    let literal: usize = run
        .document
        .modules
        .iter()
        .flat_map(|m| m.call_graph.values())
        .map(|callees| callees.len())
        .sum();
    assert_eq!(run.document.metadata.stats.call_edges_count, literal);

    let users = &run.document.modules[1];
    let callees: Vec<&str> = users.call_graph["get_user_name"].iter().map(String::as_str).collect();
    assert_eq!(callees, vec!["load_user", "strip"]);
    assert!(users.call_graph.contains_key("User.rename"));
}

#[tokio::test]
async fn unchanged_sources_give_identical_manifests() {
    let temp = copy_fixture();
    let first = indexer(temp.path()).index(temp.path()).await.unwrap();
    let second = indexer(temp.path()).index(temp.path()).await.unwrap();

    assert_eq!(
        serde_json::to_vec(&first.manifest).unwrap(),
        serde_json::to_vec(&second.manifest).unwrap()
    );
    assert_eq!(first.document, second.document);
    for entry in &first.manifest.entries {
        let hash = entry.hash.as_deref().expect("every fixture entity has source");
        assert!(hashing::is_well_formed(hash), "{} has {}", entry.uid, hash);
    }
}

#[tokio::test]
async fn reindent_only_keeps_entity_hash() {
    let temp = copy_fixture();
    let path = temp.path().join("src/billing.rs");
    let uid = "billing.total#function";

    let before = indexer(temp.path()).index(temp.path()).await.unwrap();
    let original = fs::read_to_string(&path).unwrap();
    let reindented = original.replace(
        "pub fn total(lines: &[Line]) -> u64 {\n    lines.iter().map(|l| l.cents).sum()\n}",
        "  pub fn total(lines: &[Line]) -> u64 {   \r\n      lines.iter().map(|l| l.cents).sum()\r\n  }",
    );
    assert_ne!(original, reindented);
    fs::write(&path, reindented).unwrap();
    let after = indexer(temp.path()).index(temp.path()).await.unwrap();

    let entity_before = find(&before.document, uid);
    let entity_after = find(&after.document, uid);
    assert_eq!(entity_before.hash, entity_after.hash);
    // The module's raw-content hash does see the edit.
    assert_ne!(find(&before.document, "billing#module").hash, find(&after.document, "billing#module").hash);
}

#[tokio::test]
async fn second_run_reports_changes() {
    let temp = copy_fixture();
    let root = temp.path();
    let config = StructmapConfig::load_for_root(root).unwrap();
    let store = ManifestStore::from_config(&config, root);

    indexer(root).index_and_save(root, &store, true).await.unwrap();

    let users = root.join("src/accounts/users.py");
    let source = fs::read_to_string(&users).unwrap();
    fs::write(
        &users,
        source.replace("    return user.name.strip()", "    return user.name.upper()")
            + "\n\ndef delete_user(uid):\n    pass\n",
    )
    .unwrap();
    fs::remove_file(root.join("web/cart.ts")).unwrap();

    let run = indexer(root).index_and_save(root, &store, true).await.unwrap();
    let changes = run.changes.expect("previous manifest exists");

    let added: Vec<&str> = changes.added.iter().map(|e| e.uid.as_str()).collect();
    assert_eq!(added, vec!["accounts.users.delete_user#function"]);
    let modified: Vec<&str> = changes.modified.iter().map(|e| e.uid.as_str()).collect();
    assert_eq!(
        modified,
        vec!["accounts.users#module", "accounts.users.get_user_name#function"]
    );
    let deleted: Vec<&str> = changes.deleted.iter().map(|e| e.uid.as_str()).collect();
    assert_eq!(
        deleted,
        vec![
            "web.cart#module",
            "web.cart.Cart#class",
            "web.cart.Cart.add",
            "web.cart.Cart.sum",
        ]
    );
}

#[tokio::test]
async fn scan_failures_are_isolated() {
    let temp = copy_fixture();
    let root = temp.path();
    fs::write(root.join("src/latin1.py"), [b'#', b' ', 0xe9, b'\n']).unwrap();
    fs::write(root.join("web/bad.records.json"), "[1, 2, 3]").unwrap();

    let run = indexer(root).index(root).await.unwrap();
    let failed: Vec<&str> = run.report.failures.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(failed, vec!["src/latin1.py", "web/bad.records.json"]);
    assert_eq!(run.document.modules.len(), 4);
}

#[tokio::test]
async fn records_scanner_feeds_the_pipeline() {
    let temp = copy_fixture();
    let root = temp.path();
    let records = serde_json::json!({
        "module": {
            "kind": "module", "name": "ledger", "file_path": "lib/ledger.rb",
            "source": "class Ledger\nend\n"
        },
        "entities": [{
            "kind": "class", "name": "Ledger", "file_path": "lib/ledger.rb",
            "source": "class Ledger\nend",
            "methods": [{"kind": "method", "name": "post", "file_path": "lib/ledger.rb",
                         "source": "def post; audit; end", "calls": ["audit"]}]
        }]
    });
    fs::create_dir_all(root.join("scans")).unwrap();
    fs::write(root.join("scans/ledger.records.json"), records.to_string()).unwrap();

    let run = indexer(root).index(root).await.unwrap();
    let ledger = find(&run.document, "ledger#module");
    assert_eq!(ledger.hash, Some(hashing::hash_content(b"class Ledger\nend\n")));
    assert_eq!(ledger.hash_source, Some(HashSource::Content));
    find(&run.document, "ledger.Ledger.post");
    assert_eq!(run.document.metadata.stats.call_edges_count, 10);
}

#[tokio::test]
async fn uid_collision_aborts_the_run() {
    let temp = copy_fixture();
    let root = temp.path();
    // `src/accounts.py` and `src/accounts/__init__.py` both name `accounts`.
    fs::write(root.join("src/accounts.py"), "X = 1\n").unwrap();

    let err = indexer(root).index(root).await.unwrap_err();
    assert_eq!(err.code(), "uid_collision");
    let message = err.to_string();
    assert!(message.contains("src/accounts.py"), "{message}");
    assert!(message.contains("src/accounts/__init__.py"), "{message}");
}

#[tokio::test]
async fn index_file_and_same_named_child_both_index() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("src/parser")).unwrap();
    fs::create_dir_all(root.join("pkg")).unwrap();
    fs::write(root.join("src/parser/mod.rs"), "pub mod parser;\npub fn parse() {}\n").unwrap();
    fs::write(root.join("src/parser/parser.rs"), "pub fn parse() {}\n").unwrap();
    fs::write(root.join("pkg/__init__.py"), "def load():\n    pass\n").unwrap();
    fs::write(root.join("pkg/pkg.py"), "def load():\n    pass\n").unwrap();

    let run = indexer(root).index(root).await.unwrap();
    let uids: Vec<&str> = run.document.modules.iter().map(|m| m.uid()).collect();
    assert_eq!(
        uids,
        vec!["pkg#module", "pkg.pkg#module", "parser#module", "parser.parser#module"]
    );
    find(&run.document, "parser.parse#function");
    find(&run.document, "parser.parser.parse#function");
    find(&run.document, "pkg.load#function");
    find(&run.document, "pkg.pkg.load#function");

    let report = struct_dir::generate(&root.join("struct"), &run.document).unwrap();
    assert_eq!(report.module_files.len(), 4);
}

#[tokio::test]
async fn property_setter_does_not_collide() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    fs::write(
        root.join("shapes.py"),
        "class Circle:\n    @property\n    def r(self):\n        return self._r\n\n    @r.setter\n    def r(self, value):\n        self._r = value\n",
    )
    .unwrap();

    let run = indexer(root).index(root).await.unwrap();
    let r = find(&run.document, "shapes.Circle.r");
    assert!(r.tags.contains(&"property".to_string()), "{:?}", r.tags);
    assert_eq!(find(&run.document, "shapes.Circle#class").methods.len(), 1);
}

#[tokio::test]
async fn struct_directory_from_indexed_document() {
    let temp = copy_fixture();
    let run = indexer(temp.path()).index(temp.path()).await.unwrap();
    let out = temp.path().join("struct");
    let report = struct_dir::generate(&out, &run.document).unwrap();

    let module_files: Vec<String> = walkdir::WalkDir::new(out.join(struct_dir::MODULES_DIR))
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        module_files,
        vec!["accounts.json", "accounts.users.json", "billing.json", "web.cart.json"]
    );
    assert_eq!(report.edge_count, run.document.metadata.stats.call_edges_count);
}
