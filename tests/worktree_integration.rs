//! Integration tests for the local resources: status, diff, index and
//! checkout.
//!
//! Every test builds real repositories below a temporary served root and
//! drives the engine the way request handlers do.

mod common;

use common::{address, open, Fixture};

use gitgate::engine::diff::compute_diff;
use gitgate::engine::index::{self, ResetBody};
use gitgate::engine::orchestrator::checkout::{checkout_branch, checkout_paths};
use gitgate::engine::stash::{self, StashPost, StashPut};
use gitgate::engine::status::{compute_status, render_status};
use gitgate::engine::Gateway;

fn reset_body(json: serde_json::Value) -> ResetBody {
    serde_json::from_value(json).unwrap()
}

fn status(gateway: &Gateway) -> gitgate::engine::status::StatusSnapshot {
    let (repo, addr) = open(gateway, "/gitapi/status/file/demo/");
    compute_status(&repo, &addr).unwrap()
}

// =============================================================================
// Status
// =============================================================================

#[test]
fn clean_repository_has_empty_status() {
    let fx = Fixture::new();
    fx.repo("demo");
    let gateway = fx.gateway();

    let (repo, addr) = open(&gateway, "/gitapi/status/file/demo/");
    let snapshot = compute_status(&repo, &addr).unwrap();
    assert!(snapshot.is_clean());

    let view = render_status(&repo, &addr, &snapshot).unwrap();
    assert_eq!(view.repository_state, "SAFE");
    assert_eq!(view.location, "/gitapi/status/file/demo/");
}

#[test]
fn modified_file_is_restored_by_checkout() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.write("README.md", "# Changed\n");
    let gateway = fx.gateway();

    let (repo, addr) = open(&gateway, "/gitapi/status/file/demo/");
    let snapshot = compute_status(&repo, &addr).unwrap();
    assert_eq!(snapshot.modified, vec!["README.md"]);

    checkout_paths(&repo, &["README.md".to_string()], false).unwrap();

    let (repo, addr) = open(&gateway, "/gitapi/status/file/demo/");
    assert!(compute_status(&repo, &addr).unwrap().is_clean());
    assert_eq!(demo.read("README.md"), "# Test Repo\n");
}

#[test]
fn untracked_files_survive_checkout_unless_removal_is_requested() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.write("scratch.txt", "notes\n");
    let gateway = fx.gateway();
    let paths = vec!["scratch.txt".to_string()];

    let (repo, addr) = open(&gateway, "/gitapi/status/file/demo/");
    assert_eq!(compute_status(&repo, &addr).unwrap().untracked, paths);

    checkout_paths(&repo, &paths, false).unwrap();
    assert!(demo.exists("scratch.txt"));

    checkout_paths(&repo, &paths, true).unwrap();
    assert!(!demo.exists("scratch.txt"));
    let (repo, addr) = open(&gateway, "/gitapi/status/file/demo/");
    assert!(compute_status(&repo, &addr).unwrap().is_clean());
}

#[test]
fn checkout_skips_paths_that_do_not_exist() {
    let fx = Fixture::new();
    fx.repo("demo");
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/status/file/demo/");
    checkout_paths(&repo, &["no/such/file.txt".to_string()], false).unwrap();
}

#[test]
fn folder_status_reports_paths_relative_to_the_folder() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.commit_file("src/lib.rs", "fn a() {}\n", "add lib");
    demo.write("src/lib.rs", "fn b() {}\n");
    demo.write("top.txt", "outside\n");
    let gateway = fx.gateway();

    let (repo, addr) = open(&gateway, "/gitapi/status/file/demo/src/");
    let snapshot = compute_status(&repo, &addr).unwrap();
    assert_eq!(snapshot.modified, vec!["src/lib.rs"]);
    assert!(snapshot.untracked.is_empty());

    let view = render_status(&repo, &addr, &snapshot).unwrap();
    assert_eq!(view.modified[0].name, "src/lib.rs");
    assert_eq!(view.modified[0].path, "lib.rs");
}

#[test]
fn status_of_a_plain_file_is_rejected() {
    let fx = Fixture::new();
    fx.repo("demo");
    let gateway = fx.gateway();

    let (repo, addr) = open(&gateway, "/gitapi/status/file/demo/README.md");
    let err = compute_status(&repo, &addr).unwrap_err();
    assert_eq!(err.http_code(), 400);
}

#[test]
fn unknown_repository_is_not_found() {
    let fx = Fixture::new();
    let gateway = fx.gateway();

    let err = gateway.open(&address("/gitapi/status/file/missing/")).unwrap_err();
    assert_eq!(err.http_code(), 404);
}

// =============================================================================
// Diff
// =============================================================================

#[test]
fn working_tree_diff_marks_missing_final_newlines() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.commit_file("test.txt", "test", "add test");
    demo.write("test.txt", "hello");
    let gateway = fx.gateway();

    let (repo, addr) = open(&gateway, "/gitapi/diff/Default/file/demo/");
    let report = compute_diff(&repo, &addr, &[]).unwrap();

    assert!(
        report.patch.contains(
            "@@ -1 +1 @@\n-test\n\\ No newline at end of file\n+hello\n\\ No newline at end of file\n"
        ),
        "unexpected patch:\n{}",
        report.patch
    );
    assert_eq!(report.view.children.len(), 1);
    assert_eq!(report.view.children[0].change_type, "MODIFY");
    assert_eq!(report.view.children[0].new_path, "test.txt");
}

#[test]
fn diff_filters_limit_the_changed_files() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.commit_file("a.txt", "a\n", "add a");
    demo.commit_file("b.txt", "b\n", "add b");
    demo.write("a.txt", "a2\n");
    demo.write("b.txt", "b2\n");
    let gateway = fx.gateway();

    let (repo, addr) = open(&gateway, "/gitapi/diff/Default/file/demo/");
    let all = compute_diff(&repo, &addr, &[]).unwrap();
    assert_eq!(all.view.children.len(), 2);

    let only_b = compute_diff(&repo, &addr, &["b.txt".to_string()]).unwrap();
    assert_eq!(only_b.view.children.len(), 1);
    assert_eq!(only_b.view.children[0].new_path, "b.txt");
    assert!(!only_b.patch.contains("a.txt"));
}

#[test]
fn range_diff_between_commits() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    let old = demo.head();
    demo.commit_file("new.txt", "new\n", "add new");
    let gateway = fx.gateway();

    let raw = format!("/gitapi/diff/{old}..HEAD/file/demo/");
    let (repo, addr) = open(&gateway, &raw);
    let report = compute_diff(&repo, &addr, &[]).unwrap();
    assert_eq!(report.view.children.len(), 1);
    assert_eq!(report.view.children[0].change_type, "ADD");
    assert!(report.patch.contains("+new\n"));
}

#[test]
fn several_filters_are_concatenated_in_filter_order() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    for name in ["a.txt", "b.txt", "c.txt"] {
        demo.commit_file(name, "old\n", name);
        demo.write(name, "new\n");
    }
    let gateway = fx.gateway();

    let (repo, addr) = open(&gateway, "/gitapi/diff/Default/file/demo/");
    let filters = vec!["c.txt".to_string(), "a.txt".to_string()];
    let report = compute_diff(&repo, &addr, &filters).unwrap();

    let paths: Vec<&str> = report.view.children.iter().map(|c| c.new_path.as_str()).collect();
    assert_eq!(paths, ["c.txt", "a.txt"]);
    let c_at = report.patch.find("diff --git a/c.txt").unwrap();
    let a_at = report.patch.find("diff --git a/a.txt").unwrap();
    assert!(c_at < a_at, "patch not in filter order:\n{}", report.patch);
    assert!(!report.patch.contains("b.txt"));
}

#[test]
fn swapping_range_ends_inverts_the_diff() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    let old = demo.head();
    let new = demo.commit_file("new.txt", "new\n", "add new");
    let gateway = fx.gateway();

    let forward = format!("/gitapi/diff/{old}..{new}/file/demo/");
    let (repo, addr) = open(&gateway, &forward);
    let forward = compute_diff(&repo, &addr, &[]).unwrap();
    let backward = format!("/gitapi/diff/{new}..{old}/file/demo/");
    let (repo, addr) = open(&gateway, &backward);
    let backward = compute_diff(&repo, &addr, &[]).unwrap();

    assert_eq!(forward.view.children[0].change_type, "ADD");
    assert_eq!(backward.view.children[0].change_type, "DELETE");
    assert_eq!(forward.view.children[0].new_path, backward.view.children[0].old_path);
    assert!(forward.patch.contains("+new\n"));
    assert!(backward.patch.contains("-new\n"));
}

#[test]
fn renames_are_reported_as_one_change() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    let content = "line one\nline two\nline three\nline four\n";
    let old = demo.commit_file("old.txt", content, "add old");
    demo.git(&["mv", "old.txt", "renamed.txt"]);
    demo.git(&["commit", "-m", "rename"]);
    let gateway = fx.gateway();

    let raw = format!("/gitapi/diff/{old}..HEAD/file/demo/");
    let (repo, addr) = open(&gateway, &raw);
    let report = compute_diff(&repo, &addr, &[]).unwrap();
    assert_eq!(report.view.children.len(), 1);
    let change = &report.view.children[0];
    assert_eq!(change.change_type, "RENAME");
    assert_eq!(change.old_path, "old.txt");
    assert_eq!(change.new_path, "renamed.txt");
}

#[test]
fn filters_match_paths_literally() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.commit_file("a.txt", "a\n", "add a");
    demo.commit_file("a*.txt", "star\n", "add star");
    demo.write("a.txt", "a2\n");
    demo.write("a*.txt", "star2\n");
    let gateway = fx.gateway();

    let (repo, addr) = open(&gateway, "/gitapi/diff/Default/file/demo/");
    let report = compute_diff(&repo, &addr, &["a*.txt".to_string()]).unwrap();
    assert_eq!(report.view.children.len(), 1);
    assert_eq!(report.view.children[0].new_path, "a*.txt");
}

// =============================================================================
// Index
// =============================================================================

#[test]
fn staging_moves_a_change_from_modified_to_changed() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.write("README.md", "# Staged\n");
    let gateway = fx.gateway();

    let (repo, file) = open(&gateway, "/gitapi/index/file/demo/README.md");
    index::stage(&repo, &file).unwrap();
    assert_eq!(index::staged_content(&repo, &file).unwrap(), b"# Staged\n");

    let (repo, addr) = open(&gateway, "/gitapi/status/file/demo/");
    let snapshot = compute_status(&repo, &addr).unwrap();
    assert_eq!(snapshot.changed, vec!["README.md"]);
    assert!(snapshot.modified.is_empty());

    index::unstage(&repo, &file).unwrap();
    let (repo, addr) = open(&gateway, "/gitapi/status/file/demo/");
    let snapshot = compute_status(&repo, &addr).unwrap();
    assert_eq!(snapshot.modified, vec!["README.md"]);
    assert!(snapshot.changed.is_empty());
}

#[test]
fn mixed_reset_unstages_everything() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.write("README.md", "# Staged\n");
    demo.write("new.txt", "new\n");
    demo.git(&["add", "-A"]);
    let gateway = fx.gateway();

    let (repo, addr) = open(&gateway, "/gitapi/index/file/demo/");
    index::reset(&repo, &addr, &reset_body(serde_json::json!({ "Reset": "MIXED" }))).unwrap();

    let snapshot = status(&gateway);
    assert!(snapshot.changed.is_empty());
    assert!(snapshot.added.is_empty());
    assert_eq!(snapshot.modified, vec!["README.md"]);
    assert_eq!(snapshot.untracked, vec!["new.txt"]);
}

#[test]
fn hard_reset_moves_the_branch_and_discards_changes() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    let first = demo.head();
    demo.commit_file("a.txt", "a\n", "second");
    demo.write("README.md", "# Dirty\n");
    let gateway = fx.gateway();

    let (repo, addr) = open(&gateway, "/gitapi/index/file/demo/");
    let body = reset_body(serde_json::json!({ "Reset": "HARD", "Commit": first }));
    index::reset(&repo, &addr, &body).unwrap();

    assert_eq!(demo.head(), first);
    assert!(!demo.exists("a.txt"));
    assert_eq!(demo.read("README.md"), "# Test Repo\n");
    assert!(status(&gateway).is_clean());
}

#[test]
fn path_reset_only_touches_the_named_paths() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.write("a.txt", "a\n");
    demo.write("b.txt", "b\n");
    demo.git(&["add", "-A"]);
    let gateway = fx.gateway();

    let (repo, addr) = open(&gateway, "/gitapi/index/file/demo/");
    index::reset(&repo, &addr, &reset_body(serde_json::json!({ "Path": ["a.txt"] }))).unwrap();

    let snapshot = status(&gateway);
    assert_eq!(snapshot.added, vec!["b.txt"]);
    assert_eq!(snapshot.untracked, vec!["a.txt"]);
}

#[test]
fn malformed_reset_requests_are_client_errors() {
    let fx = Fixture::new();
    fx.repo("demo");
    let gateway = fx.gateway();
    let (repo, addr) = open(&gateway, "/gitapi/index/file/demo/");

    for body in [
        serde_json::json!({}),
        serde_json::json!({ "Reset": "BOGUS" }),
        serde_json::json!({ "Reset": "KEEP" }),
        serde_json::json!({ "Path": ["README.md"], "Commit": "HEAD" }),
        serde_json::json!({ "Reset": "HARD", "Path": ["README.md"] }),
    ] {
        let err = index::reset(&repo, &addr, &reset_body(body.clone())).unwrap_err();
        assert_eq!(err.http_code(), 400, "body {body}");
    }
}

// =============================================================================
// Branch checkout
// =============================================================================

#[test]
fn branch_checkout_switches_head() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.git(&["branch", "feature"]);
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/status/file/demo/");
    checkout_branch(&repo, "feature").unwrap();
    assert_eq!(
        common::git_output(demo.path(), &["symbolic-ref", "HEAD"]),
        "refs/heads/feature"
    );
}

#[test]
fn branch_checkout_refuses_to_overwrite_local_changes() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.git(&["checkout", "-b", "other"]);
    demo.commit_file("README.md", "# Other\n", "change on other");
    demo.git(&["checkout", "master"]);
    demo.write("README.md", "# Local edit\n");
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/status/file/demo/");
    let err = checkout_branch(&repo, "other").unwrap_err();
    assert_eq!(err.http_code(), 409);
    assert_eq!(err.to_status().code, "CONFLICT");

    // Nothing moved.
    assert_eq!(demo.read("README.md"), "# Local edit\n");
    assert_eq!(
        common::git_output(demo.path(), &["symbolic-ref", "HEAD"]),
        "refs/heads/master"
    );
}

// =============================================================================
// Stash
// =============================================================================

#[test]
fn stash_save_then_pop_restores_changes() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.write("README.md", "# Work in progress\n");
    let gateway = fx.gateway();

    let (repo, addr) = open(&gateway, "/gitapi/stash/file/demo/");
    let post = StashPost {
        working_directory_message: Some("wip readme".into()),
        ..StashPost::default()
    };
    let saved = stash::save(&repo, &post).unwrap();
    assert_eq!(saved.index, 0);
    assert!(saved.message.contains("wip readme"));
    assert!(saved.location.starts_with("/gitapi/stash/"));
    assert_eq!(demo.read("README.md"), "# Test Repo\n");

    let listed = stash::list(&repo, &addr).unwrap();
    assert_eq!(listed.children.len(), 1);
    assert_eq!(listed.children[0].id, saved.id);

    stash::apply(&repo, &addr, &StashPut::default()).unwrap();
    assert_eq!(demo.read("README.md"), "# Work in progress\n");
    assert!(stash::list(&repo, &addr).unwrap().children.is_empty());
}

#[test]
fn applying_one_entry_keeps_it() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.write("README.md", "# First\n");
    let gateway = fx.gateway();
    let (repo, whole) = open(&gateway, "/gitapi/stash/file/demo/");
    let first = stash::save(&repo, &StashPost::default()).unwrap();
    demo.write("README.md", "# Second\n");
    stash::save(&repo, &StashPost::default()).unwrap();

    let raw = format!("/gitapi/stash/{}/file/demo/", first.id);
    let (repo, entry) = open(&gateway, &raw);
    assert_eq!(stash::get(&repo, &entry).unwrap().index, 1);
    stash::apply(&repo, &entry, &StashPut::default()).unwrap();

    assert_eq!(demo.read("README.md"), "# First\n");
    assert_eq!(stash::list(&repo, &whole).unwrap().children.len(), 2);
}

#[test]
fn dropping_entries() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    let gateway = fx.gateway();
    let (repo, whole) = open(&gateway, "/gitapi/stash/file/demo/");
    for content in ["# One\n", "# Two\n", "# Three\n"] {
        demo.write("README.md", content);
        stash::save(&repo, &StashPost::default()).unwrap();
    }

    let (repo, newest) = open(&gateway, "/gitapi/stash/stash%40%7B0%7D/file/demo/");
    stash::drop_entries(&repo, &newest).unwrap();
    assert_eq!(stash::list(&repo, &whole).unwrap().children.len(), 2);

    stash::drop_entries(&repo, &whole).unwrap();
    assert!(stash::list(&repo, &whole).unwrap().children.is_empty());
    assert_eq!(demo.read("README.md"), "# Test Repo\n");
}

#[test]
fn stash_requests_on_nothing_are_client_errors() {
    let fx = Fixture::new();
    fx.repo("demo");
    let gateway = fx.gateway();
    let (repo, whole) = open(&gateway, "/gitapi/stash/file/demo/");

    assert_eq!(stash::save(&repo, &StashPost::default()).unwrap_err().http_code(), 400);
    assert_eq!(stash::apply(&repo, &whole, &StashPut::default()).unwrap_err().http_code(), 400);
    assert_eq!(stash::drop_entries(&repo, &whole).unwrap_err().http_code(), 400);
    let entry = address("/gitapi/stash/stash%40%7B3%7D/file/demo/");
    assert_eq!(stash::get(&repo, &entry).unwrap_err().http_code(), 400);
}
