//! Integration tests for commits, history and the HEAD-changing
//! operations: merge, rebase, cherry-pick and revert.

mod common;

use std::sync::{Arc, Barrier};

use serde_json::json;

use common::{open, Fixture, TestRepo};

use gitgate::core::config::Config;
use gitgate::engine::history::{self, Paging};
use gitgate::engine::index;
use gitgate::engine::orchestrator::{self, cherry_pick, merge, rebase, revert, CommitPost};
use gitgate::engine::orchestrator::{
    CherryPickStatus, MergeStatus, RebaseOperation, RebaseStatus, RevertStatus,
};
use gitgate::engine::status::compute_status;
use gitgate::engine::Gateway;

fn post(body: serde_json::Value) -> CommitPost {
    serde_json::from_value(body).unwrap()
}

/// `master` and `topic` both change `f.txt` after a common base.
fn diverged(fx: &Fixture) -> TestRepo {
    let demo = fx.repo("demo");
    demo.commit_file("f.txt", "base\n", "base");
    demo.git(&["branch", "topic"]);
    demo.commit_file("f.txt", "master\n", "master change");
    demo.git(&["checkout", "topic"]);
    demo.commit_file("f.txt", "topic\n", "topic change");
    demo.git(&["checkout", "master"]);
    demo
}

fn head_status(gateway: &Gateway) -> gitgate::engine::status::StatusSnapshot {
    let (repo, addr) = open(gateway, "/gitapi/status/file/demo/");
    compute_status(&repo, &addr).unwrap()
}

// =============================================================================
// Commit and log
// =============================================================================

#[test]
fn commit_records_staged_changes() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    let before = demo.head();
    demo.write("notes.txt", "remember\n");
    let gateway = fx.gateway();

    let (repo, file) = open(&gateway, "/gitapi/index/file/demo/notes.txt");
    index::stage(&repo, &file).unwrap();

    let (repo, head) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let action = post(json!({
        "Message": "add notes",
        "AuthorName": "Author",
        "AuthorEmail": "author@example.com"
    }))
    .into_action()
    .unwrap();
    let node = orchestrator::apply(&repo, &head, action).unwrap();

    assert_eq!(node["Id"].as_str().unwrap(), demo.head());
    assert_eq!(node["Parents"][0].as_str().unwrap(), before);
    assert_eq!(node["AuthorName"], "Author");
    assert_eq!(node["Message"].as_str().unwrap().trim(), "add notes");
    assert!(head_status(&gateway).is_clean());
}

#[test]
fn commit_operations_apply_to_head_only() {
    let fx = Fixture::new();
    fx.repo("demo");
    let gateway = fx.gateway();

    let (repo, addr) = open(&gateway, "/gitapi/commit/master/file/demo/");
    let action = post(json!({ "Message": "nope" })).into_action().unwrap();
    let err = orchestrator::apply(&repo, &addr, action).unwrap_err();
    assert_eq!(err.http_code(), 400);
}

#[test]
fn log_pages_through_history() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.commit_file("a.txt", "a\n", "second");
    let third = demo.commit_file("b.txt", "b\n", "third");
    let gateway = fx.gateway();
    let (repo, addr) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");

    let first = history::log(&repo, &addr, Paging { page: 1, page_size: 1 }).unwrap();
    assert_eq!(first.children.len(), 1);
    assert_eq!(first.children[0].id.as_str(), third);
    assert!(first.has_next);
    assert!(!first.has_prev);
    assert!(first.previous_location.is_none());

    let second = history::log(&repo, &addr, Paging { page: 2, page_size: 1 }).unwrap();
    assert_eq!(second.children.len(), 1);
    assert!(second.has_next);
    assert!(second.has_prev);
    assert!(second.next_location.unwrap().contains("page=3"));

    let last = history::log(&repo, &addr, Paging { page: 3, page_size: 1 }).unwrap();
    assert_eq!(last.children.len(), 1);
    assert!(!last.has_next);

    let past_end = history::log(&repo, &addr, Paging { page: 4, page_size: 1 }).unwrap();
    assert!(past_end.children.is_empty());
}

#[test]
fn log_of_a_file_only_lists_commits_touching_it() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.commit_file("a.txt", "a\n", "add a");
    demo.commit_file("b.txt", "b\n", "add b");
    demo.commit_file("a.txt", "a2\n", "change a");
    let gateway = fx.gateway();

    let (repo, addr) = open(&gateway, "/gitapi/commit/HEAD/file/demo/a.txt");
    let page = history::log(&repo, &addr, Paging::default()).unwrap();
    let messages: Vec<&str> = page.children.iter().map(|c| c.message.trim()).collect();
    assert_eq!(messages, vec!["change a", "add a"]);
}

#[test]
fn range_log_lists_commits_reachable_from_the_end_only() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    let start = demo.commit_file("a.txt", "1\n", "one");
    demo.commit_file("a.txt", "2\n", "two");
    demo.commit_file("b.txt", "3\n", "three");
    let gateway = fx.gateway();

    let raw = format!("/gitapi/commit/{start}..HEAD/file/demo/");
    let (repo, addr) = open(&gateway, &raw);
    let page = history::log(&repo, &addr, Paging::default()).unwrap();
    let messages: Vec<&str> = page.children.iter().map(|c| c.message.trim()).collect();
    assert_eq!(messages, ["three", "two"]);
    assert!(!page.has_next);
}

#[test]
fn file_log_diffs_against_the_previous_listed_commit() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    let added = demo.commit_file("a.txt", "one\n", "add a");
    demo.commit_file("other.txt", "x\n", "unrelated");
    let changed = demo.commit_file("a.txt", "two\n", "change a");
    let gateway = fx.gateway();

    let (repo, addr) = open(&gateway, "/gitapi/commit/HEAD/file/demo/a.txt");
    let page = history::log(&repo, &addr, Paging::default()).unwrap();
    assert_eq!(page.children.len(), 2);

    let newest = &page.children[0];
    assert_eq!(newest.id.as_str(), changed);
    let diffs = newest.diffs.as_ref().unwrap();
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].change_type, "MODIFY");
    assert!(diffs[0].old_location.as_deref().unwrap().contains(&added));

    let oldest = &page.children[1];
    assert_eq!(oldest.diffs.as_ref().unwrap()[0].change_type, "ADD");
}

#[test]
fn oldest_entry_of_a_range_diffs_against_its_parent() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    let base = demo.commit_file("a.txt", "one\n", "add a");
    let parent = demo.commit_file("b.txt", "b\n", "unrelated");
    demo.commit_file("a.txt", "two\n", "change a");
    let gateway = fx.gateway();

    let raw = format!("/gitapi/commit/{base}..HEAD/file/demo/a.txt");
    let (repo, addr) = open(&gateway, &raw);
    let page = history::log(&repo, &addr, Paging::default()).unwrap();
    assert_eq!(page.children.len(), 1);

    let diffs = page.children[0].diffs.as_ref().unwrap();
    assert_eq!(diffs[0].change_type, "MODIFY");
    assert_eq!(diffs[0].old_path, "a.txt");
    assert!(diffs[0].old_location.as_deref().unwrap().contains(&parent));
}

#[test]
fn commit_content_reads_a_file_at_a_revision() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    let first = demo.commit_file("a.txt", "one\n", "one");
    demo.commit_file("a.txt", "two\n", "two");
    let gateway = fx.gateway();

    let raw = format!("/gitapi/commit/{first}/file/demo/a.txt");
    let (repo, addr) = open(&gateway, &raw);
    assert_eq!(history::commit_content(&repo, &addr).unwrap(), b"one\n");
}

// =============================================================================
// Merge
// =============================================================================

#[test]
fn merge_of_disjoint_changes_creates_a_merge_commit() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.git(&["branch", "side"]);
    demo.commit_file("main.txt", "main\n", "main work");
    demo.git(&["checkout", "side"]);
    let side = demo.commit_file("side.txt", "side\n", "side work");
    demo.git(&["checkout", "master"]);
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let outcome = merge::merge(&repo, "side", false).unwrap();
    assert_eq!(outcome.result, MergeStatus::Merged);

    assert_eq!(demo.rev_parse("HEAD^2"), side);
    assert_eq!(demo.read("side.txt"), "side\n");
    assert!(head_status(&gateway).is_clean());
}

#[test]
fn merge_fast_forwards_and_then_is_up_to_date() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.git(&["checkout", "-b", "ahead"]);
    let ahead = demo.commit_file("x.txt", "x\n", "ahead");
    demo.git(&["checkout", "master"]);
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    assert_eq!(merge::merge(&repo, "ahead", false).unwrap().result, MergeStatus::FastForward);
    assert_eq!(demo.head(), ahead);

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    assert_eq!(merge::merge(&repo, "ahead", false).unwrap().result, MergeStatus::AlreadyUpToDate);
}

#[test]
fn squash_merge_stages_without_committing() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.git(&["branch", "side"]);
    let head = demo.commit_file("main.txt", "main\n", "main work");
    demo.git(&["checkout", "side"]);
    demo.commit_file("side.txt", "side\n", "side work");
    demo.git(&["checkout", "master"]);
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let outcome = merge::merge(&repo, "side", true).unwrap();
    assert_eq!(outcome.result, MergeStatus::MergedSquashed);

    assert_eq!(demo.head(), head);
    assert_eq!(demo.read("side.txt"), "side\n");
    let status = head_status(&gateway);
    assert_eq!(status.added, vec!["side.txt"]);
    assert!(!status.state.is_in_progress());
}

#[test]
fn committing_a_resolved_merge_records_both_parents() {
    let fx = Fixture::new();
    let demo = diverged(&fx);
    let topic = demo.rev_parse("topic");
    let gateway = fx.gateway();

    let (repo, head) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    assert_eq!(merge::merge(&repo, "topic", false).unwrap().result, MergeStatus::Conflicting);

    demo.write("f.txt", "both\n");
    let (repo, file) = open(&gateway, "/gitapi/index/file/demo/f.txt");
    index::stage(&repo, &file).unwrap();
    let action = post(json!({ "Message": "merge topic" })).into_action().unwrap();
    orchestrator::apply(&repo, &head, action).unwrap();

    assert_eq!(demo.rev_parse("HEAD^2"), topic);
    assert!(!head_status(&gateway).state.is_in_progress());
}

#[test]
fn conflicting_merge_writes_markers() {
    let fx = Fixture::new();
    let demo = diverged(&fx);
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let outcome = merge::merge(&repo, "topic", false).unwrap();
    assert_eq!(outcome.result, MergeStatus::Conflicting);
    assert_eq!(outcome.conflicting_paths, Some(vec!["f.txt".to_string()]));

    let content = demo.read("f.txt");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 5, "unexpected markers:\n{content}");
    assert!(lines[0].starts_with("<<<<<<<"));
    assert_eq!(lines[1], "master");
    assert_eq!(lines[2], "=======");
    assert_eq!(lines[3], "topic");
    assert!(lines[4].starts_with(">>>>>>>"));

    let status = head_status(&gateway);
    assert_eq!(status.conflicting, vec!["f.txt"]);
}

#[test]
fn merge_refuses_to_touch_dirty_paths() {
    let fx = Fixture::new();
    let demo = diverged(&fx);
    demo.write("f.txt", "uncommitted\n");
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let outcome = merge::merge(&repo, "topic", false).unwrap();
    assert_eq!(outcome.result, MergeStatus::Failed);
    assert!(outcome.failing_paths.unwrap().contains_key("f.txt"));
    assert_eq!(demo.read("f.txt"), "uncommitted\n");
}

// =============================================================================
// Rebase
// =============================================================================

#[test]
fn rebase_stops_on_conflict_and_continues_after_resolution() {
    let fx = Fixture::new();
    let demo = diverged(&fx);
    let master = demo.rev_parse("master");
    demo.git(&["checkout", "topic"]);
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let begun = rebase::rebase(&repo, Some("master"), RebaseOperation::Begin).unwrap();
    assert_eq!(begun.result, RebaseStatus::Stopped);
    assert_eq!(begun.conflicting_paths, Some(vec!["f.txt".to_string()]));
    assert_eq!(begun.rebase_state.upon_commit.as_ref().map(|o| o.as_str()), Some(master.as_str()));

    // Unresolved conflicts block CONTINUE.
    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let blocked = rebase::rebase(&repo, None, RebaseOperation::Continue).unwrap();
    assert_eq!(blocked.result, RebaseStatus::FailedUnmergedPaths);

    demo.write("f.txt", "resolved\n");
    let (repo, file) = open(&gateway, "/gitapi/index/file/demo/f.txt");
    index::stage(&repo, &file).unwrap();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let done = rebase::rebase(&repo, None, RebaseOperation::Continue).unwrap();
    assert_eq!(done.result, RebaseStatus::Ok);
    assert_eq!(
        serde_json::to_value(&done.rebase_state).unwrap()["Operation"],
        "NONE"
    );

    assert_eq!(demo.read("f.txt"), "resolved\n");
    assert_eq!(demo.rev_parse("HEAD~1"), master);
}

#[test]
fn rebase_abort_restores_the_branch() {
    let fx = Fixture::new();
    let demo = diverged(&fx);
    demo.git(&["checkout", "topic"]);
    let topic = demo.head();
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    assert_eq!(
        rebase::rebase(&repo, Some("master"), RebaseOperation::Begin).unwrap().result,
        RebaseStatus::Stopped
    );

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let aborted = rebase::rebase(&repo, None, RebaseOperation::Abort).unwrap();
    assert_eq!(aborted.result, RebaseStatus::Aborted);
    assert_eq!(demo.head(), topic);
    assert_eq!(demo.read("f.txt"), "topic\n");
}

#[test]
fn rebase_steps_without_a_rebase_are_refused() {
    let fx = Fixture::new();
    fx.repo("demo");
    let gateway = fx.gateway();

    for operation in [RebaseOperation::Continue, RebaseOperation::Skip, RebaseOperation::Abort] {
        let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
        let outcome = rebase::rebase(&repo, None, operation).unwrap();
        assert_eq!(outcome.result, RebaseStatus::FailedWrongRepositoryState);
    }
}

#[test]
fn rebase_skip_drops_the_stopped_commit() {
    let fx = Fixture::new();
    let demo = diverged(&fx);
    let master = demo.rev_parse("master");
    demo.git(&["checkout", "topic"]);
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let begun = rebase::rebase(&repo, Some("master"), RebaseOperation::Begin).unwrap();
    assert_eq!(begun.result, RebaseStatus::Stopped);

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let skipped = rebase::rebase(&repo, None, RebaseOperation::Skip).unwrap();
    assert_eq!(skipped.result, RebaseStatus::Ok);
    assert_eq!(demo.head(), master);
    assert_eq!(demo.read("f.txt"), "master\n");
    assert!(head_status(&gateway).is_clean());
}

#[test]
fn rebase_of_a_branch_behind_upstream_fast_forwards() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.git(&["branch", "behind"]);
    let ahead = demo.commit_file("a.txt", "a\n", "upstream work");
    demo.git(&["checkout", "behind"]);
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let outcome = rebase::rebase(&repo, Some("master"), RebaseOperation::Begin).unwrap();
    assert_eq!(outcome.result, RebaseStatus::FastForward);
    assert_eq!(demo.head(), ahead);
    assert_eq!(
        common::git_output(demo.path(), &["symbolic-ref", "HEAD"]),
        "refs/heads/behind"
    );
}

#[test]
fn concurrent_continues_apply_the_step_once() {
    let fx = Fixture::new();
    let demo = diverged(&fx);
    let master = demo.rev_parse("master");
    demo.git(&["checkout", "topic"]);
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let begun = rebase::rebase(&repo, Some("master"), RebaseOperation::Begin).unwrap();
    assert_eq!(begun.result, RebaseStatus::Stopped);
    demo.write("f.txt", "resolved\n");
    let (repo, file) = open(&gateway, "/gitapi/index/file/demo/f.txt");
    index::stage(&repo, &file).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let workers: Vec<_> = (0..2)
        .map(|_| {
            let root = fx.root().to_path_buf();
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                let gateway = Gateway::new(root, Config::default());
                let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
                barrier.wait();
                rebase::rebase(&repo, None, RebaseOperation::Continue).unwrap().result
            })
        })
        .collect();
    let mut results: Vec<RebaseStatus> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    results.sort_by_key(|r| format!("{r:?}"));

    assert_eq!(results, [RebaseStatus::FailedWrongRepositoryState, RebaseStatus::Ok]);
    assert_eq!(demo.rev_parse("HEAD~1"), master);
    assert_eq!(
        common::git_output(demo.path(), &["rev-list", "--count", &format!("{master}..HEAD")]),
        "1"
    );
}

#[test]
fn rebase_onto_an_ancestor_is_up_to_date() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    let base = demo.head();
    demo.commit_file("a.txt", "a\n", "ahead of base");
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let outcome = rebase::rebase(&repo, Some(&base), RebaseOperation::Begin).unwrap();
    assert_eq!(outcome.result, RebaseStatus::UpToDate);
}

// =============================================================================
// Cherry-pick
// =============================================================================

#[test]
fn cherry_pick_applies_a_commit_from_another_branch() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.git(&["checkout", "-b", "feature"]);
    demo.commit_file("skip.txt", "skip\n", "not wanted");
    demo.write("pick.txt", "pick\n");
    demo.git(&["add", "pick.txt"]);
    demo.git(&["commit", "-m", "wanted", "--author", "Picked Author <picked@example.com>"]);
    let wanted = demo.head();
    demo.git(&["checkout", "master"]);
    let before = demo.head();
    let gateway = fx.gateway();

    let (repo, head) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let action = post(json!({ "Cherry-Pick": wanted })).into_action().unwrap();
    let body = orchestrator::apply(&repo, &head, action).unwrap();
    assert_eq!(body["Result"], "OK");
    assert_eq!(body["HeadUpdated"], true);
    assert_eq!(body["Id"].as_str().unwrap(), demo.head());

    assert_eq!(demo.rev_parse("HEAD~1"), before);
    assert_eq!(demo.read("pick.txt"), "pick\n");
    assert!(!demo.exists("skip.txt"));
    assert_eq!(
        common::git_output(demo.path(), &["log", "-1", "--format=%an|%s"]),
        "Picked Author|wanted"
    );
    assert!(head_status(&gateway).is_clean());
}

#[test]
fn cherry_pick_of_a_change_already_on_head_leaves_head_alone() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    let picked = demo.commit_file("a.txt", "a\n", "add a");
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let outcome = cherry_pick::cherry_pick(&repo, &picked).unwrap();
    assert_eq!(outcome.result, CherryPickStatus::Ok);
    assert!(!outcome.head_updated);
    assert_eq!(demo.head(), picked);
}

#[test]
fn cherry_pick_stops_on_conflicts() {
    let fx = Fixture::new();
    let demo = diverged(&fx);
    let topic = demo.rev_parse("topic");
    let head = demo.head();
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let outcome = cherry_pick::cherry_pick(&repo, &topic).unwrap();
    assert_eq!(outcome.result, CherryPickStatus::Conflicting);
    assert_eq!(outcome.conflicting_paths, Some(vec!["f.txt".to_string()]));
    assert!(!outcome.head_updated);
    assert_eq!(demo.head(), head);
    assert!(demo.read("f.txt").starts_with("<<<<<<<"));
    assert_eq!(head_status(&gateway).state.wire_name(), "CHERRY_PICKING");
}

#[test]
fn cherry_pick_refuses_to_touch_dirty_paths() {
    let fx = Fixture::new();
    let demo = diverged(&fx);
    let topic = demo.rev_parse("topic");
    demo.write("f.txt", "uncommitted\n");
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let outcome = cherry_pick::cherry_pick(&repo, &topic).unwrap();
    assert_eq!(outcome.result, CherryPickStatus::Failed);
    assert!(outcome.failing_paths.unwrap().contains_key("f.txt"));
    assert_eq!(demo.read("f.txt"), "uncommitted\n");
}

// =============================================================================
// Revert
// =============================================================================

#[test]
fn revert_commits_the_inverse_change() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.commit_file("a.txt", "one\n", "one");
    let second = demo.commit_file("a.txt", "two\n", "two");
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let outcome = revert::revert(&repo, &second).unwrap();
    assert_eq!(outcome.result, RevertStatus::Ok);
    assert_eq!(outcome.id.unwrap().as_str(), demo.head());
    assert_eq!(demo.read("a.txt"), "one\n");
    assert_eq!(demo.rev_parse("HEAD~1"), second);
}

#[test]
fn revert_blocked_by_local_changes_leaves_everything_alone() {
    let fx = Fixture::new();
    let demo = fx.repo("demo");
    demo.commit_file("a.txt", "one\n", "one");
    let second = demo.commit_file("a.txt", "two\n", "two");
    demo.write("a.txt", "local\n");
    let gateway = fx.gateway();

    let (repo, _) = open(&gateway, "/gitapi/commit/HEAD/file/demo/");
    let outcome = revert::revert(&repo, &second).unwrap();
    assert_eq!(outcome.result, RevertStatus::Failure);
    assert_eq!(outcome.failing_paths, Some(vec!["a.txt".to_string()]));
    assert_eq!(demo.head(), second);
    assert_eq!(demo.read("a.txt"), "local\n");
}
