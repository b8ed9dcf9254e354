//! End-to-end pipeline runs against the in-memory GitHub.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{json, Value};

use gatekeeper::comments::{CommentTemplates, RuleId};
use gatekeeper::github::fakes::MemoryGitHub;
use gatekeeper::github::{ObjectRef, Reaction, RepoRef};
use gatekeeper::labels::Taxonomy;
use gatekeeper::status::{CheckCategory, CheckState};
use gatekeeper::{Orchestrator, PipelineReport, PipelineSettings, WebhookEvent};

const HEAD: &str = "1f2e3d4c";

fn repo() -> RepoRef {
    RepoRef::new("acme", "widgets")
}

fn pr_target() -> ObjectRef {
    ObjectRef::new(repo(), 12)
}

fn issue_target() -> ObjectRef {
    ObjectRef::new(repo(), 3)
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(ToString::to_string).collect()
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        auto_create_scopes: false,
        fail_oversized: false,
    }
}

fn orchestrator(github: &Arc<MemoryGitHub>, settings: PipelineSettings) -> Orchestrator {
    Orchestrator::new(
        github.clone(),
        Arc::new(Taxonomy::standard()),
        Arc::new(CommentTemplates::standard()),
        settings,
    )
}

fn repository() -> Value {
    json!({ "name": "widgets", "owner": { "login": "acme" } })
}

fn event(kind: &str, body: &Value) -> WebhookEvent {
    WebhookEvent::parse(kind, body.to_string().as_bytes()).unwrap()
}

struct PullRequest<'a> {
    action: &'a str,
    title: &'a str,
    sha: &'a str,
    additions: u64,
    deletions: u64,
    association: &'a str,
    author: &'a str,
}

impl Default for PullRequest<'_> {
    fn default() -> Self {
        Self {
            action: "opened",
            title: "fix(db): correct race",
            sha: HEAD,
            additions: 20,
            deletions: 5,
            association: "CONTRIBUTOR",
            author: "octocat",
        }
    }
}

impl PullRequest<'_> {
    fn event(&self) -> WebhookEvent {
        event(
            "pull_request",
            &json!({
                "action": self.action,
                "pull_request": {
                    "number": 12,
                    "title": self.title,
                    "head": { "sha": self.sha },
                    "additions": self.additions,
                    "deletions": self.deletions,
                    "author_association": self.association,
                    "user": { "login": self.author }
                },
                "repository": repository(),
                "sender": { "login": self.author }
            }),
        )
    }
}

fn issue_event(action: &str, title: &str, association: &str) -> WebhookEvent {
    event(
        "issues",
        &json!({
            "action": action,
            "issue": {
                "number": 3,
                "title": title,
                "author_association": association,
                "user": { "login": "octocat" }
            },
            "repository": repository()
        }),
    )
}

fn comment_event(comment_id: u64, login: &str, body: &str) -> WebhookEvent {
    event(
        "issue_comment",
        &json!({
            "action": "created",
            "comment": { "id": comment_id, "body": body, "user": { "login": login } },
            "issue": {
                "number": 3,
                "title": "[DB] slow queries",
                "author_association": "NONE",
                "user": { "login": "octocat" }
            },
            "repository": repository()
        }),
    )
}

fn status(github: &MemoryGitHub, sha: &str, category: CheckCategory) -> Option<CheckState> {
    github
        .latest_status(sha, category.context())
        .map(|update| update.state)
}

fn assert_checks(report: &PipelineReport, expected: &[(CheckCategory, CheckState)]) {
    for (category, state) in expected {
        assert_eq!(report.check(*category), Some(*state), "{category}");
    }
}

// ---------------------------------------------------------------------------
// Pull requests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_conventional_pr_is_fully_labeled_and_passes() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    github.set_commits(&pr_target(), &[("c1", "fix(db): correct race")]);

    let report = orchestrator(&github, settings())
        .handle(&PullRequest::default().event())
        .await
        .unwrap();

    let expected = set(&["Fix", "category/db", "size/XS", "Community"]);
    assert_eq!(github.issue_labels(&pr_target()), expected);
    assert_eq!(report.labels.added.iter().cloned().collect::<BTreeSet<_>>(), expected);
    assert!(report.labels.removed.is_empty());
    assert!(report.labels.failures.is_empty());

    for category in CheckCategory::ALL {
        assert_eq!(report.check(category), Some(CheckState::Success));
        assert_eq!(status(&github, HEAD, category), Some(CheckState::Success));
    }
    assert!(github.comments(&pr_target()).is_empty());
}

#[tokio::test]
async fn test_non_conventional_title_fails_with_one_comment() {
    let github = Arc::new(MemoryGitHub::new());
    github.set_commits(&pr_target(), &[("c1", "fix: correct race")]);

    let pr = PullRequest {
        title: "update stuff",
        ..PullRequest::default()
    };
    let report = orchestrator(&github, settings())
        .handle(&pr.event())
        .await
        .unwrap();

    assert_checks(
        &report,
        &[
            (CheckCategory::TitleFormat, CheckState::Failure),
            (CheckCategory::CommitFormat, CheckState::Success),
            (CheckCategory::SizeLimit, CheckState::Success),
        ],
    );
    let comments = github.comments(&pr_target());
    assert_eq!(comments.len(), 1);
    assert!(comments[0]
        .body
        .starts_with(&format!("<!-- botid: {} -->", RuleId::PrTitleInvalid.code())));
    assert!(comments[0].body.contains("update stuff"));
    // The valid commit still labels the PR
    assert_eq!(
        github.issue_labels(&pr_target()),
        set(&["Fix", "size/XS", "Community"])
    );
}

#[tokio::test]
async fn test_title_failure_is_never_promoted_to_success() {
    let github = Arc::new(MemoryGitHub::new());
    let pr = PullRequest {
        title: "update stuff",
        ..PullRequest::default()
    };
    orchestrator(&github, settings()).handle(&pr.event()).await;

    let pushed: Vec<CheckState> = github
        .statuses(HEAD)
        .into_iter()
        .filter(|update| update.context == CheckCategory::TitleFormat.context())
        .map(|update| update.state)
        .collect();
    assert_eq!(pushed, vec![CheckState::Pending, CheckState::Failure]);
}

#[tokio::test]
async fn test_unknown_type_is_a_title_failure() {
    let github = Arc::new(MemoryGitHub::new());
    let pr = PullRequest {
        title: "build: bump dependencies",
        ..PullRequest::default()
    };
    let report = orchestrator(&github, settings())
        .handle(&pr.event())
        .await
        .unwrap();

    assert_eq!(report.check(CheckCategory::TitleFormat), Some(CheckState::Failure));
    assert_eq!(github.comments(&pr_target()).len(), 1);
}

#[tokio::test]
async fn test_redelivery_converges_without_extra_writes() {
    let github = Arc::new(MemoryGitHub::new());
    let gatekeeper = orchestrator(&github, settings());
    let pr = PullRequest {
        title: "update stuff",
        ..PullRequest::default()
    };

    gatekeeper.handle(&pr.event()).await;
    let second = gatekeeper.handle(&pr.event()).await.unwrap();

    assert!(second.labels.added.is_empty());
    assert!(second.labels.removed.is_empty());
    assert_eq!(github.comments(&pr_target()).len(), 1);
    assert_eq!(github.edit_count(), 0);
}

#[tokio::test]
async fn test_fixing_the_title_retires_the_comment() {
    let github = Arc::new(MemoryGitHub::new());
    let gatekeeper = orchestrator(&github, settings());

    let broken = PullRequest {
        title: "update stuff",
        ..PullRequest::default()
    };
    gatekeeper.handle(&broken.event()).await;
    assert_eq!(github.comments(&pr_target()).len(), 1);

    let fixed = PullRequest {
        action: "edited",
        title: "chore: update stuff",
        ..PullRequest::default()
    };
    let report = gatekeeper.handle(&fixed.event()).await.unwrap();

    assert!(github.comments(&pr_target()).is_empty());
    assert_eq!(report.check(CheckCategory::TitleFormat), Some(CheckState::Success));
    assert!(github.issue_labels(&pr_target()).contains("Chore"));
}

#[tokio::test]
async fn test_title_edit_refreshes_the_existing_comment() {
    let github = Arc::new(MemoryGitHub::new());
    let gatekeeper = orchestrator(&github, settings());

    gatekeeper
        .handle(
            &PullRequest {
                title: "update stuff",
                ..PullRequest::default()
            }
            .event(),
        )
        .await;
    gatekeeper
        .handle(
            &PullRequest {
                action: "edited",
                title: "update more stuff",
                ..PullRequest::default()
            }
            .event(),
        )
        .await;

    let comments = github.comments(&pr_target());
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body.contains("update more stuff"));
    assert_eq!(github.edit_count(), 1);
}

#[tokio::test]
async fn test_missing_scope_label_is_requested_then_resolved() {
    let github = Arc::new(MemoryGitHub::new());
    let gatekeeper = orchestrator(&github, settings());
    let pr = PullRequest::default();

    let report = gatekeeper.handle(&pr.event()).await.unwrap();
    assert_eq!(report.check(CheckCategory::Labeler), Some(CheckState::Failure));
    assert!(!github.issue_labels(&pr_target()).contains("category/db"));
    assert!(!github.has_label_definition(&repo(), "category/db"));
    let comments = github.comments(&pr_target());
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body.contains("<!-- bot_label: category/db -->"));
    assert!(comments[0].body.contains("`/label:add db`"));

    github.define_label(&repo(), "category/db");
    let report = gatekeeper.handle(&pr.event()).await.unwrap();
    assert_eq!(report.check(CheckCategory::Labeler), Some(CheckState::Success));
    assert!(github.issue_labels(&pr_target()).contains("category/db"));
    assert!(github.comments(&pr_target()).is_empty());
}

#[tokio::test]
async fn test_scope_change_retires_the_old_label_comment() {
    let github = Arc::new(MemoryGitHub::new());
    let gatekeeper = orchestrator(&github, settings());

    gatekeeper.handle(&PullRequest::default().event()).await;
    gatekeeper
        .handle(
            &PullRequest {
                action: "edited",
                title: "fix(api): correct race",
                ..PullRequest::default()
            }
            .event(),
        )
        .await;

    let comments = github.comments(&pr_target());
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body.contains("category/api"));
}

#[tokio::test]
async fn test_scopes_are_created_when_configured() {
    let github = Arc::new(MemoryGitHub::new());
    let settings = PipelineSettings {
        auto_create_scopes: true,
        ..settings()
    };

    let report = orchestrator(&github, settings)
        .handle(&PullRequest::default().event())
        .await
        .unwrap();

    assert_eq!(report.check(CheckCategory::Labeler), Some(CheckState::Success));
    assert!(github.issue_labels(&pr_target()).contains("category/db"));
    assert_eq!(
        github
            .label_definition(&repo(), "category/db")
            .map(|label| label.color),
        Some("bfd4f2".to_string())
    );
    assert!(github.comments(&pr_target()).is_empty());
}

#[tokio::test]
async fn test_breaking_change_gets_its_label() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/api");
    let pr = PullRequest {
        title: "feat(api)!: drop v1 endpoints",
        association: "MEMBER",
        ..PullRequest::default()
    };

    orchestrator(&github, settings()).handle(&pr.event()).await;

    assert_eq!(
        github.issue_labels(&pr_target()),
        set(&["Feature", "category/api", "BreakingChange", "size/XS"])
    );
}

#[tokio::test]
async fn test_stale_labels_are_removed() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    github.attach_label(&pr_target(), "size/XL");
    github.attach_label(&pr_target(), "Feature");

    let report = orchestrator(&github, settings())
        .handle(&PullRequest::default().event())
        .await
        .unwrap();

    assert_eq!(
        report.labels.removed.iter().cloned().collect::<BTreeSet<_>>(),
        set(&["size/XL", "Feature"])
    );
    assert_eq!(
        github.issue_labels(&pr_target()),
        set(&["Fix", "category/db", "size/XS", "Community"])
    );
}

#[tokio::test]
async fn test_invalid_commits_get_one_comment_each() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    github.set_commits(
        &pr_target(),
        &[
            ("a1", "wip"),
            ("a2", "fix(db): correct race"),
            ("a3", "more wip\n\nlong explanation"),
        ],
    );

    let report = orchestrator(&github, settings())
        .handle(&PullRequest::default().event())
        .await
        .unwrap();

    assert_eq!(report.check(CheckCategory::CommitFormat), Some(CheckState::Failure));
    assert_eq!(report.check(CheckCategory::TitleFormat), Some(CheckState::Success));
    let comments = github.comments(&pr_target());
    assert_eq!(comments.len(), 2);
    assert!(comments.iter().any(|c| c.body.contains("<!-- commit_id: a1 -->")));
    assert!(comments.iter().any(|c| c.body.contains("<!-- commit_id: a3 -->")));
    assert!(!comments.iter().any(|c| c.body.contains("long explanation")));
}

#[tokio::test]
async fn test_force_push_retires_comments_for_rewritten_commits() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    let gatekeeper = orchestrator(&github, settings());

    github.set_commits(&pr_target(), &[("a1", "wip"), ("a2", "fix: thing")]);
    gatekeeper.handle(&PullRequest::default().event()).await;
    assert_eq!(github.comments(&pr_target()).len(), 1);

    github.set_commits(&pr_target(), &[("b1", "fix(db): correct race")]);
    let pushed = PullRequest {
        action: "synchronize",
        sha: "b1",
        ..PullRequest::default()
    };
    let report = gatekeeper.handle(&pushed.event()).await.unwrap();

    assert!(github.comments(&pr_target()).is_empty());
    assert_eq!(report.check(CheckCategory::CommitFormat), Some(CheckState::Success));
    assert_eq!(status(&github, "b1", CheckCategory::CommitFormat), Some(CheckState::Success));
}

#[tokio::test]
async fn test_commits_contribute_type_breaking_and_scope_labels() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    github.set_commits(
        &pr_target(),
        &[
            ("c1", "feat: add x"),
            ("c2", "fix(db)!: correct race"),
            ("c3", "docs(ui): readme"),
        ],
    );
    let pr = PullRequest {
        title: "feat: add x",
        ..PullRequest::default()
    };

    let report = orchestrator(&github, settings())
        .handle(&pr.event())
        .await
        .unwrap();

    assert_eq!(
        github.issue_labels(&pr_target()),
        set(&[
            "Feature",
            "Fix",
            "Docs",
            "BreakingChange",
            "category/db",
            "size/XS",
            "Community"
        ])
    );
    assert_checks(
        &report,
        &[
            (CheckCategory::TitleFormat, CheckState::Success),
            (CheckCategory::CommitFormat, CheckState::Success),
            (CheckCategory::Labeler, CheckState::Failure),
        ],
    );
    let comments = github.comments(&pr_target());
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body.contains("<!-- bot_label: category/ui -->"));
}

#[tokio::test]
async fn test_commit_scope_comment_is_retired_once_the_label_exists() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    github.set_commits(
        &pr_target(),
        &[("c1", "fix(db): correct race"), ("c2", "docs(ui): readme")],
    );
    let gatekeeper = orchestrator(&github, settings());
    let pr = PullRequest::default();

    gatekeeper.handle(&pr.event()).await;
    assert_eq!(github.comments(&pr_target()).len(), 1);
    assert!(!github.issue_labels(&pr_target()).contains("category/ui"));

    github.define_label(&repo(), "category/ui");
    let report = gatekeeper.handle(&pr.event()).await.unwrap();

    assert!(github.comments(&pr_target()).is_empty());
    assert_eq!(report.check(CheckCategory::Labeler), Some(CheckState::Success));
    assert!(github.issue_labels(&pr_target()).contains("category/ui"));
    assert!(github.issue_labels(&pr_target()).contains("Docs"));
}

#[tokio::test]
async fn test_commit_scope_comment_survives_a_failed_commit_listing() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    github.set_commits(&pr_target(), &[("c1", "docs(ui): readme")]);
    let gatekeeper = orchestrator(&github, settings());

    gatekeeper.handle(&PullRequest::default().event()).await;
    assert_eq!(github.comments(&pr_target()).len(), 1);

    github.fail_commit_listing();
    gatekeeper.handle(&PullRequest::default().event()).await;

    let comments = github.comments(&pr_target());
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body.contains("<!-- bot_label: category/ui -->"));
}

#[tokio::test]
async fn test_commit_listing_failure_is_an_error() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    github.fail_commit_listing();

    let report = orchestrator(&github, settings())
        .handle(&PullRequest::default().event())
        .await
        .unwrap();

    assert_checks(
        &report,
        &[
            (CheckCategory::CommitFormat, CheckState::Error),
            (CheckCategory::TitleFormat, CheckState::Success),
            (CheckCategory::Labeler, CheckState::Success),
        ],
    );
    assert!(github.issue_labels(&pr_target()).contains("Fix"));
}

#[tokio::test]
async fn test_oversized_pr_is_advisory_by_default() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    let pr = PullRequest {
        additions: 600,
        deletions: 500,
        ..PullRequest::default()
    };

    let report = orchestrator(&github, settings())
        .handle(&pr.event())
        .await
        .unwrap();

    assert_eq!(report.check(CheckCategory::SizeLimit), Some(CheckState::Success));
    assert!(github.issue_labels(&pr_target()).contains("size/XL"));
    let comments = github.comments(&pr_target());
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body.contains("1000 lines"));

    // Shrinking the PR retires the comment
    let smaller = PullRequest {
        action: "synchronize",
        additions: 80,
        deletions: 10,
        ..PullRequest::default()
    };
    orchestrator(&github, settings()).handle(&smaller.event()).await;
    assert!(github.comments(&pr_target()).is_empty());
    assert!(github.issue_labels(&pr_target()).contains("size/S"));
}

#[tokio::test]
async fn test_oversized_pr_fails_when_configured() {
    let github = Arc::new(MemoryGitHub::new());
    let settings = PipelineSettings {
        fail_oversized: true,
        ..settings()
    };
    let pr = PullRequest {
        additions: 600,
        deletions: 500,
        ..PullRequest::default()
    };

    let report = orchestrator(&github, settings)
        .handle(&pr.event())
        .await
        .unwrap();

    assert_eq!(report.check(CheckCategory::SizeLimit), Some(CheckState::Failure));
}

#[tokio::test]
async fn test_size_label_failure_is_a_size_error() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    github.fail_label_add("size/XS");

    let report = orchestrator(&github, settings())
        .handle(&PullRequest::default().event())
        .await
        .unwrap();

    assert_eq!(report.check(CheckCategory::SizeLimit), Some(CheckState::Error));
    assert_eq!(report.check(CheckCategory::Labeler), Some(CheckState::Success));
    assert_eq!(report.labels.failures.len(), 1);
    // The rest of the batch still went through
    assert_eq!(
        github.issue_labels(&pr_target()),
        set(&["Fix", "category/db", "Community"])
    );
}

#[tokio::test]
async fn test_stale_size_label_removal_failure_is_a_size_error() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    github.attach_label(&pr_target(), "size/XL");
    github.attach_label(&pr_target(), "wontfix");
    github.fail_label_remove("size/XL");

    let report = orchestrator(&github, settings())
        .handle(&PullRequest::default().event())
        .await
        .unwrap();

    assert_checks(
        &report,
        &[
            (CheckCategory::SizeLimit, CheckState::Error),
            (CheckCategory::Labeler, CheckState::Success),
        ],
    );
    assert_eq!(report.labels.removed, vec!["wontfix".to_string()]);
    assert_eq!(
        github.issue_labels(&pr_target()),
        set(&["Fix", "category/db", "size/XS", "size/XL", "Community"])
    );
}

#[tokio::test]
async fn test_type_label_failure_fails_the_labeler() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    github.fail_label_add("Fix");

    let report = orchestrator(&github, settings())
        .handle(&PullRequest::default().event())
        .await
        .unwrap();

    assert_eq!(report.check(CheckCategory::Labeler), Some(CheckState::Failure));
    assert_eq!(report.check(CheckCategory::SizeLimit), Some(CheckState::Success));
}

#[tokio::test]
async fn test_live_label_fetch_failure_is_a_labeler_error() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    github.fail_label_listing();

    let report = orchestrator(&github, settings())
        .handle(&PullRequest::default().event())
        .await
        .unwrap();

    assert_eq!(report.check(CheckCategory::Labeler), Some(CheckState::Error));
    assert_eq!(report.check(CheckCategory::TitleFormat), Some(CheckState::Success));
}

#[tokio::test]
async fn test_status_push_failures_do_not_stop_the_run() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    github.fail_statuses();

    let report = orchestrator(&github, settings())
        .handle(&PullRequest::default().event())
        .await
        .unwrap();

    assert!(github.statuses(HEAD).is_empty());
    assert_eq!(report.check(CheckCategory::TitleFormat), Some(CheckState::Success));
    assert!(github.issue_labels(&pr_target()).contains("Fix"));
}

#[tokio::test]
async fn test_bot_authors_and_other_actions_are_ignored() {
    let github = Arc::new(MemoryGitHub::new());
    let gatekeeper = orchestrator(&github, settings());

    let by_bot = PullRequest {
        author: "renovate[bot]",
        ..PullRequest::default()
    };
    assert!(gatekeeper.handle(&by_bot.event()).await.is_none());

    let closed = PullRequest {
        action: "closed",
        ..PullRequest::default()
    };
    assert!(gatekeeper.handle(&closed.event()).await.is_none());

    assert!(github.statuses(HEAD).is_empty());
    assert!(github.issue_labels(&pr_target()).is_empty());
}

#[tokio::test]
async fn test_non_community_authors_get_no_community_label() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    let pr = PullRequest {
        association: "OWNER",
        ..PullRequest::default()
    };

    orchestrator(&github, settings()).handle(&pr.event()).await;

    assert!(!github.issue_labels(&pr_target()).contains("Community"));
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_conventional_issue_is_labeled_without_statuses() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    github.attach_label(&issue_target(), "triage");

    let report = orchestrator(&github, settings())
        .handle(&issue_event("opened", "[DB] slow queries", "NONE"))
        .await
        .unwrap();

    assert_eq!(
        github.issue_labels(&issue_target()),
        set(&["category/db", "Community"])
    );
    assert!(report.checks.is_empty());
    assert!(github.comments(&issue_target()).is_empty());
}

#[tokio::test]
async fn test_issue_sub_scope_is_lowercased() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/api/auth");

    orchestrator(&github, settings())
        .handle(&issue_event("opened", "[API/AUTH] token refresh", "MEMBER"))
        .await;

    assert_eq!(github.issue_labels(&issue_target()), set(&["category/api/auth"]));
}

#[tokio::test]
async fn test_invalid_issue_title_is_reported_then_retired() {
    let github = Arc::new(MemoryGitHub::new());
    github.define_label(&repo(), "category/db");
    let gatekeeper = orchestrator(&github, settings());

    gatekeeper
        .handle(&issue_event("opened", "queries are slow", "MEMBER"))
        .await;
    let comments = github.comments(&issue_target());
    assert_eq!(comments.len(), 1);
    assert!(comments[0]
        .body
        .starts_with(&format!("<!-- botid: {} -->", RuleId::IssueTitleInvalid.code())));
    assert!(comments[0].body.contains("`queries are slow`"));

    gatekeeper
        .handle(&issue_event("edited", "[DB] queries are slow", "MEMBER"))
        .await;
    assert!(github.comments(&issue_target()).is_empty());
}

#[tokio::test]
async fn test_labeling_an_issue_retires_the_missing_label_comment() {
    let github = Arc::new(MemoryGitHub::new());
    let gatekeeper = orchestrator(&github, settings());

    gatekeeper
        .handle(&issue_event("opened", "[DB] slow queries", "MEMBER"))
        .await;
    assert_eq!(github.comments(&issue_target()).len(), 1);

    let labeled = event(
        "issues",
        &json!({
            "action": "labeled",
            "issue": {
                "number": 3,
                "title": "[DB] slow queries",
                "author_association": "MEMBER",
                "user": { "login": "octocat" }
            },
            "label": { "name": "category/db", "color": "bfd4f2" },
            "repository": repository()
        }),
    );
    gatekeeper.handle(&labeled).await;

    assert!(github.comments(&issue_target()).is_empty());
}

#[tokio::test]
async fn test_issue_events_for_pull_requests_are_ignored() {
    let github = Arc::new(MemoryGitHub::new());
    let pr_issue = event(
        "issues",
        &json!({
            "action": "opened",
            "issue": {
                "number": 3,
                "title": "not conventional",
                "author_association": "NONE",
                "user": { "login": "octocat" },
                "pull_request": { "url": "https://api.github.com/repos/acme/widgets/pulls/3" }
            },
            "repository": repository()
        }),
    );

    assert!(orchestrator(&github, settings()).handle(&pr_issue).await.is_none());
    assert!(github.comments(&issue_target()).is_empty());
}

// ---------------------------------------------------------------------------
// Slash commands
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_member_can_create_a_scope_label() {
    let github = Arc::new(MemoryGitHub::new());
    github.add_member("maintainer");
    let gatekeeper = orchestrator(&github, settings());

    gatekeeper
        .handle(&issue_event("opened", "[DB] slow queries", "NONE"))
        .await;
    assert_eq!(github.comments(&issue_target()).len(), 1);

    let comment_id = github.insert_comment(&issue_target(), "maintainer", "/label:add db");
    let report = gatekeeper
        .handle(&comment_event(comment_id, "maintainer", "/label:add db"))
        .await
        .unwrap();

    assert_eq!(report.reaction, Some(Reaction::PlusOne));
    assert_eq!(github.reactions(comment_id), vec![Reaction::PlusOne]);
    assert!(github.issue_labels(&issue_target()).contains("category/db"));
    assert_eq!(
        github
            .label_definition(&repo(), "category/db")
            .map(|label| label.color),
        Some("bfd4f2".to_string())
    );
    // Only the maintainer's command is left
    let comments = github.comments(&issue_target());
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].id, comment_id);
}

#[tokio::test]
async fn test_member_can_remove_a_scope_label() {
    let github = Arc::new(MemoryGitHub::new());
    github.add_member("maintainer");
    github.attach_label(&issue_target(), "category/db");

    let report = orchestrator(&github, settings())
        .handle(&comment_event(41, "maintainer", "/label:remove db"))
        .await
        .unwrap();

    assert_eq!(report.reaction, Some(Reaction::PlusOne));
    assert!(github.issue_labels(&issue_target()).is_empty());
}

#[tokio::test]
async fn test_failed_command_reacts_thumbs_down() {
    let github = Arc::new(MemoryGitHub::new());
    github.add_member("maintainer");
    github.fail_label_add("category/db");

    let report = orchestrator(&github, settings())
        .handle(&comment_event(42, "maintainer", "/label:add db"))
        .await
        .unwrap();

    assert_eq!(report.reaction, Some(Reaction::MinusOne));
    assert_eq!(github.reactions(42), vec![Reaction::MinusOne]);
}

#[tokio::test]
async fn test_non_members_and_plain_comments_are_ignored() {
    let github = Arc::new(MemoryGitHub::new());
    let gatekeeper = orchestrator(&github, settings());

    assert!(gatekeeper
        .handle(&comment_event(43, "stranger", "/label:add db"))
        .await
        .is_none());
    assert!(gatekeeper
        .handle(&comment_event(44, "stranger", "thanks!"))
        .await
        .is_none());

    github.add_member("maintainer");
    github.fail_membership();
    assert!(gatekeeper
        .handle(&comment_event(45, "maintainer", "/label:add db"))
        .await
        .is_none());

    assert!(github.reactions(43).is_empty());
    assert!(!github.has_label_definition(&repo(), "category/db"));
}
