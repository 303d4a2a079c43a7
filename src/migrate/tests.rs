use std::path::Path;

use serde_json::json;

use super::*;
use crate::error::MigrationError;
use crate::model::board::fixtures::BOARD;
use crate::providers::tests::FakeTarget;
use crate::query::test_support::indexes;

fn routes() -> Routes {
    Routes::new("acme", "roadmap", 7)
}

async fn migrate(board: &Board, target: &FakeTarget, ledger: &mut Ledger, stages: &[Stage]) -> Result<()> {
    let ix = indexes(board);
    let mut migrator = Migrator::new(board, &ix, target, routes(), ledger);
    migrator.run(stages).await
}

fn open_ledger(dir: &Path) -> Ledger {
    Ledger::open(&dir.join("progress.json"), false).unwrap()
}

#[tokio::test]
async fn migrates_a_board_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let board = Board::from_json(BOARD).unwrap();
    let target = FakeTarget::new();
    let mut ledger = open_ledger(dir.path());

    migrate(&board, &target, &mut ledger, &Stage::ALL).await.unwrap();

    let columns = target.calls_to("POST", "/projects/7/columns");
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].payload, Some(json!({"name": "Todo"})));
    assert_eq!(columns[1].payload, Some(json!({"name": "Done"})));

    let labels = target.calls_to("POST", "/labels");
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].payload, Some(json!({"name": "Bug", "color": "DC143C"})));

    let issues = target.calls_to("POST", "/repos/acme/roadmap/issues");
    let issues: Vec<_> = issues.iter().filter(|c| c.resource.ends_with("/issues")).collect();
    assert_eq!(issues.len(), 1);
    let issue = issues[0].payload.as_ref().unwrap();
    assert_eq!(issue["title"], "Fix login");
    assert_eq!(issue["labels"], json!(["Bug"]));
    assert_eq!(issue["assignees"], json!(["alicedev"]));
    let body = issue["body"].as_str().unwrap();
    assert!(body.starts_with("> Migrated from [Trello Card 42]"));
    assert!(body.contains("- [x] first"));
    assert!(body.contains(
        "![shot.png](https://raw.githubusercontent.com/acme/roadmap/abc123/.github/trello-attachments/"
    ));

    assert_eq!(ledger.source_ids(LISTS).len(), 2);
    assert_eq!(ledger.source_ids(LABELS).len(), 1);
    assert_eq!(ledger.source_ids(CARDS).len(), 1);
    assert_eq!(ledger.github_id(CARD_NUMBERS, "c1"), Some(1));

    let updates = target.calls_to("PATCH", "/repos/acme/roadmap/issues/1");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].payload.as_ref().unwrap()["state"], "open");

    let comments = target.calls_to("POST", "/issues/1/comments");
    assert_eq!(comments.len(), 1);
    let comment = comments[0].payload.as_ref().unwrap()["body"].as_str().unwrap().to_string();
    assert!(comment.starts_with("> Migrated comment original author: @alicedev"));
    assert!(comment.ends_with("see #1"));

    let todo_column = ledger.github_id(LISTS, "l1").unwrap();
    let issue_id = ledger.github_id(CARDS, "c1").unwrap();
    let project_cards = target.calls_to("POST", &format!("/projects/columns/{todo_column}/cards"));
    assert_eq!(project_cards.len(), 1);
    assert_eq!(
        project_cards[0].payload,
        Some(json!({"content_id": issue_id, "content_type": "Issue"}))
    );

    // the card is open, so nothing is archived
    assert!(target.calls_to("PATCH", "/projects/columns/cards/").is_empty());
}

#[tokio::test]
async fn rerun_after_success_makes_no_calls() {
    let dir = tempfile::tempdir().unwrap();
    let board = Board::from_json(BOARD).unwrap();
    let target = FakeTarget::new();
    let mut ledger = open_ledger(dir.path());
    migrate(&board, &target, &mut ledger, &Stage::ALL).await.unwrap();
    let before = target.calls().len();

    let mut reopened = open_ledger(dir.path());
    migrate(&board, &target, &mut reopened, &Stage::ALL).await.unwrap();

    assert_eq!(target.calls().len(), before);
    assert_eq!(reopened.len(), ledger.len());
}

#[tokio::test]
async fn failure_stops_the_run_and_resume_skips_done_work() {
    let dir = tempfile::tempdir().unwrap();
    let board = Board::from_json(BOARD).unwrap();
    let target = FakeTarget::new().with_failure("/labels", 422);
    let mut ledger = open_ledger(dir.path());

    let err = migrate(&board, &target, &mut ledger, &Stage::ALL).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MigrationError>(),
        Some(MigrationError::RemoteCreate { status: 422, .. })
    ));
    assert!(err.to_string().contains("stage labels failed"));
    assert!(target.calls_to("POST", "/issues").is_empty());

    // what finished before the failure is on disk
    let on_disk = open_ledger(dir.path());
    assert_eq!(on_disk.source_ids(LISTS).len(), 2);
    assert!(on_disk.source_ids(LABELS).is_empty());

    target.clear_failures();
    let mut resumed = open_ledger(dir.path());
    migrate(&board, &target, &mut resumed, &Stage::ALL).await.unwrap();

    assert_eq!(target.calls_to("POST", "/projects/7/columns").len(), 2);
    assert_eq!(resumed.source_ids(LABELS), vec!["lab1"]);
    assert_eq!(resumed.source_ids(PROJECT_CARDS), vec!["c1"]);
}

#[tokio::test]
async fn later_stage_without_its_dependencies_fails() {
    let dir = tempfile::tempdir().unwrap();
    let board = Board::from_json(BOARD).unwrap();
    let target = FakeTarget::new();
    let mut ledger = open_ledger(dir.path());

    let err = migrate(&board, &target, &mut ledger, &[Stage::CardBodies])
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MigrationError>(),
        Some(MigrationError::ReferenceResolution { .. })
    ));
    assert!(target.calls().is_empty());
}

#[tokio::test]
async fn pass_two_stages_wait_for_every_issue_number() {
    let dir = tempfile::tempdir().unwrap();
    let mut board = Board::from_json(BOARD).unwrap();
    board.cards[0].desc = "blocked by #43".into();
    let mut other = board.cards[0].clone();
    other.id = "c2".into();
    other.id_short = 43;
    other.short_link = "efgh5678".into();
    other.short_url = "https://trello.com/c/efgh5678".into();
    other.desc.clear();
    board.cards.push(other);
    let target = FakeTarget::new();
    let mut ledger = open_ledger(dir.path());
    ledger.mark_done(CARDS, "c1", 500).unwrap();
    ledger.mark_done(CARD_NUMBERS, "c1", 1).unwrap();

    for stage in [Stage::CardBodies, Stage::Comments] {
        let err = migrate(&board, &target, &mut ledger, &[stage]).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MigrationError>(),
            Some(MigrationError::ReferenceResolution { source_id, .. }) if source_id == "c2"
        ));
    }
    assert!(target.calls().is_empty());
    assert!(!ledger.is_done(CARD_STATE, "c1"));
    assert!(ledger.source_ids(COMMENTS).is_empty());

    ledger.mark_done(CARDS, "c2", 501).unwrap();
    ledger.mark_done(CARD_NUMBERS, "c2", 2).unwrap();
    migrate(&board, &target, &mut ledger, &[Stage::CardBodies]).await.unwrap();

    let update = &target.calls_to("PATCH", "/repos/acme/roadmap/issues/1")[0];
    let body = update.payload.as_ref().unwrap()["body"].as_str().unwrap();
    assert!(body.contains("blocked by #2"));
}

#[tokio::test]
async fn closed_cards_are_closed_and_archived() {
    let dir = tempfile::tempdir().unwrap();
    let mut board = Board::from_json(BOARD).unwrap();
    board.cards[0].closed = true;
    let target = FakeTarget::new();
    let mut ledger = open_ledger(dir.path());

    migrate(&board, &target, &mut ledger, &Stage::ALL).await.unwrap();

    let update = &target.calls_to("PATCH", "/repos/acme/roadmap/issues/1")[0];
    assert_eq!(update.payload.as_ref().unwrap()["state"], "closed");

    let project_card = ledger.github_id(PROJECT_CARDS, "c1").unwrap();
    let archived = target.calls_to("PATCH", &format!("/projects/columns/cards/{project_card}"));
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].payload, Some(json!({"archived": true})));
    assert!(ledger.is_done(PROJECT_CARD_STATE, "c1"));
}

#[tokio::test]
async fn project_cards_are_added_bottom_up() {
    let dir = tempfile::tempdir().unwrap();
    let mut board = Board::from_json(BOARD).unwrap();
    let mut top = board.cards[0].clone();
    top.id = "c2".into();
    top.id_short = 43;
    top.short_link = "efgh5678".into();
    top.short_url = "https://trello.com/c/efgh5678".into();
    top.pos = 100.0;
    board.cards.push(top);
    let target = FakeTarget::new();
    let mut ledger = open_ledger(dir.path());

    migrate(&board, &target, &mut ledger, &Stage::ALL).await.unwrap();

    let column = ledger.github_id(LISTS, "l1").unwrap();
    let added: Vec<u64> = target
        .calls_to("POST", &format!("/projects/columns/{column}/cards"))
        .iter()
        .map(|c| c.payload.as_ref().unwrap()["content_id"].as_u64().unwrap())
        .collect();
    assert_eq!(
        added,
        vec![
            ledger.github_id(CARDS, "c1").unwrap(),
            ledger.github_id(CARDS, "c2").unwrap(),
        ]
    );
    // issues are created in card number order
    assert_eq!(ledger.github_id(CARD_NUMBERS, "c1"), Some(1));
    assert_eq!(ledger.github_id(CARD_NUMBERS, "c2"), Some(2));
}

#[tokio::test]
async fn unmapped_comment_author_aborts_comments_stage() {
    let dir = tempfile::tempdir().unwrap();
    let json = BOARD.replace("\"idMemberCreator\": \"m1\"", "\"idMemberCreator\": \"m2\"");
    let board = Board::from_json(&json).unwrap();
    let target = FakeTarget::new();
    let mut ledger = open_ledger(dir.path());

    let err = migrate(&board, &target, &mut ledger, &Stage::ALL).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MigrationError>(),
        Some(MigrationError::UnmappedAuthor(_))
    ));
    assert!(ledger.is_done(CARD_STATE, "c1"));
    assert!(ledger.source_ids(COMMENTS).is_empty());
}

#[test]
fn label_colours_map_to_palette() {
    assert_eq!(label_color(Some("red"), "ededed"), "DC143C");
    assert_eq!(label_color(Some("sky"), "ededed"), "AFEEEE");
    assert_eq!(label_color(Some("mauve"), "ededed"), "ededed");
    assert_eq!(label_color(None, "cccccc"), "cccccc");
}

#[test]
fn stage_names_round_trip() {
    for stage in Stage::ALL {
        assert_eq!(Stage::parse(stage.as_str()), Some(stage));
    }
    assert_eq!(Stage::parse("card-bodies"), Some(Stage::CardBodies));
    assert_eq!(Stage::parse("everything"), None);
}

#[test]
fn stats_count_the_board() {
    let board = Board::from_json(BOARD).unwrap();
    let ix = indexes(&board);
    let stats = Stats::collect(&board, &ix);
    assert_eq!(
        stats,
        Stats {
            lists: 2,
            labels: 1,
            cards: 1,
            cards_with_attachments: 1,
            cards_linking_cards: 0,
            checklists: 1,
            members: 2,
            mapped_members: 1,
            comments: 1,
        }
    );
}
