use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use board_block::{BoardOrchestrator, Effects, Settings};
use taskboard_atoms::activity::{ActivityAction, ActivityEntry, ActivityLogger, StoreActivityLog};
use taskboard_atoms::boards::CreateBoardPayload;
use taskboard_atoms::lists::{CreateListPayload, TaskList};
use taskboard_atoms::members::{Role, UpdateRolePayload};
use taskboard_atoms::realtime::{Broadcaster, LocalBroadcaster};
use taskboard_atoms::store::{BoardStore, MemoryStore};
use taskboard_atoms::tasks::{CreateTaskPayload, MoveTaskPayload, Task};
use taskboard_atoms::users::User;
use taskboard_atoms::{BoardError, Result};

struct Harness {
    store: Arc<MemoryStore>,
    broadcaster: Arc<LocalBroadcaster>,
    orchestrator: BoardOrchestrator,
}

async fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    for id in ["alice", "bob", "carol"] {
        store
            .insert_user(User {
                id: id.to_string(),
                name: id.to_string(),
                email: format!("{}@example.com", id),
            })
            .await;
    }
    let broadcaster = Arc::new(LocalBroadcaster::new());
    let dyn_store: Arc<dyn BoardStore> = store.clone();
    let effects = Effects::new(Arc::new(StoreActivityLog::new(dyn_store.clone())), broadcaster.clone());
    let orchestrator = BoardOrchestrator::new(dyn_store, effects, Settings::default());
    Harness {
        store,
        broadcaster,
        orchestrator,
    }
}

struct FailingLogger;

#[async_trait]
impl ActivityLogger for FailingLogger {
    async fn append(&self, _: ActivityAction, _: &str, _: &str, _: Value) -> Result<ActivityEntry> {
        Err(BoardError::failed("activity sink unavailable"))
    }
}

struct FailingBroadcaster;

#[async_trait]
impl Broadcaster for FailingBroadcaster {
    async fn publish(&self, _: &str, _: &str, _: &Value) -> Result<()> {
        Err(BoardError::failed("socket endpoint unavailable"))
    }
}

#[derive(Default)]
struct RevocationRecorder {
    revoked: std::sync::Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Broadcaster for RevocationRecorder {
    async fn publish(&self, _: &str, _: &str, _: &Value) -> Result<()> {
        Ok(())
    }

    async fn revoke(&self, channel: &str, user_id: &str) -> Result<()> {
        self.revoked
            .lock()
            .unwrap()
            .push((channel.to_string(), user_id.to_string()));
        Ok(())
    }
}

impl Harness {
    async fn board(&self) -> String {
        self.orchestrator
            .create_board("alice", CreateBoardPayload { title: "Launch".into() })
            .await
            .unwrap()
            .board
            .id
    }

    async fn list(&self, board_id: &str, title: &str) -> TaskList {
        self.orchestrator
            .create_list(
                "alice",
                CreateListPayload {
                    title: title.into(),
                    board_id: board_id.into(),
                },
            )
            .await
            .unwrap()
    }

    async fn task(&self, list_id: &str, title: &str) -> Task {
        self.orchestrator
            .create_task(
                "alice",
                CreateTaskPayload {
                    title: title.into(),
                    description: None,
                    due_date: None,
                    list_id: list_id.into(),
                },
            )
            .await
            .unwrap()
    }

    async fn positions(&self, list_id: &str) -> Vec<(String, i64)> {
        let mut tasks = self.store.tasks_for_list(list_id).await.unwrap().items;
        tasks.sort_by_key(|t| t.position);
        tasks.into_iter().map(|t| (t.title, t.position)).collect()
    }
}

#[tokio::test]
async fn move_task_into_empty_list() {
    let h = harness().await;
    let board_id = h.board().await;
    let l1 = h.list(&board_id, "L1").await;
    let l2 = h.list(&board_id, "L2").await;
    let t1 = h.task(&l1.id, "T1").await;
    h.task(&l1.id, "T2").await;

    let moved = h
        .orchestrator
        .move_task(
            "alice",
            &t1.id,
            MoveTaskPayload {
                new_list_id: l2.id.clone(),
                new_position: 1,
            },
        )
        .await
        .unwrap();

    assert_eq!(moved.list_id, l2.id);
    assert_eq!(moved.position, 1);
    assert_eq!(h.positions(&l1.id).await, vec![("T2".to_string(), 1)]);
    assert_eq!(h.positions(&l2.id).await, vec![("T1".to_string(), 1)]);
}

#[tokio::test]
async fn sequential_creates_are_numbered() {
    let h = harness().await;
    let board_id = h.board().await;
    let list = h.list(&board_id, "Todo").await;

    for title in ["a", "b", "c"] {
        h.task(&list.id, title).await;
    }

    let positions: Vec<i64> = h.positions(&list.id).await.into_iter().map(|(_, p)| p).collect();
    assert_eq!(positions, vec![1, 2, 3]);
}

#[tokio::test]
async fn member_cannot_delete_list() {
    let h = harness().await;
    let board_id = h.board().await;
    let list = h.list(&board_id, "Todo").await;
    h.orchestrator.add_member("alice", &board_id, "bob").await.unwrap();

    let result = h.orchestrator.delete_list("bob", &list.id).await;

    assert!(matches!(result, Err(BoardError::InsufficientPermissions)));
    assert!(h.store.get_list(&list.id).await.unwrap().is_some());
}

#[tokio::test]
async fn outsider_is_denied_not_told_board_exists() {
    let h = harness().await;
    let board_id = h.board().await;

    let existing = h.orchestrator.get_board("carol", &board_id).await;
    let missing = h.orchestrator.get_board("carol", "no-such-board").await;

    assert!(matches!(existing, Err(BoardError::AccessDenied)));
    assert!(matches!(missing, Err(BoardError::AccessDenied)));
}

#[tokio::test]
async fn concurrent_appends_get_distinct_positions() {
    let h = harness().await;
    let board_id = h.board().await;
    let list = h.list(&board_id, "Todo").await;

    let creates = (0..8).map(|i| {
        let orchestrator = h.orchestrator.clone();
        let list_id = list.id.clone();
        tokio::spawn(async move {
            orchestrator
                .create_task(
                    "alice",
                    CreateTaskPayload {
                        title: format!("task {}", i),
                        description: None,
                        due_date: None,
                        list_id,
                    },
                )
                .await
        })
    });
    for handle in futures::future::join_all(creates).await {
        handle.unwrap().unwrap();
    }

    let positions: Vec<i64> = h.positions(&list.id).await.into_iter().map(|(_, p)| p).collect();
    assert_eq!(positions, (1..=8).collect::<Vec<i64>>());
}

#[tokio::test]
async fn side_effect_failures_do_not_fail_mutation() {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn BoardStore> = store.clone();
    let effects = Effects::new(Arc::new(FailingLogger), Arc::new(FailingBroadcaster));
    let orchestrator = BoardOrchestrator::new(dyn_store, effects, Settings::default());

    let board = orchestrator
        .create_board("alice", CreateBoardPayload { title: "Ops".into() })
        .await
        .unwrap()
        .board;
    let list = orchestrator
        .create_list(
            "alice",
            CreateListPayload {
                title: "Todo".into(),
                board_id: board.id.clone(),
            },
        )
        .await
        .unwrap();

    assert_eq!(list.position, 1);
    assert!(store.recent_activity(&board.id, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn mutation_logs_and_broadcasts() {
    let h = harness().await;
    let board_id = h.board().await;
    let mut channel = h.broadcaster.join_channel(&board_id).await;

    let list = h.list(&board_id, "Todo").await;

    let event = channel.recv().await.unwrap();
    assert_eq!(event.event, "list_created");
    assert_eq!(event.payload["id"], list.id.as_str());

    let activity = channel.recv().await.unwrap();
    assert_eq!(activity.event, "activity_created");
    assert_eq!(activity.payload["action"], "LIST_CREATED");

    let feed = h.orchestrator.recent_activity("alice", &board_id, None).await.unwrap();
    assert_eq!(feed[0].action, ActivityAction::ListCreated);
    assert_eq!(feed[1].action, ActivityAction::BoardCreated);
}

#[tokio::test]
async fn ownership_transfer_swaps_roles() {
    let h = harness().await;
    let board_id = h.board().await;
    h.orchestrator.add_member("alice", &board_id, "bob").await.unwrap();

    h.orchestrator
        .transfer_ownership("alice", &board_id, "bob")
        .await
        .unwrap();

    let members = h.orchestrator.members("bob", &board_id).await.unwrap();
    let role_of = |user: &str| members.iter().find(|m| m.user_id == user).map(|m| m.role);
    assert_eq!(role_of("bob"), Some(Role::Owner));
    assert_eq!(role_of("alice"), Some(Role::Admin));

    let renamed = h
        .orchestrator
        .rename_board("alice", &board_id, serde_json::from_str(r#"{"title":"x"}"#).unwrap())
        .await;
    assert!(matches!(renamed, Err(BoardError::InsufficientPermissions)));
}

#[tokio::test]
async fn role_update_is_owner_only() {
    let h = harness().await;
    let board_id = h.board().await;
    h.orchestrator.add_member("alice", &board_id, "bob").await.unwrap();
    h.orchestrator.add_member("alice", &board_id, "carol").await.unwrap();
    h.orchestrator
        .update_role("alice", &board_id, "bob", UpdateRolePayload { role: "ADMIN".into() })
        .await
        .unwrap();

    let by_admin = h
        .orchestrator
        .update_role("bob", &board_id, "carol", UpdateRolePayload { role: "ADMIN".into() })
        .await;
    assert!(matches!(by_admin, Err(BoardError::InsufficientPermissions)));

    // Admins may still manage membership
    h.orchestrator.remove_member("bob", &board_id, "carol").await.unwrap();
    let owner_removal = h.orchestrator.remove_member("bob", &board_id, "alice").await;
    assert!(matches!(owner_removal, Err(BoardError::Conflict(_))));
}

#[tokio::test]
async fn lists_come_back_with_ordered_tasks() {
    let h = harness().await;
    let board_id = h.board().await;
    let todo = h.list(&board_id, "Todo").await;
    h.list(&board_id, "Done").await;
    let first = h.task(&todo.id, "first").await;
    h.task(&todo.id, "second").await;
    h.orchestrator.assign_user("alice", &first.id, "alice").await.unwrap();

    let lists = h.orchestrator.lists_with_tasks("alice", &board_id).await.unwrap();

    assert_eq!(lists.len(), 2);
    assert_eq!(lists[0].list.title, "Todo");
    let titles: Vec<&str> = lists[0].tasks.iter().map(|c| c.task.title.as_str()).collect();
    assert_eq!(titles, vec!["first", "second"]);
    assert_eq!(lists[0].tasks[0].assignees[0].user_id, "alice");
    assert!(lists[1].tasks.is_empty());
}

#[tokio::test]
async fn board_deletion_cascades() {
    let h = harness().await;
    let board_id = h.board().await;
    let list = h.list(&board_id, "Todo").await;
    let task = h.task(&list.id, "a").await;

    h.orchestrator.delete_board("alice", &board_id).await.unwrap();

    assert!(h.store.get_board(&board_id).await.unwrap().is_none());
    assert!(h.store.get_task(&task.id).await.unwrap().is_none());
    assert!(h.store.recent_activity(&board_id, 10).await.unwrap().is_empty());
    assert!(h.orchestrator.my_boards("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn departed_members_lose_their_subscriptions() {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn BoardStore> = store.clone();
    let recorder = Arc::new(RevocationRecorder::default());
    let effects = Effects::new(Arc::new(StoreActivityLog::new(dyn_store.clone())), recorder.clone());
    let orchestrator = BoardOrchestrator::new(dyn_store, effects, Settings::default());
    let board_id = orchestrator
        .create_board("alice", CreateBoardPayload { title: "Ops".into() })
        .await
        .unwrap()
        .board
        .id;
    orchestrator.add_member("alice", &board_id, "bob").await.unwrap();
    orchestrator.add_member("alice", &board_id, "carol").await.unwrap();

    orchestrator.remove_member("alice", &board_id, "bob").await.unwrap();
    orchestrator.leave_board("carol", &board_id).await.unwrap();

    let revoked = recorder.revoked.lock().unwrap().clone();
    assert_eq!(
        revoked,
        vec![
            (board_id.clone(), "bob".to_string()),
            (board_id.clone(), "carol".to_string()),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_moves_keep_both_lists_dense() {
    let h = harness().await;
    let board_id = h.board().await;
    let l1 = h.list(&board_id, "L1").await;
    let l2 = h.list(&board_id, "L2").await;
    let mut tasks = Vec::new();
    for i in 0..5 {
        tasks.push(h.task(&l1.id, &format!("a{}", i)).await);
        tasks.push(h.task(&l2.id, &format!("b{}", i)).await);
    }

    // Position 1 stays valid for every move whatever lands first
    let moves = tasks.iter().cycle().take(20).enumerate().map(|(i, task)| {
        let orchestrator = h.orchestrator.clone();
        let task_id = task.id.clone();
        let target = if i % 3 == 0 { l2.id.clone() } else { l1.id.clone() };
        tokio::spawn(async move {
            orchestrator
                .move_task(
                    "alice",
                    &task_id,
                    MoveTaskPayload {
                        new_list_id: target,
                        new_position: 1,
                    },
                )
                .await
        })
    });

    let mut moved = 0;
    for handle in futures::future::join_all(moves).await {
        match handle.unwrap() {
            Ok(_) => moved += 1,
            Err(e) => assert_eq!(e.kind(), "Conflict", "unexpected failure: {}", e),
        }
    }
    assert!(moved > 0);

    let first = h.positions(&l1.id).await;
    let second = h.positions(&l2.id).await;
    assert_eq!(first.len() + second.len(), 10);
    for layout in [first, second] {
        let positions: Vec<i64> = layout.into_iter().map(|(_, p)| p).collect();
        assert_eq!(positions, (1..=positions.len() as i64).collect::<Vec<i64>>());
    }
}
