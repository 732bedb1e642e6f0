//! Board membership reconciler.
//!
//! Desired state is derived purely from the roster: a (board, user) pair is
//! desired-active when the board's slug appears in the user's board tag
//! list. The full desired board→members mapping is computed first, then
//! each board is converged independently; a failure on one board is logged
//! and skipped, never fatal for the pass.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, info, warn};

use rostersync_core::SyncResult;
use rostersync_directory::types::{DesiredUser, Username};
use rostersync_reconciler::partition::partition;

use crate::traits::{BoardMutation, BoardQuery, BoardService};
use crate::types::{Board, BoardMember, MembershipState};

/// Desired board→members mapping across the whole user population.
pub fn desired_memberships(users: &[DesiredUser]) -> BTreeMap<String, BTreeSet<Username>> {
    let mut memberships: BTreeMap<String, BTreeSet<Username>> = BTreeMap::new();
    for user in users {
        for slug in &user.boards {
            memberships
                .entry(slug.clone())
                .or_default()
                .insert(user.username.clone());
        }
    }
    memberships
}

/// Outcome counters for one board reconciliation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BoardSummary {
    /// Boards examined.
    pub boards_seen: usize,
    /// Boards named in the desired mapping but missing remotely.
    pub boards_missing: usize,
    /// Boards skipped after a remote failure.
    pub boards_failed: usize,
    /// Memberships inserted as active.
    pub inserted: usize,
    /// Inactive memberships reactivated.
    pub activated: usize,
    /// Active memberships deactivated.
    pub deactivated: usize,
    /// Administrative identity assertions issued.
    pub admin_assertions: usize,
}

/// Converges board memberships onto the roster-derived desired mapping.
pub struct BoardReconciler<'a, B: ?Sized> {
    boards: &'a B,
    admin: &'a Username,
    dry_run: bool,
}

impl<'a, B> BoardReconciler<'a, B>
where
    B: BoardService + ?Sized,
{
    /// Binds the reconciler to a board service and the privileged
    /// administrative identity.
    pub fn new(boards: &'a B, admin: &'a Username, dry_run: bool) -> Self {
        Self {
            boards,
            admin,
            dry_run,
        }
    }

    /// Run one membership reconciliation pass over every remote board.
    ///
    /// Boards present remotely but absent from the desired mapping still
    /// receive the administrative-identity assertion.
    pub async fn reconcile(&self, users: &[DesiredUser]) -> SyncResult<BoardSummary> {
        let desired = desired_memberships(users);
        let boards = self.boards.list_boards().await?;
        let mut summary = BoardSummary::default();

        let known_slugs: BTreeSet<&str> = boards.iter().map(|b| b.slug.as_str()).collect();
        for slug in desired.keys() {
            if !known_slugs.contains(slug.as_str()) {
                warn!(board = %slug, "board named in roster does not exist remotely, skipping");
                summary.boards_missing += 1;
            }
        }

        for board in &boards {
            summary.boards_seen += 1;
            let want = desired.get(&board.slug).cloned().unwrap_or_default();
            match self.reconcile_board(board, &want).await {
                Ok((inserted, activated, deactivated)) => {
                    summary.inserted += inserted;
                    summary.activated += activated;
                    summary.deactivated += deactivated;
                    summary.admin_assertions += 1;
                }
                Err(err) => {
                    warn!(board = %board.slug, error = %err, "board reconciliation failed, skipping");
                    summary.boards_failed += 1;
                }
            }
        }

        info!(
            boards = summary.boards_seen,
            inserted = summary.inserted,
            activated = summary.activated,
            deactivated = summary.deactivated,
            "board membership pass finished"
        );
        Ok(summary)
    }

    async fn reconcile_board(
        &self,
        board: &Board,
        want: &BTreeSet<Username>,
    ) -> SyncResult<(usize, usize, usize)> {
        let members = self.boards.list_members(board).await?;
        let by_name: HashMap<&Username, &BoardMember> =
            members.iter().map(|m| (&m.username, m)).collect();

        // The administrative identity is desired-active everywhere.
        let mut want = want.clone();
        want.insert(self.admin.clone());

        let p = partition(
            want.iter().cloned(),
            by_name.keys().map(|u| (*u).clone()),
        );

        let mut inserted = 0;
        let mut activated = 0;
        let mut deactivated = 0;

        for username in &p.only_desired {
            if self.dry_run {
                info!(board = %board.slug, username = %username, "dry-run: would insert active member");
            } else {
                self.boards.insert_active(board, username).await?;
                info!(board = %board.slug, username = %username, "inserted active member");
            }
            inserted += 1;
        }

        for username in &p.both {
            if by_name[username].state() == MembershipState::Active {
                continue;
            }
            if self.dry_run {
                info!(board = %board.slug, username = %username, "dry-run: would reactivate member");
            } else {
                self.boards.activate(board, username).await?;
                info!(board = %board.slug, username = %username, "reactivated member");
            }
            activated += 1;
        }

        for username in &p.only_actual {
            // Records are deactivated, never deleted; already-inactive
            // members are a steady state.
            if by_name[username].state() == MembershipState::Inactive {
                debug!(board = %board.slug, username = %username, "stale member already inactive");
                continue;
            }
            if self.dry_run {
                info!(board = %board.slug, username = %username, "dry-run: would deactivate member");
            } else {
                self.boards.deactivate(board, username).await?;
                info!(board = %board.slug, username = %username, "deactivated member");
            }
            deactivated += 1;
        }

        // Asserted every pass, even on boards with no desired members.
        if self.dry_run {
            info!(board = %board.slug, username = %self.admin, "dry-run: would assert admin identity");
        } else {
            self.boards.ensure_admin(board, self.admin).await?;
        }

        Ok((inserted, activated, deactivated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn user(name: &str, boards: &[&str]) -> DesiredUser {
        DesiredUser {
            username: Username::new(name),
            first_name: "First".into(),
            last_name: "Last".into(),
            organization: "org".into(),
            geography: None,
            function: "dev".into(),
            habilitation: "a".into(),
            scope_tags: vec![],
            extra_roles: vec![],
            boards: boards.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn board(slug: &str) -> Board {
        Board {
            id: format!("board-{slug}"),
            slug: slug.to_string(),
            title: slug.to_uppercase(),
        }
    }

    fn member(name: &str, active: bool) -> BoardMember {
        BoardMember {
            username: Username::new(name),
            active,
            is_admin: false,
        }
    }

    #[derive(Default)]
    struct MockBoards {
        boards: Vec<Board>,
        members: Mutex<BTreeMap<String, Vec<BoardMember>>>,
        calls: Mutex<Vec<String>>,
        fail_board: Option<String>,
    }

    impl MockBoards {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn member_of(&self, board: &str, name: &str) -> Option<BoardMember> {
            self.members
                .lock()
                .unwrap()
                .get(board)
                .and_then(|ms| ms.iter().find(|m| m.username == Username::new(name)).cloned())
        }
    }

    #[async_trait]
    impl BoardQuery for MockBoards {
        async fn list_boards(&self) -> SyncResult<Vec<Board>> {
            Ok(self.boards.clone())
        }

        async fn list_members(&self, board: &Board) -> SyncResult<Vec<BoardMember>> {
            if self.fail_board.as_deref() == Some(board.slug.as_str()) {
                return Err(rostersync_core::SyncError::remote(
                    "member listing",
                    "simulated failure",
                ));
            }
            Ok(self
                .members
                .lock()
                .unwrap()
                .get(&board.id)
                .cloned()
                .unwrap_or_default())
        }
    }

    #[async_trait]
    impl BoardMutation for MockBoards {
        async fn insert_active(&self, board: &Board, username: &Username) -> SyncResult<()> {
            self.record(format!("insert:{}:{username}", board.slug));
            self.members
                .lock()
                .unwrap()
                .entry(board.id.clone())
                .or_default()
                .push(BoardMember {
                    username: username.clone(),
                    active: true,
                    is_admin: false,
                });
            Ok(())
        }

        async fn activate(&self, board: &Board, username: &Username) -> SyncResult<()> {
            self.record(format!("activate:{}:{username}", board.slug));
            let mut members = self.members.lock().unwrap();
            if let Some(ms) = members.get_mut(&board.id) {
                for m in ms.iter_mut().filter(|m| &m.username == username) {
                    m.active = true;
                }
            }
            Ok(())
        }

        async fn deactivate(&self, board: &Board, username: &Username) -> SyncResult<()> {
            self.record(format!("deactivate:{}:{username}", board.slug));
            let mut members = self.members.lock().unwrap();
            if let Some(ms) = members.get_mut(&board.id) {
                for m in ms.iter_mut().filter(|m| &m.username == username) {
                    m.active = false;
                }
            }
            Ok(())
        }

        async fn ensure_admin(&self, board: &Board, username: &Username) -> SyncResult<()> {
            self.record(format!("ensure_admin:{}:{username}", board.slug));
            let mut members = self.members.lock().unwrap();
            let ms = members.entry(board.id.clone()).or_default();
            match ms.iter_mut().find(|m| &m.username == username) {
                Some(m) => {
                    m.active = true;
                    m.is_admin = true;
                }
                None => ms.push(BoardMember {
                    username: username.clone(),
                    active: true,
                    is_admin: true,
                }),
            }
            Ok(())
        }
    }

    fn admin() -> Username {
        Username::new("admin@example.org")
    }

    #[test]
    fn desired_mapping_groups_by_slug() {
        let users = vec![
            user("a@x.org", &["b1", "b2"]),
            user("b@x.org", &["b2"]),
            user("c@x.org", &[]),
        ];
        let mapping = desired_memberships(&users);
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["b1"].len(), 1);
        assert_eq!(mapping["b2"].len(), 2);
    }

    #[tokio::test]
    async fn tagged_user_is_inserted_active() {
        let mock = MockBoards {
            boards: vec![board("crp")],
            ..MockBoards::default()
        };
        let admin = admin();
        let reconciler = BoardReconciler::new(&mock, &admin, false);

        let summary = reconciler.reconcile(&[user("a@x.org", &["crp"])]).await.unwrap();

        assert_eq!(summary.inserted, 2); // user + admin identity
        assert_eq!(summary.admin_assertions, 1);
        let m = mock.member_of("board-crp", "a@x.org").unwrap();
        assert!(m.active);
    }

    #[tokio::test]
    async fn untagged_active_member_is_deactivated_not_deleted() {
        let mock = MockBoards {
            boards: vec![board("crp")],
            ..MockBoards::default()
        };
        mock.members
            .lock()
            .unwrap()
            .insert("board-crp".into(), vec![member("gone@x.org", true)]);
        let admin = admin();
        let reconciler = BoardReconciler::new(&mock, &admin, false);

        let summary = reconciler.reconcile(&[user("gone@x.org", &[])]).await.unwrap();

        assert_eq!(summary.deactivated, 1);
        // The record survives, inactive.
        let m = mock.member_of("board-crp", "gone@x.org").unwrap();
        assert!(!m.active);
    }

    #[tokio::test]
    async fn retagged_inactive_member_is_reactivated() {
        let mock = MockBoards {
            boards: vec![board("crp")],
            ..MockBoards::default()
        };
        mock.members
            .lock()
            .unwrap()
            .insert("board-crp".into(), vec![member("back@x.org", false)]);
        let admin = admin();
        let reconciler = BoardReconciler::new(&mock, &admin, false);

        let summary = reconciler.reconcile(&[user("back@x.org", &["crp"])]).await.unwrap();

        assert_eq!(summary.activated, 1);
        assert_eq!(summary.inserted, 1); // admin only
        assert!(!mock.calls().iter().any(|c| c.starts_with("insert:crp:back")));
    }

    #[tokio::test]
    async fn admin_is_asserted_on_undesired_boards() {
        let mock = MockBoards {
            boards: vec![board("crp"), board("orphan")],
            ..MockBoards::default()
        };
        let admin = admin();
        let reconciler = BoardReconciler::new(&mock, &admin, false);

        let summary = reconciler.reconcile(&[user("a@x.org", &["crp"])]).await.unwrap();

        assert_eq!(summary.admin_assertions, 2);
        let m = mock.member_of("board-orphan", "admin@example.org").unwrap();
        assert!(m.active);
        assert!(m.is_admin);
    }

    #[tokio::test]
    async fn admin_is_never_deactivated() {
        let mock = MockBoards {
            boards: vec![board("crp")],
            ..MockBoards::default()
        };
        mock.members
            .lock()
            .unwrap()
            .insert("board-crp".into(), vec![member("admin@example.org", true)]);
        let admin = admin();
        let reconciler = BoardReconciler::new(&mock, &admin, false);

        reconciler.reconcile(&[]).await.unwrap();

        assert!(!mock.calls().iter().any(|c| c.starts_with("deactivate")));
        assert!(mock.member_of("board-crp", "admin@example.org").unwrap().active);
    }

    #[tokio::test]
    async fn missing_board_is_a_warned_skip() {
        let mock = MockBoards {
            boards: vec![board("crp")],
            ..MockBoards::default()
        };
        let admin = admin();
        let reconciler = BoardReconciler::new(&mock, &admin, false);

        let summary = reconciler
            .reconcile(&[user("a@x.org", &["nonexistent"])])
            .await
            .unwrap();

        assert_eq!(summary.boards_missing, 1);
        assert_eq!(summary.boards_seen, 1);
    }

    #[tokio::test]
    async fn failing_board_is_skipped_not_fatal() {
        let mock = MockBoards {
            boards: vec![board("broken"), board("crp")],
            fail_board: Some("broken".into()),
            ..MockBoards::default()
        };
        let admin = admin();
        let reconciler = BoardReconciler::new(&mock, &admin, false);

        let summary = reconciler.reconcile(&[user("a@x.org", &["crp"])]).await.unwrap();

        assert_eq!(summary.boards_failed, 1);
        assert!(mock.member_of("board-crp", "a@x.org").is_some());
    }

    #[tokio::test]
    async fn second_pass_only_reasserts_admin() {
        let mock = MockBoards {
            boards: vec![board("crp")],
            ..MockBoards::default()
        };
        let admin = admin();
        let reconciler = BoardReconciler::new(&mock, &admin, false);
        let users = vec![user("a@x.org", &["crp"])];

        reconciler.reconcile(&users).await.unwrap();
        mock.calls.lock().unwrap().clear();
        let summary = reconciler.reconcile(&users).await.unwrap();

        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.activated, 0);
        assert_eq!(summary.deactivated, 0);
        let calls = mock.calls();
        assert!(calls.iter().all(|c| c.starts_with("ensure_admin")), "{calls:?}");
    }

    #[tokio::test]
    async fn dry_run_issues_no_transitions() {
        let mock = MockBoards {
            boards: vec![board("crp")],
            ..MockBoards::default()
        };
        let admin = admin();
        let reconciler = BoardReconciler::new(&mock, &admin, true);

        let summary = reconciler.reconcile(&[user("a@x.org", &["crp"])]).await.unwrap();

        assert_eq!(summary.inserted, 2);
        assert!(mock.calls().is_empty());
    }
}
