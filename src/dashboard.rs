//! Read-only views over the catalog and a user's contributions.

use serde::Serialize;

use crate::assignments::{self, Assignment, Mission, Progress, PRIORITY_LIST_LENGTH};
use crate::db::Db;
use crate::errors::BackendError;
use crate::gamification::Level;
use crate::glossary::GlossaryItem;
use crate::user::Principal;

/// Shown when the identity provider did not supply a name.
pub const DEFAULT_NAME: &str = "Usuario";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub user: Summary,
    pub stats: Stats,
    pub priority_assignments: Vec<Mission>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub name: String,
    pub streak: i32,
    pub level: Level,
    pub score: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(flatten)]
    pub progress: Progress,
    pub next_mission: Option<Mission>,
}

/// Every term the principal may see, with the state of their recordings.
pub async fn assignments_for(
    db: &dyn Db,
    principal: &Principal,
) -> Result<Vec<Assignment>, BackendError> {
    let catalog = db.retrieve_glossary().await?;
    let history = db.retrieve_history(&principal.id).await?;

    Ok(assignments::assignments(&catalog, &history, principal))
}

/// A single term, as long as the principal may see it.
pub async fn assignment_by_slug(
    db: &dyn Db,
    principal: &Principal,
    slug: &str,
) -> Result<GlossaryItem, BackendError> {
    db.retrieve_glossary_by_slug(slug)
        .await?
        .filter(|item| item.is_visible_to(principal))
        .ok_or_else(|| BackendError::AssignmentNotFound(slug.to_owned()))
}

pub async fn dashboard(db: &dyn Db, principal: &Principal) -> Result<Dashboard, BackendError> {
    let stats = db
        .retrieve_user_stats(&principal.id)
        .await?
        .ok_or(BackendError::UserNotFound(principal.id))?;

    let catalog = db.retrieve_glossary().await?;
    let total_glossary = db.count_glossary().await?;
    let history = db.retrieve_history(&principal.id).await?;

    let priority_assignments =
        assignments::priority_list(&catalog, &history, principal, PRIORITY_LIST_LENGTH);

    Ok(Dashboard {
        user: Summary {
            name: stats.name.unwrap_or_else(|| DEFAULT_NAME.to_owned()),
            streak: stats.current_streak,
            level: Level::for_score(stats.reputation_score),
            score: stats.reputation_score,
        },
        stats: Stats {
            progress: assignments::progress(total_glossary.max(0) as usize, &history),
            next_mission: priority_assignments.first().cloned(),
        },
        priority_assignments,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::assignments::AssignmentStatus;
    use crate::db::mock::MockDb;
    use crate::glossary::{item, CatalogStatus, Visibility};
    use crate::lifecycle::{RecordingManager, UploadRequest};
    use crate::recording::RecordingStatus;
    use crate::store::mock::MockStore;
    use crate::user::{Role, UserStats};

    fn setup() -> (Arc<MockDb>, RecordingManager, Principal) {
        let mut hidden = item(4, "secreto", 1);
        hidden.visibility = Visibility::RoleRestricted;
        hidden.allowed_roles = vec![Role::from("INTERPRETER")];

        let db = Arc::new(MockDb::with_glossary(vec![
            item(1, "hola", 1),
            item(2, "gracias", 1),
            item(3, "bano", 2),
            hidden,
        ]));

        let manager = RecordingManager::new(
            Arc::new(logging::discard()),
            db.clone(),
            Arc::new(MockStore::new()),
        );

        let member = Principal::new(db.add_user(Role::Member), Role::Member);

        (db, manager, member)
    }

    async fn record(manager: &RecordingManager, principal: &Principal, assignment_id: i32) -> uuid::Uuid {
        let request = UploadRequest {
            assignment_id,
            content_type: "video/mp4".to_owned(),
            metadata: serde_json::Value::Null,
        };

        manager
            .initiate_batch(principal, request, 1)
            .await
            .expect("initiate upload")
            .recordings[0]
            .recording_id
    }

    fn slugs(missions: &[Mission]) -> Vec<&str> {
        missions.iter().map(|m| m.slug.as_str()).collect()
    }

    #[tokio::test]
    async fn next_mission_moves_on_after_confirmation() {
        let (db, manager, member) = setup();

        let before = dashboard(&*db, &member).await.expect("dashboard");
        assert_eq!(before.stats.next_mission.as_ref().unwrap().slug, "gracias");
        assert_eq!(slugs(&before.priority_assignments), vec!["gracias", "hola", "bano"]);

        let id = record(&manager, &member, 2).await;

        let initiated_only = dashboard(&*db, &member).await.expect("dashboard");
        assert_eq!(initiated_only.stats.next_mission.unwrap().slug, "gracias");

        manager.confirm(&member, &[id]).await.expect("confirm");

        let after = dashboard(&*db, &member).await.expect("dashboard");
        assert_eq!(after.stats.next_mission.as_ref().unwrap().slug, "hola");
        assert_eq!(slugs(&after.priority_assignments), vec!["hola", "bano"]);
        assert_eq!(after.stats.progress.total_completed, 1);
        assert_eq!(after.stats.progress.total_glossary, 4);
        assert_eq!(after.stats.progress.progress, 25);
        assert_eq!(after.stats.progress.pending, 1);
        assert_eq!(after.user.score, 10);
        assert_eq!(after.user.streak, 1);
        assert_eq!(after.user.level, Level::Explorador);
        assert_eq!(after.user.name, DEFAULT_NAME);
    }

    #[tokio::test]
    async fn dashboards_serialize_in_the_expected_shape() {
        let (db, _, member) = setup();
        db.set_stats(
            member.id,
            UserStats {
                name: Some("Ana".to_owned()),
                current_streak: 4,
                last_contribution_at: None,
                reputation_score: 70,
            },
        );

        let value = serde_json::to_value(dashboard(&*db, &member).await.unwrap()).unwrap();

        assert_eq!(value["user"]["name"], "Ana");
        assert_eq!(value["user"]["level"], "Maestro");
        assert_eq!(value["stats"]["totalGlossary"], 4);
        assert_eq!(value["stats"]["nextMission"]["slug"], "gracias");
        assert_eq!(value["priorityAssignments"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn assignments_are_labelled_by_recording_state() {
        let (db, manager, member) = setup();

        let approved = record(&manager, &member, 1).await;
        let pending = record(&manager, &member, 2).await;
        record(&manager, &member, 3).await;
        manager.confirm(&member, &[approved, pending]).await.expect("confirm");
        db.set_status(approved, RecordingStatus::Approved);

        let listed = assignments_for(&*db, &member).await.expect("assignments");

        let labels = listed
            .iter()
            .map(|a| (a.slug.as_str(), a.status))
            .collect::<Vec<_>>();

        assert_eq!(
            labels,
            vec![
                ("gracias", AssignmentStatus::Pending),
                ("hola", AssignmentStatus::Completed),
                ("bano", AssignmentStatus::Available),
            ]
        );
    }

    #[tokio::test]
    async fn admins_see_the_whole_catalog() {
        let (db, _, _) = setup();
        let admin = Principal::new(db.add_user(Role::Admin), Role::Admin);

        let listed = assignments_for(&*db, &admin).await.expect("assignments");

        assert_eq!(listed.len(), 4);
        assert_eq!(listed[0].slug, "gracias");
    }

    #[tokio::test]
    async fn hidden_terms_are_not_found_by_slug() {
        let (db, _, member) = setup();
        let interpreter = Principal::new(
            db.add_user(Role::from("INTERPRETER")),
            Role::from("INTERPRETER"),
        );

        let found = assignment_by_slug(&*db, &member, "hola").await.expect("lookup");
        assert_eq!(found.id, 1);

        assert!(matches!(
            assignment_by_slug(&*db, &member, "secreto").await,
            Err(BackendError::AssignmentNotFound(_))
        ));
        assert!(matches!(
            assignment_by_slug(&*db, &member, "nada").await,
            Err(BackendError::AssignmentNotFound(_))
        ));
        assert!(assignment_by_slug(&*db, &interpreter, "secreto").await.is_ok());
    }

    #[tokio::test]
    async fn inactive_terms_are_hidden_from_members() {
        let mut retired = item(1, "hola", 1);
        retired.status = CatalogStatus::Inactive;

        let db = MockDb::with_glossary(vec![retired]);
        let member = Principal::new(db.add_user(Role::Member), Role::Member);
        let admin = Principal::new(db.add_user(Role::Admin), Role::Admin);

        assert!(assignments_for(&db, &member).await.unwrap().is_empty());
        assert_eq!(assignments_for(&db, &admin).await.unwrap().len(), 1);
    }
}
