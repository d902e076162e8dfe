//! The user's own account: onboarding answers, profile and login sync.

use serde::Deserialize;

use crate::db::Db;
use crate::errors::BackendError;
use crate::user::{HearingStatus, Onboarding, Principal, Profile};

/// The onboarding answers as sent. Checked by [`OnboardingForm::validate`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingForm {
    pub hearing_status: Option<String>,
    pub lsm_variant: Option<String>,
    pub age_range: Option<String>,
    pub gender: Option<String>,
}

impl OnboardingForm {
    pub fn validate(self) -> Result<Onboarding, BackendError> {
        let hearing_status = self
            .hearing_status
            .ok_or_else(|| BackendError::invalid("Hearing status is required"))?
            .parse::<HearingStatus>()
            .map_err(|_| BackendError::invalid("Invalid hearing status value"))?;

        let lsm_variant = self
            .lsm_variant
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| BackendError::invalid("LSM variant is required"))?;

        Ok(Onboarding {
            hearing_status,
            lsm_variant,
            age_range: self.age_range,
            gender: self.gender,
        })
    }
}

pub async fn profile(db: &dyn Db, principal: &Principal) -> Result<Profile, BackendError> {
    db.retrieve_profile(&principal.id)
        .await?
        .ok_or(BackendError::UserNotFound(principal.id))
}

/// Stores the onboarding answers. Only allowed once; a completed
/// onboarding is refused before the answers are even looked at.
pub async fn onboard(
    db: &dyn Db,
    principal: &Principal,
    form: OnboardingForm,
) -> Result<Profile, BackendError> {
    if profile(db, principal).await?.onboarding_completed {
        return Err(BackendError::AlreadyOnboarded);
    }

    let onboarding = form.validate()?;

    // a concurrent onboarding may have won since the check above
    db.complete_onboarding(&principal.id, &onboarding)
        .await?
        .ok_or(BackendError::AlreadyOnboarded)
}

/// Records a login and returns the account as it now stands.
pub async fn sync(
    db: &dyn Db,
    principal: &Principal,
    name: Option<String>,
) -> Result<Profile, BackendError> {
    let name = name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty());

    db.sync_user(&principal.id, name)
        .await?
        .ok_or(BackendError::UserNotFound(principal.id))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::mock::MockDb;
    use crate::user::Role;

    fn member() -> (Arc<MockDb>, Principal) {
        let db = Arc::new(MockDb::default());
        let principal = Principal::new(db.add_user(Role::Member), Role::Member);

        (db, principal)
    }

    fn form(hearing_status: &str, lsm_variant: &str) -> OnboardingForm {
        OnboardingForm {
            hearing_status: Some(hearing_status.to_owned()),
            lsm_variant: Some(lsm_variant.to_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn onboarding_answers_are_validated() {
        let valid = OnboardingForm {
            age_range: Some("25-34".to_owned()),
            ..form("hard_of_hearing", " CDMX ")
        }
        .validate()
        .expect("valid answers");

        assert_eq!(valid.hearing_status, HearingStatus::HardOfHearing);
        assert_eq!(valid.lsm_variant, "CDMX");
        assert_eq!(valid.age_range.as_deref(), Some("25-34"));
        assert_eq!(valid.gender, None);

        for invalid in vec![
            form("deafish", "CDMX"),
            form("deaf", "  "),
            OnboardingForm {
                lsm_variant: Some("CDMX".to_owned()),
                ..Default::default()
            },
            OnboardingForm {
                hearing_status: Some("coda".to_owned()),
                ..Default::default()
            },
        ] {
            assert!(matches!(invalid.validate(), Err(BackendError::InvalidArgument(_))));
        }
    }

    #[tokio::test]
    async fn onboarding_happens_once() {
        let (db, principal) = member();

        let onboarded = onboard(&*db, &principal, form("deaf", "CDMX"))
            .await
            .expect("first onboarding");

        assert!(onboarded.onboarding_completed);
        assert_eq!(onboarded.hearing_status, Some(HearingStatus::Deaf));

        let again = onboard(&*db, &principal, form("hearing", "Yucatán")).await;
        assert!(matches!(again, Err(BackendError::AlreadyOnboarded)));

        // refused even when the new answers are invalid
        let invalid = onboard(&*db, &principal, OnboardingForm::default()).await;
        assert!(matches!(invalid, Err(BackendError::AlreadyOnboarded)));

        let stored = profile(&*db, &principal).await.expect("profile");
        assert_eq!(stored.lsm_variant.as_deref(), Some("CDMX"));
    }

    #[tokio::test]
    async fn invalid_answers_leave_onboarding_open() {
        let (db, principal) = member();

        let result = onboard(&*db, &principal, form("deaf", "")).await;
        assert!(matches!(result, Err(BackendError::InvalidArgument(_))));

        assert!(!profile(&*db, &principal).await.unwrap().onboarding_completed);
    }

    #[tokio::test]
    async fn syncing_records_the_login() {
        let (db, principal) = member();

        let before = profile(&*db, &principal).await.unwrap();
        assert_eq!(before.last_login_at, None);

        let synced = sync(&*db, &principal, Some(" Ana ".to_owned())).await.expect("sync");
        assert_eq!(synced.name.as_deref(), Some("Ana"));
        assert!(synced.last_login_at.is_some());

        let kept = sync(&*db, &principal, Some(String::new())).await.expect("sync");
        assert_eq!(kept.name.as_deref(), Some("Ana"));
    }

    #[tokio::test]
    async fn unknown_users_have_no_profile() {
        let db = MockDb::default();
        let ghost = Principal::new(uuid::Uuid::new_v4(), Role::Member);

        assert!(matches!(
            profile(&db, &ghost).await,
            Err(BackendError::UserNotFound(_))
        ));
        assert!(matches!(
            sync(&db, &ghost, None).await,
            Err(BackendError::UserNotFound(_))
        ));
    }
}
