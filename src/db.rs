use futures::future::BoxFuture;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::assignments::HistoryEntry;
use crate::errors::BackendError;
use crate::gamification::Contribution;
use crate::glossary::{GlossaryId, GlossaryItem};
use crate::recording::{ListedRecording, NewRecording, Recording, RecordingQuery};
use crate::user::{Onboarding, Profile, Role, Session, UserStats};

#[cfg(test)]
pub(crate) mod mock;

pub trait Db: Send + Sync {
    /// Resolves a bearer token, refreshing the user's last login.
    fn authenticate(&self, token: &Uuid) -> BoxFuture<Result<Option<Session>, BackendError>>;

    /// Creates the user if needed and issues a new session token.
    fn create_session(
        &self,
        email: &str,
        name: Option<String>,
        role: &Role,
    ) -> BoxFuture<Result<Uuid, BackendError>>;

    fn count_glossary(&self) -> BoxFuture<Result<i64, BackendError>>;

    /// The whole catalog in priority order.
    fn retrieve_glossary(&self) -> BoxFuture<Result<Vec<GlossaryItem>, BackendError>>;

    fn retrieve_glossary_by_id(
        &self,
        id: GlossaryId,
    ) -> BoxFuture<Result<Option<GlossaryItem>, BackendError>>;

    fn retrieve_glossary_by_slug(
        &self,
        slug: &str,
    ) -> BoxFuture<Result<Option<GlossaryItem>, BackendError>>;

    /// Persists all of `recordings` in the `UPLOADING` state, or none of
    /// them. Each row is stamped when it is written, so later rows of a
    /// batch list as newer.
    fn insert_recordings(
        &self,
        recordings: Vec<NewRecording>,
    ) -> BoxFuture<Result<Vec<Recording>, BackendError>>;

    fn retrieve_recording(&self, id: &Uuid) -> BoxFuture<Result<Option<Recording>, BackendError>>;

    /// Moves every one of `ids` from `UPLOADING` to `PENDING` and credits
    /// the owner, as a single transaction. Fails with
    /// [`BackendError::NotConfirmable`] without changing anything unless
    /// every id is owned by `user_id` and still uploading.
    fn confirm_recordings(
        &self,
        user_id: &Uuid,
        ids: &[Uuid],
        now: OffsetDateTime,
    ) -> BoxFuture<Result<Contribution, BackendError>>;

    fn delete_recording(&self, id: &Uuid) -> BoxFuture<Result<(), BackendError>>;

    /// Returns the requested page of recordings and the total number of
    /// matches.
    fn list_recordings(
        &self,
        user_id: &Uuid,
        query: &RecordingQuery,
    ) -> BoxFuture<Result<(Vec<ListedRecording>, i64), BackendError>>;

    /// The term and state of every recording the user owns.
    fn retrieve_history(&self, user_id: &Uuid) -> BoxFuture<Result<Vec<HistoryEntry>, BackendError>>;

    fn retrieve_user_stats(&self, user_id: &Uuid) -> BoxFuture<Result<Option<UserStats>, BackendError>>;

    fn retrieve_profile(&self, user_id: &Uuid) -> BoxFuture<Result<Option<Profile>, BackendError>>;

    /// Stores the onboarding answers unless the user already gave them.
    /// Returns `None` when nothing was updated.
    fn complete_onboarding(
        &self,
        user_id: &Uuid,
        onboarding: &Onboarding,
    ) -> BoxFuture<Result<Option<Profile>, BackendError>>;

    /// Records a login, replacing the display name when one is given.
    fn sync_user(
        &self,
        user_id: &Uuid,
        name: Option<String>,
    ) -> BoxFuture<Result<Option<Profile>, BackendError>>;
}

pub use self::postgres::*;

mod postgres {
    use std::convert::TryFrom;
    use std::str::FromStr;

    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sqlx::{
        self,
        postgres::{PgPool, PgRow},
    };
    use time::OffsetDateTime;
    use uuid::Uuid;

    use crate::assignments::HistoryEntry;
    use crate::errors::BackendError;
    use crate::gamification::{self, Contribution};
    use crate::glossary::{GlossaryId, GlossaryItem};
    use crate::recording::{
        GlossaryRef, ListedRecording, NewRecording, Recording, RecordingQuery, RecordingStatus,
    };
    use crate::user::{Onboarding, Principal, Profile, Role, Session, UserStats};

    const RECORDINGS_ID_CONSTRAINT: &str = "recordings_primary_key";
    const RECORDINGS_STORAGE_KEY_CONSTRAINT: &str = "recordings_storage_key";

    /// A [`super::Db`] over a Postgres pool owned by the caller.
    pub struct PgDb {
        pool: PgPool,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb { pool }
        }
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
        fn authenticate(&self, token: &Uuid) -> BoxFuture<Result<Option<Session>, BackendError>> {
            let token = *token;

            async move {
                let query = sqlx::query(include_str!("queries/authenticate.sql"));

                let session = query
                    .bind(token)
                    .try_map(|row: PgRow| {
                        let id: Uuid = try_get(&row, "id")?;
                        let role: String = try_get(&row, "role")?;
                        let banned: bool = try_get(&row, "banned")?;

                        Ok(Session {
                            principal: Principal::new(id, Role::from(role)),
                            banned,
                        })
                    })
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(session)
            }
            .boxed()
        }

        fn create_session(
            &self,
            email: &str,
            name: Option<String>,
            role: &Role,
        ) -> BoxFuture<Result<Uuid, BackendError>> {
            let email = email.to_owned();
            let role = role.as_str().to_owned();

            async move {
                let query = sqlx::query_as(include_str!("queries/create_session.sql"));

                let (token,): (Uuid,) = query
                    .bind(email)
                    .bind(name)
                    .bind(role)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(token)
            }
            .boxed()
        }

        fn count_glossary(&self) -> BoxFuture<Result<i64, BackendError>> {
            async move {
                let query = sqlx::query_as::<_, (i64,)>(include_str!("queries/count_glossary.sql"));

                let (count,) = query.fetch_one(&self.pool).await.map_err(map_sqlx_error)?;

                Ok(count)
            }
            .boxed()
        }

        fn retrieve_glossary(&self) -> BoxFuture<Result<Vec<GlossaryItem>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_glossary.sql"));

                let items = query
                    .try_map(|row: PgRow| glossary_item(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(items)
            }
            .boxed()
        }

        fn retrieve_glossary_by_id(
            &self,
            id: GlossaryId,
        ) -> BoxFuture<Result<Option<GlossaryItem>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_glossary_by_id.sql"));

                let item = query
                    .bind(id)
                    .try_map(|row: PgRow| glossary_item(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(item)
            }
            .boxed()
        }

        fn retrieve_glossary_by_slug(
            &self,
            slug: &str,
        ) -> BoxFuture<Result<Option<GlossaryItem>, BackendError>> {
            let slug = slug.to_owned();

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_glossary_by_slug.sql"));

                let item = query
                    .bind(slug)
                    .try_map(|row: PgRow| glossary_item(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(item)
            }
            .boxed()
        }

        fn insert_recordings(
            &self,
            recordings: Vec<NewRecording>,
        ) -> BoxFuture<Result<Vec<Recording>, BackendError>> {
            async move {
                let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
                let mut created = Vec::with_capacity(recordings.len());

                for new in recordings {
                    let query = sqlx::query_as(include_str!("queries/create_recording.sql"));

                    let (created_at,): (OffsetDateTime,) = query
                        .bind(new.id)
                        .bind(new.user_id)
                        .bind(new.glossary_id)
                        .bind(&new.storage_key)
                        .bind(&new.filename)
                        .bind(&new.content_type)
                        .bind(&new.metadata)
                        .fetch_one(&mut tx)
                        .await
                        .map_err(map_sqlx_error)?;

                    created.push(Recording {
                        id: new.id,
                        user_id: new.user_id,
                        glossary_id: new.glossary_id,
                        storage_key: new.storage_key,
                        filename: new.filename,
                        content_type: new.content_type,
                        status: RecordingStatus::Uploading,
                        metadata: new.metadata,
                        created_at,
                    });
                }

                tx.commit().await.map_err(map_sqlx_error)?;

                Ok(created)
            }
            .boxed()
        }

        fn retrieve_recording(&self, id: &Uuid) -> BoxFuture<Result<Option<Recording>, BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_recording.sql"));

                let recording = query
                    .bind(id)
                    .try_map(|row: PgRow| recording(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(recording)
            }
            .boxed()
        }

        fn confirm_recordings(
            &self,
            user_id: &Uuid,
            ids: &[Uuid],
            now: OffsetDateTime,
        ) -> BoxFuture<Result<Contribution, BackendError>> {
            let user_id = *user_id;
            let ids = ids.to_vec();

            async move {
                let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

                let confirmed = sqlx::query(include_str!("queries/confirm_recordings.sql"))
                    .bind(&ids)
                    .bind(user_id)
                    .execute(&mut tx)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if usize::try_from(confirmed).ok() != Some(ids.len()) {
                    tx.rollback().await.map_err(map_sqlx_error)?;
                    return Err(BackendError::NotConfirmable);
                }

                // the row lock serializes concurrent confirmations by the
                // same user, so the streak is computed from fresh values
                let stats = sqlx::query(include_str!("queries/lock_user_stats.sql"))
                    .bind(user_id)
                    .try_map(|row: PgRow| user_stats(&row))
                    .fetch_optional(&mut tx)
                    .await
                    .map_err(map_sqlx_error)?
                    .ok_or(BackendError::UserNotFound(user_id))?;

                let (_, contribution) = gamification::contribute(&stats, ids.len(), now);

                sqlx::query(include_str!("queries/record_contribution.sql"))
                    .bind(user_id)
                    .bind(contribution.new_streak)
                    .bind(now)
                    .bind(contribution.points_earned)
                    .execute(&mut tx)
                    .await
                    .map_err(map_sqlx_error)?;

                tx.commit().await.map_err(map_sqlx_error)?;

                Ok(contribution)
            }
            .boxed()
        }

        fn delete_recording(&self, id: &Uuid) -> BoxFuture<Result<(), BackendError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/delete_recording.sql"));

                let count = query
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(BackendError::RecordingNotFound(id))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }

        fn list_recordings(
            &self,
            user_id: &Uuid,
            query: &RecordingQuery,
        ) -> BoxFuture<Result<(Vec<ListedRecording>, i64), BackendError>> {
            let user_id = *user_id;
            let filters = query.clone();

            async move {
                let status = filters.status.map(|s| s.as_str());
                let limit = filters.page.map(|p| i64::from(p.limit));
                let offset = filters.page.map_or(0, |p| p.offset());

                let recordings = sqlx::query(include_str!("queries/list_recordings.sql"))
                    .bind(user_id)
                    .bind(&filters.ids)
                    .bind(filters.glossary_id)
                    .bind(status)
                    .bind(limit)
                    .bind(offset)
                    .try_map(|row: PgRow| {
                        let category: String = try_get(&row, "glossary_category")?;

                        Ok(ListedRecording {
                            recording: recording(&row)?,
                            glossary: GlossaryRef {
                                slug: try_get(&row, "glossary_slug")?,
                                category: parse_column(&category)?,
                            },
                            preview_url: None,
                        })
                    })
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                let (total,): (i64,) = sqlx::query_as(include_str!("queries/count_recordings.sql"))
                    .bind(user_id)
                    .bind(&filters.ids)
                    .bind(filters.glossary_id)
                    .bind(status)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok((recordings, total))
            }
            .boxed()
        }

        fn retrieve_history(
            &self,
            user_id: &Uuid,
        ) -> BoxFuture<Result<Vec<HistoryEntry>, BackendError>> {
            let user_id = *user_id;

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_history.sql"));

                let history: Vec<HistoryEntry> = query
                    .bind(user_id)
                    .try_map(|row: PgRow| {
                        let glossary_id: GlossaryId = try_get(&row, "glossary_id")?;
                        let status: String = try_get(&row, "status")?;

                        Ok((glossary_id, parse_column(&status)?))
                    })
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(history)
            }
            .boxed()
        }

        fn retrieve_user_stats(
            &self,
            user_id: &Uuid,
        ) -> BoxFuture<Result<Option<UserStats>, BackendError>> {
            let user_id = *user_id;

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_user_stats.sql"));

                let stats = query
                    .bind(user_id)
                    .try_map(|row: PgRow| user_stats(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(stats)
            }
            .boxed()
        }

        fn retrieve_profile(
            &self,
            user_id: &Uuid,
        ) -> BoxFuture<Result<Option<Profile>, BackendError>> {
            let user_id = *user_id;

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_profile.sql"));

                let found = query
                    .bind(user_id)
                    .try_map(|row: PgRow| profile(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(found)
            }
            .boxed()
        }

        fn complete_onboarding(
            &self,
            user_id: &Uuid,
            onboarding: &Onboarding,
        ) -> BoxFuture<Result<Option<Profile>, BackendError>> {
            let user_id = *user_id;
            let onboarding = onboarding.clone();

            async move {
                let query = sqlx::query(include_str!("queries/complete_onboarding.sql"));

                let updated = query
                    .bind(user_id)
                    .bind(onboarding.hearing_status.as_str())
                    .bind(onboarding.lsm_variant)
                    .bind(onboarding.age_range)
                    .bind(onboarding.gender)
                    .try_map(|row: PgRow| profile(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(updated)
            }
            .boxed()
        }

        fn sync_user(
            &self,
            user_id: &Uuid,
            name: Option<String>,
        ) -> BoxFuture<Result<Option<Profile>, BackendError>> {
            let user_id = *user_id;

            async move {
                let query = sqlx::query(include_str!("queries/sync_user.sql"));

                let synced = query
                    .bind(user_id)
                    .bind(name)
                    .try_map(|row: PgRow| profile(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(synced)
            }
            .boxed()
        }
    }

    fn glossary_item(row: &PgRow) -> Result<GlossaryItem, sqlx::Error> {
        let category: String = try_get(row, "category")?;
        let visibility: String = try_get(row, "visibility")?;
        let status: String = try_get(row, "status")?;
        let allowed_roles: Vec<String> = try_get(row, "allowed_roles")?;

        Ok(GlossaryItem {
            id: try_get(row, "id")?,
            slug: try_get(row, "slug")?,
            category: parse_column(&category)?,
            priority: try_get(row, "priority")?,
            visibility: parse_column(&visibility)?,
            allowed_roles: allowed_roles.into_iter().map(Role::from).collect(),
            status: parse_column(&status)?,
            video_reference_url: try_get(row, "video_reference_url")?,
        })
    }

    fn recording(row: &PgRow) -> Result<Recording, sqlx::Error> {
        let status: String = try_get(row, "status")?;

        Ok(Recording {
            id: try_get(row, "id")?,
            user_id: try_get(row, "user_id")?,
            glossary_id: try_get(row, "glossary_id")?,
            storage_key: try_get(row, "storage_key")?,
            filename: try_get(row, "filename")?,
            content_type: try_get(row, "content_type")?,
            status: parse_column(&status)?,
            metadata: try_get(row, "metadata")?,
            created_at: try_get(row, "created_at")?,
        })
    }

    fn user_stats(row: &PgRow) -> Result<UserStats, sqlx::Error> {
        Ok(UserStats {
            name: try_get(row, "name")?,
            current_streak: try_get(row, "current_streak")?,
            last_contribution_at: try_get(row, "last_contribution_at")?,
            reputation_score: try_get(row, "reputation_score")?,
        })
    }

    fn profile(row: &PgRow) -> Result<Profile, sqlx::Error> {
        let role: String = try_get(row, "role")?;
        let hearing_status: Option<String> = try_get(row, "hearing_status")?;

        Ok(Profile {
            id: try_get(row, "id")?,
            email: try_get(row, "email")?,
            name: try_get(row, "name")?,
            role: Role::from(role),
            hearing_status: hearing_status.as_deref().map(parse_column).transpose()?,
            lsm_variant: try_get(row, "lsm_variant")?,
            age_range: try_get(row, "age_range")?,
            gender: try_get(row, "gender")?,
            onboarding_completed: try_get(row, "onboarding_completed")?,
            last_login_at: try_get(row, "last_login_at")?,
            created_at: try_get(row, "created_at")?,
        })
    }

    /// Parses a text column holding one of our enumerations.
    fn parse_column<T>(value: &str) -> Result<T, sqlx::Error>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        // the CHECK constraints make this unreachable unless the schema drifts
        value.parse().map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }

    fn try_get<'a, T: sqlx::Type<sqlx::Postgres> + sqlx::decode::Decode<'a, sqlx::Postgres>>(
        row: &'a PgRow,
        column: &str,
    ) -> Result<T, sqlx::Error> {
        use sqlx::prelude::*;

        row.try_get(column)
    }

    fn map_sqlx_error(error: sqlx::Error) -> BackendError {
        use sqlx::Error;

        match error {
            Error::Database(ref e) if e.constraint() == Some(RECORDINGS_ID_CONSTRAINT) => {
                BackendError::RecordingAlreadyExists
            }
            Error::Database(ref e) if e.constraint() == Some(RECORDINGS_STORAGE_KEY_CONSTRAINT) => {
                BackendError::StorageKeyAlreadyExists
            }
            _ => BackendError::Sqlx { source: error },
        }
    }
}
