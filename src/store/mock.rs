use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use rusoto_core::RusotoError;
use url::Url;
use uuid::Uuid;

use crate::errors::BackendError;
use crate::media::VideoFormat;
use crate::store::{storage_key, Store, UploadTarget};

/// An in-memory store that signs nothing and can be told to fail.
#[derive(Default)]
pub(crate) struct MockStore {
    pub(crate) minted: Mutex<Vec<String>>,
    pub(crate) deleted: Mutex<Vec<String>>,
    fail_after: Mutex<Option<usize>>,
    failing_deletes: Mutex<HashSet<String>>,
    failing_previews: Mutex<HashSet<String>>,
}

impl MockStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// Makes every mint after the first `successes` fail.
    pub fn fail_mints_after(&self, successes: usize) {
        *self.fail_after.lock().unwrap() = Some(successes);
    }

    pub fn fail_delete_of(&self, key: &str) {
        self.failing_deletes.lock().unwrap().insert(key.to_owned());
    }

    pub fn fail_preview_of(&self, key: &str) {
        self.failing_previews.lock().unwrap().insert(key.to_owned());
    }

    fn fake_url(verb: &str, key: &str, ttl: Duration) -> Url {
        Url::parse(&format!(
            "https://storage.test/bucket/{}?verb={}&expires={}",
            key,
            verb,
            ttl.as_secs()
        ))
        .expect("build fake storage URL")
    }
}

fn unavailable() -> BackendError {
    BackendError::PresignFailed {
        source: url::ParseError::EmptyHost,
    }
}

impl Store for MockStore {
    fn mint_upload_target(
        &self,
        owner: &Uuid,
        slug: &str,
        format: &VideoFormat,
    ) -> Result<UploadTarget, BackendError> {
        let mut minted = self.minted.lock().unwrap();

        if let Some(limit) = *self.fail_after.lock().unwrap() {
            if minted.len() >= limit {
                return Err(unavailable());
            }
        }

        let key = storage_key(owner, slug, format.extension);
        minted.push(key.clone());

        Ok(UploadTarget {
            upload_url: Self::fake_url("put", &key, super::UPLOAD_URL_TTL),
            key,
        })
    }

    fn download_url(&self, key: &str, ttl: Duration) -> Result<Url, BackendError> {
        if self.failing_previews.lock().unwrap().contains(key) {
            return Err(unavailable());
        }

        Ok(Self::fake_url("get", key, ttl))
    }

    fn delete(&self, key: &str) -> BoxFuture<Result<(), BackendError>> {
        let key = key.to_owned();

        async move {
            if self.failing_deletes.lock().unwrap().contains(&key) {
                return Err(BackendError::DeleteFailed {
                    source: RusotoError::Validation("simulated outage".to_owned()),
                });
            }

            self.deleted.lock().unwrap().push(key);

            Ok(())
        }
        .boxed()
    }
}
