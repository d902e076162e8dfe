use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use rusoto_core::{Region, RusotoError};
use rusoto_credential::AwsCredentials;
use rusoto_s3::util::{PreSignedRequest, PreSignedRequestOption};
use rusoto_s3::{DeleteObjectRequest, GetObjectRequest, PutObjectRequest, S3Client, S3};
use url::Url;
use uuid::Uuid;

use crate::errors::BackendError;
use crate::media::VideoFormat;

#[cfg(test)]
pub(crate) mod mock;

/// How long a signed upload URL stays valid. Also reported to clients
/// as `expiresIn`.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(15 * 60);

/// How long a signed preview URL stays valid.
pub const PREVIEW_URL_TTL: Duration = Duration::from_secs(60 * 60);

/// A storage key together with a URL the client can `PUT` the bytes to.
#[derive(Clone, Debug)]
pub struct UploadTarget {
    pub key: String,
    pub upload_url: Url,
}

pub trait Store: Send + Sync {
    /// Reserves a fresh key under the owner and assignment and signs
    /// an upload URL for it, valid for [`UPLOAD_URL_TTL`].
    fn mint_upload_target(
        &self,
        owner: &Uuid,
        slug: &str,
        format: &VideoFormat,
    ) -> Result<UploadTarget, BackendError>;

    /// Signs a read URL for the given object.
    fn download_url(&self, key: &str, ttl: Duration) -> Result<Url, BackendError>;

    /// Deletes the given object. Deleting an absent object succeeds.
    fn delete(&self, key: &str) -> BoxFuture<Result<(), BackendError>>;
}

/// Builds `raw/{owner}/{slug}/{random}.{extension}`.
pub fn storage_key(owner: &Uuid, slug: &str, extension: &str) -> String {
    format!(
        "raw/{}/{}/{}.{}",
        owner,
        slug,
        Uuid::new_v4().to_hyphenated(),
        extension
    )
}

/// A store backed by S3 or an S3-compatible service such as MinIO.
pub struct S3Store {
    client: Arc<S3Client>,
    bucket: String,
    region: Region,
    credentials: AwsCredentials,
}

impl S3Store {
    /// Creates a new instance.
    pub fn new(
        client: Arc<S3Client>,
        bucket: String,
        region: Region,
        credentials: AwsCredentials,
    ) -> Self {
        Self {
            client,
            bucket,
            region,
            credentials,
        }
    }

    pub fn from_env() -> Result<Self, rusoto_core::request::TlsError> {
        use rusoto_core::request::HttpClient;
        use rusoto_credential::StaticProvider;

        use crate::config::get_variable;

        let access_key = get_variable("S3_ACCESS_KEY");
        let secret_access_key = get_variable("S3_SECRET_ACCESS_KEY");

        let region = Region::Custom {
            name: get_variable("S3_REGION_NAME"),
            endpoint: get_variable("S3_ENDPOINT"),
        };

        let bucket = get_variable("S3_BUCKET_NAME");

        let client = Arc::new(S3Client::new_with(
            HttpClient::new()?,
            StaticProvider::new_minimal(access_key.clone(), secret_access_key.clone()),
            region.clone(),
        ));

        let credentials = AwsCredentials::new(access_key, secret_access_key, None, None);

        Ok(S3Store::new(client, bucket, region, credentials))
    }

    fn sign(&self, request: &impl PreSignedRequest, ttl: Duration) -> Result<Url, BackendError> {
        let option = PreSignedRequestOption { expires_in: ttl };
        let signed = request.get_presigned_url(&self.region, &self.credentials, &option);

        Url::parse(&signed).map_err(|source| BackendError::PresignFailed { source })
    }
}

impl Store for S3Store {
    fn mint_upload_target(
        &self,
        owner: &Uuid,
        slug: &str,
        format: &VideoFormat,
    ) -> Result<UploadTarget, BackendError> {
        let key = storage_key(owner, slug, format.extension);

        let request = PutObjectRequest {
            bucket: self.bucket.clone(),
            key: key.clone(),
            content_type: Some(format.essence.clone()),
            ..Default::default()
        };

        let upload_url = self.sign(&request, UPLOAD_URL_TTL)?;

        Ok(UploadTarget { key, upload_url })
    }

    fn download_url(&self, key: &str, ttl: Duration) -> Result<Url, BackendError> {
        let request = GetObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_owned(),
            ..Default::default()
        };

        self.sign(&request, ttl)
    }

    fn delete(&self, key: &str) -> BoxFuture<Result<(), BackendError>> {
        delete(self, key.to_owned()).boxed()
    }
}

async fn delete(store: &S3Store, key: String) -> Result<(), BackendError> {
    let request = DeleteObjectRequest {
        bucket: store.bucket.clone(),
        key,
        ..Default::default()
    };

    match store.client.delete_object(request).await {
        Ok(_) => Ok(()),
        // S3 answers 204 for absent keys, but some compatible services
        // answer 404
        Err(RusotoError::Unknown(ref response)) if response.status.as_u16() == 404 => Ok(()),
        Err(source) => Err(BackendError::DeleteFailed { source }),
    }
}
