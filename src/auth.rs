use uuid::Uuid;

use crate::db::Db;
use crate::errors::BackendError;
use crate::user::Principal;

/// Extracts the session token from an `Authorization: Bearer ...` value.
pub fn bearer_token(header: &str) -> Option<Uuid> {
    let mut parts = header.trim().splitn(2, ' ');

    let scheme = parts.next()?;
    let token = parts.next()?.trim();

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    Uuid::parse_str(token).ok()
}

/// Resolves the `Authorization` header of a request to the principal it
/// acts as.
pub async fn authenticate(db: &dyn Db, header: Option<&str>) -> Result<Principal, BackendError> {
    let token = header
        .and_then(bearer_token)
        .ok_or(BackendError::Unauthenticated)?;

    let session = db
        .authenticate(&token)
        .await?
        .ok_or(BackendError::Unauthenticated)?;

    if session.banned {
        return Err(BackendError::Suspended);
    }

    Ok(session.principal)
}
