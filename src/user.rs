use std::fmt;

use serde::{Serialize, Serializer};
use time::OffsetDateTime;
use uuid::Uuid;

/// A role tag attached to a user and matched against catalog restrictions.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Member,
    Admin,
    /// Any other tag, e.g. `INTERPRETER`.
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Member => "MEMBER",
            Role::Admin => "ADMIN",
            Role::Other(tag) => tag,
        }
    }
}

impl From<String> for Role {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "MEMBER" => Role::Member,
            "ADMIN" => Role::Admin,
            _ => Role::Other(tag),
        }
    }
}

impl From<&str> for Role {
    fn from(tag: &str) -> Self {
        Role::from(tag.to_owned())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The authenticated identity a request acts as.
#[derive(Clone, Debug, PartialEq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    /// Privileged principals see the whole catalog regardless of
    /// status or visibility.
    pub fn is_privileged(&self) -> bool {
        self.role == Role::Admin
    }
}

/// What a bearer token resolved to.
#[derive(Clone, Debug)]
pub struct Session {
    pub principal: Principal,
    pub banned: bool,
}

/// The gamification counters of a user.
#[derive(Clone, Debug, PartialEq)]
pub struct UserStats {
    /// The display name, if the identity provider supplied one.
    pub name: Option<String>,

    /// Consecutive calendar days with at least one confirmed upload.
    pub current_streak: i32,

    /// The instant of the most recent confirmation.
    pub last_contribution_at: Option<OffsetDateTime>,

    pub reputation_score: i64,
}

/// How a contributor relates to hearing, asked once during onboarding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HearingStatus {
    Deaf,
    HardOfHearing,
    Hearing,
    Coda,
}

crate::glossary::string_enum!(HearingStatus, "hearing status"; Deaf => "deaf", HardOfHearing => "hard_of_hearing", Hearing => "hearing", Coda => "coda");

/// Validated onboarding answers.
#[derive(Clone, Debug, PartialEq)]
pub struct Onboarding {
    pub hearing_status: HearingStatus,

    /// The regional sign-language variant the user signs.
    pub lsm_variant: String,

    pub age_range: Option<String>,
    pub gender: Option<String>,
}

/// What a user sees about themselves.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub hearing_status: Option<HearingStatus>,
    pub lsm_variant: Option<String>,
    pub age_range: Option<String>,
    pub gender: Option<String>,
    pub onboarding_completed: bool,

    #[serde(serialize_with = "optional_timestamp")]
    pub last_login_at: Option<OffsetDateTime>,

    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
}

fn optional_timestamp<S: Serializer>(
    value: &Option<OffsetDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    value.map(|v| v.unix_timestamp()).serialize(serializer)
}
