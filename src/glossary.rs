
use serde::Serialize;

use crate::user::{Principal, Role};

/// An ID in the catalog.
pub type GlossaryId = i32;

/// The thematic group a term belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Social,
    Verb,
    Context,
    Question,
}

/// Who may see a catalog entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    Public,
    RoleRestricted,
}

/// Whether a catalog entry is currently offered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CatalogStatus {
    Active,
    Inactive,
}

/// Raised when a stored enumeration value is not recognized.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized {kind} value {value:?}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

macro_rules! string_enum {
    ($name:ident, $kind:expr; $($variant:ident => $text:literal),+) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::glossary::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err($crate::glossary::UnknownVariant::new($kind, s)),
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use string_enum;

string_enum!(Category, "category"; Social => "social", Verb => "verb", Context => "context", Question => "question");
string_enum!(Visibility, "visibility"; Public => "PUBLIC", RoleRestricted => "ROLE_RESTRICTED");
string_enum!(CatalogStatus, "catalog status"; Active => "ACTIVE", Inactive => "INACTIVE");

/// A single term in the catalog. Read-only to this service.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryItem {
    pub id: GlossaryId,

    /// Unique and URL-safe.
    pub slug: String,

    pub category: Category,

    /// 1 is the most urgent.
    pub priority: i32,

    #[serde(skip_serializing)]
    pub visibility: Visibility,

    #[serde(skip_serializing)]
    pub allowed_roles: Vec<Role>,

    #[serde(skip_serializing)]
    pub status: CatalogStatus,

    pub video_reference_url: Option<String>,
}

impl GlossaryItem {
    /// Whether `principal` may be assigned this term.
    pub fn is_visible_to(&self, principal: &Principal) -> bool {
        if principal.is_privileged() {
            return true;
        }

        self.status == CatalogStatus::Active
            && (self.visibility == Visibility::Public || self.allowed_roles.contains(&principal.role))
    }
}

#[cfg(test)]
pub(crate) fn item(id: GlossaryId, slug: &str, priority: i32) -> GlossaryItem {
    GlossaryItem {
        id,
        slug: slug.to_owned(),
        category: Category::Social,
        priority,
        visibility: Visibility::Public,
        allowed_roles: vec![],
        status: CatalogStatus::Active,
        video_reference_url: None,
    }
}
