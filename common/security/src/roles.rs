use common_auth::{ROLE_ADMIN, ROLE_ADVERTISER, ROLE_USER};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Role stored on an account record. Unrecognised strings are kept so the
/// record round-trips, but they grant nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccountRole {
    Admin,
    Advertiser,
    User,
    Unknown(String),
}

impl AccountRole {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            ROLE_ADMIN => AccountRole::Admin,
            ROLE_ADVERTISER => AccountRole::Advertiser,
            ROLE_USER => AccountRole::User,
            other => AccountRole::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AccountRole::Admin => ROLE_ADMIN,
            AccountRole::Advertiser => ROLE_ADVERTISER,
            AccountRole::User => ROLE_USER,
            AccountRole::Unknown(other) => other,
        }
    }
}

impl Serialize for AccountRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AccountRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(AccountRole::parse(&raw))
    }
}
