use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Width of the backend key space; prefixed names are trimmed to fit.
pub const ACCOUNT_NAME_MAX_LEN: usize = 32;
pub const COLLECTIVE_ACCOUNT_PREFIX: &str = "town-";
pub const FEDERATION_ACCOUNT_PREFIX: &str = "nation-";

/// The three kinds of economic participant a ledger account can belong to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Individual,
    Collective,
    Federation,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Individual => "individual",
            EntityKind::Collective => "collective",
            EntityKind::Federation => "federation",
        }
    }

    /// Account-name prefix for this kind. Individuals use their raw identifier.
    pub fn account_prefix(self) -> Option<&'static str> {
        match self {
            EntityKind::Individual => None,
            EntityKind::Collective => Some(COLLECTIVE_ACCOUNT_PREFIX),
            EntityKind::Federation => Some(FEDERATION_ACCOUNT_PREFIX),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "individual" => Ok(EntityKind::Individual),
            "collective" => Ok(EntityKind::Collective),
            "federation" => Ok(EntityKind::Federation),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

/// An economic participant. The kind is fixed at construction; only the
/// identifier may change (see [`Entity::rename`]).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Entity {
    kind: EntityKind,
    id: String,
}

impl Entity {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn individual(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Individual, id)
    }

    pub fn collective(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Collective, id)
    }

    pub fn federation(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Federation, id)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Change the identifier. The account name follows on the next lookup.
    pub fn rename(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Canonical backend key for this entity, derived on every call.
    pub fn account_name(&self) -> AccountName {
        resolve_account_name(self)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Backend key addressing a single balance record.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountName(String);

impl AccountName {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AccountName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Map an entity to its backend account name.
///
/// Collectives and federations are prefixed and trimmed to
/// [`ACCOUNT_NAME_MAX_LEN`] characters, dropping the tail of the identifier.
/// Two long identifiers sharing a trimmed prefix address the same record;
/// that collision is left to the backend's key space. Individual identifiers
/// are passed through untouched.
pub fn resolve_account_name(entity: &Entity) -> AccountName {
    match entity.kind.account_prefix() {
        Some(prefix) => {
            let mut name = String::with_capacity(prefix.len() + entity.id.len());
            name.push_str(prefix);
            name.push_str(&entity.id);
            AccountName(trim_max_length(name, ACCOUNT_NAME_MAX_LEN))
        }
        None => AccountName(entity.id.clone()),
    }
}

fn trim_max_length(mut value: String, max_chars: usize) -> String {
    if let Some((cut, _)) = value.char_indices().nth(max_chars) {
        value.truncate(cut);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn individual_name_is_raw_identifier() {
        let name = resolve_account_name(&Entity::individual("Steve"));
        assert_eq!(name.as_str(), "Steve");
    }

    #[test]
    fn individual_name_is_never_trimmed() {
        let id = "an-individual-with-a-name-longer-than-the-key-space";
        assert_eq!(Entity::individual(id).account_name().as_str(), id);
    }

    #[test]
    fn collective_name_is_prefixed() {
        assert_eq!(
            Entity::collective("Riverside").account_name().as_str(),
            "town-Riverside"
        );
    }

    #[test]
    fn long_federation_name_keeps_prefix_and_trims_tail() {
        let name = Entity::federation("Atlantis-with-a-very-long-name-indeed").account_name();
        assert_eq!(name.as_str().chars().count(), ACCOUNT_NAME_MAX_LEN);
        assert!(name.as_str().starts_with("nation-"));
        assert_eq!(name.as_str(), "nation-Atlantis-with-a-very-long");
    }

    #[test]
    fn trimming_counts_characters_not_bytes() {
        let name = Entity::collective("ÄÖÜäöüßÄÖÜäöüßÄÖÜäöüßÄÖÜäöüß").account_name();
        assert_eq!(name.as_str().chars().count(), ACCOUNT_NAME_MAX_LEN);
        assert!(name.as_str().starts_with("town-"));
    }

    #[test]
    fn long_names_sharing_a_prefix_collide() {
        let a = Entity::collective("Northwatch-upon-the-great-river-east");
        let b = Entity::collective("Northwatch-upon-the-great-river-west");
        assert_eq!(a.account_name(), b.account_name());
    }

    #[test]
    fn rename_changes_account_but_not_kind() {
        let mut entity = Entity::collective("Oldtown");
        let before = entity.account_name();
        entity.rename("Newtown");
        assert_eq!(entity.kind(), EntityKind::Collective);
        assert_ne!(before, entity.account_name());
        assert_eq!(entity.account_name().as_str(), "town-Newtown");
    }

    #[test]
    fn kind_parses_from_its_label() {
        for kind in [
            EntityKind::Individual,
            EntityKind::Collective,
            EntityKind::Federation,
        ] {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("guild".parse::<EntityKind>().is_err());
    }
}
