//! Entity identities, account naming and context lookup shared by Hamlet crates.

mod context;
mod entity;

pub use context::{
    resolve_context, Context, DirectoryError, DirectoryResult, EntityDirectory, MemoryDirectory,
};
pub use entity::{
    resolve_account_name, AccountName, Entity, EntityKind, ACCOUNT_NAME_MAX_LEN,
    COLLECTIVE_ACCOUNT_PREFIX, FEDERATION_ACCOUNT_PREFIX,
};
