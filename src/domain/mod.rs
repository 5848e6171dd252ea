//! Usage: Domain modules (scopes, credential snapshots, key files, introspection results).

pub(crate) mod credential;
pub(crate) mod key_files;
pub(crate) mod scopes;
pub(crate) mod token_info;
