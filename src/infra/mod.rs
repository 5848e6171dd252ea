pub(crate) mod app_paths;
pub(crate) mod credential_store;
pub(crate) mod settings;
