use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use oauth2l_lib::{
    parse_client_secrets, parse_service_account_key, InstalledClient, Oauth2lSettings,
    ServiceAccountKey,
};
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct EnvRestore {
    saved: Vec<(&'static str, Option<OsString>)>,
}

impl EnvRestore {
    fn save_once(&mut self, key: &'static str) {
        if self.saved.iter().any(|(k, _)| *k == key) {
            return;
        }
        self.saved.push((key, std::env::var_os(key)));
    }

    fn set_var(&mut self, key: &'static str, value: impl Into<OsString>) {
        self.save_once(key);
        std::env::set_var(key, value.into());
    }

    fn remove_var(&mut self, key: &'static str) {
        self.save_once(key);
        std::env::remove_var(key);
    }
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..).rev() {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

/// Isolated HOME plus a scrubbed credential environment, restored on drop.
pub struct TestHome {
    _lock: MutexGuard<'static, ()>,
    env: EnvRestore,
    home: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        let lock = env_lock();
        let home = tempfile::tempdir().expect("tempdir");

        let mut env = EnvRestore::default();
        let home_os = home.path().as_os_str().to_os_string();

        env.set_var("HOME", home_os.clone());
        // Windows fallback env for `dirs`.
        env.set_var("USERPROFILE", home_os.clone());
        env.set_var("APPDATA", home_os);

        env.remove_var("GOOGLE_APPLICATION_CREDENTIALS");
        env.remove_var("OAUTH2L_CONFIG");
        env.remove_var("OAUTH2L_LOG");

        Self {
            _lock: lock,
            env,
            home,
        }
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        self.home.path()
    }

    #[allow(dead_code)]
    pub fn store_path(&self) -> PathBuf {
        self.home.path().join(".oauth2l.token")
    }

    #[allow(dead_code)]
    pub fn set_var(&mut self, key: &'static str, value: impl Into<OsString>) {
        self.env.set_var(key, value);
    }
}

impl Default for TestHome {
    fn default() -> Self {
        Self::new()
    }
}

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[allow(dead_code)]
pub fn fixture_json(name: &str) -> serde_json::Value {
    let bytes = std::fs::read(fixture_path(name)).expect("read fixture");
    serde_json::from_slice(&bytes).expect("fixture json")
}

/// Fixture service account whose token endpoint points at `token_uri`.
#[allow(dead_code)]
pub fn service_account_key(token_uri: &str) -> ServiceAccountKey {
    let mut value = fixture_json("service_account.json");
    value["token_uri"] = serde_json::Value::from(token_uri);
    parse_service_account_key(value).expect("service account fixture")
}

#[allow(dead_code)]
pub fn installed_client(token_uri: &str) -> InstalledClient {
    let mut value = fixture_json("client_secrets.json");
    value["installed"]["token_uri"] = serde_json::Value::from(token_uri);
    parse_client_secrets(value).expect("client secrets fixture")
}

#[allow(dead_code)]
pub fn settings() -> Oauth2lSettings {
    Oauth2lSettings {
        user_agent: "oauth2l/test".to_string(),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn scopes(raw: &[&str]) -> Vec<String> {
    oauth2l_lib::expand_scopes(raw)
}
