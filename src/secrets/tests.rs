use super::*;

const TEST_SERVICE: &str = "crm-screen-pop-test";

/// Drop guard that removes the test secret from the keychain when it goes
/// out of scope, even if the test panics.
struct TestSecret(String);

impl TestSecret {
    fn new(suffix: &str) -> Self {
        let name = format!("__test_{}", suffix);
        let _ = KeyringStore::with_service(TEST_SERVICE).delete(&name);
        Self(name)
    }

    fn name(&self) -> &str {
        &self.0
    }
}

impl Drop for TestSecret {
    fn drop(&mut self) {
        let _ = KeyringStore::with_service(TEST_SERVICE).delete(&self.0);
    }
}

#[test]
#[ignore] // needs a real OS keychain
fn keyring_store_and_retrieve_roundtrip() {
    let secret = TestSecret::new("roundtrip");
    let store = KeyringStore::with_service(TEST_SERVICE);

    store.set(secret.name(), "hello-world").unwrap();

    assert_eq!(store.get(secret.name()).unwrap().as_deref(), Some("hello-world"));
}

#[test]
#[ignore] // needs a real OS keychain
fn keyring_missing_secret_is_none() {
    let secret = TestSecret::new("missing");
    let store = KeyringStore::with_service(TEST_SERVICE);

    assert_eq!(store.get(secret.name()).unwrap(), None);
}

#[test]
#[ignore] // needs a real OS keychain
fn keyring_delete_missing_is_ok() {
    let secret = TestSecret::new("delete-missing");
    let store = KeyringStore::with_service(TEST_SERVICE);

    assert!(store.delete(secret.name()).is_ok());
}

#[test]
fn memory_overwrite_replaces_value() {
    let store = MemoryStore::new();

    store.set(USERNAME, "first").unwrap();
    store.set(USERNAME, "second").unwrap();

    assert_eq!(store.get(USERNAME).unwrap().as_deref(), Some("second"));
}

#[test]
fn memory_delete_removes_value() {
    let store = MemoryStore::new();
    store.set(AUTH, "token").unwrap();

    store.delete(AUTH).unwrap();
    store.delete(AUTH).unwrap();

    assert_eq!(store.get(AUTH).unwrap(), None);
}
