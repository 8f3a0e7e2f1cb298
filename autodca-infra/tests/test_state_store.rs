use autodca::infra::contracts::{Address, GrantScope, JobDefinition, Selector};
use autodca::infra::job_registry::JobRegistry;
use autodca::infra::nonce_manager::NonceManager;
use autodca::infra::session_registry::SessionKeyRegistry;
use autodca::infra::state_store::{EngineState, StateStore, StateStoreError};
use std::fs;
use tempfile::TempDir;

fn populated_state() -> EngineState {
    let account = Address::new("0xsafe");
    let grants = SessionKeyRegistry::new();
    grants
        .enable(
            &account,
            &Address::new("0xkey"),
            GrantScope {
                target: Address::new("0xexecutor"),
                selector: Selector::from_signature("executeJob(uint256)"),
                valid_after: 0,
                valid_until: 100,
            },
        )
        .unwrap();

    let jobs = JobRegistry::new();
    let job = jobs
        .create(
            &account,
            JobDefinition {
                source_token: Address::new("0xusdc"),
                destination_token: Address::new("0xwmatic"),
                destination_vault: Address::new("0xvault"),
                limit_amount: u128::from(u64::MAX) * 4,
                used_amount: 0,
                valid_after: 0,
                valid_until: 100,
                last_executed: 0,
                refresh_interval: 10,
            },
        )
        .unwrap();
    jobs.record_execution(job.id, 5_000, 20).unwrap();

    let nonces = NonceManager::new();
    nonces.consume(&account, "session:0xkey", 0).unwrap();

    EngineState::new(grants.snapshot(), jobs.snapshot(), nonces.snapshot())
}

#[test]
fn test_load_missing_file() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path().join("state.json")).unwrap();
    assert!(store.load().unwrap().is_none());
}

#[test]
fn test_save_and_load() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path().join("state.json")).unwrap();
    let state = populated_state();

    store.save(&state).unwrap();
    let loaded = store.load().unwrap().unwrap();

    assert_eq!(loaded, state);
    assert_eq!(loaded.jobs.jobs[0].used_amount, 5_000);
    assert_eq!(loaded.jobs.jobs[0].limit_amount, u128::from(u64::MAX) * 4);
}

#[test]
fn test_save_overwrites_and_leaves_no_temp_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state.json");
    let store = StateStore::new(&path).unwrap();

    store.save(&populated_state()).unwrap();
    let empty = EngineState::new(vec![], Default::default(), vec![]);
    store.save(&empty).unwrap();

    let loaded = store.load().unwrap().unwrap();
    assert!(loaded.grants.is_empty());
    assert!(loaded.jobs.jobs.is_empty());
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn test_rejects_unknown_schema_version() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state.json");
    let store = StateStore::new(&path).unwrap();

    let mut state = populated_state();
    state.schema_version = 99;
    store.save(&state).unwrap();

    assert!(matches!(
        store.load(),
        Err(StateStoreError::UnsupportedVersion(99))
    ));
}

#[test]
fn test_corrupted_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state.json");
    fs::write(&path, "{ not json").unwrap();

    let store = StateStore::new(&path).unwrap();
    assert!(matches!(store.load(), Err(StateStoreError::Json(_))));
}
