use autodca::infra::audit_logger::AuditLogger;
use autodca::infra::contracts::{Address, AuditDecision, AuditEntry};
use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn create_entry(account: &str, decision: AuditDecision) -> AuditEntry {
    let mut entry = AuditEntry::new(Address::new(account), decision);
    entry.job_id = Some(0);
    entry
}

#[test]
fn test_log_single_entry() {
    let temp = TempDir::new().unwrap();
    let logger = AuditLogger::new(temp.path().join("audit.log")).unwrap();

    let mut entry = create_entry("0xsafe", AuditDecision::Allow);
    entry.amount = Some(1_000_000);
    logger.log(&entry).unwrap();

    let entries = logger.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, entry.id);
    assert_eq!(entries[0].amount, Some(1_000_000));
    assert_eq!(entries[0].decision, AuditDecision::Allow);
}

#[test]
fn test_decision_serialized_uppercase() {
    let temp = TempDir::new().unwrap();
    let log_path = temp.path().join("audit.log");
    let logger = AuditLogger::new(&log_path).unwrap();

    let mut entry = create_entry("0xsafe", AuditDecision::Deny);
    entry.error = Some("Unauthorized".to_string());
    logger.log(&entry).unwrap();

    let content = fs::read_to_string(&log_path).unwrap();
    assert!(content.contains("\"decision\":\"DENY\""));
    assert!(!content.contains("\"amount\""));
}

#[test]
fn test_creates_parent_directories() {
    let temp = TempDir::new().unwrap();
    let log_path = temp.path().join("nested").join("dir").join("audit.log");
    let logger = AuditLogger::new(&log_path).unwrap();
    logger.log(&create_entry("0xsafe", AuditDecision::Allow)).unwrap();
    assert!(log_path.exists());
    assert_eq!(logger.path(), log_path.as_path());
}

#[test]
fn test_appends_across_reopen() {
    let temp = TempDir::new().unwrap();
    let log_path = temp.path().join("audit.log");

    {
        let logger = AuditLogger::new(&log_path).unwrap();
        logger.log(&create_entry("0xa", AuditDecision::Allow)).unwrap();
    }
    let logger = AuditLogger::new(&log_path).unwrap();
    logger.log(&create_entry("0xb", AuditDecision::Deny)).unwrap();

    let entries = logger.entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].account, Address::new("0xa"));
    assert_eq!(entries[1].account, Address::new("0xb"));
}

#[test]
fn test_concurrent_logging() {
    let temp = TempDir::new().unwrap();
    let logger = Arc::new(AuditLogger::new(temp.path().join("audit.log")).unwrap());
    let mut handles = vec![];

    for i in 0..10 {
        let logger = Arc::clone(&logger);
        handles.push(thread::spawn(move || {
            for _ in 0..10 {
                logger
                    .log(&create_entry(&format!("0x{}", i), AuditDecision::Allow))
                    .unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(logger.entries().unwrap().len(), 100);
}
