use skiff_core::{
    FileRef, Namespace, OperationError, OperationKind, SchedConfig, SchedConfigBuilder,
    TransferError,
};

#[test]
fn test_file_ref_constructors() {
    let local = FileRef::local("/home/user/file.txt");
    assert_eq!(local.namespace, Namespace::Local);
    assert_eq!(local.path().to_str(), Some("/home/user/file.txt"));

    let remote = FileRef::remote("/srv/incoming/file.txt");
    assert_eq!(remote.namespace, Namespace::Remote);

    // Same path, different namespace: different identity.
    assert_ne!(FileRef::local("/x"), FileRef::remote("/x"));
}

#[test]
fn test_file_ref_serde_round_trip() {
    let original = FileRef::remote("/srv/data");
    let json = serde_json::to_string(&original).unwrap();
    let decoded: FileRef = serde_json::from_str(&json).unwrap();
    assert_eq!(original, decoded);
}

#[test]
fn test_operation_kind_display() {
    assert_eq!(OperationKind::Copy.to_string(), "Copy");
    assert_eq!(OperationKind::Move.to_string(), "Move");
    assert_eq!(OperationKind::Remove.to_string(), "Remove");
}

#[test]
fn test_operation_error_display() {
    let err = OperationError::new("/srv/a.txt", "read failed");
    assert_eq!(err.to_string(), "/srv/a.txt: read failed");
}

#[test]
fn test_config_from_json_uses_defaults() {
    let config: SchedConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config.max_displayed_errors, 5);
    assert_eq!(config.error_poll_ms, 250);
}

#[test]
fn test_config_builder_overrides() {
    let config = SchedConfigBuilder::default()
        .max_displayed_errors(3usize)
        .error_poll_ms(10u64)
        .build()
        .unwrap();
    assert_eq!(config.max_displayed_errors, 3);
    assert_eq!(config.error_poll_ms, 10);
}

#[test]
fn test_transfer_error_session() {
    let err = TransferError::session("connection reset");
    assert_eq!(err.to_string(), "Session error: connection reset");
}
