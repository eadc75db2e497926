use parcel_core::{
    open_db_in_memory, CallOptions, CancelToken, DbHandle, InterruptReason, Parcel, ParcelStatus,
    ParcelStore, StoreConfig, StoreError, StoreOperation,
};
use std::time::{Duration, Instant};

fn setup() -> (DbHandle, ParcelStore) {
    let handle = DbHandle::new(open_db_in_memory().unwrap());
    let store = ParcelStore::try_new(handle.clone()).unwrap();
    (handle, store)
}

fn test_parcel() -> Parcel {
    Parcel::registered(1000, "test", "2024-05-01T10:00:00Z")
}

fn parcel_count(handle: &DbHandle) -> i64 {
    handle
        .with_connection(|conn| conn.query_row("SELECT COUNT(*) FROM parcel;", [], |row| row.get(0)))
        .unwrap()
}

#[test]
fn expired_deadline_runs_no_statement() {
    let (handle, store) = setup();
    let bounded = store.with_options(CallOptions::new().with_deadline(Instant::now()));

    let err = bounded.add(&test_parcel()).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Interrupted {
            operation: StoreOperation::Add,
            reason: InterruptReason::DeadlineExceeded,
            ..
        }
    ));
    assert_eq!(err.code(), "deadline_exceeded");
    assert_eq!(parcel_count(&handle), 0);
}

#[test]
fn cancelled_token_leaves_the_row_untouched() {
    let (_, store) = setup();
    let id = store.add(&test_parcel()).unwrap();

    let token = CancelToken::new();
    let bounded = store.with_options(CallOptions::new().with_cancel_token(token.clone()));
    token.cancel();

    let err = bounded.set_status(id, ParcelStatus::Sent).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Interrupted {
            operation: StoreOperation::SetStatus,
            reason: InterruptReason::Cancelled,
            ..
        }
    ));
    assert_eq!(store.get(id).unwrap().status, "registered");
}

#[test]
fn generous_timeout_does_not_affect_results() {
    let (_, store) = setup();
    let token = CancelToken::new();
    let bounded = store.with_options(
        CallOptions::new()
            .with_timeout(Duration::from_secs(30))
            .with_cancel_token(token.clone()),
    );

    let id = bounded.add(&test_parcel()).unwrap();
    bounded.set_status(id, ParcelStatus::Sent).unwrap();
    assert_eq!(bounded.get(id).unwrap().status, "sent");

    // Cancelling a scoped clone must not leak into the base store.
    token.cancel();
    assert!(bounded.get(id).is_err());
    store.set_status(id, ParcelStatus::Delivered).unwrap();
}

#[test]
fn configured_default_timeout_bounds_every_call() {
    let handle = DbHandle::new(open_db_in_memory().unwrap());
    let config = StoreConfig {
        default_timeout_ms: Some(0),
        ..StoreConfig::default()
    };
    let store = ParcelStore::try_with_config(handle, config).unwrap();

    let err = store.get_by_client(1000).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Interrupted {
            reason: InterruptReason::DeadlineExceeded,
            ..
        }
    ));
}

#[test]
fn no_connection_is_reported_before_an_expired_deadline() {
    let store = ParcelStore::unbound().with_options(CallOptions::new().with_deadline(Instant::now()));
    assert!(matches!(store.get(1), Err(StoreError::NoConnection)));
}
