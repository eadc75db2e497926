use parcel_core::{
    open_db, open_db_in_memory, DbHandle, Parcel, ParcelRepository, ParcelStatus, ParcelStore,
    SqliteParcelRepository, StoreError, StoreResult,
};
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

fn test_parcel() -> Parcel {
    Parcel::registered(1000, "test", "2024-05-01T10:00:00Z")
}

/// A store with its own connection to the database file at `path`.
fn connect(path: &Path) -> ParcelStore {
    ParcelStore::try_new(DbHandle::new(open_db(path).unwrap())).unwrap()
}

fn race<F>(stores: Vec<ParcelStore>, action: F) -> Vec<StoreResult<()>>
where
    F: Fn(&ParcelStore) -> StoreResult<()> + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(stores.len()));
    let action = Arc::new(action);
    let workers: Vec<_> = stores
        .into_iter()
        .map(|store| {
            let barrier = Arc::clone(&barrier);
            let action = Arc::clone(&action);
            thread::spawn(move || {
                barrier.wait();
                action(&store)
            })
        })
        .collect();

    workers
        .into_iter()
        .map(|worker| worker.join().unwrap())
        .collect()
}

#[test]
fn conditional_writes_refuse_rows_changed_since_the_check() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();
    let id = repo.insert_parcel(&test_parcel()).unwrap();

    // Another writer moves the parcel on after our status read.
    conn.execute("UPDATE parcel SET status = 'sent' WHERE number = ?1;", [id])
        .unwrap();

    assert!(!repo
        .update_status_if(id, ParcelStatus::Registered, ParcelStatus::Sent)
        .unwrap());
    assert!(!repo
        .update_address_if(id, ParcelStatus::Registered, "elsewhere")
        .unwrap());
    assert!(!repo.delete_if(id, ParcelStatus::Registered).unwrap());

    let parcel = repo.get_parcel(id).unwrap().unwrap();
    assert_eq!(parcel.status, "sent");
    assert_eq!(parcel.address, "test");
}

#[test]
fn racing_status_updates_from_separate_connections_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parcels.db");
    let first = connect(&path);
    let second = connect(&path);
    let id = first.add(&test_parcel()).unwrap();

    let results = race(vec![first.clone(), second], move |store| {
        store.set_status(id, ParcelStatus::Sent)
    });

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    for result in results {
        if let Err(err) = result {
            assert!(
                matches!(
                    err,
                    StoreError::ConcurrentModification { .. }
                        | StoreError::InvalidStatusTransition { .. }
                ),
                "unexpected error: {err}"
            );
        }
    }
    assert_eq!(first.get(id).unwrap().status, "sent");
}

#[test]
fn racing_deletes_from_separate_connections_remove_the_row_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parcels.db");
    let first = connect(&path);
    let second = connect(&path);
    let id = first.add(&test_parcel()).unwrap();

    let results = race(vec![first.clone(), second], move |store| store.delete(id));

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    for result in results {
        if let Err(err) = result {
            assert!(
                matches!(
                    err,
                    StoreError::ConcurrentModification { .. } | StoreError::NotFound(_)
                ),
                "unexpected error: {err}"
            );
        }
    }
    assert!(matches!(first.get(id), Err(StoreError::NotFound(_))));
}

#[test]
fn one_store_is_shared_by_many_threads() {
    let store = ParcelStore::try_new(DbHandle::new(open_db_in_memory().unwrap())).unwrap();
    let client = 31;

    let workers: Vec<_> = (0..8)
        .map(|index| {
            let store = store.clone();
            thread::spawn(move || {
                let parcel = Parcel::registered(client, format!("address {index}"), "2024-05-01T10:00:00Z");
                let id = store.add(&parcel).unwrap();
                store.set_status(id, ParcelStatus::Sent).unwrap();
                id
            })
        })
        .collect();
    let ids: Vec<_> = workers
        .into_iter()
        .map(|worker| worker.join().unwrap())
        .collect();

    let stored = store.get_by_client(client).unwrap();
    assert_eq!(stored.len(), ids.len());
    assert!(stored.iter().all(|parcel| parcel.status == "sent"));
}
