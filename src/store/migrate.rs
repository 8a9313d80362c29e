use crate::monitor::types::Series;
use crate::store::codec;
use crate::store::{Store, StoreError};

const VERSION_KEY: &str = "_meta:version";

type MigrationFn = fn(&Store) -> Result<(), StoreError>;

fn migrations() -> Vec<(&'static str, MigrationFn)> {
    vec![
        ("001_initial", m001_initial),
        ("002_drop_unreadable_raw_members", m002_drop_unreadable_raw_members),
    ]
}

/// Apply every migration newer than the stored version.
///
/// Migrations must be idempotent: a crash between `func()` and `set_version()`
/// re-runs the step on the next start. The version only moves forward.
pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    let all = migrations();

    for (index, (name, func)) in all.iter().enumerate() {
        let version = (index + 1) as u32;
        if version > current {
            tracing::info!(version, name, "Running migration");
            func(store)?;
            set_version(store, version)?;
            tracing::info!(version, name, "Migration complete");
        } else {
            tracing::debug!(version, name, "Migration already applied, skipping");
        }
    }

    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    match store.meta.get(VERSION_KEY.as_bytes())? {
        Some(raw) => {
            let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| StoreError::Migration {
                version: 0,
                message: format!("unreadable schema version ({} bytes)", raw.len()),
            })?;
            Ok(u32::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("Refuse to downgrade from {} to {}", current, version),
        });
    }

    store
        .meta
        .insert(VERSION_KEY.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

fn m001_initial(_store: &Store) -> Result<(), StoreError> {
    Ok(())
}

/// Raw members that cannot be decoded would otherwise be skipped (and logged)
/// by every report build until the aggregator deletes them.
fn m002_drop_unreadable_raw_members(store: &Store) -> Result<(), StoreError> {
    for series in Series::ALL {
        let tree = store.raw_tree(series);
        let mut batch = sled::Batch::default();
        let mut dropped = 0usize;
        for item in tree.iter() {
            let (key, value) = item?;
            let readable = std::str::from_utf8(&value)
                .ok()
                .map(|raw| codec::decode_member(series, raw).is_ok())
                .unwrap_or(false);
            if !readable {
                batch.remove(key);
                dropped += 1;
            }
        }
        tree.apply_batch(batch)?;
        if dropped > 0 {
            tracing::warn!(series = %series, dropped, "Dropped unreadable raw members");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn migrations_are_recorded_and_not_downgraded() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("migrate-db").to_str().unwrap()).unwrap();

        run(&store).unwrap();
        let version = get_current_version(&store).unwrap();
        assert_eq!(version as usize, migrations().len());

        run(&store).unwrap();
        assert_eq!(get_current_version(&store).unwrap(), version);

        assert!(matches!(
            set_version(&store, version - 1),
            Err(StoreError::Migration { .. })
        ));
    }

    #[test]
    fn unreadable_raw_members_are_removed() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("migrate-db-2").to_str().unwrap()).unwrap();
        store
            .queue_length_raw
            .insert(b"00000000000000000001:1", b"1~5".as_slice())
            .unwrap();
        store
            .queue_length_raw
            .insert(b"00000000000000000002:2", b"not-a-member".as_slice())
            .unwrap();

        run(&store).unwrap();

        assert_eq!(store.queue_length_raw.len(), 1);
    }
}
