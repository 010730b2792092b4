//! Record store: CRUD over medical records keyed by `(dataType, patientId)`.

use ehrgate_core::{DataType, Record};

use crate::error::StorageError;
use crate::keys::{encode_key, encode_prefix};
use crate::scan::ScanGuard;
use crate::traits::LedgerStore;
use crate::StorageResult;

/// Object-type tag of record keys.
pub const RECORD_OBJECT_TYPE: &str = "record";

/// CRUD mediator over the raw ledger primitives for [`Record`]s.
pub struct RecordStore<'a> {
    store: &'a dyn LedgerStore,
}

impl<'a> RecordStore<'a> {
    pub fn new(store: &'a dyn LedgerStore) -> Self {
        Self { store }
    }

    fn key(data_type: DataType, patient_id: &str) -> StorageResult<String> {
        encode_key(RECORD_OBJECT_TYPE, &[data_type.as_str(), patient_id])
    }

    /// Reads a record, returning `None` if absent.
    pub fn find(&self, data_type: DataType, patient_id: &str) -> StorageResult<Option<Record>> {
        let key = Self::key(data_type, patient_id)?;
        match self.store.get_state(&key)? {
            Some(bytes) => Ok(Some(Record::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reads a record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    pub fn get(&self, data_type: DataType, patient_id: &str) -> StorageResult<Record> {
        self.find(data_type, patient_id)?
            .ok_or_else(|| StorageError::not_found(RECORD_OBJECT_TYPE, describe(data_type, patient_id)))
    }

    pub fn exists(&self, data_type: DataType, patient_id: &str) -> StorageResult<bool> {
        let key = Self::key(data_type, patient_id)?;
        Ok(self.store.get_state(&key)?.is_some())
    }

    /// Writes a full overwrite of the record into the write-set.
    pub fn put(&self, data_type: DataType, patient_id: &str, record: &Record) -> StorageResult<()> {
        if record.data_type != data_type || record.patient_id != patient_id {
            return Err(StorageError::internal(format!(
                "record {}/{} written under key {}",
                record.data_type,
                record.patient_id,
                describe(data_type, patient_id)
            )));
        }
        let key = Self::key(data_type, patient_id)?;
        self.store.put_state(&key, record.to_bytes()?)
    }

    /// Writes a new record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the key is taken.
    pub fn create(&self, record: &Record) -> StorageResult<()> {
        if self.exists(record.data_type, &record.patient_id)? {
            return Err(StorageError::already_exists(
                RECORD_OBJECT_TYPE,
                describe(record.data_type, &record.patient_id),
            ));
        }
        self.put(record.data_type, &record.patient_id, record)
    }

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    pub fn delete(&self, data_type: DataType, patient_id: &str) -> StorageResult<()> {
        if !self.exists(data_type, patient_id)? {
            return Err(StorageError::not_found(
                RECORD_OBJECT_TYPE,
                describe(data_type, patient_id),
            ));
        }
        let key = Self::key(data_type, patient_id)?;
        self.store.delete_state(&key)
    }

    /// Lazily scans every record of `data_type`.
    ///
    /// The scan is single-pass and releases its handle when the returned
    /// iterator is dropped.
    pub fn scan_all(&self, data_type: DataType) -> StorageResult<RecordScan<'a>> {
        let prefix = encode_prefix(RECORD_OBJECT_TYPE, &[data_type.as_str()])?;
        Ok(RecordScan {
            scan: ScanGuard::open(self.store, &prefix)?,
        })
    }
}

/// Lazy sequence of records produced by [`RecordStore::scan_all`].
pub struct RecordScan<'a> {
    scan: ScanGuard<'a>,
}

impl RecordScan<'_> {
    /// Closes the scan early, surfacing any close failure.
    pub fn close(self) -> StorageResult<()> {
        self.scan.close()
    }
}

impl Iterator for RecordScan<'_> {
    type Item = StorageResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.scan.next()?;
        Some(item.and_then(|(_, bytes)| Ok(Record::from_bytes(&bytes)?)))
    }
}

fn describe(data_type: DataType, patient_id: &str) -> String {
    format!("{data_type}/{patient_id}")
}
