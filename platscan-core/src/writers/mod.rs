//! Storage writers
//!
//! Every persisted record is handed to each configured writer in turn.
//! Writers are independent: a failing backend logs at error severity and
//! reports `false`, it never stops its siblings.

pub mod document_store;
pub mod file;

pub use document_store::{DocumentCollection, DocumentStoreWriter};
pub use file::FileWriter;

#[cfg(feature = "mongo")]
pub use document_store::MongoCollection;

use crate::config::WriterConfig;
use crate::logging::EventLog;
use crate::types::DocumentRecord;
use anyhow::Result;

/// Storage abstraction for finished records
pub trait StorageWriter: Send + Sync {
    /// Persist one record. Returns whether the backend confirmed the write;
    /// errors are logged on `log`, never returned.
    fn save(&self, record: &DocumentRecord, log: &dyn EventLog) -> bool;

    /// Destination descriptor used in log lines
    fn describe(&self) -> String;

    /// True when every record lands on the same destination, so two
    /// concurrent saves would overwrite each other
    fn shares_destination(&self) -> bool {
        false
    }
}

/// Build one writer per config entry, in config order
pub fn build_writers(configs: &[WriterConfig], log: &dyn EventLog) -> Result<Vec<Box<dyn StorageWriter>>> {
    let mut writers: Vec<Box<dyn StorageWriter>> = Vec::with_capacity(configs.len());

    for config in configs {
        let writer: Box<dyn StorageWriter> = match config {
            WriterConfig::File { uri, create_dirs } => {
                Box::new(FileWriter::new(uri.as_str()).with_create_dirs(*create_dirs))
            }
            WriterConfig::Mongo { .. } => build_mongo_writer(config)?,
        };
        log.info(&format!("Configured writer {}", writer.describe()));
        writers.push(writer);
    }

    Ok(writers)
}

#[cfg(feature = "mongo")]
fn build_mongo_writer(config: &WriterConfig) -> Result<Box<dyn StorageWriter>> {
    use std::time::Duration;

    let WriterConfig::Mongo {
        host,
        database,
        collection,
        server_selection_timeout_secs,
    } = config
    else {
        anyhow::bail!("not a mongo writer config: {config:?}");
    };

    let collection = MongoCollection::connect(
        host,
        database,
        collection,
        Duration::from_secs(*server_selection_timeout_secs),
    )?;
    Ok(Box::new(DocumentStoreWriter::new(collection)))
}

#[cfg(not(feature = "mongo"))]
fn build_mongo_writer(config: &WriterConfig) -> Result<Box<dyn StorageWriter>> {
    anyhow::bail!("mongo writer configured but platscan was built without the `mongo` feature: {config:?}")
}
