//! Document-store writer
//!
//! Inserts the whole record (file, text, metadata) as one document. The
//! backend sits behind `DocumentCollection`; `MongoCollection` is the
//! production implementation.

use super::StorageWriter;
use crate::error::WriterError;
use crate::logging::EventLog;
use crate::types::DocumentRecord;

/// One collection in a document store
pub trait DocumentCollection: Send + Sync {
    /// Insert one record. `Ok(Some(id))` when the backend acknowledged the
    /// insert with a generated identifier.
    fn insert_one(&self, record: &DocumentRecord) -> Result<Option<String>, WriterError>;

    fn describe(&self) -> String;
}

pub struct DocumentStoreWriter<C: DocumentCollection> {
    collection: C,
}

impl<C: DocumentCollection> DocumentStoreWriter<C> {
    pub fn new(collection: C) -> Self {
        Self { collection }
    }
}

impl<C: DocumentCollection> StorageWriter for DocumentStoreWriter<C> {
    fn save(&self, record: &DocumentRecord, log: &dyn EventLog) -> bool {
        match self.collection.insert_one(record) {
            Ok(Some(id)) => {
                log.info(&format!("Inserted {} into {} as {id}", record.file, self.describe()));
                true
            }
            Ok(None) => {
                log.error(&format!(
                    "{} failed to insert {}: {}",
                    self.describe(),
                    record.file,
                    WriterError::NotAcknowledged
                ));
                false
            }
            Err(e) => {
                log.error(&format!("{} failed to insert {}: {e}", self.describe(), record.file));
                false
            }
        }
    }

    fn describe(&self) -> String {
        self.collection.describe()
    }
}

#[cfg(feature = "mongo")]
pub use mongo::MongoCollection;

#[cfg(feature = "mongo")]
mod mongo {
    use super::DocumentCollection;
    use crate::error::WriterError;
    use crate::types::DocumentRecord;
    use mongodb::bson::{self, Bson, Document};
    use mongodb::options::{ClientOptions, Credential, ServerAddress};
    use mongodb::sync::{Client, Collection};
    use std::time::Duration;

    pub const USERNAME_VAR: &str = "MONGODB_USERNAME";
    pub const PASSWORD_VAR: &str = "MONGODB_PASSWORD";

    /// MongoDB collection over the synchronous driver. The client (and its
    /// connection pool) is built once, at construction.
    pub struct MongoCollection {
        host: String,
        database: String,
        name: String,
        collection: Collection<Document>,
    }

    impl MongoCollection {
        /// Credentials come from `MONGODB_USERNAME` / `MONGODB_PASSWORD`;
        /// without them the connection is unauthenticated. Nothing touches
        /// the network until the first insert.
        pub fn connect(
            host: &str,
            database: &str,
            collection: &str,
            server_selection_timeout: Duration,
        ) -> Result<Self, WriterError> {
            let hosts = parse_hosts(host)?;
            let mut options = ClientOptions::builder().hosts(hosts).build();
            options.credential = credential_from_env();
            options.server_selection_timeout = Some(server_selection_timeout);
            options.app_name = Some("platscan".to_string());

            let client = Client::with_options(options).map_err(|e| WriterError::Backend(e.to_string()))?;
            let handle = client.database(database).collection::<Document>(collection);

            Ok(Self {
                host: host.to_string(),
                database: database.to_string(),
                name: collection.to_string(),
                collection: handle,
            })
        }
    }

    /// Accepts `mongodb://h1:port,h2/` as well as bare `host:port` lists
    pub(super) fn parse_hosts(host: &str) -> Result<Vec<ServerAddress>, WriterError> {
        let trimmed = host
            .trim()
            .trim_start_matches("mongodb://")
            .trim_end_matches('/');
        let without_credentials = trimmed.rsplit('@').next().unwrap_or(trimmed);

        let hosts = without_credentials
            .split(',')
            .filter(|h| !h.is_empty())
            .map(|h| ServerAddress::parse(h).map_err(|e| WriterError::Backend(format!("invalid host {h}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        if hosts.is_empty() {
            return Err(WriterError::Backend(format!("no hosts in {host:?}")));
        }
        Ok(hosts)
    }

    fn credential_from_env() -> Option<Credential> {
        let username = std::env::var(USERNAME_VAR).ok().filter(|u| !u.is_empty())?;
        let password = std::env::var(PASSWORD_VAR).ok();
        Some(
            Credential::builder()
                .username(username)
                .password(password)
                .build(),
        )
    }

    impl DocumentCollection for MongoCollection {
        fn insert_one(&self, record: &DocumentRecord) -> Result<Option<String>, WriterError> {
            let document = bson::to_document(record).map_err(|e| WriterError::Serialization(e.to_string()))?;
            let result = self
                .collection
                .insert_one(document, None)
                .map_err(|e| WriterError::Backend(e.to_string()))?;

            Ok(match result.inserted_id {
                Bson::ObjectId(id) => Some(id.to_hex()),
                Bson::Null => None,
                other => Some(other.to_string()),
            })
        }

        fn describe(&self) -> String {
            format!("mongo({}, {}.{})", self.host, self.database, self.name)
        }
    }
}
