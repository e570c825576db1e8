use crate::server::config::ServerConfig;
use std::sync::Arc;
use usernode::store::{DocumentStore, MemoryStore};

/// Opens the document store selected by the configuration.
///
/// A MongoDB URI selects the MongoDB backend; without one the directory lives
/// in process memory.
pub async fn connect_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.mongodb_uri.as_deref() {
        #[cfg(feature = "mongodb")]
        Some(uri) => {
            use anyhow::Context;
            let store = usernode::store::MongoStore::connect(uri)
                .await
                .context("failed to connect to MongoDB")?;
            #[cfg(feature = "tracing")]
            tracing::info!(db = %config.directory.db, "Using MongoDB store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "mongodb"))]
        Some(_) => {
            anyhow::bail!("MONGODB_URI is set but the server was built without the `mongodb` feature")
        }
        None => {
            #[cfg(feature = "tracing")]
            tracing::warn!("MONGODB_URI not set; using the in-memory store, data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::config::CliArgs;
    use clap::Parser;

    #[tokio::test]
    async fn falls_back_to_memory_without_uri() {
        let args = CliArgs::try_parse_from(["usernode-tonic-server", "--secret", "s"]).unwrap();
        let mut config = ServerConfig::try_from(args).unwrap();
        config.mongodb_uri = None;
        let store = connect_store(&config).await.unwrap();
        let ns = usernode::store::Namespace::new("db", "users");
        assert_eq!(store.count(&ns, &usernode::store::Filter::new()).await.unwrap(), 0);
    }
}
