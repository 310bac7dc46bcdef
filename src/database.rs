use async_trait::async_trait;
use clap::ValueEnum;
use serde::Serialize;

use crate::client::{Client, ClientError};
use crate::properties::Properties;
#[cfg(feature = "riak")]
use crate::riak::RiakClient;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Database {
    #[cfg(feature = "riak")]
    Riak,
}

/// Opens one client per worker.
#[async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    async fn create(&self) -> Result<Box<dyn Client>, ClientError>;
}

pub struct DatabaseFactory {
    database: Database,
    properties: Properties,
}

impl DatabaseFactory {
    pub fn new(database: Database, properties: Properties) -> Self {
        Self {
            database,
            properties,
        }
    }
}

#[async_trait]
impl ClientFactory for DatabaseFactory {
    async fn create(&self) -> Result<Box<dyn Client>, ClientError> {
        match self.database {
            #[cfg(feature = "riak")]
            Database::Riak => Ok(Box::new(RiakClient::init(&self.properties).await?)),
        }
    }
}

#[cfg(all(test, feature = "riak"))]
mod tests {
    use super::*;
    use crate::riak::mock::MockRiak;

    #[tokio::test]
    async fn riak_factory_opens_independent_clients() {
        let server = MockRiak::start().await;
        let factory = DatabaseFactory::new(Database::Riak, server.properties());

        let first = factory.create().await.unwrap();
        let second = factory.create().await.unwrap();
        let values = [("a".to_string(), "1".to_string())].into_iter().collect();

        first.insert("t", "k", &values).await.unwrap();
        assert_eq!(second.read("t", "k", None).await.unwrap(), values);
        assert_eq!(server.bucket_lookups().len(), 2);
    }
}
