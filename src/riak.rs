#![cfg(feature = "riak")]

//! Riak binding over the Protocol Buffers interface.
//!
//! Records from every table share one bucket. The store key is the table name
//! followed directly by the record key, so `("user", "12")` and
//! `("user1", "2")` address the same object.

pub mod codec;
pub mod connection;
pub mod proto;

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::client::{Client, ClientError, Record, Status};
use crate::properties::Properties;
use connection::Connection;
use proto::{
    RpbContent, RpbDelReq, RpbGetBucketReq, RpbGetBucketResp, RpbGetReq, RpbGetResp, RpbPutReq,
};

pub const HOST_PROPERTY: &str = "riak.host";
pub const PORT_PROPERTY: &str = "riak.port";
pub const BUCKET_PROPERTY: &str = "riak.bucket";
pub const CONNECT_TIMEOUT_PROPERTY: &str = "riak.connect_timeout_ms";
pub const REQUEST_TIMEOUT_PROPERTY: &str = "riak.request_timeout_ms";

const DEFAULT_PORT: u16 = 8087;
const DEFAULT_BUCKET: &str = "ycsb";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1000;
const CONTENT_TYPE: &[u8] = b"application/json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiakConfig {
    pub host: String,
    pub port: u16,
    pub bucket: String,
    /// `None` waits forever.
    pub connect_timeout: Option<Duration>,
    /// `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl RiakConfig {
    pub fn from_properties(props: &Properties) -> Result<Self, ClientError> {
        // An empty host resolves to the local machine.
        let host = match props.get_or(HOST_PROPERTY, "").trim() {
            "" => "127.0.0.1".to_string(),
            host => host.to_string(),
        };
        // Zero disables either timeout.
        let millis = |ms: u64| (ms > 0).then(|| Duration::from_millis(ms));
        let connect_timeout_ms: u64 =
            props.get_parsed(CONNECT_TIMEOUT_PROPERTY, DEFAULT_CONNECT_TIMEOUT_MS)?;
        let request_timeout_ms: u64 = props.get_parsed(REQUEST_TIMEOUT_PROPERTY, 0)?;

        Ok(Self {
            host,
            port: props.get_parsed(PORT_PROPERTY, DEFAULT_PORT)?,
            bucket: props.get_or(BUCKET_PROPERTY, DEFAULT_BUCKET).to_string(),
            connect_timeout: millis(connect_timeout_ms),
            request_timeout: millis(request_timeout_ms),
        })
    }
}

/// Stored object as returned by a fetch.
struct Fetched {
    value: Vec<u8>,
    vclock: Option<Vec<u8>>,
}

pub struct RiakClient {
    conn: Mutex<Connection>,
    bucket: Vec<u8>,
}

impl RiakClient {
    /// Connect and make sure the configured bucket answers.
    pub async fn init(props: &Properties) -> Result<Self, ClientError> {
        let config = RiakConfig::from_properties(props)?;
        let conn = Connection::connect(
            &config.host,
            config.port,
            config.connect_timeout,
            config.request_timeout,
        )
        .await?;

        let client = Self {
            conn: Mutex::new(conn),
            bucket: config.bucket.clone().into_bytes(),
        };
        client.ensure_bucket().await?;

        info!(
            host = %config.host,
            port = config.port,
            bucket = %config.bucket,
            "riak client initialised"
        );
        Ok(client)
    }

    /// Buckets exist implicitly; fetching the properties proves the node
    /// serves this one.
    async fn ensure_bucket(&self) -> Result<(), ClientError> {
        let req = RpbGetBucketReq {
            bucket: self.bucket.clone(),
        };
        let _props: RpbGetBucketResp = self
            .conn
            .lock()
            .await
            .exchange(codec::GET_BUCKET_REQ, &req, codec::GET_BUCKET_RESP)
            .await?;
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        self.conn.lock().await.ping().await
    }

    fn store_key(table: &str, key: &str) -> String {
        let mut store_key = String::with_capacity(table.len() + key.len());
        store_key.push_str(table);
        store_key.push_str(key);
        store_key
    }

    async fn fetch(&self, store_key: &str) -> Result<Option<Fetched>, ClientError> {
        let req = RpbGetReq {
            bucket: self.bucket.clone(),
            key: store_key.as_bytes().to_vec(),
            ..Default::default()
        };
        let resp: RpbGetResp = self
            .conn
            .lock()
            .await
            .exchange(codec::GET_REQ, &req, codec::GET_RESP)
            .await?;

        if resp.content.len() > 1 {
            return Err(ClientError::Siblings {
                key: store_key.to_string(),
                count: resp.content.len(),
            });
        }

        let vclock = resp.vclock;
        let live = resp
            .content
            .into_iter()
            .find(|content| content.deleted != Some(true));
        Ok(live.map(|content| Fetched {
            value: content.value,
            vclock,
        }))
    }

    /// Write `record`. With a vclock the write only succeeds if the object
    /// is unchanged since it was fetched.
    async fn store(
        &self,
        store_key: &str,
        record: &Record,
        vclock: Option<Vec<u8>>,
    ) -> Result<(), ClientError> {
        let req = RpbPutReq {
            bucket: self.bucket.clone(),
            key: Some(store_key.as_bytes().to_vec()),
            if_not_modified: vclock.as_ref().map(|_| true),
            vclock,
            content: Some(RpbContent {
                value: serde_json::to_vec(record)?,
                content_type: Some(CONTENT_TYPE.to_vec()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = self
            .conn
            .lock()
            .await
            .exchange_empty(codec::PUT_REQ, &req, codec::PUT_RESP)
            .await;

        match result {
            Err(ClientError::Server { message, .. }) if message == "modified" => {
                Err(ClientError::Conflict(store_key.to_string()))
            }
            other => other,
        }
    }

    async fn fetch_record(
        &self,
        store_key: &str,
    ) -> Result<(Record, Option<Vec<u8>>), ClientError> {
        let fetched = self
            .fetch(store_key)
            .await?
            .ok_or_else(|| ClientError::NotFound(store_key.to_string()))?;
        let record: Record = serde_json::from_slice(&fetched.value)?;
        Ok((record, fetched.vclock))
    }

    /// Fetch, overlay `values` on the stored fields and write back under
    /// the fetched vclock.
    async fn merge_and_store(&self, store_key: &str, values: &Record) -> Result<(), ClientError> {
        let (mut record, vclock) = self.fetch_record(store_key).await?;
        record.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.store(store_key, &record, vclock).await
    }

    fn log_failure<T>(
        op: &str,
        store_key: &str,
        result: Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        if let Err(ref err) = result {
            let status = Status::from(err);
            warn!(
                op,
                key = store_key,
                %status,
                code = status.code(),
                error = %err,
                "riak operation failed"
            );
        }
        result
    }
}

#[async_trait]
impl Client for RiakClient {
    async fn insert(&self, table: &str, key: &str, values: &Record) -> Result<(), ClientError> {
        let store_key = Self::store_key(table, key);
        let result = self.store(&store_key, values, None).await;
        Self::log_failure("insert", &store_key, result)
    }

    /// The field filter is ignored; every stored field is returned.
    async fn read(
        &self,
        table: &str,
        key: &str,
        _fields: Option<&HashSet<String>>,
    ) -> Result<Record, ClientError> {
        let store_key = Self::store_key(table, key);
        let result = match self.fetch_record(&store_key).await {
            Ok((record, _)) if record.is_empty() => Err(ClientError::EmptyRecord(store_key.clone())),
            Ok((record, _)) => Ok(record),
            Err(err) => Err(err),
        };
        Self::log_failure("read", &store_key, result)
    }

    async fn update(&self, table: &str, key: &str, values: &Record) -> Result<(), ClientError> {
        let store_key = Self::store_key(table, key);
        let result = self.merge_and_store(&store_key, values).await;
        Self::log_failure("update", &store_key, result)
    }

    async fn delete(&self, table: &str, key: &str) -> Result<(), ClientError> {
        let store_key = Self::store_key(table, key);
        let req = RpbDelReq {
            bucket: self.bucket.clone(),
            key: store_key.as_bytes().to_vec(),
            ..Default::default()
        };
        let result = self
            .conn
            .lock()
            .await
            .exchange_empty(codec::DEL_REQ, &req, codec::DEL_RESP)
            .await;
        Self::log_failure("delete", &store_key, result)
    }

    async fn scan(
        &self,
        table: &str,
        start_key: &str,
        _record_count: usize,
        _fields: Option<&HashSet<String>>,
    ) -> Result<Vec<Record>, ClientError> {
        let store_key = Self::store_key(table, start_key);
        Self::log_failure("scan", &store_key, Err(ClientError::NotImplemented("scan")))
    }
}

#[cfg(test)]
pub(crate) mod mock;
