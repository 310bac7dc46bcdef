//! Riak Protocol Buffers messages used by the binding.
//!
//! Field tags follow `riak.proto` / `riak_kv.proto`. Only the fields the
//! binding reads or writes are declared; unknown fields in responses are
//! skipped by the decoder.

/// Error reply, sent in place of any expected response.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbErrorResp {
    #[prost(bytes = "vec", required, tag = "1")]
    pub errmsg: Vec<u8>,

    #[prost(uint32, required, tag = "2")]
    pub errcode: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbPair {
    #[prost(bytes = "vec", required, tag = "1")]
    pub key: Vec<u8>,

    #[prost(bytes = "vec", optional, tag = "2")]
    pub value: Option<Vec<u8>>,
}

/// One value of an object. An object with siblings carries several.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbContent {
    #[prost(bytes = "vec", required, tag = "1")]
    pub value: Vec<u8>,

    #[prost(bytes = "vec", optional, tag = "2")]
    pub content_type: Option<Vec<u8>>,

    #[prost(bytes = "vec", optional, tag = "3")]
    pub charset: Option<Vec<u8>>,

    #[prost(bytes = "vec", optional, tag = "5")]
    pub vtag: Option<Vec<u8>>,

    #[prost(uint32, optional, tag = "7")]
    pub last_mod: Option<u32>,

    #[prost(uint32, optional, tag = "8")]
    pub last_mod_usecs: Option<u32>,

    #[prost(message, repeated, tag = "9")]
    pub usermeta: Vec<RpbPair>,

    /// Set on tombstones returned with `deletedvclock`.
    #[prost(bool, optional, tag = "11")]
    pub deleted: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbGetReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub bucket: Vec<u8>,

    #[prost(bytes = "vec", required, tag = "2")]
    pub key: Vec<u8>,

    #[prost(uint32, optional, tag = "3")]
    pub r: Option<u32>,

    #[prost(bool, optional, tag = "6")]
    pub notfound_ok: Option<bool>,

    #[prost(uint32, optional, tag = "10")]
    pub timeout: Option<u32>,
}

/// Empty `content` means the key was not found.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbGetResp {
    #[prost(message, repeated, tag = "1")]
    pub content: Vec<RpbContent>,

    #[prost(bytes = "vec", optional, tag = "2")]
    pub vclock: Option<Vec<u8>>,

    #[prost(bool, optional, tag = "3")]
    pub unchanged: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbPutReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub bucket: Vec<u8>,

    #[prost(bytes = "vec", optional, tag = "2")]
    pub key: Option<Vec<u8>>,

    #[prost(bytes = "vec", optional, tag = "3")]
    pub vclock: Option<Vec<u8>>,

    #[prost(message, optional, tag = "4")]
    pub content: Option<RpbContent>,

    #[prost(uint32, optional, tag = "5")]
    pub w: Option<u32>,

    #[prost(uint32, optional, tag = "6")]
    pub dw: Option<u32>,

    #[prost(bool, optional, tag = "7")]
    pub return_body: Option<bool>,

    /// Reject the write if the stored vclock differs from `vclock`.
    #[prost(bool, optional, tag = "9")]
    pub if_not_modified: Option<bool>,

    #[prost(bool, optional, tag = "10")]
    pub if_none_match: Option<bool>,

    #[prost(uint32, optional, tag = "12")]
    pub timeout: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbPutResp {
    #[prost(message, repeated, tag = "1")]
    pub content: Vec<RpbContent>,

    #[prost(bytes = "vec", optional, tag = "2")]
    pub vclock: Option<Vec<u8>>,

    #[prost(bytes = "vec", optional, tag = "3")]
    pub key: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbDelReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub bucket: Vec<u8>,

    #[prost(bytes = "vec", required, tag = "2")]
    pub key: Vec<u8>,

    #[prost(uint32, optional, tag = "3")]
    pub rw: Option<u32>,

    #[prost(bytes = "vec", optional, tag = "4")]
    pub vclock: Option<Vec<u8>>,

    #[prost(uint32, optional, tag = "10")]
    pub timeout: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbGetBucketReq {
    #[prost(bytes = "vec", required, tag = "1")]
    pub bucket: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbBucketProps {
    #[prost(uint32, optional, tag = "1")]
    pub n_val: Option<u32>,

    #[prost(bool, optional, tag = "2")]
    pub allow_mult: Option<bool>,

    #[prost(bool, optional, tag = "3")]
    pub last_write_wins: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RpbGetBucketResp {
    #[prost(message, optional, tag = "1")]
    pub props: Option<RpbBucketProps>,
}
