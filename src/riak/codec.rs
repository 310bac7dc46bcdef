//! Riak PB framing: `u32` big-endian length, one message-code byte, then the
//! protobuf payload. The length counts the code byte.

use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::client::ClientError;

pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

pub const ERROR_RESP: u8 = 0;
pub const PING_REQ: u8 = 1;
pub const PING_RESP: u8 = 2;
pub const GET_REQ: u8 = 9;
pub const GET_RESP: u8 = 10;
pub const PUT_REQ: u8 = 11;
pub const PUT_RESP: u8 = 12;
pub const DEL_REQ: u8 = 13;
pub const DEL_RESP: u8 = 14;
pub const GET_BUCKET_REQ: u8 = 19;
pub const GET_BUCKET_RESP: u8 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub code: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(code: u8, message: &impl Message) -> Self {
        Self {
            code,
            payload: message.encode_to_vec(),
        }
    }

    /// A frame with no payload, e.g. ping or delete responses.
    pub fn empty(code: u8) -> Self {
        Self {
            code,
            payload: Vec::new(),
        }
    }

    pub fn decode<M: Message + Default>(&self) -> Result<M, ClientError> {
        M::decode(self.payload.as_slice()).map_err(|e| {
            ClientError::Protocol(format!("bad payload for message code {}: {}", self.code, e))
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let len = (self.payload.len() + 1) as u32;
        let mut buf = Vec::with_capacity(self.payload.len() + 5);
        buf.extend_from_slice(&len.to_be_bytes());
        buf.push(self.code);
        buf.extend_from_slice(&self.payload);
        buf
    }
}

pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), ClientError>
where
    W: AsyncWrite + Unpin,
{
    if frame.payload.len() + 1 > MAX_FRAME_LEN {
        return Err(ClientError::Protocol(format!(
            "frame of {} bytes exceeds limit",
            frame.payload.len() + 1
        )));
    }
    writer.write_all(&frame.to_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, ClientError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len == 0 {
        return Err(ClientError::Protocol("zero-length frame".to_string()));
    }
    if len > MAX_FRAME_LEN {
        return Err(ClientError::Protocol(format!(
            "frame of {} bytes exceeds limit",
            len
        )));
    }

    let code = reader.read_u8().await?;
    let mut payload = vec![0u8; len - 1];
    reader.read_exact(&mut payload).await?;

    Ok(Frame { code, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riak::proto::RpbGetReq;

    #[test]
    fn length_prefix_counts_code_byte() {
        let bytes = Frame::empty(PING_REQ).to_bytes();
        assert_eq!(bytes, vec![0, 0, 0, 1, PING_REQ]);
    }

    #[tokio::test]
    async fn get_request_survives_the_wire() {
        let req = RpbGetReq {
            bucket: b"ycsb".to_vec(),
            key: b"usertableuser1".to_vec(),
            ..Default::default()
        };
        let (mut client, mut server) = tokio::io::duplex(1024);

        write_frame(&mut client, &Frame::new(GET_REQ, &req))
            .await
            .unwrap();
        let frame = read_frame(&mut server).await.unwrap();

        assert_eq!(frame.code, GET_REQ);
        assert_eq!(frame.decode::<RpbGetReq>().unwrap(), req);
    }

    #[tokio::test]
    async fn rejects_oversized_length() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let len = (MAX_FRAME_LEN as u32 + 1).to_be_bytes();
        client.write_all(&len).await.unwrap();

        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[tokio::test]
    async fn rejects_zero_length() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0, 0, 0, 0]).await.unwrap();

        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[tokio::test]
    async fn truncated_stream_is_transport_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0, 0, 0, 10, GET_RESP]).await.unwrap();
        drop(client);

        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }
}
