use std::time::Duration;

use prost::Message;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::codec::{self, Frame};
use super::proto::RpbErrorResp;
use crate::client::ClientError;

/// A single PB connection. Requests are strictly sequential.
///
/// A round trip that fails partway (timeout, I/O or framing error) leaves the
/// stream out of step with the server, so the stream is discarded and the
/// next request reconnects first.
pub struct Connection {
    addr: String,
    stream: Option<TcpStream>,
    /// `None` waits forever.
    connect_timeout: Option<Duration>,
    /// `None` waits forever.
    request_timeout: Option<Duration>,
}

impl Connection {
    pub async fn connect(
        host: &str,
        port: u16,
        connect_timeout: Option<Duration>,
        request_timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let addr = format!("{}:{}", host, port);
        let stream = Self::open(&addr, connect_timeout).await?;

        Ok(Self {
            addr,
            stream: Some(stream),
            connect_timeout,
            request_timeout,
        })
    }

    async fn open(addr: &str, connect_timeout: Option<Duration>) -> Result<TcpStream, ClientError> {
        debug!(%addr, "connecting to riak");
        let stream = match connect_timeout {
            Some(limit) => tokio::time::timeout(limit, TcpStream::connect(addr))
                .await
                .map_err(|_| ClientError::Timeout(limit.as_millis() as u64))??,
            None => TcpStream::connect(addr).await?,
        };
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// True once a failed round trip has discarded the stream.
    pub fn is_broken(&self) -> bool {
        self.stream.is_none()
    }

    /// Send `request` and decode the reply, which must carry `expected`.
    pub async fn exchange<Req, Resp>(
        &mut self,
        code: u8,
        request: &Req,
        expected: u8,
    ) -> Result<Resp, ClientError>
    where
        Req: Message,
        Resp: Message + Default,
    {
        let frame = self.round_trip(Frame::new(code, request)).await?;
        Self::expect(&frame, expected)?;
        frame.decode()
    }

    /// Like `exchange` for replies that have no body.
    pub async fn exchange_empty<Req: Message>(
        &mut self,
        code: u8,
        request: &Req,
        expected: u8,
    ) -> Result<(), ClientError> {
        let frame = self.round_trip(Frame::new(code, request)).await?;
        Self::expect(&frame, expected)
    }

    pub async fn ping(&mut self) -> Result<(), ClientError> {
        let frame = self.round_trip(Frame::empty(codec::PING_REQ)).await?;
        Self::expect(&frame, codec::PING_RESP)
    }

    async fn round_trip(&mut self, request: Frame) -> Result<Frame, ClientError> {
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => Self::open(&self.addr, self.connect_timeout).await?,
        };

        let io = async {
            codec::write_frame(&mut stream, &request).await?;
            codec::read_frame(&mut stream).await
        };
        let result = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, io)
                .await
                .unwrap_or(Err(ClientError::Timeout(limit.as_millis() as u64))),
            None => io.await,
        };

        match result {
            Ok(frame) => {
                self.stream = Some(stream);
                Ok(frame)
            }
            Err(err) => {
                warn!(addr = %self.addr, error = %err, "dropping riak connection");
                Err(err)
            }
        }
    }

    fn expect(frame: &Frame, expected: u8) -> Result<(), ClientError> {
        if frame.code == expected {
            return Ok(());
        }
        if frame.code == codec::ERROR_RESP {
            let err: RpbErrorResp = frame.decode()?;
            return Err(ClientError::Server {
                code: err.errcode,
                message: String::from_utf8_lossy(&err.errmsg).into_owned(),
            });
        }
        Err(ClientError::Protocol(format!(
            "expected message code {}, got {}",
            expected, frame.code
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_becomes_server_error() {
        let frame = Frame::new(
            codec::ERROR_RESP,
            &RpbErrorResp {
                errmsg: b"overload".to_vec(),
                errcode: 0,
            },
        );

        let err = Connection::expect(&frame, codec::PUT_RESP).unwrap_err();
        match err {
            ClientError::Server { code, message } => {
                assert_eq!(code, 0);
                assert_eq!(message, "overload");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unexpected_code_is_protocol_error() {
        let err = Connection::expect(&Frame::empty(codec::DEL_RESP), codec::GET_RESP).unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result =
            Connection::connect("127.0.0.1", port, Some(Duration::from_millis(500)), None).await;
        assert!(matches!(
            result,
            Err(ClientError::Transport(_)) | Err(ClientError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn timed_out_exchange_reconnects_before_next_request() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // First connection answers late; the second answers at once.
        tokio::spawn(async move {
            let (mut slow, _) = listener.accept().await.unwrap();
            let (mut fast, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let _ = codec::read_frame(&mut slow).await;
                tokio::time::sleep(Duration::from_millis(300)).await;
                let _ = codec::write_frame(&mut slow, &Frame::empty(codec::PING_RESP)).await;
            });
            while codec::read_frame(&mut fast).await.is_ok() {
                if codec::write_frame(&mut fast, &Frame::empty(codec::PING_RESP))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        let mut conn = Connection::connect(
            "127.0.0.1",
            port,
            Some(Duration::from_millis(500)),
            Some(Duration::from_millis(100)),
        )
        .await
        .unwrap();

        assert!(matches!(conn.ping().await, Err(ClientError::Timeout(100))));
        assert!(conn.is_broken());

        conn.ping().await.unwrap();
        assert!(!conn.is_broken());
    }
}
