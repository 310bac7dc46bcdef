//! In-process stand-in for a Riak node speaking the PB protocol, enough for
//! the binding's get/put/delete/bucket calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use super::codec::{self, Frame};
use super::proto::{
    RpbBucketProps, RpbContent, RpbDelReq, RpbErrorResp, RpbGetBucketReq, RpbGetBucketResp,
    RpbGetReq, RpbGetResp, RpbPutReq, RpbPutResp,
};
use super::{HOST_PROPERTY, PORT_PROPERTY};
use crate::client::ClientError;
use crate::properties::Properties;

#[derive(Default)]
struct Object {
    /// (value, content type) per sibling
    contents: Vec<(Vec<u8>, Option<Vec<u8>>)>,
    version: u64,
}

#[derive(Default)]
struct State {
    objects: HashMap<(String, String), Object>,
    bucket_lookups: Vec<String>,
    fail_next: Option<String>,
    bump_on_next_fetch: bool,
    delay_next: Option<Duration>,
    connections: usize,
}

#[derive(Clone)]
pub struct MockRiak {
    port: u16,
    state: Arc<Mutex<State>>,
}

impl MockRiak {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State::default()));

        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_state.lock().unwrap().connections += 1;
                tokio::spawn(serve(stream, accept_state.clone()));
            }
        });

        Self { port, state }
    }

    pub fn properties(&self) -> Properties {
        let mut props = Properties::new();
        props.set(HOST_PROPERTY, "127.0.0.1");
        props.set(PORT_PROPERTY, self.port.to_string());
        props
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .objects
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    pub fn raw(&self, bucket: &str, key: &str) -> Option<(Vec<u8>, Option<Vec<u8>>)> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .and_then(|object| object.contents.first().cloned())
    }

    pub fn put_raw(&self, bucket: &str, key: &str, value: Vec<u8>) {
        self.put_siblings(bucket, key, vec![value]);
    }

    pub fn put_siblings(&self, bucket: &str, key: &str, values: Vec<Vec<u8>>) {
        let mut state = self.state.lock().unwrap();
        let object = state
            .objects
            .entry((bucket.to_string(), key.to_string()))
            .or_default();
        object.contents = values.into_iter().map(|v| (v, None)).collect();
        object.version += 1;
    }

    pub fn bucket_lookups(&self) -> Vec<String> {
        self.state.lock().unwrap().bucket_lookups.clone()
    }

    /// Answer the next request with an error response.
    pub fn fail_next_request(&self, message: &str) {
        self.state.lock().unwrap().fail_next = Some(message.to_string());
    }

    /// Hold back the reply to the next request.
    pub fn delay_next_reply(&self, delay: Duration) {
        self.state.lock().unwrap().delay_next = Some(delay);
    }

    pub fn connections(&self) -> usize {
        self.state.lock().unwrap().connections
    }

    /// Simulate another writer touching the object right after it is fetched.
    pub fn bump_on_next_fetch(&self) {
        self.state.lock().unwrap().bump_on_next_fetch = true;
    }
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<State>>) {
    while let Ok(request) = codec::read_frame(&mut stream).await {
        let reply = match handle(&request, &state) {
            Ok(frame) => frame,
            Err(message) => error_frame(&message),
        };
        let delay = state.lock().unwrap().delay_next.take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if codec::write_frame(&mut stream, &reply).await.is_err() {
            break;
        }
    }
}

fn error_frame(message: &str) -> Frame {
    Frame::new(
        codec::ERROR_RESP,
        &RpbErrorResp {
            errmsg: message.as_bytes().to_vec(),
            errcode: 0,
        },
    )
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn handle(request: &Frame, state: &Mutex<State>) -> Result<Frame, String> {
    let mut state = state.lock().unwrap();
    if let Some(message) = state.fail_next.take() {
        return Err(message);
    }
    let decode_err = |e: ClientError| e.to_string();

    match request.code {
        codec::PING_REQ => Ok(Frame::empty(codec::PING_RESP)),
        codec::GET_BUCKET_REQ => {
            let req: RpbGetBucketReq = request.decode().map_err(decode_err)?;
            state.bucket_lookups.push(text(&req.bucket));
            Ok(Frame::new(
                codec::GET_BUCKET_RESP,
                &RpbGetBucketResp {
                    props: Some(RpbBucketProps {
                        n_val: Some(3),
                        allow_mult: Some(false),
                        last_write_wins: Some(false),
                    }),
                },
            ))
        }
        codec::GET_REQ => {
            let req: RpbGetReq = request.decode().map_err(decode_err)?;
            let bump = std::mem::take(&mut state.bump_on_next_fetch);
            let id = (text(&req.bucket), text(&req.key));
            let resp = match state.objects.get_mut(&id) {
                None => RpbGetResp::default(),
                Some(object) => {
                    let resp = RpbGetResp {
                        content: object
                            .contents
                            .iter()
                            .map(|(value, content_type)| RpbContent {
                                value: value.clone(),
                                content_type: content_type.clone(),
                                ..Default::default()
                            })
                            .collect(),
                        vclock: Some(object.version.to_be_bytes().to_vec()),
                        unchanged: None,
                    };
                    if bump {
                        object.version += 1;
                    }
                    resp
                }
            };
            Ok(Frame::new(codec::GET_RESP, &resp))
        }
        codec::PUT_REQ => {
            let req: RpbPutReq = request.decode().map_err(decode_err)?;
            let key = req.key.ok_or("missing key")?;
            let content = req.content.ok_or("missing content")?;
            let id = (text(&req.bucket), text(&key));

            if req.if_not_modified == Some(true) {
                let current = state
                    .objects
                    .get(&id)
                    .ok_or("notfound")?
                    .version
                    .to_be_bytes()
                    .to_vec();
                if req.vclock.as_ref() != Some(&current) {
                    return Err("modified".to_string());
                }
            }

            let object = state.objects.entry(id).or_default();
            object.contents = vec![(content.value, content.content_type)];
            object.version += 1;
            Ok(Frame::new(codec::PUT_RESP, &RpbPutResp::default()))
        }
        codec::DEL_REQ => {
            let req: RpbDelReq = request.decode().map_err(decode_err)?;
            state.objects.remove(&(text(&req.bucket), text(&req.key)));
            Ok(Frame::empty(codec::DEL_RESP))
        }
        other => Err(format!("unknown message code {}", other)),
    }
}
