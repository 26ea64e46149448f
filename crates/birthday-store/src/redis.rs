// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Minimal Redis client.
//!
//! Speaks just enough RESP for this service: AUTH/SELECT at connect time,
//! then PING/SET/GET. The connection is established lazily, reused across
//! operations, and dropped on any i/o or protocol error; every operation is
//! attempted once within a fixed timeout, with no retries.

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::repository::{KvStore, StoreError};

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub address: String,
    pub password: Option<String>,
    pub db: u32,
    /// per-operation timeout, in seconds
    pub op_timeout_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            address: "127.0.0.1:6379".to_string(),
            password: None,
            db: 0,
            op_timeout_secs: 5,
        }
    }
}

#[derive(Debug, PartialEq)]
enum Reply {
    Simple(String),
    Bulk(String),
    Integer(i64),
    Nil,
}

pub struct RedisStore {
    config: RedisConfig,
    conn: Mutex<Option<BufStream<TcpStream>>>,
}

impl RedisStore {
    pub fn new(config: RedisConfig) -> Self {
        RedisStore {
            config,
            conn: Mutex::new(None),
        }
    }

    async fn connect(&self) -> Result<BufStream<TcpStream>, StoreError> {
        let stream = TcpStream::connect(&self.config.address).await?;
        let mut stream = BufStream::new(stream);
        debug!(address = %self.config.address, "connected to redis");

        if let Some(ref password) = self.config.password {
            match run_command(&mut stream, &["AUTH", password]).await? {
                Reply::Simple(ref s) if s == "OK" => {}
                other => return Err(unexpected(other)),
            }
        }
        if self.config.db != 0 {
            let db = self.config.db.to_string();
            match run_command(&mut stream, &["SELECT", &db]).await? {
                Reply::Simple(ref s) if s == "OK" => {}
                other => return Err(unexpected(other)),
            }
        }
        Ok(stream)
    }

    async fn command(&self, args: &[&str]) -> Result<Reply, StoreError> {
        let mut guard = self.conn.lock().await;
        let op = async {
            if guard.is_none() {
                let stream = self.connect().await?;
                guard.replace(stream);
            }
            let Some(stream) = guard.as_mut() else {
                return Err(StoreError::Protocol("connection unavailable".to_string()));
            };
            run_command(stream, args).await
        };
        match timeout(Duration::from_secs(self.config.op_timeout_secs), op).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => {
                // -ERR replies leave the connection usable; anything else
                // leaves it in an unknown protocol state
                if !matches!(e, StoreError::Server(_)) {
                    *guard = None;
                }
                Err(e)
            }
            Err(_) => {
                *guard = None;
                Err(StoreError::Timeout)
            }
        }
    }
}

#[async_trait::async_trait]
impl KvStore for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        match self.command(&["PING"]).await? {
            Reply::Simple(ref s) if s == "PONG" => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self.command(&["SET", key, value]).await? {
            Reply::Simple(ref s) if s == "OK" => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn get(&self, key: &str) -> Result<String, StoreError> {
        match self.command(&["GET", key]).await? {
            Reply::Bulk(value) => Ok(value),
            Reply::Nil => Err(StoreError::NotFound),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(reply: Reply) -> StoreError {
    StoreError::Protocol(format!("{reply:?}"))
}

async fn run_command(
    stream: &mut BufStream<TcpStream>,
    args: &[&str],
) -> Result<Reply, StoreError> {
    let mut request = format!("*{}\r\n", args.len()).into_bytes();
    for arg in args {
        request.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        request.extend_from_slice(arg.as_bytes());
        request.extend_from_slice(b"\r\n");
    }
    stream.write_all(&request).await?;
    stream.flush().await?;
    read_reply(stream).await
}

async fn read_reply(stream: &mut BufStream<TcpStream>) -> Result<Reply, StoreError> {
    let line = read_line(stream).await?;
    let Some(kind) = line.chars().next() else {
        return Err(StoreError::Protocol("empty reply line".to_string()));
    };
    let rest = &line[kind.len_utf8()..];
    match kind {
        '+' => Ok(Reply::Simple(rest.to_string())),
        '-' => Err(StoreError::Server(rest.to_string())),
        ':' => rest
            .parse::<i64>()
            .map(Reply::Integer)
            .map_err(|_| StoreError::Protocol(format!("bad integer reply: {rest}"))),
        '$' => {
            let len = rest
                .parse::<i64>()
                .map_err(|_| StoreError::Protocol(format!("bad bulk length: {rest}")))?;
            if len < 0 {
                return Ok(Reply::Nil);
            }
            // payload plus trailing CRLF
            let mut buf = vec![0u8; len as usize + 2];
            stream.read_exact(&mut buf).await?;
            buf.truncate(len as usize);
            String::from_utf8(buf)
                .map(Reply::Bulk)
                .map_err(|_| StoreError::Protocol("non-utf8 bulk reply".to_string()))
        }
        other => Err(StoreError::Protocol(format!("unknown reply type: {other}"))),
    }
}

async fn read_line(stream: &mut BufStream<TcpStream>) -> Result<String, StoreError> {
    let mut line = String::new();
    let n = stream.read_line(&mut line).await?;
    if n == 0 {
        return Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "redis closed the connection",
        )));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
