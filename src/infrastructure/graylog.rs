//! GELF sink for central aggregation.
//!
//! Serializes events as GELF 1.1 and delivers them over TCP
//! (null-terminated frames on a persistent connection, reopened on
//! failure) or UDP (one datagram per event). Only the worker thread
//! touches the transport in queued mode; in synchronous mode the
//! internal mutex serializes access.

use std::fmt;
use std::io::Write;
use std::net::{TcpStream, UdpSocket};
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::application::ports::{GraylogPort, SinkError};
use crate::domain::LogEvent;

/// Graylog transport protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraylogProtocol {
    /// Persistent connection with null-terminated frames
    Tcp,
    /// One datagram per event
    Udp,
}

impl FromStr for GraylogProtocol {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(GraylogProtocol::Tcp),
            "udp" => Ok(GraylogProtocol::Udp),
            other => Err(format!("unsupported graylog protocol: {other:?}")),
        }
    }
}

/// Aggregator endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraylogTarget {
    /// Host name or address
    pub host: String,
    /// Port
    pub port: u16,
}

enum Transport {
    Disconnected,
    Tcp(TcpStream),
    Udp(UdpSocket),
}

/// GELF sink with a lazily established transport.
pub struct GraylogAdapter {
    target: GraylogTarget,
    protocol: GraylogProtocol,
    transport: Mutex<Transport>,
}

impl GraylogAdapter {
    /// Sink for `target` over `protocol`. No connection is opened until
    /// the first emit.
    pub fn new(target: GraylogTarget, protocol: GraylogProtocol) -> Self {
        Self {
            target,
            protocol,
            transport: Mutex::new(Transport::Disconnected),
        }
    }

    /// Build the GELF 1.1 payload for one event.
    ///
    /// Additional fields follow the GELF convention of an underscore
    /// prefix; the PID lineage is rendered as `pid1>pid2`.
    pub fn gelf_payload(event: &LogEvent) -> Value {
        let context = &event.context;
        let mut payload = Map::new();
        payload.insert("version".into(), json!("1.1"));
        payload.insert(
            "host".into(),
            json!(context.hostname.clone().unwrap_or_else(|| "localhost".into())),
        );
        payload.insert("short_message".into(), json!(event.message));
        let micros = event.timestamp.timestamp_micros();
        payload.insert("timestamp".into(), json!(micros as f64 / 1_000_000.0));
        payload.insert("level".into(), json!(event.level.syslog_priority()));
        payload.insert("_logger".into(), json!(event.logger_name));
        payload.insert("_event_id".into(), json!(event.event_id));
        payload.insert("_service".into(), json!(context.service));
        payload.insert("_environment".into(), json!(context.environment));
        payload.insert("_job_id".into(), json!(context.job_id));
        payload.insert("_process_id".into(), json!(context.process_id));
        let chain = context.chain_display();
        if !chain.is_empty() {
            payload.insert("_process_id_chain".into(), json!(chain));
        }
        let optional = [
            ("_request_id", &context.request_id),
            ("_user_id", &context.user_id),
            ("_user_name", &context.user_name),
            ("_trace_id", &context.trace_id),
            ("_span_id", &context.span_id),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                payload.insert(key.into(), json!(value));
            }
        }
        if let Some(exception) = &event.exception {
            payload.insert("full_message".into(), json!(exception.trace));
            payload.insert("_exception_type".into(), json!(exception.type_name));
            payload.insert("_exception_message".into(), json!(exception.message));
        }
        for (key, value) in context.extra.iter().chain(event.extra.iter()) {
            payload.insert(format!("_{key}"), value.clone());
        }
        Value::Object(payload)
    }

    fn deliver(&self, bytes: &[u8]) -> Result<(), SinkError> {
        let mut transport = self.transport.lock().expect("graylog transport lock poisoned");
        match self.protocol {
            GraylogProtocol::Udp => {
                if !matches!(*transport, Transport::Udp(_)) {
                    let socket = UdpSocket::bind(("0.0.0.0", 0))?;
                    *transport = Transport::Udp(socket);
                }
                if let Transport::Udp(socket) = &*transport {
                    socket.send_to(bytes, (self.target.host.as_str(), self.target.port))?;
                }
                Ok(())
            }
            GraylogProtocol::Tcp => {
                // One reconnect attempt per emit: a broken persistent
                // connection is replaced and the frame retried once.
                if let Transport::Tcp(stream) = &mut *transport {
                    if write_frame(stream, bytes).is_ok() {
                        return Ok(());
                    }
                }
                let mut stream = self.connect()?;
                let result = write_frame(&mut stream, bytes);
                *transport = match result {
                    Ok(()) => Transport::Tcp(stream),
                    Err(_) => Transport::Disconnected,
                };
                result.map_err(SinkError::Io)
            }
        }
    }

    fn connect(&self) -> Result<TcpStream, SinkError> {
        let stream = TcpStream::connect((self.target.host.as_str(), self.target.port))?;
        stream.set_write_timeout(Some(Duration::from_secs(1)))?;
        Ok(stream)
    }
}

fn write_frame(stream: &mut TcpStream, bytes: &[u8]) -> std::io::Result<()> {
    stream.write_all(bytes)?;
    stream.write_all(b"\0")?;
    stream.flush()
}

impl GraylogPort for GraylogAdapter {
    fn emit(&self, event: &LogEvent) -> Result<(), SinkError> {
        let payload = Self::gelf_payload(event);
        let bytes = serde_json::to_vec(&payload)
            .map_err(|err| SinkError::Render(err.to_string()))?;
        self.deliver(&bytes)
    }

    fn flush(&self) -> Result<(), SinkError> {
        let mut transport = self.transport.lock().expect("graylog transport lock poisoned");
        if let Transport::Tcp(stream) = &mut *transport {
            stream.flush()?;
        }
        *transport = Transport::Disconnected;
        Ok(())
    }
}

impl fmt::Debug for GraylogAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraylogAdapter")
            .field("target", &self.target)
            .field("protocol", &self.protocol)
            .finish()
    }
}
