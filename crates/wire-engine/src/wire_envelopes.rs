//! The two control envelopes the writer may emit regardless of the
//! connection's application codec (spec §6.1, §6.2). Always JSON text.

use serde::Serialize;

#[derive(Serialize)]
struct PingWire<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(rename = "pingId")]
    ping_id: u64,
    #[serde(rename = "connId")]
    conn_id: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct ErrorWire<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    error: &'a str,
}

pub fn ping_json(ping_id: u64, conn_id: &str, name: &str) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&PingWire {
        kind: "ping",
        ping_id,
        conn_id,
        name,
    })
}

pub fn error_json(message: &str) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&ErrorWire {
        kind: "error",
        error: message,
    })
}
