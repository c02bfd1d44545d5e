//! Transaction builders shared by the integration tests.
#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bitfs_config::testing::TestEnvironment;
use bitfs_ingest::record::{BCAT_PART_PREFIX, BCAT_PREFIX, BITCOM_PREFIX, B_PREFIX};
use bitfs_ingest::{Block, Engine, Pipeline, Transaction};
use serde_json::{json, Map, Value};

pub const OWNER: &str = "1BitcomOwnerAddr";

/// Deterministic 64-hex id.
pub fn id(n: u32) -> String {
    format!("{:064x}", n)
}

fn tx(txid: &str, out: Value) -> Transaction {
    serde_json::from_value(json!({
        "tx": { "h": txid },
        "in": [{ "e": { "a": OWNER } }],
        "out": [
            { "b0": { "op": 118 }, "s1": "change" },
            out
        ]
    }))
    .unwrap()
}

pub fn b_tx(txid: &str, data: &[u8], content_type: &str) -> Transaction {
    tx(
        txid,
        json!({
            "b0": { "op": 106 },
            "s1": B_PREFIX,
            "b2": STANDARD.encode(data),
            "s3": content_type,
            "s4": "binary",
            "s5": "",
        }),
    )
}

pub fn manifest_tx(txid: &str, chunks: &[String], content_type: &str) -> Transaction {
    let mut out = Map::new();
    out.insert("b0".into(), json!({ "op": 106 }));
    out.insert("s1".into(), json!(BCAT_PREFIX));
    out.insert("s2".into(), json!("test upload"));
    out.insert("s3".into(), json!(content_type));
    out.insert("s4".into(), json!("binary"));
    out.insert("s5".into(), json!("file.bin"));
    out.insert("s6".into(), json!(""));
    for (i, chunk) in chunks.iter().enumerate() {
        out.insert(format!("h{}", i + 7), json!(chunk));
    }
    tx(txid, Value::Object(out))
}

pub fn chunk_tx(txid: &str, data: &[u8]) -> Transaction {
    tx(
        txid,
        json!({
            "b0": { "op": 106 },
            "s1": BCAT_PART_PREFIX,
            "lb2": STANDARD.encode(data),
        }),
    )
}

pub fn bitcom_tx(txid: &str, command: &str, arg: &str, op: &str, path: &str) -> Transaction {
    tx(
        txid,
        json!({
            "b0": { "op": 106 },
            "s1": BITCOM_PREFIX,
            "s2": command,
            "s3": arg,
            "s4": op,
            "s5": path,
        }),
    )
}

pub fn block(items: Vec<Transaction>) -> Block {
    Block {
        info: None,
        items,
        mempool: Vec::new(),
    }
}

pub fn open_pipeline(env: &TestEnvironment) -> Pipeline {
    Pipeline::new(Engine::open(&env.config()).unwrap())
}
