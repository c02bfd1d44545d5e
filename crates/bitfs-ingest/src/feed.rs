//! Transaction shapes delivered by the upstream feed.
//!
//! The feed has already decoded the ledger format into the bitdb-style
//! JSON layout: `tx.h` is the txid, `in[].e.a` the spending address, and
//! each output carries its pushes as positional fields (`b0`, `s1`, `b2`,
//! `lb2`, `h7`, ...). Nothing here interprets those fields; see
//! [`crate::record`] for that.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `OP_RETURN`, the leading opcode of a data-carrying output.
pub const OP_RETURN: u64 = 106;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx: TxRef,
    #[serde(rename = "in", default)]
    pub inputs: Vec<Input>,
    #[serde(rename = "out", default)]
    pub outputs: Vec<Output>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxRef {
    /// Transaction id (hex)
    pub h: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Input {
    #[serde(default)]
    pub e: Option<InputEdge>,
}

/// Previous-output edge of an input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputEdge {
    /// Address that owned the spent output
    #[serde(default)]
    pub a: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Output {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b0: Option<Value>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Output {
    /// Opcode of the first push, if it was an opcode.
    pub fn leading_opcode(&self) -> Option<u64> {
        self.b0.as_ref()?.get("op")?.as_u64()
    }

    /// A positional field, only if it is a JSON string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name)?.as_str()
    }
}

impl Transaction {
    pub fn txid(&self) -> &str {
        &self.tx.h
    }

    /// First output whose leading push is `OP_RETURN`.
    pub fn data_output(&self) -> Option<&Output> {
        self.outputs
            .iter()
            .find(|out| out.leading_opcode() == Some(OP_RETURN))
    }

    /// Address of the first input's spent output.
    pub fn owner(&self) -> Option<&str> {
        self.inputs.first()?.e.as_ref()?.a.as_deref()
    }
}

/// A confirmed block plus whatever was still in the mempool when it landed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub info: Option<BlockInfo>,
    #[serde(default)]
    pub items: Vec<Transaction>,
    #[serde(default)]
    pub mempool: Vec<Transaction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    #[serde(default)]
    pub hash: String,
}
