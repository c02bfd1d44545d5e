//! Typed protocol records decoded from a feed transaction.
//!
//! Decoding happens once, at the pipeline boundary. A transaction either
//! yields a fully validated [`Record`], is irrelevant (`Ok(None)`), or is
//! malformed ([`DecodeError`]); handlers never see raw positional fields.
//!
//! Field map of the data output:
//!
//! | protocol | s1 prefix                            | fields                                          |
//! |----------|--------------------------------------|-------------------------------------------------|
//! | B        | `19HxigV4QyBv3tHpQVcUEQyq1pzZVdoAut` | lb2/b2 data, s3 type, s4 encoding, s5 filename  |
//! | BCAT     | `15DHFxWZJT58f9nhyGnsRBqrgwK4W6h4Up` | s2 info, s3..s5 as B, h7.. chunk txids          |
//! | chunk    | `1ChDHzdd1H4wSjgGMHyndZm6qxEDGjqpJL` | lb2/b2 data                                     |
//! | Bitcom   | `$`                                  | s2 command, ls3/s3 data or ref, s4 op, s5 path  |

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use bitfs_cas::ContentHash;
use bitfs_index::ManifestRecord;
use thiserror::Error;
use url::Url;

use crate::feed::{Output, Transaction};

pub const B_PREFIX: &str = "19HxigV4QyBv3tHpQVcUEQyq1pzZVdoAut";
pub const BCAT_PREFIX: &str = "15DHFxWZJT58f9nhyGnsRBqrgwK4W6h4Up";
pub const BCAT_PART_PREFIX: &str = "1ChDHzdd1H4wSjgGMHyndZm6qxEDGjqpJL";
pub const BITCOM_PREFIX: &str = "$";

/// First positional field holding a BCAT chunk txid.
const FIRST_CHUNK_FIELD: usize = 7;

/// Payloads are accepted with or without padding.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid txid {0:?}")]
    InvalidTxId(String),

    #[error("payload missing or not a string")]
    MissingPayload,

    #[error("payload is not valid base64")]
    InvalidBase64,

    #[error("manifest lists no chunks")]
    EmptyManifest,

    #[error("invalid chunk id {0:?}")]
    InvalidChunkId(String),

    #[error("bitcom write has no owner")]
    MissingOwner,

    #[error("bitcom write has no path")]
    MissingPath,

    #[error("unsupported bitcom command {0:?}")]
    UnsupportedCommand(String),

    #[error("unsupported write operation {0:?}")]
    UnsupportedOperation(String),

    #[error("unresolvable reference {0:?}")]
    UnresolvableReference(String),
}

/// A single-transaction B file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BFile {
    pub tx_id: String,
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    pub encoding: Option<String>,
    pub filename: Option<String>,
}

/// One BCAT part, addressed by its own txid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    pub tx_id: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// `>` or `to`
    Truncate,
    /// `>>`
    Append,
}

/// Stored object a Bitcom `cat` can copy from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectRef {
    /// `c://<sha256>`
    Content(ContentHash),
    /// `b://<txid>` or `bit://<B prefix>/<txid>`
    BFile(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitcomSource {
    /// `echo`: inline bytes
    Literal(Vec<u8>),
    /// `cat`: copy of a stored object
    Reference(ObjectRef),
}

/// A write into an owner's namespace. The path is kept verbatim; the
/// handler validates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitcomWrite {
    pub tx_id: String,
    pub owner: String,
    pub path: String,
    pub mode: WriteMode,
    pub source: BitcomSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    B(BFile),
    Manifest(ManifestRecord),
    Chunk(ChunkRecord),
    Bitcom(BitcomWrite),
}

impl Record {
    /// Decode the data output of `tx`.
    ///
    /// Returns `Ok(None)` when the transaction carries no data output or
    /// uses a protocol this engine does not handle.
    pub fn decode(tx: &Transaction) -> Result<Option<Record>, DecodeError> {
        let Some(out) = tx.data_output() else {
            return Ok(None);
        };

        let record = match out.str_field("s1") {
            Some(B_PREFIX) => Record::B(decode_b(tx, out)?),
            Some(BCAT_PREFIX) => Record::Manifest(decode_manifest(tx, out)?),
            Some(BCAT_PART_PREFIX) => Record::Chunk(ChunkRecord {
                tx_id: txid(tx)?,
                data: payload(out)?,
            }),
            Some(BITCOM_PREFIX) => Record::Bitcom(decode_bitcom(tx, out)?),
            _ => return Ok(None),
        };
        Ok(Some(record))
    }

    pub fn tx_id(&self) -> &str {
        match self {
            Record::B(b) => &b.tx_id,
            Record::Manifest(m) => &m.tx_id,
            Record::Chunk(c) => &c.tx_id,
            Record::Bitcom(w) => &w.tx_id,
        }
    }
}

/// 64 hex chars.
pub fn is_txid(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn normalize_txid(s: &str) -> Option<String> {
    is_txid(s).then(|| s.to_ascii_lowercase())
}

fn txid(tx: &Transaction) -> Result<String, DecodeError> {
    normalize_txid(tx.txid()).ok_or_else(|| DecodeError::InvalidTxId(tx.txid().to_string()))
}

/// Optional declared attribute; empty strings count as absent.
fn declared(out: &Output, field: &str) -> Option<String> {
    out.str_field(field)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `lb2` (large push) falling back to `b2`, base64-decoded.
fn payload(out: &Output) -> Result<Vec<u8>, DecodeError> {
    let encoded = out
        .str_field("lb2")
        .filter(|s| !s.is_empty())
        .or_else(|| out.str_field("b2"))
        .ok_or(DecodeError::MissingPayload)?;
    BASE64
        .decode(encoded)
        .map_err(|_| DecodeError::InvalidBase64)
}

fn decode_b(tx: &Transaction, out: &Output) -> Result<BFile, DecodeError> {
    Ok(BFile {
        tx_id: txid(tx)?,
        data: payload(out)?,
        content_type: declared(out, "s3"),
        encoding: declared(out, "s4"),
        filename: declared(out, "s5"),
    })
}

fn decode_manifest(tx: &Transaction, out: &Output) -> Result<ManifestRecord, DecodeError> {
    let mut chunks = Vec::new();
    for i in FIRST_CHUNK_FIELD.. {
        let Some(chunk_id) = out.str_field(&format!("h{i}")) else {
            break;
        };
        let chunk_id = normalize_txid(chunk_id)
            .ok_or_else(|| DecodeError::InvalidChunkId(chunk_id.to_string()))?;
        chunks.push(chunk_id);
    }
    if chunks.is_empty() {
        return Err(DecodeError::EmptyManifest);
    }

    Ok(ManifestRecord {
        tx_id: txid(tx)?,
        chunks,
        info: declared(out, "s2"),
        content_type: declared(out, "s3"),
        encoding: declared(out, "s4"),
        filename: declared(out, "s5"),
    })
}

fn decode_bitcom(tx: &Transaction, out: &Output) -> Result<BitcomWrite, DecodeError> {
    let owner = tx
        .owner()
        .filter(|o| !o.is_empty())
        .ok_or(DecodeError::MissingOwner)?
        .to_string();
    let path = out
        .str_field("s5")
        .filter(|p| !p.is_empty())
        .ok_or(DecodeError::MissingPath)?
        .to_string();

    let mode = match out.str_field("s4").unwrap_or_default() {
        ">" | "to" => WriteMode::Truncate,
        ">>" => WriteMode::Append,
        other => return Err(DecodeError::UnsupportedOperation(other.to_string())),
    };

    let source = match out.str_field("s2").unwrap_or_default() {
        "echo" => {
            let data = out
                .str_field("ls3")
                .filter(|s| !s.is_empty())
                .or_else(|| out.str_field("s3"))
                .ok_or(DecodeError::MissingPayload)?;
            BitcomSource::Literal(data.as_bytes().to_vec())
        }
        "cat" => {
            let reference = out.str_field("s3").ok_or(DecodeError::MissingPayload)?;
            BitcomSource::Reference(parse_reference(reference)?)
        }
        other => return Err(DecodeError::UnsupportedCommand(other.to_string())),
    };

    Ok(BitcomWrite {
        tx_id: txid(tx)?,
        owner,
        path,
        mode,
        source,
    })
}

/// Parse a `c://`, `b://` or `bit://<B prefix>/` reference.
pub fn parse_reference(reference: &str) -> Result<ObjectRef, DecodeError> {
    let unresolvable = || DecodeError::UnresolvableReference(reference.to_string());
    let url = Url::parse(reference).map_err(|_| unresolvable())?;
    let host = url.host_str().unwrap_or_default();

    match url.scheme() {
        "c" => ContentHash::from_hex(host)
            .map(ObjectRef::Content)
            .ok_or_else(unresolvable),
        "b" => normalize_txid(host)
            .map(ObjectRef::BFile)
            .ok_or_else(unresolvable),
        "bit" if host.eq_ignore_ascii_case(B_PREFIX) => {
            normalize_txid(url.path().trim_start_matches('/'))
                .map(ObjectRef::BFile)
                .ok_or_else(unresolvable)
        }
        _ => Err(unresolvable()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn id(n: u8) -> String {
        format!("{:064x}", n)
    }

    fn tx(txid: &str, out: Value) -> Transaction {
        serde_json::from_value(json!({
            "tx": { "h": txid },
            "in": [{ "e": { "a": "1Owner" } }],
            "out": [out]
        }))
        .unwrap()
    }

    #[test]
    fn test_decode_b() {
        let t = tx(
            &id(1),
            json!({ "b0": { "op": 106 }, "s1": B_PREFIX, "b2": "aGVsbG8=", "s3": "text/plain", "s4": "", "s5": "hi.txt" }),
        );
        let Some(Record::B(b)) = Record::decode(&t).unwrap() else {
            panic!("expected B record");
        };
        assert_eq!(b.data, b"hello");
        assert_eq!(b.content_type.as_deref(), Some("text/plain"));
        assert_eq!(b.encoding, None);
        assert_eq!(b.filename.as_deref(), Some("hi.txt"));
    }

    #[test]
    fn test_lb2_takes_precedence() {
        let t = tx(
            &id(1),
            json!({ "b0": { "op": 106 }, "s1": B_PREFIX, "lb2": "Zm9v", "b2": "YmFy" }),
        );
        let Some(Record::B(b)) = Record::decode(&t).unwrap() else {
            panic!("expected B record");
        };
        assert_eq!(b.data, b"foo");
    }

    #[test]
    fn test_missing_or_non_string_payload() {
        let absent = tx(&id(1), json!({ "b0": { "op": 106 }, "s1": B_PREFIX }));
        assert_eq!(Record::decode(&absent), Err(DecodeError::MissingPayload));

        let number = tx(&id(1), json!({ "b0": { "op": 106 }, "s1": B_PREFIX, "b2": 7 }));
        assert_eq!(Record::decode(&number), Err(DecodeError::MissingPayload));
    }

    #[test]
    fn test_irrelevant_transactions() {
        let no_marker = tx(&id(1), json!({ "b0": { "op": 118 }, "s1": B_PREFIX, "b2": "eA==" }));
        assert_eq!(Record::decode(&no_marker), Ok(None));

        let other_protocol = tx(&id(1), json!({ "b0": { "op": 106 }, "s1": "1SomethingElse" }));
        assert_eq!(Record::decode(&other_protocol), Ok(None));
    }

    #[test]
    fn test_decode_manifest_collects_chunks_in_order() {
        let t = tx(
            &id(9),
            json!({
                "b0": { "op": 106 }, "s1": BCAT_PREFIX, "s2": "bcat", "s3": "video/mp4",
                "h7": id(0xab).to_uppercase(), "h8": id(1), "h10": id(3)
            }),
        );
        let Some(Record::Manifest(m)) = Record::decode(&t).unwrap() else {
            panic!("expected manifest");
        };
        // h9 is missing, so h10 is not part of the manifest
        assert_eq!(m.chunks, vec![id(0xab), id(1)]);
        assert_eq!(m.content_type.as_deref(), Some("video/mp4"));
        assert_eq!(m.info.as_deref(), Some("bcat"));
    }

    #[test]
    fn test_manifest_validation() {
        let empty = tx(&id(9), json!({ "b0": { "op": 106 }, "s1": BCAT_PREFIX }));
        assert_eq!(Record::decode(&empty), Err(DecodeError::EmptyManifest));

        let bad = tx(&id(9), json!({ "b0": { "op": 106 }, "s1": BCAT_PREFIX, "h7": "zz" }));
        assert!(matches!(Record::decode(&bad), Err(DecodeError::InvalidChunkId(_))));
    }

    #[test]
    fn test_invalid_txid() {
        let t = tx("T1", json!({ "b0": { "op": 106 }, "s1": BCAT_PART_PREFIX, "b2": "eA==" }));
        assert!(matches!(Record::decode(&t), Err(DecodeError::InvalidTxId(_))));
    }

    #[test]
    fn test_decode_bitcom_echo() {
        let t = tx(
            &id(4),
            json!({ "b0": { "op": 106 }, "s1": "$", "s2": "echo", "s3": "hi", "s4": ">>", "s5": "notes/a.txt" }),
        );
        let Some(Record::Bitcom(w)) = Record::decode(&t).unwrap() else {
            panic!("expected bitcom");
        };
        assert_eq!(w.owner, "1Owner");
        assert_eq!(w.path, "notes/a.txt");
        assert_eq!(w.mode, WriteMode::Append);
        assert_eq!(w.source, BitcomSource::Literal(b"hi".to_vec()));
    }

    #[test]
    fn test_bitcom_rejects_unknown_operation() {
        let t = tx(
            &id(4),
            json!({ "b0": { "op": 106 }, "s1": "$", "s2": "echo", "s3": "hi", "s4": "|", "s5": "a" }),
        );
        assert_eq!(
            Record::decode(&t),
            Err(DecodeError::UnsupportedOperation("|".to_string()))
        );
    }

    #[test]
    fn test_parse_references() {
        let hash = ContentHash::compute(b"x");
        assert_eq!(
            parse_reference(&format!("c://{}", hash.to_hex())),
            Ok(ObjectRef::Content(hash))
        );
        assert_eq!(
            parse_reference(&format!("b://{}", id(5))),
            Ok(ObjectRef::BFile(id(5)))
        );
        assert_eq!(
            parse_reference(&format!("bit://{}/{}", B_PREFIX, id(6))),
            Ok(ObjectRef::BFile(id(6)))
        );
        assert!(parse_reference("bit://1Unknown/abc").is_err());
        assert!(parse_reference("https://example.com/x").is_err());
        assert!(parse_reference("not a url").is_err());
    }
}
