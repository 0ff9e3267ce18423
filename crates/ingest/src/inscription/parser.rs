//! Witness envelope parsing.
//!
//! Inscriptions ride in a witness script as an `OP_FALSE OP_IF ... OP_ENDIF`
//! envelope tagged with the `ord` marker: tag 1 carries the content type,
//! the empty tag starts the body, and body chunks are concatenated in order.

use crate::chain::ChainTx;

const OP_IF: u8 = 0x63;
const OP_ENDIF: u8 = 0x68;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;

const PROTOCOL_MARKER: &[u8] = b"ord";
const CONTENT_TYPE_TAG: &[u8] = &[0x01];

/// One inscription parsed out of a witness script.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInscription {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Extract every inscription carried by a transaction's witnesses.
///
/// Returns `(input_index, inscription)` pairs; inputs whose witness items do
/// not parse are skipped silently, bad hex included.
pub fn extract_inscriptions(tx: &ChainTx) -> Vec<(u32, ParsedInscription)> {
    let mut found = Vec::new();

    for (input_index, input) in tx.vin.iter().enumerate() {
        for item in &input.witness {
            let Ok(bytes) = hex::decode(item) else {
                continue;
            };
            if let Some(inscription) = parse_witness_script(&bytes) {
                found.push((input_index as u32, inscription));
                break; // one inscription per input
            }
        }
    }

    found
}

/// Parse a witness script, returning the first well-formed envelope.
pub fn parse_witness_script(script: &[u8]) -> Option<ParsedInscription> {
    let start = find_envelope_start(script)?;
    let mut pos = start;

    let mut content_type = None;
    let mut body = Vec::new();
    let mut in_body = false;
    let mut complete = false;

    while pos < script.len() {
        if script[pos] == OP_ENDIF {
            complete = true;
            break;
        }

        let (chunk, next) = read_push(script, pos)?;

        if in_body {
            body.extend_from_slice(&chunk);
            pos = next;
            continue;
        }

        // Field position: this chunk is a tag; empty tag opens the body.
        if chunk.is_empty() {
            in_body = true;
            pos = next;
            continue;
        }

        let tag = chunk;
        let (value, after_value) = read_push(script, next)?;
        if tag == CONTENT_TYPE_TAG {
            content_type = String::from_utf8(value).ok();
        }
        // Unknown tags are skipped, their value consumed.
        pos = after_value;
    }

    if !complete {
        return None;
    }

    Some(ParsedInscription { content_type, body })
}

/// Locate `OP_FALSE OP_IF <push "ord">` and return the offset just past the
/// protocol marker.
fn find_envelope_start(script: &[u8]) -> Option<usize> {
    let needle = [
        0x00,
        OP_IF,
        PROTOCOL_MARKER.len() as u8,
        PROTOCOL_MARKER[0],
        PROTOCOL_MARKER[1],
        PROTOCOL_MARKER[2],
    ];
    script
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|idx| idx + needle.len())
}

/// Decode one data push at `pos`, returning the pushed bytes and the offset
/// after them.  `OP_0` decodes as an empty push.
fn read_push(script: &[u8], pos: usize) -> Option<(Vec<u8>, usize)> {
    let opcode = *script.get(pos)?;

    let (len, data_start) = match opcode {
        0x00 => return Some((Vec::new(), pos + 1)),
        1..=75 => (opcode as usize, pos + 1),
        OP_PUSHDATA1 => {
            let len = *script.get(pos + 1)? as usize;
            (len, pos + 2)
        }
        OP_PUSHDATA2 => {
            let lo = *script.get(pos + 1)? as usize;
            let hi = *script.get(pos + 2)? as usize;
            (lo | (hi << 8), pos + 3)
        }
        OP_PUSHDATA4 => {
            let b: [u8; 4] = script.get(pos + 1..pos + 5)?.try_into().ok()?;
            (u32::from_le_bytes(b) as usize, pos + 5)
        }
        _ => return None,
    };

    let data_end = data_start.checked_add(len)?;
    if data_end > script.len() {
        return None;
    }
    Some((script[data_start..data_end].to_vec(), data_end))
}
