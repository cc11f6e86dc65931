//! `encode` / `decode` command implementation.

use anyhow::{Context, Result};
use contracts::{AppId, Dictionary};
use serde::Serialize;

use crate::cli::{DecodeArgs, EncodeArgs};
use crate::error::CliError;

#[derive(Serialize)]
struct DecodedFrame {
    app: AppId,
    size_in_bytes: usize,
    dictionary: Dictionary,
}

/// Execute the `encode` command
pub fn run_encode(args: &EncodeArgs) -> Result<()> {
    let app: AppId = args
        .app
        .parse()
        .with_context(|| format!("Invalid app UUID '{}'", args.app))?;

    let dictionary: Dictionary = serde_json::from_str(&args.json).map_err(|e| {
        CliError::InvalidDictionary {
            message: e.to_string(),
        }
    })?;

    let frame = codec::encode_frame(app, &dictionary);
    println!("{}", to_hex(&frame));
    Ok(())
}

/// Execute the `decode` command
pub fn run_decode(args: &DecodeArgs) -> Result<()> {
    let bytes = from_hex(&args.hex)?;
    let frame = codec::decode_frame(&bytes).context("Failed to decode frame")?;

    let decoded = DecodedFrame {
        app: frame.app,
        size_in_bytes: frame.dictionary.size_in_bytes(),
        dictionary: frame.dictionary,
    };
    let json = serde_json::to_string_pretty(&decoded).context("Failed to serialize frame")?;
    println!("{}", json);
    Ok(())
}

fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Whitespace and an optional `0x` prefix are ignored.
fn from_hex(input: &str) -> Result<Vec<u8>, CliError> {
    let cleaned: String = input.split_whitespace().collect();
    let digits = cleaned.strip_prefix("0x").unwrap_or(&cleaned);

    hex::decode(digits).map_err(|e| CliError::invalid_hex(e.to_string()))
}
