#![allow(clippy::missing_errors_doc)]

use std::{error::Error, fmt, string::FromUtf8Error};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use geocoin_core::{PersistedState, RecordSection};
use geocoin_storage::LoadedState;

const TRANSFER_DOMAIN: &str = "geocoin";
const TRANSFER_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded state payload.
pub(crate) const TRANSFER_HEADER: &str = "geocoin:v1";
/// Delimiter used to separate the prefix and payload.
const FIELD_DELIMITER: char = ':';

/// Encodes the persisted state into a single-line string suitable for clipboard transfer.
#[must_use]
pub(crate) fn encode(state: &PersistedState) -> String {
    let json = serde_json::to_vec(state).expect("persisted state serialization never fails");
    let encoded = STANDARD_NO_PAD.encode(json);
    format!("{TRANSFER_HEADER}{FIELD_DELIMITER}{encoded}")
}

/// Decodes a transfer string into persisted state.
///
/// Individual pit or inventory entries that do not fit the layout are
/// skipped and reported like any other load; a payload that is not a
/// state document at all is rejected.
pub(crate) fn decode(value: &str) -> Result<LoadedState, TransferError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TransferError::EmptyPayload);
    }

    let mut parts = trimmed.splitn(3, FIELD_DELIMITER);
    let domain = parts.next().ok_or(TransferError::MissingPrefix)?;
    let version = parts.next().ok_or(TransferError::MissingVersion)?;
    let payload = parts.next().ok_or(TransferError::MissingPayload)?;

    if domain != TRANSFER_DOMAIN {
        return Err(TransferError::InvalidPrefix(domain.to_owned()));
    }
    if version != TRANSFER_VERSION {
        return Err(TransferError::UnsupportedVersion(version.to_owned()));
    }

    let bytes = STANDARD_NO_PAD
        .decode(payload.as_bytes())
        .map_err(TransferError::InvalidEncoding)?;
    let text = String::from_utf8(bytes).map_err(TransferError::InvalidText)?;
    let loaded = geocoin_storage::decode(&text);

    if let Some(record) = loaded
        .corrupt
        .iter()
        .find(|record| record.section == RecordSection::Document)
    {
        return Err(TransferError::InvalidDocument(record.reason.to_string()));
    }
    Ok(loaded)
}

/// Errors that can occur while decoding transfer strings.
#[derive(Debug)]
pub(crate) enum TransferError {
    /// The provided string was empty or contained only whitespace.
    EmptyPayload,
    /// The prefix segment was missing from the encoded state.
    MissingPrefix,
    /// The encoded state did not contain a version segment.
    MissingVersion,
    /// The encoded state did not include the payload segment.
    MissingPayload,
    /// The encoded state used an unexpected prefix segment.
    InvalidPrefix(String),
    /// The encoded state used an unsupported version identifier.
    UnsupportedVersion(String),
    /// The base64 payload could not be decoded.
    InvalidEncoding(base64::DecodeError),
    /// The decoded payload was not UTF-8 text.
    InvalidText(FromUtf8Error),
    /// The decoded text was not a state document.
    InvalidDocument(String),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "transfer payload was empty"),
            Self::MissingPrefix => write!(f, "transfer string is missing the prefix"),
            Self::MissingVersion => write!(f, "transfer string is missing the version"),
            Self::MissingPayload => write!(f, "transfer string is missing the payload"),
            Self::InvalidPrefix(prefix) => write!(f, "transfer prefix '{prefix}' is not supported"),
            Self::UnsupportedVersion(version) => {
                write!(f, "transfer version '{version}' is not supported")
            }
            Self::InvalidEncoding(error) => {
                write!(f, "could not decode transfer payload: {error}")
            }
            Self::InvalidText(error) => write!(f, "transfer payload is not text: {error}"),
            Self::InvalidDocument(reason) => {
                write!(f, "transfer payload is not a state document: {reason}")
            }
        }
    }
}

impl Error for TransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEncoding(error) => Some(error),
            Self::InvalidText(error) => Some(error),
            _ => None,
        }
    }
}
