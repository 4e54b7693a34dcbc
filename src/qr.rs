//! Merchant QR payloads.
//!
//! Merchants present either a JSON payload tagged `LOCALIZEI_MERCHANT_QR` or a
//! link containing `/cashback/loja/<merchantId>`. The JSON form is tried first.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::model::{DEFAULT_STORE_ID, MerchantSession};

/// Type tag carried by merchant QR payloads.
pub const MERCHANT_QR_TYPE: &str = "LOCALIZEI_MERCHANT_QR";

static MERCHANT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/cashback/loja/([^/?#\s]+)").expect("merchant link pattern is valid")
});

/// Errors that can occur when reading a scanned payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QrError {
    #[error("unrecognized merchant QR payload")]
    InvalidPayload,
}

/// Merchant-side payload, as rendered into the QR code.
#[derive(Debug, Serialize)]
pub struct MerchantQr<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(rename = "merchantId")]
    merchant_id: &'a str,
    #[serde(rename = "storeId")]
    store_id: &'a str,
}

impl<'a> MerchantQr<'a> {
    pub fn new(session: &'a MerchantSession) -> Self {
        Self {
            kind: MERCHANT_QR_TYPE,
            merchant_id: &session.merchant_id,
            store_id: &session.store_id,
        }
    }

    pub fn encode(&self) -> String {
        // a struct of string fields always serializes
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Extract the merchant session from a decoded QR string.
pub fn parse_payload(raw: &str) -> Result<MerchantSession, QrError> {
    parse_tagged(raw)
        .or_else(|| parse_link(raw))
        .ok_or(QrError::InvalidPayload)
}

fn parse_tagged(raw: &str) -> Option<MerchantSession> {
    let value: Value = serde_json::from_str(raw).ok()?;

    if value.get("type").and_then(Value::as_str) != Some(MERCHANT_QR_TYPE) {
        return None;
    }

    let merchant_id = value
        .get("merchantId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())?;

    let store_id = value
        .get("storeId")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_STORE_ID);

    Some(MerchantSession::new(merchant_id, store_id))
}

fn parse_link(raw: &str) -> Option<MerchantSession> {
    let captures = MERCHANT_LINK.captures(raw)?;
    Some(MerchantSession::with_default_store(&captures[1]))
}
