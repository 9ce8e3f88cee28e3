//! Versioned QR interchange format.
//!
//! Every code is a JSON envelope `{v, type, network_id, chain_id, data}`.
//! Decoding checks the version, then the type, then the expected type,
//! and only then reads `data`; nothing is returned on a partial decode.

use crypto_utils::encryption;
use crypto_utils::kdf::{self, KdfParams};
use crypto_utils::zeroizing::ZeroizingString;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use zeroize::Zeroize;

use crate::error::OperationError;
use crate::types::NetworkProperties;

pub const QR_VERSION: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QrType {
    Contact,
    Account,
    Transaction,
    Mnemonic,
    Address,
}

impl QrType {
    pub fn code(self) -> i64 {
        match self {
            QrType::Contact => 1,
            QrType::Account => 2,
            QrType::Transaction => 3,
            QrType::Mnemonic => 5,
            QrType::Address => 7,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, OperationError> {
        match code {
            1 => Ok(QrType::Contact),
            2 => Ok(QrType::Account),
            3 => Ok(QrType::Transaction),
            5 => Ok(QrType::Mnemonic),
            7 => Ok(QrType::Address),
            other => Err(OperationError::QrUnsupportedType(other)),
        }
    }
}

/// A private key or mnemonic, in the clear or sealed with a password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Secret {
    Plain(ZeroizingString),
    /// Hex-encoded AES-GCM ciphertext and Argon2id salt.
    Protected { ciphertext: String, salt: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrPayload {
    Contact {
        name: String,
        address: Option<String>,
        public_key: Option<String>,
    },
    Account(Secret),
    /// Wire payload bytes.
    Transaction { payload: Vec<u8> },
    Mnemonic(Secret),
    Address { name: String, address: String },
}

impl QrPayload {
    pub fn qr_type(&self) -> QrType {
        match self {
            QrPayload::Contact { .. } => QrType::Contact,
            QrPayload::Account(_) => QrType::Account,
            QrPayload::Transaction { .. } => QrType::Transaction,
            QrPayload::Mnemonic(_) => QrType::Mnemonic,
            QrPayload::Address { .. } => QrType::Address,
        }
    }
}

/// A decoded code together with the network it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrCode {
    pub network_id: u64,
    pub chain_id: String,
    pub payload: QrPayload,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    v: u64,
    #[serde(rename = "type")]
    qr_type: i64,
    network_id: u64,
    chain_id: String,
    data: Value,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QrCodec {
    kdf: KdfParams,
}

impl QrCodec {
    pub fn new(kdf: KdfParams) -> Self {
        Self { kdf }
    }

    /// Deterministic: the same payload and network always give the same text.
    pub fn encode(
        &self,
        payload: &QrPayload,
        network: &NetworkProperties,
    ) -> Result<String, OperationError> {
        let envelope = Envelope {
            v: QR_VERSION,
            qr_type: payload.qr_type().code(),
            network_id: network.network_type,
            chain_id: chain_id(network),
            data: encode_data(payload),
        };
        serde_json::to_string(&envelope)
            .map_err(|e| OperationError::QrParse(format!("cannot serialize QR: {e}")))
    }

    pub fn decode(&self, text: &str, expected: Option<QrType>) -> Result<QrCode, OperationError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| OperationError::QrParse(format!("not JSON: {e}")))?;

        let version = value.get("v").and_then(Value::as_u64);
        if version != Some(QR_VERSION) {
            return Err(OperationError::QrParse(format!(
                "unsupported QR version {:?}",
                value.get("v")
            )));
        }
        let code = value
            .get("type")
            .and_then(Value::as_i64)
            .ok_or_else(|| OperationError::QrParse("missing type".into()))?;
        let actual = QrType::from_code(code)?;
        if let Some(expected) = expected {
            if expected != actual {
                return Err(OperationError::QrTypeMismatch { expected, actual });
            }
        }

        let envelope: Envelope = serde_json::from_value(value)
            .map_err(|e| OperationError::QrParse(format!("malformed envelope: {e}")))?;
        Ok(QrCode {
            network_id: envelope.network_id,
            chain_id: envelope.chain_id,
            payload: decode_data(actual, &envelope.data)?,
        })
    }

    /// Decodes and rejects codes issued for another network.
    pub fn decode_for_network(
        &self,
        text: &str,
        expected: Option<QrType>,
        network: &NetworkProperties,
    ) -> Result<QrPayload, OperationError> {
        let code = self.decode(text, expected)?;
        if code.network_id != network.network_type || code.chain_id != chain_id(network) {
            return Err(OperationError::Validation(format!(
                "QR issued for network {} ({}), current is {} ({})",
                code.network_id,
                code.chain_id,
                network.network_type,
                chain_id(network)
            )));
        }
        Ok(code.payload)
    }

    /// Seals `secret` under `password`.
    pub fn protect(&self, secret: &str, password: &str) -> Result<Secret, OperationError> {
        let salt = kdf::generate_salt();
        let mut key = kdf::derive_key(password.as_bytes(), &salt, self.kdf)?;
        let sealed = encryption::encrypt(secret.as_bytes(), &key);
        key.zeroize();
        Ok(Secret::Protected {
            ciphertext: hex::encode(sealed?),
            salt: hex::encode(salt),
        })
    }

    pub fn reveal(&self, secret: &Secret, password: &str) -> Result<ZeroizingString, OperationError> {
        let (ciphertext, salt) = match secret {
            Secret::Plain(value) => return Ok(value.clone()),
            Secret::Protected { ciphertext, salt } => (ciphertext, salt),
        };
        let ciphertext = hex::decode(ciphertext)
            .map_err(|e| OperationError::QrParse(format!("invalid ciphertext: {e}")))?;
        let salt: [u8; 16] = hex::decode(salt)
            .ok()
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| OperationError::QrParse("salt must be 16 hex bytes".into()))?;

        let mut key = kdf::derive_key(password.as_bytes(), &salt, self.kdf)?;
        let plaintext = encryption::decrypt(&ciphertext, &key);
        key.zeroize();
        let mut plaintext = plaintext
            .map_err(|_| OperationError::Validation("wrong password or corrupted QR".into()))?;
        let text = std::str::from_utf8(&plaintext)
            .map(ZeroizingString::from)
            .map_err(|_| OperationError::QrParse("secret is not utf-8".into()));
        plaintext.zeroize();
        text
    }
}

fn chain_id(network: &NetworkProperties) -> String {
    match &network.generation_hash {
        Some(hash) => hash.to_ascii_uppercase(),
        None => network.network_type.to_string(),
    }
}

fn encode_data(payload: &QrPayload) -> Value {
    match payload {
        QrPayload::Contact {
            name,
            address,
            public_key,
        } => {
            let mut data = json!({ "name": name });
            if let Some(address) = address {
                data["address"] = json!(address);
            }
            if let Some(public_key) = public_key {
                data["publicKey"] = json!(public_key);
            }
            data
        }
        QrPayload::Account(secret) => secret_data(secret, "privateKey"),
        QrPayload::Transaction { payload } => json!({ "payload": hex::encode_upper(payload) }),
        QrPayload::Mnemonic(secret) => secret_data(secret, "mnemonic"),
        QrPayload::Address { name, address } => json!({ "name": name, "address": address }),
    }
}

fn secret_data(secret: &Secret, field: &str) -> Value {
    match secret {
        Secret::Plain(value) => json!({ field: &**value }),
        Secret::Protected { ciphertext, salt } => json!({ "ciphertext": ciphertext, "salt": salt }),
    }
}

fn decode_data(qr_type: QrType, data: &Value) -> Result<QrPayload, OperationError> {
    let payload = match qr_type {
        QrType::Contact => {
            let address = optional_str(data, "address")?;
            let public_key = optional_str(data, "publicKey")?;
            if address.is_none() && public_key.is_none() {
                return Err(OperationError::QrParse(
                    "contact needs an address or a public key".into(),
                ));
            }
            QrPayload::Contact {
                name: required_str(data, "name")?,
                address,
                public_key,
            }
        }
        QrType::Account => QrPayload::Account(decode_secret(data, "privateKey")?),
        QrType::Transaction => QrPayload::Transaction {
            payload: hex::decode(required_str(data, "payload")?)
                .map_err(|e| OperationError::QrParse(format!("payload is not hex: {e}")))?,
        },
        QrType::Mnemonic => QrPayload::Mnemonic(decode_secret(data, "mnemonic")?),
        QrType::Address => QrPayload::Address {
            name: required_str(data, "name")?,
            address: required_str(data, "address")?,
        },
    };
    Ok(payload)
}

fn decode_secret(data: &Value, field: &str) -> Result<Secret, OperationError> {
    if let Some(value) = optional_str(data, field)? {
        return Ok(Secret::Plain(ZeroizingString::new(value)));
    }
    Ok(Secret::Protected {
        ciphertext: required_str(data, "ciphertext")?,
        salt: required_str(data, "salt")?,
    })
}

fn required_str(data: &Value, field: &str) -> Result<String, OperationError> {
    optional_str(data, field)?
        .ok_or_else(|| OperationError::QrParse(format!("missing field '{field}'")))
}

fn optional_str(data: &Value, field: &str) -> Result<Option<String>, OperationError> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(OperationError::QrParse(format!(
            "field '{field}' must be a string, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{FeeMultipliers, NativeCurrency, Protocol};

    fn network() -> NetworkProperties {
        NetworkProperties {
            protocol: Protocol::Symbol,
            node_url: "http://localhost:3000".into(),
            network_identifier: "testnet".into(),
            network_type: 152,
            generation_hash: Some(
                "49d6e1ce276a85b70eafe52349aacca389302e7a9754bcf1221e79494fc665a4".into(),
            ),
            epoch_adjustment: 0,
            chain_height: 0,
            fee_multipliers: FeeMultipliers::default(),
            base_fee_per_gas: None,
            native_currency: NativeCurrency {
                id: "72C0212E67A08BCE".into(),
                name: "symbol.xym".into(),
                divisibility: 6,
            },
        }
    }

    fn codec() -> QrCodec {
        QrCodec::new(KdfParams {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        })
    }

    fn samples() -> Vec<QrPayload> {
        vec![
            QrPayload::Contact {
                name: "Bob".into(),
                address: Some("TBOB".into()),
                public_key: None,
            },
            QrPayload::Account(Secret::Plain(ZeroizingString::from("AA".repeat(32).as_str()))),
            QrPayload::Transaction {
                payload: vec![0x01, 0x02, 0xff],
            },
            QrPayload::Mnemonic(Secret::Plain(ZeroizingString::from("abandon about"))),
            QrPayload::Address {
                name: "shop".into(),
                address: "TSHOP".into(),
            },
        ]
    }

    #[test]
    fn encode_decode_is_idempotent() {
        let codec = codec();
        let network = network();
        for payload in samples() {
            let text = codec.encode(&payload, &network).unwrap();
            let decoded = codec.decode(&text, Some(payload.qr_type())).unwrap();
            assert_eq!(decoded.payload, payload);
            assert_eq!(codec.encode(&decoded.payload, &network).unwrap(), text);
        }
    }

    #[test]
    fn envelope_shape() {
        let text = codec()
            .encode(
                &QrPayload::Address {
                    name: "shop".into(),
                    address: "TSHOP".into(),
                },
                &network(),
            )
            .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["v"], 3);
        assert_eq!(value["type"], 7);
        assert_eq!(value["network_id"], 152);
        assert_eq!(
            value["chain_id"],
            "49D6E1CE276A85B70EAFE52349AACCA389302E7A9754BCF1221E79494FC665A4"
        );
        assert_eq!(value["data"]["address"], "TSHOP");
    }

    #[test]
    fn type_mismatch_is_checked_before_data() {
        let text = r#"{"v":3,"type":2,"network_id":152,"chain_id":"x","data":"garbage"}"#;
        let err = codec().decode(text, Some(QrType::Contact)).unwrap_err();
        assert_eq!(
            err,
            OperationError::QrTypeMismatch {
                expected: QrType::Contact,
                actual: QrType::Account
            }
        );
        assert_eq!(codec().decode(text, None).unwrap_err().kind(), ErrorKind::QrParse);
    }

    #[test]
    fn error_kinds() {
        let codec = codec();
        let cases = [
            ("not json", ErrorKind::QrParse),
            (r#"{"v":2,"type":7,"network_id":152,"chain_id":"x","data":{}}"#, ErrorKind::QrParse),
            (r#"{"v":3,"type":9,"network_id":152,"chain_id":"x","data":{}}"#, ErrorKind::QrUnsupportedType),
            (r#"{"v":3,"type":7,"network_id":152,"chain_id":"x","data":{"name":"a"}}"#, ErrorKind::QrParse),
            (r#"{"v":3,"type":1,"network_id":152,"chain_id":"x","data":{"name":"a"}}"#, ErrorKind::QrParse),
            (r#"{"v":3,"type":3,"network_id":152,"chain_id":"x","data":{"payload":"zz"}}"#, ErrorKind::QrParse),
        ];
        for (text, kind) in cases {
            assert_eq!(codec.decode(text, None).unwrap_err().kind(), kind, "{text}");
        }
    }

    #[test]
    fn other_network_is_rejected() {
        let codec = codec();
        let payload = QrPayload::Address {
            name: "shop".into(),
            address: "TSHOP".into(),
        };
        let text = codec.encode(&payload, &network()).unwrap();
        assert_eq!(
            codec
                .decode_for_network(&text, Some(QrType::Address), &network())
                .unwrap(),
            payload
        );

        let mut mainnet = network();
        mainnet.network_type = 104;
        mainnet.generation_hash = Some("57F7DA205008026C776CB6AED843393F04CD458E0AA2D9F1D5F31A402072B2D6".into());
        let err = codec
            .decode_for_network(&text, Some(QrType::Address), &mainnet)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn protected_secret_round_trip() {
        let codec = codec();
        let secret = codec.protect("pizza road phone", "hunter2").unwrap();
        let payload = QrPayload::Mnemonic(secret.clone());
        let text = codec.encode(&payload, &network()).unwrap();
        assert!(!text.contains("pizza"));

        let decoded = codec.decode(&text, Some(QrType::Mnemonic)).unwrap();
        let QrPayload::Mnemonic(sealed) = decoded.payload else {
            panic!("expected a mnemonic payload");
        };
        assert_eq!(sealed, secret);
        assert_eq!(&*codec.reveal(&sealed, "hunter2").unwrap(), "pizza road phone");
        assert_eq!(
            codec.reveal(&sealed, "wrong").unwrap_err().kind(),
            ErrorKind::Validation
        );
    }
}
