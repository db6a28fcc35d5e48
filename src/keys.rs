//! # Decryption Key Store
//!
//! Operators configure one AES-128 key per meter, addressed by the device
//! id printed on the meter (the same eight digits
//! [`format_device_id`](crate::payload::data_encoding::format_device_id)
//! produces). The store is built once at startup, either programmatically
//! or from a JSON object of `"device id" -> "hex key"` pairs, and is then
//! only read during decoding.

use std::collections::HashMap;

use crate::error::WmBusError;
use crate::payload::data_encoding::format_device_id;
use crate::wmbus::crypto::AesKey;

/// Per-device AES key lookup.
#[derive(Debug, Default, Clone)]
pub struct KeyStore {
    keys: HashMap<String, AesKey>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a key for a device id, replacing any previous entry.
    pub fn add_key(&mut self, device_id: &str, key: AesKey) {
        self.keys.insert(device_id.to_lowercase(), key);
    }

    /// Looks up the key for a device id as carried in the link header.
    pub fn key_for(&self, device_id: u32) -> Option<&AesKey> {
        self.keys.get(&format_device_id(device_id))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Loads a key store from a JSON object mapping device ids to 32-digit
    /// hex keys:
    ///
    /// ```json
    /// { "76160190": "00112233445566778899AABBCCDDEEFF" }
    /// ```
    pub fn from_json(json: &str) -> Result<KeyStore, WmBusError> {
        let raw: HashMap<String, String> =
            serde_json::from_str(json).map_err(|e| WmBusError::Key(e.to_string()))?;

        let mut store = KeyStore::new();
        for (device_id, hex_key) in raw {
            let key = AesKey::from_hex(&hex_key)
                .map_err(|e| WmBusError::Key(format!("key for {device_id}: {e}")))?;
            store.add_key(&device_id, key);
        }
        Ok(store)
    }
}
