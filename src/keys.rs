use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Round-robin pool of Hypixel API keys.
///
/// Every call hands out the key under the cursor and advances it, so load is
/// spread evenly across keys and each stays under its own rate limit.
#[derive(Debug)]
pub struct KeyRotator {
    keys: Vec<String>,
    cursor: Mutex<usize>,
}

impl KeyRotator {
    pub fn new(keys: Vec<String>) -> Result<Self> {
        if keys.is_empty() {
            return Err(Error::config("at least one API key is required"));
        }
        if keys.iter().any(|k| k.trim().is_empty()) {
            return Err(Error::config("API keys cannot be blank"));
        }
        Ok(Self {
            keys,
            cursor: Mutex::new(0),
        })
    }

    /// Next key in rotation.
    pub fn next(&self) -> &str {
        let mut cursor = self.cursor.lock();
        let key = &self.keys[*cursor];
        *cursor = (*cursor + 1) % self.keys.len();
        key
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
