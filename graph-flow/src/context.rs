use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{GraphError, Result};

/// Context for sharing data between tasks in a graph execution
#[derive(Clone, Debug)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let key = key.into();
        let value = serde_json::to_value(value)
            .map_err(|e| GraphError::ContextError(format!("failed to serialize '{key}': {e}")))?;
        self.data.insert(key, value);
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Like [`Context::get`] but a missing or mistyped value is an error.
    pub async fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .data
            .get(key)
            .map(|v| v.clone())
            .ok_or_else(|| GraphError::ContextError(format!("'{key}' not found in context")))?;
        serde_json::from_value(value)
            .map_err(|e| GraphError::ContextError(format!("'{key}' has unexpected shape: {e}")))
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
