//! Value-level deep copy through a serde round trip.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::VellumResult;

/// Deep copy via JSON serialization.
///
/// Unlike `Clone`, the copy shares nothing with the source and drops any
/// state that is not part of the serialized form.
pub trait DeepClone: Sized {
    fn deep_clone(&self) -> VellumResult<Self>;
}

impl<T> DeepClone for T
where
    T: Serialize + DeserializeOwned,
{
    fn deep_clone(&self) -> VellumResult<Self> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json::from_value(value)?)
    }
}
