//! JSON request bodies carrying a list of names.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};

/// A request body holding one non-empty list of names under a fixed field.
pub trait NameList: DeserializeOwned {
    const FIELD: &'static str;

    fn into_names(self) -> Vec<String>;
}

/// `{"tags": [...]}`
#[derive(Debug, Deserialize)]
pub struct TagsBody {
    pub tags: Vec<String>,
}

impl NameList for TagsBody {
    const FIELD: &'static str = "tags";

    fn into_names(self) -> Vec<String> {
        self.tags
    }
}

/// `{"links": [...]}`
#[derive(Debug, Deserialize)]
pub struct LinksBody {
    pub links: Vec<String>,
}

impl NameList for LinksBody {
    const FIELD: &'static str = "links";

    fn into_names(self) -> Vec<String> {
        self.links
    }
}

/// Decode `body` as `T` and return its names, rejecting an empty list.
pub fn names<T: NameList>(body: &[u8]) -> ApiResult<Vec<String>> {
    let parsed: T = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))?;

    let names = parsed.into_names();
    if names.is_empty() {
        return Err(ApiError::bad_request(format!(
            "'{}' must contain at least one item",
            T::FIELD
        )));
    }
    Ok(names)
}
