//! The at-rest form of a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SessionId;

/// One stored session, keyed by its identifier.
///
/// Field names follow the document layout: `_id`, `user_id`, `data`,
/// `last_accessed`. `data` holds the sealed value map; nothing else about
/// the session's contents is readable at rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    #[serde(rename = "_id")]
    pub id: SessionId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,

    #[serde(rename = "data")]
    pub payload: String,

    pub last_accessed: DateTime<Utc>,
}
