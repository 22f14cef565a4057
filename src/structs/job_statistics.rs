use crate::structs::int64;
use serde::{Deserialize, Serialize};

// https://cloud.google.com/bigquery/docs/reference/rest/v2/Job#JobStatistics
// Times are milliseconds since the epoch.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatistics {
    #[serde(
        default,
        deserialize_with = "int64::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub creation_time: Option<i64>,
    #[serde(
        default,
        deserialize_with = "int64::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<i64>,
    #[serde(
        default,
        deserialize_with = "int64::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<i64>,
    #[serde(
        default,
        deserialize_with = "int64::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_bytes_processed: Option<i64>,
}
