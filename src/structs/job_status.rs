use std::fmt;

use crate::structs::error_proto::ErrorProto;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum State {
    Pending,
    Running,
    Done,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Pending => "PENDING",
            State::Running => "RUNNING",
            State::Done => "DONE",
            State::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

// https://cloud.google.com/bigquery/docs/reference/rest/v2/Job#JobStatus
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<State>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_result: Option<ErrorProto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorProto>>,
}
