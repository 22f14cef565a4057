pub mod error_proto;
pub mod google_error;
pub mod int64;
pub mod job;
pub mod job_cancel_response;
pub mod job_configuration;
pub mod job_configuration_query;
pub mod job_list;
pub mod job_list_item;
pub mod job_reference;
pub mod job_statistics;
pub mod job_status;
pub mod list_jobs_request;
