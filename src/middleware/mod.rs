pub mod ingest_auth;
pub mod request_id;
