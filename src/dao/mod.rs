/// Durable string-keyed blob store holding the serialized session.
pub mod kv_store;
/// File-backed question list.
pub mod questions;
/// Storage error types shared by the persistence collaborators.
pub mod storage;
