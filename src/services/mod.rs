//! Business logic layer: code generation, the event authorization gate, the
//! session reconciler, health probing, SSE fan-out, and the storage supervisor.

pub mod documentation;
pub mod event_gate;
pub mod health_service;
pub mod session_codes;
pub mod session_service;
pub mod sse_service;
pub mod storage_supervisor;
