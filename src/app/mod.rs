//! Application orchestration: argument dispatch, the serve session, and the
//! ping emitter that shares its output stream.

pub mod dispatch;
pub mod output;
pub mod ping;
pub mod session;
