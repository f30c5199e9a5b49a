//! Pairs a handheld wand with an altar display and drives the altar with
//! gestures.
//!
//! The altar listens under a short room code; a wand dials it, handshakes
//! with its device capabilities and then streams commands produced by the
//! gesture recognizer. The altar dispatches each command to a handler that
//! talks to the content, oracle, navigation and atmosphere collaborators and
//! may answer with a response the wand mirrors.

pub mod collaborators;
pub mod config;
pub mod dispatcher;
pub mod feedback;
pub mod gesture;
pub mod protocol;
pub mod protocol_log;
pub mod room;
pub mod session;
pub mod supervisor;
pub mod transport;
