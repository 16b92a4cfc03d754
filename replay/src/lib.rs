//! Decoding for AWBW match recordings.
//!
//! A replay arrives either as a zip archive or as a bare gzip stream wrapping a
//! JSON document. `ReplayParser` unwraps the container and runs every action
//! fragment through an `ActionRegistry`, producing a `ReplayData` where each
//! action is a fully typed `ReplayAction`. Decoding is all or nothing: a single
//! malformed action fails the whole replay.

pub mod actions;
pub use actions::ReplayAction;

pub mod date_parser;

mod errors;
pub use errors::{DecodeError, RegistryError};

mod model;
pub use model::{
    Position, ReplayBuilding, ReplayContext, ReplayData, ReplayInfo, ReplayUnit, ReplayUser, TurnContext, TurnData,
};

mod parser;
pub use parser::{ContainerKind, ReplayParser, SUPPORTED_VERSION};

mod registry;
pub use registry::{ActionRegistry, DecodeFn};
