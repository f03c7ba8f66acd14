//! Newline framing, response parsing and command encoding for the Airview
//! serial protocol.
//!
//! The wire format is line-oriented ASCII:
//! - Requests are `<command>\n`
//! - Responses are `<command_id>|<info>,<payload>\n`
//!
//! The protocol carries no request identifiers. Responses are correlated
//! with requests only by order and by their `command_id`.

pub mod codec;
pub mod error;
pub mod reader;
pub mod response;
pub mod writer;

pub use codec::{encode_command, RawMessage, DELIMITER};
pub use error::{FrameError, Result};
pub use reader::{LineConfig, LineReader};
pub use response::{parse_body, parse_response, ParseFailure, ParsedResponse};
pub use writer::CommandWriter;
