//! SOCKS5 command parsing module
//!
//! Handles parsing SOCKS5 requests and building replies.

mod parser;
mod reply;

pub use parser::parse_request;
pub use reply::{
    build_reply, send_command_not_supported, send_host_unreachable, send_reply, send_success,
    Response,
};
