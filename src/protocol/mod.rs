//! Wire-level protocol handling
//!
//! - `http`: request/response heads, HTTP dates, `Basic` credentials
//! - `multipart`: MJPEG part headers (parse and encode)
//! - `constants`: boundary token, limits and defaults

pub mod constants;
pub mod http;
pub mod multipart;

pub use multipart::PartHeader;
