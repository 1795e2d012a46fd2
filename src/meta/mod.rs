//! The metadata language: a compact, line-oriented text encoding used for
//! file headers, file metadata, chunk headers and structured content.
//!
//! ```text
//! title:"A beautiful picture"
//! size:{width:640,height:480}
//! tags:["night","paris"]
//! hdr:+
//! date:_"2024-10-22T08:55:22.000Z"
//! ```
//!
//! | Value              | Encoding           |
//! |--------------------|--------------------|
//! | `true` / `false`   | `+` / `-`          |
//! | null               | `*`                |
//! | ±Infinity          | `inf` / `-inf`     |
//! | NaN                | omitted            |
//! | date               | `_"<ISO-8601>"`    |
//! | string             | `"..."` (escaped)  |
//!
//! `parse(&stringify(&m)) == m` holds for every map without `NaN` in it.

pub mod parse;
pub mod stringify;
pub mod value;

pub use parse::{parse, parse_value, SyntaxError};
pub use stringify::{stringify, stringify_value};
pub use value::{Map, Value};
