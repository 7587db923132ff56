pub mod html;

pub use html::{ParsedPage, parse};
