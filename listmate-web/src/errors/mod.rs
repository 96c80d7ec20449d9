mod http_error;
mod obfuscate_errors;
mod panic_handler;

pub use http_error::*;
pub use obfuscate_errors::*;
pub use panic_handler::*;
