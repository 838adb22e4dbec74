pub mod decode;
pub mod http_client;
pub mod json_file;
pub mod traits;

pub use traits::Source;
