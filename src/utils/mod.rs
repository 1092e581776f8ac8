pub(crate) mod byte_cursor;
pub(crate) mod bytes;
mod decode;
pub(crate) mod inflate;

pub(crate) use self::byte_cursor::ByteCursor;
pub use self::decode::{DecodeStrategy, StringDecoder, decode_string};
