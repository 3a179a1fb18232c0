pub mod error;
pub mod key;
pub mod value;

pub use error::{MapError, Result};
pub use key::{IntoKey, Key, MAX_KEY_LEN};
pub use value::Value;
