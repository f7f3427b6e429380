// Re-export all model types
pub use self::cart::*;
pub use self::enums::*;
pub use self::errors::*;

mod cart;
mod enums;
mod errors;
