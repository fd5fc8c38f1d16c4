// FFI 모듈 - C# (Unity) 연동용 C ABI
pub mod decoder;
pub mod registry;
pub mod types;

pub use decoder::*;
pub use types::ErrorCode;
