mod argument;
mod getset;
mod signature;

pub use argument::FuncArgs;
pub use getset::PySetterValue;
pub use signature::Signature;
