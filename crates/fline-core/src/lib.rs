#![forbid(unsafe_code)]

//! Core: key model, escape decoding, chord bindings and digit arguments.

pub mod binding;
pub mod decoder;
pub mod descriptor;
pub mod digit_argument;
pub mod key;
pub mod logging;

pub use binding::{BindingTable, ChordResolver, Lookup, Resolution};
pub use decoder::InputDecoder;
pub use descriptor::DescriptorError;
pub use digit_argument::{ArgumentKey, DigitArgument, DigitArgumentKeys};
pub use key::{KeyChord, KeyCode, Modifiers, RawUnit};
