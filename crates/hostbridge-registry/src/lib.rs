//! Handle registry shared between native code and a host runtime.
//!
//! Hosts that only exchange numbers and text refer to native objects by
//! tokens of the form `ref <tag> <id>`. [`HandleRegistry`] maps those
//! handles to raw pointers without owning the pointees; the generated C++
//! runtime implements the same contract.

pub mod error;
pub mod handle;
pub mod registry;

pub use error::{RegistryError, Result};
pub use handle::{Handle, TypeTag};
pub use registry::HandleRegistry;
