//! Built-in modules
//!
//! Vendor adapters live with the host integration; the core ships a dummy
//! placeholder and a scripted module used by simulations and tests.

pub mod dummy;
pub mod scripted;

pub use dummy::DummyModule;
pub use scripted::ScriptedModule;
