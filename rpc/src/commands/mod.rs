//! Concrete request and response kinds

pub mod python;
pub mod script;

pub use python::{PythonCall, PythonResp};
pub use script::{ScriptCall, ScriptResp};
