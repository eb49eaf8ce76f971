//! Profiler configuration propagated from the caller to the callee.
//!
//! The receiving worker enables a replica of the caller's profiler state for the
//! duration of the wrapped call, so the configuration must survive a byte
//! round-trip unchanged.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::protocol::value::Value;

/// Number of elements in the value form of [`ProfilerConfig`]
pub const PROFILER_CONFIG_VALUE_LEN: usize = 6;

/// Which profiler backend is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfilerState {
    #[default]
    Disabled,
    Cpu,
    Cuda,
    Nvtx,
    Kineto,
}

impl ProfilerState {
    pub fn as_i64(self) -> i64 {
        match self {
            ProfilerState::Disabled => 0,
            ProfilerState::Cpu => 1,
            ProfilerState::Cuda => 2,
            ProfilerState::Nvtx => 3,
            ProfilerState::Kineto => 4,
        }
    }

    pub fn from_i64(raw: i64) -> Result<Self> {
        match raw {
            0 => Ok(ProfilerState::Disabled),
            1 => Ok(ProfilerState::Cpu),
            2 => Ok(ProfilerState::Cuda),
            3 => Ok(ProfilerState::Nvtx),
            4 => Ok(ProfilerState::Kineto),
            other => Err(ProtocolError::malformed(
                "profiler state in 0..=4",
                other,
            )),
        }
    }
}

impl std::str::FromStr for ProfilerState {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "disabled" => Ok(ProfilerState::Disabled),
            "cpu" => Ok(ProfilerState::Cpu),
            "cuda" => Ok(ProfilerState::Cuda),
            "nvtx" => Ok(ProfilerState::Nvtx),
            "kineto" => Ok(ProfilerState::Kineto),
            _ => Err(ProtocolError::malformed("profiler state name", s)),
        }
    }
}

/// Profiler configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Active profiler backend
    pub state: ProfilerState,

    /// Record input shapes of profiled ops
    pub report_input_shapes: bool,

    /// Track tensor memory allocation
    pub profile_memory: bool,

    /// Record source stacks
    pub with_stack: bool,

    /// Estimate FLOPs
    pub with_flops: bool,

    /// Record module hierarchy
    pub with_modules: bool,
}

impl ProfilerConfig {
    /// Configuration with `state` and every flag off
    pub fn new(state: ProfilerState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    /// Value form carried in the profiling envelope metadata.
    pub fn to_value(&self) -> Value {
        Value::List(vec![
            Value::Int(self.state.as_i64()),
            Value::Bool(self.report_input_shapes),
            Value::Bool(self.profile_memory),
            Value::Bool(self.with_stack),
            Value::Bool(self.with_flops),
            Value::Bool(self.with_modules),
        ])
    }

    /// Rebuild a configuration from [`ProfilerConfig::to_value`] output.
    ///
    /// Anything other than the exact shape is rejected.
    pub fn from_value(value: &Value) -> Result<Self> {
        let items = value.as_list()?;
        if items.len() != PROFILER_CONFIG_VALUE_LEN {
            return Err(ProtocolError::TupleArity {
                expected: PROFILER_CONFIG_VALUE_LEN,
                actual: items.len(),
            });
        }
        Ok(Self {
            state: ProfilerState::from_i64(items[0].as_int()?)?,
            report_input_shapes: items[1].as_bool()?,
            profile_memory: items[2].as_bool()?,
            with_stack: items[3].as_bool()?,
            with_flops: items[4].as_bool()?,
            with_modules: items[5].as_bool()?,
        })
    }
}
