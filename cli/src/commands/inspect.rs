//! Inspect command implementation

use anyhow::{Context, Result};
use clap::Args;
use profwire_rpc::commands::{PythonCall, ScriptCall};
use profwire_rpc::{InboundProfilingRequest, RequestRegistry, RpcCommand};
use profwire_shared::utils::hex_preview;
use profwire_shared::{Message, MessageId, ProfilerConfig, Tensor, WorkerId};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::output;

/// Bytes of wrapped payload shown in previews
const PREVIEW_BYTES: usize = 32;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Envelope message file written by `profwire wrap`
    pub input: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct TensorSummary {
    pub dtype: String,
    pub shape: Vec<usize>,
    pub nbytes: usize,
}

impl From<&Tensor> for TensorSummary {
    fn from(tensor: &Tensor) -> Self {
        Self {
            dtype: tensor.dtype().name().to_string(),
            shape: tensor.shape().to_vec(),
            nbytes: tensor.nbytes(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WrappedSummary {
    Python { payload_len: usize, preview: String },
    Script { qualified_name: String, args: usize },
    Other { message_type: String },
}

impl WrappedSummary {
    fn describe(command: &dyn RpcCommand) -> Self {
        if let Some(call) = command.downcast_ref::<PythonCall>() {
            WrappedSummary::Python {
                payload_len: call.pickled_payload().len(),
                preview: hex_preview(call.pickled_payload(), PREVIEW_BYTES),
            }
        } else if let Some(call) = command.downcast_ref::<ScriptCall>() {
            WrappedSummary::Script {
                qualified_name: call.qualified_name().to_string(),
                args: call.args().len(),
            }
        } else {
            WrappedSummary::Other {
                message_type: command.message_type().to_string(),
            }
        }
    }
}

/// Everything an envelope carries, in printable form
#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub id: MessageId,
    pub message_type: String,
    pub wrapped_message_type: String,
    pub from_worker_id: WorkerId,
    pub profiler: ProfilerConfig,
    pub tensors: Vec<TensorSummary>,
    pub wrapped: WrappedSummary,
}

/// Unwrap an envelope message with the builtin registry.
pub fn inspect_message(message: Message) -> Result<InspectReport> {
    let id = message.id();
    let registry = RequestRegistry::with_builtins();
    let envelope = InboundProfilingRequest::from_message(message, &registry)
        .context("Failed to unwrap profiling request")?;
    Ok(InspectReport {
        id,
        message_type: envelope.message_type().to_string(),
        wrapped_message_type: envelope.wrapped_message_type().to_string(),
        from_worker_id: envelope.from_worker_id(),
        profiler: envelope.profiler_config(),
        tensors: envelope.tensors().iter().map(TensorSummary::from).collect(),
        wrapped: WrappedSummary::describe(envelope.wrapped_command()),
    })
}

pub fn inspect_file(path: &Path) -> Result<InspectReport> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let message = Message::from_bytes(&bytes)
        .with_context(|| format!("{} is not a message file", path.display()))?;
    inspect_message(message)
}

pub fn run(args: InspectArgs) -> Result<()> {
    let report = inspect_file(&args.input)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    output::heading(&format!(
        "{} id={} from worker {}",
        report.message_type, report.id, report.from_worker_id
    ));
    output::field("wrapped type", &report.wrapped_message_type);
    output::field(
        "profiler",
        format!(
            "{:?} (input shapes={}, memory={}, stack={}, flops={}, modules={})",
            report.profiler.state,
            report.profiler.report_input_shapes,
            report.profiler.profile_memory,
            report.profiler.with_stack,
            report.profiler.with_flops,
            report.profiler.with_modules
        ),
    );
    match &report.wrapped {
        WrappedSummary::Python {
            payload_len,
            preview,
        } => output::field("python call", format!("{} bytes [{}]", payload_len, preview)),
        WrappedSummary::Script {
            qualified_name,
            args,
        } => output::field("script call", format!("{} ({} args)", qualified_name, args)),
        WrappedSummary::Other { message_type } => output::field("request", message_type),
    }
    if report.tensors.is_empty() {
        output::field("tensors", "none");
    } else {
        output::field("tensors", report.tensors.len());
        for (i, t) in report.tensors.iter().enumerate() {
            println!("    [{}] {} {:?} ({} bytes)", i, t.dtype, t.shape, t.nbytes);
        }
    }
    Ok(())
}
