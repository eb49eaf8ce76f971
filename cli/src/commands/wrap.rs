//! Wrap command implementation

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use profwire_rpc::commands::{PythonCall, ScriptCall};
use profwire_rpc::{OutboundProfilingRequest, RpcCommand};
use profwire_shared::{Message, MessageId, Tensor, Value};
use std::path::PathBuf;
use tracing::info;

use crate::config::CliConfig;

/// Request kind to build around the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RequestKind {
    /// Opaque pickled call, payload used as-is
    Python,
    /// Named call taking the payload as its single argument
    Script,
}

#[derive(Args, Debug)]
pub struct WrapArgs {
    /// File holding the request payload
    #[arg(short, long)]
    pub payload: PathBuf,

    /// Where to write the envelope message
    #[arg(short, long)]
    pub out: PathBuf,

    /// Request kind
    #[arg(short, long, value_enum, default_value = "python")]
    pub kind: RequestKind,

    /// Qualified function name for script requests
    #[arg(long, default_value = "builtin::echo")]
    pub name: String,

    /// Raw tensor buffer to attach (repeatable)
    #[arg(short, long)]
    pub tensor: Vec<PathBuf>,

    /// Correlation id of the wrapped request
    #[arg(long, default_value = "0")]
    pub id: MessageId,

    /// Override the configured worker id
    #[arg(short, long)]
    pub worker_id: Option<i16>,
}

/// Build the request message described by `args`.
pub fn build_request(args: &WrapArgs) -> Result<Message> {
    let payload = std::fs::read(&args.payload)
        .with_context(|| format!("Failed to read payload {}", args.payload.display()))?;
    let tensors = args
        .tensor
        .iter()
        .map(|path| {
            std::fs::read(path)
                .map(Tensor::from_bytes)
                .with_context(|| format!("Failed to read tensor {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let command: Box<dyn RpcCommand> = match args.kind {
        RequestKind::Python => Box::new(PythonCall::new(payload, tensors)),
        RequestKind::Script => {
            let mut call_args = vec![Value::Bytes(payload)];
            call_args.extend(tensors.into_iter().map(Value::Tensor));
            Box::new(ScriptCall::new(args.name.clone(), call_args))
        }
    };
    let mut message = command.into_message()?;
    message.set_id(args.id);
    Ok(message)
}

/// Wrap the request and return the serialized envelope bytes.
pub fn wrap(args: &WrapArgs, config: &CliConfig) -> Result<Vec<u8>> {
    let request = build_request(args)?;
    let worker_id = args.worker_id.unwrap_or(config.worker_id);
    let envelope = OutboundProfilingRequest::wrap(worker_id, request, config.profiler.clone())
        .context("Failed to wrap request")?
        .into_message()
        .context("Failed to serialize profiling request")?;
    info!(
        "Wrapped {:?} request (id={}, worker={}, {} tensors)",
        args.kind,
        envelope.id(),
        worker_id,
        envelope.tensors().len()
    );
    Ok(envelope.to_bytes()?)
}

pub fn run(args: WrapArgs, config: &CliConfig) -> Result<()> {
    let bytes = wrap(&args, config)?;
    std::fs::write(&args.out, &bytes)
        .with_context(|| format!("Failed to write {}", args.out.display()))?;
    crate::output::success(&format!(
        "Wrote {} bytes to {}",
        bytes.len(),
        args.out.display()
    ));
    Ok(())
}
