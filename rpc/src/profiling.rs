//! Profiling envelope around an RPC request.
//!
//! The caller wraps an already-serialized request message together with its
//! worker id and profiler configuration. The envelope travels as a single
//! [`MessageType::RUN_WITH_PROFILING_REQ`] message whose payload is the wrapped
//! request's payload with a metadata tuple spliced onto the end:
//!
//! ```text
//! payload = wrapped_payload ++ metadata ++ u64_be(len(metadata))
//! metadata = (wrapped_message_type: Int, from_worker_id: Int, profiler_config: List)
//! ```
//!
//! The tensor list and the correlation id are those of the wrapped request.
//! The callee splits the metadata off, rebuilds the wrapped request message and
//! hands it to the [`RequestRegistry`] for reconstruction.
//!
//! An envelope lives in one of two phases, modelled by [`ProfilingRequest`]:
//! [`OutboundProfilingRequest`] still owns the serialized wrapped message and is
//! consumed by [`OutboundProfilingRequest::into_message`];
//! [`InboundProfilingRequest`] owns the reconstructed wrapped command.

use std::any::Any;

use profwire_shared::protocol::{wire, wrapped};
use profwire_shared::{
    Message, MessageType, ProfilerConfig, ProtocolError, Result, Tensor, Value, WorkerId,
};
use tracing::debug;

use crate::command::{expect_type, RpcCommand};
use crate::registry::RequestRegistry;

/// Number of elements in the metadata tuple
pub const PROFILING_METADATA_LEN: usize = 3;

/// Most envelopes a received message may nest, counting the outermost one
pub const MAX_ENVELOPE_DEPTH: usize = 8;

fn check_envelope_type(message_type: MessageType) -> Result<()> {
    expect_type(message_type, MessageType::RUN_WITH_PROFILING_REQ)
}

/// Caller-side envelope: the wrapped request is still a serialized [`Message`].
#[derive(Debug)]
pub struct OutboundProfilingRequest {
    from_worker_id: WorkerId,
    message_type: MessageType,
    wrapped_message: Message,
    wrapped_message_type: MessageType,
    profiler_config: ProfilerConfig,
}

impl OutboundProfilingRequest {
    /// Wrap `wrapped_message`, which must be a request.
    ///
    /// `message_type` must be [`MessageType::RUN_WITH_PROFILING_REQ`].
    pub fn new(
        from_worker_id: WorkerId,
        message_type: MessageType,
        wrapped_message: Message,
        profiler_config: ProfilerConfig,
    ) -> Result<Self> {
        check_envelope_type(message_type)?;
        if !wrapped_message.is_request() {
            return Err(ProtocolError::NotARequest(wrapped_message.message_type()));
        }
        Ok(Self {
            from_worker_id,
            message_type,
            wrapped_message_type: wrapped_message.message_type(),
            wrapped_message,
            profiler_config,
        })
    }

    /// [`OutboundProfilingRequest::new`] with the envelope tag filled in.
    pub fn wrap(
        from_worker_id: WorkerId,
        wrapped_message: Message,
        profiler_config: ProfilerConfig,
    ) -> Result<Self> {
        Self::new(
            from_worker_id,
            MessageType::RUN_WITH_PROFILING_REQ,
            wrapped_message,
            profiler_config,
        )
    }

    pub fn from_worker_id(&self) -> WorkerId {
        self.from_worker_id
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn wrapped_message_type(&self) -> MessageType {
        self.wrapped_message_type
    }

    pub fn profiler_config(&self) -> ProfilerConfig {
        self.profiler_config.clone()
    }

    /// Tensors of the wrapped request, in order
    pub fn tensors(&self) -> &[Tensor] {
        self.wrapped_message.tensors()
    }

    /// Serialize into the single message sent over the wire.
    ///
    /// The wrapped payload and tensors are moved, not copied, into the result.
    pub fn into_message(self) -> Result<Message> {
        let wrapped_id = self.wrapped_message.id();
        let (mut payload, tensors, wrapped_type, _) = self.wrapped_message.into_parts();
        if payload.is_empty() {
            return Err(ProtocolError::EmptyWrappedPayload);
        }

        let metadata = Value::Tuple(vec![
            Value::Int(i64::from(wrapped_type.as_u16())),
            Value::Int(i64::from(self.from_worker_id)),
            self.profiler_config.to_value(),
        ]);
        let (profiling_payload, tensor_table) = wire::encode(metadata)?;
        debug_assert!(tensor_table.is_empty(), "profiling metadata holds no tensors");

        let wrapped_len = payload.len();
        wrapped::write_wrapped_payload(&mut payload, &profiling_payload);
        debug!(
            id = wrapped_id,
            wrapped_type = %wrapped_type,
            from_worker_id = self.from_worker_id,
            wrapped_len,
            metadata_len = profiling_payload.len(),
            tensors = tensors.len(),
            "wrapped request with profiling metadata"
        );

        Ok(Message::new(payload, tensors, self.message_type, wrapped_id))
    }
}

/// Metadata carried by a profiling envelope, parsed ahead of the wrapped request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilingMetadata {
    pub message_type: MessageType,
    pub from_worker_id: WorkerId,
    pub wrapped_message_type: MessageType,
    pub profiler_config: ProfilerConfig,
}

/// Split a received envelope into its metadata and the wrapped request message.
///
/// The returned message has the wrapped payload, the envelope's tensors, the
/// wrapped type tag and the envelope's correlation id. Its reconstruction is
/// left to the caller.
pub fn split_metadata(message: Message) -> Result<(ProfilingMetadata, Message)> {
    let (mut payload, tensors, message_type, id) = message.into_parts();
    check_envelope_type(message_type)?;

    let elements = wrapped::read_wrapped_payload(&mut payload)?;
    let [wrapped_type, from_worker_id, config]: [Value; PROFILING_METADATA_LEN] = elements
        .try_into()
        .map_err(|elements: Vec<Value>| ProtocolError::TupleArity {
            expected: PROFILING_METADATA_LEN,
            actual: elements.len(),
        })?;

    let raw_type = wrapped_type.as_int()?;
    let wrapped_message_type = u16::try_from(raw_type)
        .map(MessageType::from_u16)
        .map_err(|_| ProtocolError::malformed("message type in u16 range", raw_type))?;
    let raw_worker = from_worker_id.as_int()?;
    let from_worker_id = WorkerId::try_from(raw_worker)
        .map_err(|_| ProtocolError::malformed("worker id in i16 range", raw_worker))?;
    // Replica of the caller's profiler state, enabled locally for the call.
    let profiler_config = ProfilerConfig::from_value(&config)?;

    let wrapped_message = Message::new(payload, tensors, wrapped_message_type, id);
    if !wrapped_message.is_request() {
        return Err(ProtocolError::NotARequest(wrapped_message_type));
    }

    let metadata = ProfilingMetadata {
        message_type,
        from_worker_id,
        wrapped_message_type,
        profiler_config,
    };
    Ok((metadata, wrapped_message))
}

/// Callee-side envelope holding the reconstructed wrapped command.
#[derive(Debug)]
pub struct InboundProfilingRequest {
    from_worker_id: WorkerId,
    message_type: MessageType,
    wrapped_command: Box<dyn RpcCommand>,
    wrapped_message_type: MessageType,
    tensors: Vec<Tensor>,
    profiler_config: ProfilerConfig,
}

impl InboundProfilingRequest {
    pub fn new(
        from_worker_id: WorkerId,
        message_type: MessageType,
        wrapped_command: Box<dyn RpcCommand>,
        wrapped_message_type: MessageType,
        tensors: Vec<Tensor>,
        profiler_config: ProfilerConfig,
    ) -> Result<Self> {
        check_envelope_type(message_type)?;
        Ok(Self {
            from_worker_id,
            message_type,
            wrapped_command,
            wrapped_message_type,
            tensors,
            profiler_config,
        })
    }

    /// Assemble an envelope from metadata parsed by [`split_metadata`] and a
    /// command reconstructed separately.
    pub fn from_metadata(
        metadata: ProfilingMetadata,
        wrapped_command: Box<dyn RpcCommand>,
        tensors: Vec<Tensor>,
    ) -> Result<Self> {
        Self::new(
            metadata.from_worker_id,
            metadata.message_type,
            wrapped_command,
            metadata.wrapped_message_type,
            tensors,
            metadata.profiler_config,
        )
    }

    /// Parse a received envelope and reconstruct its wrapped command through `registry`.
    ///
    /// A wrapped envelope is unwrapped here rather than through the registry,
    /// up to [`MAX_ENVELOPE_DEPTH`] levels.
    pub fn from_message(message: Message, registry: &RequestRegistry) -> Result<Self> {
        Self::from_message_at_depth(message, registry, 1)
    }

    fn from_message_at_depth(
        message: Message,
        registry: &RequestRegistry,
        depth: usize,
    ) -> Result<Self> {
        let id = message.id();
        let (metadata, wrapped_message) = split_metadata(message)?;
        let tensors = wrapped_message.tensors().to_vec();
        let wrapped_command: Box<dyn RpcCommand> =
            if metadata.wrapped_message_type == MessageType::RUN_WITH_PROFILING_REQ {
                if !registry.contains(MessageType::RUN_WITH_PROFILING_REQ) {
                    return Err(ProtocolError::UnknownMessageType(
                        MessageType::RUN_WITH_PROFILING_REQ,
                    ));
                }
                if depth >= MAX_ENVELOPE_DEPTH {
                    return Err(ProtocolError::EnvelopeDepth {
                        max: MAX_ENVELOPE_DEPTH,
                    });
                }
                Box::new(Self::from_message_at_depth(wrapped_message, registry, depth + 1)?)
            } else {
                registry.deserialize_request(wrapped_message)?
            };
        debug!(
            id,
            depth,
            wrapped_type = %metadata.wrapped_message_type,
            from_worker_id = metadata.from_worker_id,
            tensors = tensors.len(),
            "unwrapped profiling request"
        );
        Self::from_metadata(metadata, wrapped_command, tensors)
    }

    pub fn wrapped_command(&self) -> &dyn RpcCommand {
        self.wrapped_command.as_ref()
    }

    /// Replace the wrapped command, returning the previous one.
    pub fn set_wrapped_command(&mut self, wrapped_command: Box<dyn RpcCommand>) -> Box<dyn RpcCommand> {
        std::mem::replace(&mut self.wrapped_command, wrapped_command)
    }

    /// Hand the wrapped command to the execution machinery.
    pub fn into_wrapped_command(self) -> Box<dyn RpcCommand> {
        self.wrapped_command
    }

    pub fn wrapped_message_type(&self) -> MessageType {
        self.wrapped_message_type
    }

    /// Profiler configuration to apply locally as a replica of the caller's
    pub fn profiler_config(&self) -> ProfilerConfig {
        self.profiler_config.clone()
    }

    pub fn from_worker_id(&self) -> WorkerId {
        self.from_worker_id
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }
}

impl RpcCommand for InboundProfilingRequest {
    fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Re-serialize the wrapped command and wrap it again with the same metadata.
    fn into_message(self: Box<Self>) -> Result<Message> {
        let this = *self;
        let wrapped_message = this.wrapped_command.into_message()?;
        OutboundProfilingRequest::new(
            this.from_worker_id,
            this.message_type,
            wrapped_message,
            this.profiler_config,
        )?
        .into_message()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A profiling envelope in either phase of its life.
#[derive(Debug)]
pub enum ProfilingRequest {
    Outbound(OutboundProfilingRequest),
    Inbound(InboundProfilingRequest),
}

impl ProfilingRequest {
    /// Caller side: wrap a serialized request.
    pub fn wrap(
        from_worker_id: WorkerId,
        wrapped_message: Message,
        profiler_config: ProfilerConfig,
    ) -> Result<Self> {
        OutboundProfilingRequest::wrap(from_worker_id, wrapped_message, profiler_config)
            .map(ProfilingRequest::Outbound)
    }

    /// Callee side: parse a received envelope.
    pub fn from_message(message: Message, registry: &RequestRegistry) -> Result<Self> {
        InboundProfilingRequest::from_message(message, registry).map(ProfilingRequest::Inbound)
    }

    /// Serialize, consuming the envelope.
    pub fn into_message(self) -> Result<Message> {
        match self {
            ProfilingRequest::Outbound(req) => req.into_message(),
            ProfilingRequest::Inbound(req) => Box::new(req).into_message(),
        }
    }

    pub fn is_outbound(&self) -> bool {
        matches!(self, ProfilingRequest::Outbound(_))
    }

    pub fn is_inbound(&self) -> bool {
        matches!(self, ProfilingRequest::Inbound(_))
    }

    pub fn from_worker_id(&self) -> WorkerId {
        match self {
            ProfilingRequest::Outbound(req) => req.from_worker_id(),
            ProfilingRequest::Inbound(req) => req.from_worker_id(),
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            ProfilingRequest::Outbound(req) => req.message_type(),
            ProfilingRequest::Inbound(req) => req.message_type(),
        }
    }

    pub fn wrapped_message_type(&self) -> MessageType {
        match self {
            ProfilingRequest::Outbound(req) => req.wrapped_message_type(),
            ProfilingRequest::Inbound(req) => req.wrapped_message_type(),
        }
    }

    pub fn profiler_config(&self) -> ProfilerConfig {
        match self {
            ProfilingRequest::Outbound(req) => req.profiler_config(),
            ProfilingRequest::Inbound(req) => req.profiler_config(),
        }
    }

    pub fn tensors(&self) -> &[Tensor] {
        match self {
            ProfilingRequest::Outbound(req) => req.tensors(),
            ProfilingRequest::Inbound(req) => req.tensors(),
        }
    }

    /// The reconstructed wrapped command; only an inbound envelope has one.
    pub fn wrapped_command(&self) -> Result<&dyn RpcCommand> {
        match self {
            ProfilingRequest::Outbound(_) => Err(ProtocolError::WrappedCommandUnavailable),
            ProfilingRequest::Inbound(req) => Ok(req.wrapped_command()),
        }
    }

    /// Attach a wrapped command after construction; only valid on an inbound envelope.
    pub fn set_wrapped_command(&mut self, wrapped_command: Box<dyn RpcCommand>) -> Result<()> {
        match self {
            ProfilingRequest::Outbound(_) => Err(ProtocolError::WrappedCommandUnavailable),
            ProfilingRequest::Inbound(req) => {
                req.set_wrapped_command(wrapped_command);
                Ok(())
            }
        }
    }

    pub fn into_wrapped_command(self) -> Result<Box<dyn RpcCommand>> {
        match self {
            ProfilingRequest::Outbound(_) => Err(ProtocolError::WrappedCommandUnavailable),
            ProfilingRequest::Inbound(req) => Ok(req.into_wrapped_command()),
        }
    }
}
