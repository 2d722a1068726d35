//! Chat client over the republic orchestrator: request validation, tape
//! history and recording, tool execution, and streaming.

mod assembler;
mod client;
mod prepare;
mod request;
mod results;
mod session;
mod stream;
mod text;

pub mod prelude {
    pub use crate::{
        AsyncStreamEvents, AsyncTextStream, ChatClient, ChatRequest, StreamEvent, StreamEvents,
        StreamState, StructuredOutput, Tape, TextStream, ToolAutoResult, ToolAutoResultKind,
    };
    pub use rcommon::{ErrorKind, ErrorPayload};
    pub use rtape::{AnchorSelector, TapeContext, TapeEntry, TapeEntryKind};
    pub use rtooling::{Tool, ToolContext, ToolExecutor, ToolSet};
}

pub use assembler::ToolCallAssembler;
pub use client::ChatClient;
pub use request::ChatRequest;
pub use results::{StreamEvent, StreamState, StructuredOutput, ToolAutoResult, ToolAutoResultKind};
pub use session::Tape;
pub use stream::{AsyncStreamEvents, AsyncTextStream, StreamEvents, TextStream};
