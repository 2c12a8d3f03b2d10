//! Backend-agnostic recorded command stream.
//!
//! Every logical overlay action records exactly one [`CommandList`] and
//! hands it to the device for submission; no component keeps a live list
//! across calls.

use crate::descriptors::DescriptorSlot;
use crate::device::{PipelineId, ResourceId, ResourceState};

/// A single subresource state transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Barrier {
    pub resource: ResourceId,
    pub subresource: u32,
    pub before: ResourceState,
    pub after: ResourceState,
}

impl Barrier {
    /// The inverse transition, used to restore a resource to the state it
    /// had before a draw.
    pub fn reversed(self) -> Self {
        Self {
            before: self.after,
            after: self.before,
            ..self
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Transition(Vec<Barrier>),
    CopyResource {
        dst: ResourceId,
        src: ResourceId,
    },
    CopyBufferToTexture {
        dst: ResourceId,
        src: ResourceId,
        width: u32,
        height: u32,
    },
    ClearRenderTarget {
        view: DescriptorSlot,
        color: [f32; 4],
    },
    ClearDepthStencil {
        view: DescriptorSlot,
        depth: f32,
        stencil: u8,
    },
    SetRenderTarget {
        color: DescriptorSlot,
        depth: Option<DescriptorSlot>,
    },
    SetViewport {
        width: u32,
        height: u32,
    },
    SetScissor {
        width: u32,
        height: u32,
    },
    SetPipeline(PipelineId),
    /// Bind a root constant buffer at `slot`, `offset` bytes into `buffer`.
    SetConstantBuffer {
        slot: u32,
        buffer: ResourceId,
        offset: u64,
    },
    /// Instanced triangle-strip draw.
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
}

/// A recorded, not-yet-submitted batch of commands.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandList {
    pub label: Option<&'static str>,
    pub commands: Vec<Command>,
}

impl CommandList {
    pub fn new(label: &'static str) -> Self {
        Self {
            label: Some(label),
            commands: Vec::new(),
        }
    }

    pub fn transition(&mut self, barriers: Vec<Barrier>) -> &mut Self {
        if !barriers.is_empty() {
            self.commands.push(Command::Transition(barriers));
        }
        self
    }

    pub fn copy_resource(&mut self, dst: ResourceId, src: ResourceId) -> &mut Self {
        self.commands.push(Command::CopyResource { dst, src });
        self
    }

    pub fn set_render_target(
        &mut self,
        color: DescriptorSlot,
        depth: Option<DescriptorSlot>,
    ) -> &mut Self {
        self.commands.push(Command::SetRenderTarget { color, depth });
        self
    }

    pub fn set_viewport_scissor(&mut self, width: u32, height: u32) -> &mut Self {
        self.commands.push(Command::SetViewport { width, height });
        self.commands.push(Command::SetScissor { width, height });
        self
    }

    pub fn set_pipeline(&mut self, pipeline: PipelineId) -> &mut Self {
        self.commands.push(Command::SetPipeline(pipeline));
        self
    }

    pub fn set_constant_buffer(
        &mut self,
        slot: u32,
        buffer: ResourceId,
        offset: u64,
    ) -> &mut Self {
        self.commands.push(Command::SetConstantBuffer {
            slot,
            buffer,
            offset,
        });
        self
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) -> &mut Self {
        self.commands.push(Command::Draw {
            vertex_count,
            instance_count,
        });
        self
    }
}
