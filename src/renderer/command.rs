//! Render Commands
//!
//! The fog pass never talks to the GPU directly: it records blits into a
//! [`CommandBuffer`] and hands the buffer to the backend in one submission.

use std::borrow::Cow;

use smallvec::SmallVec;

use super::target::{ShaderProgramId, TargetId};

/// A single recorded render operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderCommand {
    /// Render `source` into `destination` through a fullscreen program.
    FilteredCopy {
        source: TargetId,
        destination: TargetId,
        program: ShaderProgramId,
    },
    /// Plain copy of `source` into `destination`.
    Copy {
        source: TargetId,
        destination: TargetId,
    },
}

impl RenderCommand {
    #[must_use]
    pub const fn source(&self) -> TargetId {
        match *self {
            Self::FilteredCopy { source, .. } | Self::Copy { source, .. } => source,
        }
    }

    #[must_use]
    pub const fn destination(&self) -> TargetId {
        match *self {
            Self::FilteredCopy { destination, .. } | Self::Copy { destination, .. } => destination,
        }
    }
}

/// A labelled list of commands submitted together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBuffer {
    label: Cow<'static, str>,
    commands: SmallVec<[RenderCommand; 4]>,
}

impl CommandBuffer {
    #[must_use]
    pub fn new(label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            label: label.into(),
            commands: SmallVec::new(),
        }
    }

    /// Records a plain copy.
    pub fn blit(&mut self, source: TargetId, destination: TargetId) -> &mut Self {
        self.commands.push(RenderCommand::Copy {
            source,
            destination,
        });
        self
    }

    /// Records a copy through `program`.
    pub fn blit_with(
        &mut self,
        source: TargetId,
        destination: TargetId,
        program: ShaderProgramId,
    ) -> &mut Self {
        self.commands.push(RenderCommand::FilteredCopy {
            source,
            destination,
            program,
        });
        self
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
