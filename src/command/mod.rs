//! Command recording and execution.
//!
//! GPU work is recorded as plain [`Command`] values into a named
//! [`CommandList`], then drained into an [`ExecutionContext`] at phase
//! boundaries. Recording is pure data: the ordering and resource-lifetime
//! contracts of the renderer are visible in the command stream itself, which
//! is what the tests assert against. The wgpu backend in [`crate::gpu`]
//! interprets the same stream against a real device.

use glam::Mat4;

use crate::culling::{ShadowSplit, VisibilityHandle};

/// Name identifying a render target across commands.
///
/// Targets are identified by name the whole frame, so an acquire in one
/// subsystem can be released by another without passing texture handles
/// around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub &'static str);

impl TargetId {
    /// The camera's own color+depth target, owned by the execution context
    /// rather than acquired from the pool.
    pub const CAMERA: Self = Self("camera_target");
}

/// Pixel format class of a pooled render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    /// Depth texture usable with a comparison sampler.
    Shadow,
    /// Color texture.
    Color,
}

/// Size and format of a temporary render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format class.
    pub format: TargetFormat,
}

impl TargetDesc {
    /// A square shadow target.
    #[inline]
    pub const fn shadow(size: u32) -> Self {
        Self {
            width: size,
            height: size,
            format: TargetFormat::Shadow,
        }
    }
}

/// A pixel-space viewport rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

/// Geometry group of a draw submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawGroup {
    /// Opaque geometry, drawn first.
    Opaque,
    /// Sky background, drawn after opaques.
    Skybox,
    /// Blended geometry, drawn last.
    Transparent,
}

/// Submission toggles carried by geometry draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawFlags {
    /// Allow dynamic batching of small meshes.
    pub dynamic_batching: bool,
    /// Allow GPU instancing of identical meshes.
    pub gpu_instancing: bool,
}

/// A single recorded GPU command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Open a named profiling region.
    BeginSample(&'static str),
    /// Close the matching profiling region.
    EndSample(&'static str),
    /// Acquire a temporary render target under a name.
    AcquireTarget {
        /// Target name.
        target: TargetId,
        /// Size and format.
        desc: TargetDesc,
    },
    /// Release a previously acquired target.
    ReleaseTarget {
        /// Target name.
        target: TargetId,
    },
    /// Route subsequent draws to a target.
    SetRenderTarget {
        /// Target name.
        target: TargetId,
    },
    /// Clear the current render target.
    Clear {
        /// Clear the depth attachment.
        depth: bool,
        /// Clear the color attachment to this value, if any.
        color: Option<[f32; 4]>,
    },
    /// Restrict subsequent draws to a viewport of the current target.
    SetViewport(Viewport),
    /// Set the view and projection matrices for subsequent draws.
    SetViewProjection {
        /// World-to-view matrix.
        view: Mat4,
        /// Projection matrix.
        projection: Mat4,
    },
    /// Draw the shadow casters of one light, restricted by split data.
    DrawShadowCasters {
        /// The light's visibility handle.
        handle: VisibilityHandle,
        /// Split restriction for the draw.
        split: ShadowSplit,
    },
    /// Draw one geometry group of the visible scene.
    DrawGeometry {
        /// Which group to draw.
        group: DrawGroup,
        /// Submission toggles.
        flags: DrawFlags,
    },
    /// Set a global integer shader uniform.
    SetGlobalInt {
        /// Uniform name.
        name: &'static str,
        /// Value.
        value: i32,
    },
    /// Set a global vec4-array shader uniform.
    SetGlobalVec4Array {
        /// Uniform name.
        name: &'static str,
        /// Values.
        values: Vec<[f32; 4]>,
    },
    /// Set a global mat4-array shader uniform.
    SetGlobalMat4Array {
        /// Uniform name.
        name: &'static str,
        /// Values.
        values: Vec<Mat4>,
    },
}

/// A named, append-only list of commands.
///
/// Lists are flushed at phase boundaries; flushing drains the recorded
/// commands into the execution context, so the list never grows past one
/// phase.
#[derive(Debug)]
pub struct CommandList {
    name: &'static str,
    commands: Vec<Command>,
}

impl CommandList {
    /// Create an empty list with a display name.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            commands: Vec::new(),
        }
    }

    /// Get the list name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of pending commands.
    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the list has no pending commands.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Append a command.
    #[inline]
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Open a named profiling region.
    pub fn begin_sample(&mut self, name: &'static str) {
        self.push(Command::BeginSample(name));
    }

    /// Close a named profiling region.
    pub fn end_sample(&mut self, name: &'static str) {
        self.push(Command::EndSample(name));
    }

    /// Drain all pending commands into the execution context.
    pub fn flush(&mut self, ctx: &mut dyn ExecutionContext) {
        if !self.commands.is_empty() {
            ctx.execute(std::mem::take(&mut self.commands));
        }
    }
}

/// Executes command streams against a backend.
///
/// Commands arrive in recording order across every flush of every list; a
/// backend must preserve that order. [`ExecutionContext::submit`] ends the
/// frame's stream.
pub trait ExecutionContext {
    /// Execute a batch of commands in order.
    fn execute(&mut self, commands: Vec<Command>);

    /// Submit everything executed so far to the device.
    fn submit(&mut self);

    /// Whether the backend's depth buffer runs reversed (1 near, 0 far).
    fn uses_reversed_depth(&self) -> bool {
        false
    }
}

#[cfg(test)]
pub(crate) mod recording {
    //! An execution context that records for assertions.

    use super::*;

    /// Captures every executed command and submit call.
    pub(crate) struct RecordingContext {
        pub commands: Vec<Command>,
        pub submits: usize,
        pub reversed_depth: bool,
    }

    impl RecordingContext {
        pub fn new() -> Self {
            Self {
                commands: Vec::new(),
                submits: 0,
                reversed_depth: false,
            }
        }

        /// Count of acquires issued for a target.
        pub fn acquires(&self, target: TargetId) -> usize {
            self.commands
                .iter()
                .filter(|command| {
                    matches!(command, Command::AcquireTarget { target: t, .. } if *t == target)
                })
                .count()
        }

        /// Count of releases issued for a target.
        pub fn releases(&self, target: TargetId) -> usize {
            self.commands
                .iter()
                .filter(|command| {
                    matches!(command, Command::ReleaseTarget { target: t } if *t == target)
                })
                .count()
        }

        /// Position of the first command matching a predicate.
        pub fn position(&self, predicate: impl Fn(&Command) -> bool) -> Option<usize> {
            self.commands.iter().position(predicate)
        }

        /// Whether begin/end sample regions pair up.
        pub fn samples_balanced(&self) -> bool {
            let mut depth = 0i32;
            for command in &self.commands {
                match command {
                    Command::BeginSample(_) => depth += 1,
                    Command::EndSample(_) => {
                        depth -= 1;
                        if depth < 0 {
                            return false;
                        }
                    }
                    _ => {}
                }
            }
            depth == 0
        }
    }

    impl ExecutionContext for RecordingContext {
        fn execute(&mut self, commands: Vec<Command>) {
            self.commands.extend(commands);
        }

        fn submit(&mut self) {
            self.submits += 1;
        }

        fn uses_reversed_depth(&self) -> bool {
            self.reversed_depth
        }
    }
}

#[cfg(test)]
mod tests {
    use super::recording::RecordingContext;
    use super::*;

    #[test]
    fn test_flush_drains_in_order() {
        let mut list = CommandList::new("Test");
        let mut ctx = RecordingContext::new();

        list.begin_sample("Test");
        list.push(Command::Clear {
            depth: true,
            color: None,
        });
        list.end_sample("Test");
        assert_eq!(list.len(), 3);

        list.flush(&mut ctx);
        assert!(list.is_empty());
        assert_eq!(ctx.commands.len(), 3);
        assert_eq!(ctx.commands[0], Command::BeginSample("Test"));
        assert_eq!(ctx.commands[2], Command::EndSample("Test"));
    }

    #[test]
    fn test_empty_flush_executes_nothing() {
        struct FailingContext;
        impl ExecutionContext for FailingContext {
            fn execute(&mut self, _commands: Vec<Command>) {
                panic!("executed an empty flush");
            }
            fn submit(&mut self) {}
        }

        let mut list = CommandList::new("Test");
        list.flush(&mut FailingContext);
    }
}
