//! Frame Builder
//!
//! `FrameBuilder` collects the nodes of one frame, orders them by stage,
//! and runs them against a backend.

use smallvec::SmallVec;

use super::node::RenderNode;
use super::stage::RenderStage;
use crate::renderer::backend::RenderBackend;
use crate::renderer::target::{FrameDescriptor, TargetId};

/// Node reference plus its scheduling key.
struct NodeEntry<'a> {
    stage: RenderStage,
    /// Insertion order within the frame (stable sort key)
    order: u16,
    node: &'a mut dyn RenderNode,
}

/// Per-frame node list.
///
/// Nodes are borrowed, not owned: their lifetime is managed by the caller
/// (usually a renderer feature) and outlives the builder.
///
/// ```ignore
/// let mut builder = FrameBuilder::new();
/// fog_feature.add_render_passes(&mut builder);
/// builder.execute(&mut backend, camera_target, &frame);
/// ```
pub struct FrameBuilder<'a> {
    nodes: SmallVec<[NodeEntry<'a>; 8]>,
    next_order: u16,
}

impl Default for FrameBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> FrameBuilder<'a> {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: SmallVec::new(),
            next_order: 0,
        }
    }

    /// Schedules a node at `stage`. Nodes in the same stage run in
    /// insertion order.
    #[inline]
    pub fn add_node(&mut self, stage: RenderStage, node: &'a mut dyn RenderNode) -> &mut Self {
        self.nodes.push(NodeEntry {
            stage,
            order: self.next_order,
            node,
        });
        self.next_order = self.next_order.wrapping_add(1);
        self
    }

    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn has_stage(&self, stage: RenderStage) -> bool {
        self.nodes.iter().any(|e| e.stage == stage)
    }

    /// Node names in execution order.
    #[must_use]
    pub fn schedule(&self) -> Vec<(RenderStage, &str)> {
        let mut order: Vec<_> = self.nodes.iter().collect();
        order.sort_by_key(|e| (e.stage.order(), e.order));
        order.into_iter().map(|e| (e.stage, e.node.name())).collect()
    }

    /// Runs every node of the frame.
    ///
    /// Node failures are logged and never abort the frame. After the last
    /// node, each node is told its frame target is gone.
    pub fn execute(
        mut self,
        backend: &mut dyn RenderBackend,
        color_target: TargetId,
        frame: &FrameDescriptor,
    ) {
        self.nodes.sort_by_key(|e| (e.stage.order(), e.order));

        backend.begin_frame(color_target, frame);

        for entry in &mut self.nodes {
            entry.node.configure(backend, color_target);
            if let Err(e) = entry.node.execute(backend, frame) {
                log::error!(
                    "Render node '{}' ({}) failed on frame {}: {e}",
                    entry.node.name(),
                    entry.stage,
                    frame.frame_index
                );
            }
        }

        for entry in &mut self.nodes {
            entry.node.on_target_invalidated();
        }

        backend.end_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FogError;
    use crate::renderer::backend::HeadlessBackend;
    use crate::renderer::target::TargetDesc;

    struct Recorder {
        name: &'static str,
        log: std::rc::Rc<std::cell::RefCell<Vec<String>>>,
        fail: bool,
    }

    impl RenderNode for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn configure(&mut self, _backend: &mut dyn RenderBackend, _color_target: TargetId) {
            self.log.borrow_mut().push(format!("configure {}", self.name));
        }

        fn execute(
            &mut self,
            _backend: &mut dyn RenderBackend,
            frame: &FrameDescriptor,
        ) -> crate::errors::Result<()> {
            self.log
                .borrow_mut()
                .push(format!("execute {} #{}", self.name, frame.frame_index));
            if self.fail {
                return Err(FogError::TargetInvalid);
            }
            Ok(())
        }

        fn on_target_invalidated(&mut self) {
            self.log.borrow_mut().push(format!("invalidate {}", self.name));
        }
    }

    #[test]
    fn nodes_run_by_stage_then_insertion_order() {
        let log: std::rc::Rc<std::cell::RefCell<Vec<String>>> = std::rc::Rc::default();
        let recorder = |name: &'static str, fail: bool| Recorder {
            name,
            log: std::rc::Rc::clone(&log),
            fail,
        };
        let mut ui = recorder("ui", false);
        let mut fog = recorder("fog", true);
        let mut opaque = recorder("opaque", false);
        let mut after_fog = recorder("after_fog", false);

        let mut backend = HeadlessBackend::new();
        let desc = TargetDesc::new(4, 4, wgpu::TextureFormat::Rgba8Unorm);
        let target = backend.create_target(&desc, "camera").unwrap();

        let mut builder = FrameBuilder::new();
        builder
            .add_node(RenderStage::UI, &mut ui)
            .add_node(RenderStage::BeforeTransparent, &mut fog)
            .add_node(RenderStage::Opaque, &mut opaque)
            .add_node(RenderStage::BeforeTransparent, &mut after_fog);

        assert_eq!(builder.node_count(), 4);
        assert!(builder.has_stage(RenderStage::BeforeTransparent));
        assert!(!builder.has_stage(RenderStage::ShadowMap));

        builder.execute(
            &mut backend,
            target,
            &FrameDescriptor::new(desc).with_frame_index(7),
        );

        assert_eq!(
            *log.borrow(),
            [
                "configure opaque",
                "execute opaque #7",
                "configure fog",
                "execute fog #7",
                "configure after_fog",
                "execute after_fog #7",
                "configure ui",
                "execute ui #7",
                "invalidate opaque",
                "invalidate fog",
                "invalidate after_fog",
                "invalidate ui",
            ]
        );
        assert_eq!(backend.stats().frames, 1);
    }
}
