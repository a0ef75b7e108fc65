use super::context::{PassIo, RenderContext, Slot};

/// One stage of the frame.
///
/// Passes communicate only through [`RenderContext`] intermediates and
/// declare which ones they touch so the pipeline can check their order.
pub trait RenderPass {
    fn name(&self) -> &'static str;

    fn reads(&self) -> &'static [Slot] {
        &[]
    }

    fn writes(&self) -> &'static [Slot] {
        &[]
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>);

    /// Recreates size-dependent targets. Never called with a zero size.
    fn resize(&mut self, _device: &wgpu::Device, _width: u32, _height: u32) {}

    fn io(&self) -> PassIo {
        PassIo {
            name: self.name(),
            reads: self.reads(),
            writes: self.writes(),
        }
    }
}
