//! Temporary render-target pooling.

use std::collections::HashMap;

use crate::command::{TargetDesc, TargetFormat, TargetId};

/// A pooled texture with its default view.
struct PooledTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    desc: TargetDesc,
}

/// Pool of temporary render targets keyed by name.
///
/// Acquire creates a texture or reuses a released one with a matching
/// descriptor; release returns it to the free list for the next frame.
/// Acquire and release totals are tracked so a frame can be audited for
/// leaks.
pub struct TargetPool {
    live: HashMap<TargetId, PooledTarget>,
    free: Vec<PooledTarget>,
    acquired_total: usize,
    released_total: usize,
}

impl Default for TargetPool {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            live: HashMap::new(),
            free: Vec::new(),
            acquired_total: 0,
            released_total: 0,
        }
    }

    /// Acquire a target under a name.
    pub fn acquire(&mut self, device: &wgpu::Device, target: TargetId, desc: TargetDesc) {
        if self.live.contains_key(&target) {
            log::warn!("render target {:?} acquired while still live", target.0);
            return;
        }
        let pooled = match self.free.iter().position(|entry| entry.desc == desc) {
            Some(index) => self.free.swap_remove(index),
            None => Self::create_target(device, target, desc),
        };
        self.live.insert(target, pooled);
        self.acquired_total += 1;
    }

    /// Release a target back to the pool.
    pub fn release(&mut self, target: TargetId) {
        match self.live.remove(&target) {
            Some(pooled) => {
                self.free.push(pooled);
                self.released_total += 1;
            }
            None => log::warn!("released render target {:?} that was not live", target.0),
        }
    }

    /// View of a live target.
    pub fn view(&self, target: TargetId) -> Option<&wgpu::TextureView> {
        self.live.get(&target).map(|pooled| &pooled.view)
    }

    /// Descriptor of a live target.
    pub fn desc(&self, target: TargetId) -> Option<TargetDesc> {
        self.live.get(&target).map(|pooled| pooled.desc)
    }

    /// Texture of a live target.
    pub fn texture(&self, target: TargetId) -> Option<&wgpu::Texture> {
        self.live.get(&target).map(|pooled| &pooled.texture)
    }

    /// Number of currently live targets.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Lifetime acquire count.
    #[inline]
    pub fn acquired_total(&self) -> usize {
        self.acquired_total
    }

    /// Lifetime release count.
    #[inline]
    pub fn released_total(&self) -> usize {
        self.released_total
    }

    fn create_target(device: &wgpu::Device, target: TargetId, desc: TargetDesc) -> PooledTarget {
        let (format, usage) = match desc.format {
            TargetFormat::Shadow => (
                wgpu::TextureFormat::Depth32Float,
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            ),
            TargetFormat::Color => (
                wgpu::TextureFormat::Rgba8UnormSrgb,
                wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
            ),
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(target.0),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        PooledTarget {
            texture,
            view,
            desc,
        }
    }
}
