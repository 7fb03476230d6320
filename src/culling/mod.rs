//! Culling boundary types and traits.
//!
//! The renderer never walks the scene itself. An external culling collaborator
//! hands it the visible lights for the frame and answers shadow-caster queries
//! through the [`Culling`] trait. Everything here is per-frame data: owned by
//! the collaborator, immutable while the frame renders.

use glam::{Mat4, Vec3, Vec4};

/// Identity of a light, assigned by the owning scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightId(u64);

impl LightId {
    /// Create an id from a raw value.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

/// Per-frame handle used to query caster bounds and shadow matrices
/// for one visible light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisibilityHandle(u32);

impl VisibilityHandle {
    /// Create a handle from the light's index in the visible-light list.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get the index this handle wraps.
    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// What kind of light source a visible light is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    /// Parallel rays, no position (sun-like).
    Directional,
    /// Omni-directional point source.
    Point,
    /// Cone-shaped source.
    Spot,
}

/// Shadow casting mode of a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowMode {
    /// The light casts no shadows.
    #[default]
    None,
    /// Hard-edged shadows.
    Hard,
    /// Filtered shadows.
    Soft,
}

/// One visible light for the current frame.
#[derive(Debug, Clone)]
pub struct VisibleLight {
    /// Light identity.
    pub id: LightId,
    /// Final light color (intensity pre-multiplied, linear).
    pub color: Vec3,
    /// Direction the light points, normalized.
    pub direction: Vec3,
    /// Light kind.
    pub kind: LightKind,
    /// Shadow casting mode.
    pub shadow_mode: ShadowMode,
    /// Shadow strength in `0..=1`.
    pub shadow_strength: f32,
    /// Handle for caster-bounds and shadow-matrix queries.
    pub handle: VisibilityHandle,
}

impl VisibleLight {
    /// Create a directional light with shadows disabled.
    pub fn directional(id: LightId, color: Vec3, direction: Vec3, handle: VisibilityHandle) -> Self {
        Self {
            id,
            color,
            direction: direction.normalize_or_zero(),
            kind: LightKind::Directional,
            shadow_mode: ShadowMode::None,
            shadow_strength: 0.0,
            handle,
        }
    }

    /// Enable shadows with the given mode and strength.
    pub fn with_shadows(mut self, mode: ShadowMode, strength: f32) -> Self {
        self.shadow_mode = mode;
        self.shadow_strength = strength;
        self
    }
}

/// World-space bounds of a light's visible shadow casters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CasterBounds {
    /// Box center.
    pub center: Vec3,
    /// Box half-extents.
    pub extents: Vec3,
}

/// Split data restricting a shadow-caster draw to one light's coverage.
///
/// The culling sphere is `(center.xyz, radius)`. A radius of zero or less
/// disables the restriction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSplit {
    /// Culling sphere, `xyz` center and `w` radius.
    pub culling_sphere: Vec4,
}

impl ShadowSplit {
    /// A split that restricts nothing.
    pub const DISABLED: Self = Self {
        culling_sphere: Vec4::ZERO,
    };

    /// Create a split from a culling sphere.
    #[inline]
    pub fn sphere(center: Vec3, radius: f32) -> Self {
        Self {
            culling_sphere: center.extend(radius),
        }
    }

    /// Check whether a bounding sphere intersects the split.
    pub fn intersects(&self, center: Vec3, radius: f32) -> bool {
        let split_radius = self.culling_sphere.w;
        if split_radius <= 0.0 {
            return true;
        }
        let distance = (center - self.culling_sphere.truncate()).length();
        distance <= split_radius + radius
    }
}

/// Light-space matrices and split data for rendering one shadow tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowProjection {
    /// World-to-light view matrix.
    pub view: Mat4,
    /// Light projection matrix.
    pub projection: Mat4,
    /// Split data for the caster draw.
    pub split: ShadowSplit,
}

impl ShadowProjection {
    /// Fit a directional light projection around a bounding sphere.
    ///
    /// The light is placed outside the sphere looking at its center, with an
    /// orthographic projection that encloses it.
    pub fn directional(direction: Vec3, center: Vec3, radius: f32) -> Self {
        let mut direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            direction = Vec3::NEG_Y;
        }
        // look_at degenerates when the direction is parallel to up
        let up = if direction.y.abs() > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };

        let eye = center - direction * radius * 2.0;
        let view = Mat4::look_at_rh(eye, center, up);
        let projection =
            Mat4::orthographic_rh(-radius, radius, -radius, radius, 0.1, radius * 4.0);

        Self {
            view,
            projection,
            split: ShadowSplit::sphere(center, radius),
        }
    }
}

/// Per-frame culling query interface implemented by the scene collaborator.
pub trait Culling {
    /// All lights visible this frame, in culling order.
    fn visible_lights(&self) -> &[VisibleLight];

    /// Bounds of the shadow casters visible to the given light, or `None`
    /// when nothing in view would cast a shadow from it.
    fn caster_bounds(&self, handle: VisibilityHandle) -> Option<CasterBounds>;

    /// Shadow view/projection matrices for the given light, sized to a
    /// square tile of `tile_size` pixels.
    fn shadow_projection(&self, handle: VisibilityHandle, tile_size: u32) -> ShadowProjection;
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared culling fakes for unit tests.

    use std::cell::Cell;

    use super::*;

    /// Canned culling results driven by a light list.
    pub(crate) struct TestCulling {
        pub lights: Vec<VisibleLight>,
        /// Handles that report no casters in view.
        pub empty_bounds: Vec<VisibilityHandle>,
        /// Number of caster-bounds queries issued.
        pub bounds_queries: Cell<usize>,
        /// Tile size of the last shadow-projection query.
        pub last_tile_size: Cell<u32>,
    }

    impl TestCulling {
        pub fn new(lights: Vec<VisibleLight>) -> Self {
            Self {
                lights,
                empty_bounds: Vec::new(),
                bounds_queries: Cell::new(0),
                last_tile_size: Cell::new(0),
            }
        }

        pub fn without_casters(mut self, handle: VisibilityHandle) -> Self {
            self.empty_bounds.push(handle);
            self
        }
    }

    impl Culling for TestCulling {
        fn visible_lights(&self) -> &[VisibleLight] {
            &self.lights
        }

        fn caster_bounds(&self, handle: VisibilityHandle) -> Option<CasterBounds> {
            self.bounds_queries.set(self.bounds_queries.get() + 1);
            if self.empty_bounds.contains(&handle) {
                None
            } else {
                Some(CasterBounds {
                    center: Vec3::ZERO,
                    extents: Vec3::ONE,
                })
            }
        }

        fn shadow_projection(&self, handle: VisibilityHandle, tile_size: u32) -> ShadowProjection {
            self.last_tile_size.set(tile_size);
            let direction = self
                .lights
                .iter()
                .find(|light| light.handle == handle)
                .map(|light| light.direction)
                .unwrap_or(Vec3::NEG_Y);
            ShadowProjection::directional(direction, Vec3::ZERO, 10.0)
        }
    }

    /// A directional light with shadows enabled at full strength.
    pub(crate) fn shadowed_light(index: u32) -> VisibleLight {
        VisibleLight::directional(
            LightId::from_raw(index as u64),
            Vec3::ONE,
            Vec3::new(-0.5, -1.0, -0.3),
            VisibilityHandle::new(index),
        )
        .with_shadows(ShadowMode::Soft, 1.0)
    }
}
