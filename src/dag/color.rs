//! Variable-bit-rate color token.

/// A color value attached to voxels and subtrees.
///
/// Equality-comparable; the distinguished unset value signals divergent
/// children and forces per-voxel resolution instead of bulk fill. This
/// build carries an RGBA8 payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct VbrColor(Option<u32>);

impl VbrColor {
    /// The unset/mixed value.
    pub const UNSET: VbrColor = VbrColor(None);

    /// From a packed 0xAARRGGBB value.
    pub fn rgba8(rgba: u32) -> Self {
        VbrColor(Some(rgba))
    }

    /// From an opaque 0xRRGGBB value.
    pub fn rgb8(rgb: u32) -> Self {
        VbrColor(Some(0xff00_0000 | (rgb & 0x00ff_ffff)))
    }

    /// Quantize a float color triple (each in 0..=1), e.g. from a picker.
    pub fn from_f32(r: f32, g: f32, b: f32) -> Self {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
        Self::rgb8((q(r) << 16) | (q(g) << 8) | q(b))
    }

    pub fn is_set(self) -> bool {
        self.0.is_some()
    }

    /// Packed RGBA payload, if set.
    pub fn rgba(self) -> Option<u32> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_is_default() {
        assert_eq!(VbrColor::default(), VbrColor::UNSET);
        assert!(!VbrColor::UNSET.is_set());
    }

    #[test]
    fn test_rgb8_is_opaque() {
        let c = VbrColor::rgb8(0x123456);
        assert_eq!(c.rgba(), Some(0xff123456));
        assert_ne!(c, VbrColor::UNSET);
    }

    #[test]
    fn test_from_f32_quantizes() {
        assert_eq!(VbrColor::from_f32(1.0, 0.0, 0.0), VbrColor::rgb8(0xff0000));
        assert_eq!(VbrColor::from_f32(0.0, 1.0, 1.0), VbrColor::rgb8(0x00ffff));
    }
}
