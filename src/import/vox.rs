//! MagicaVoxel `.vox` model loading.
//!
//! Parses the chunked container (SIZE, XYZI, RGBA; anything else is
//! skipped by its declared size) into a point set, and exposes the point
//! set as a color-aware edit predicate so a model is stamped into the
//! world by an ordinary edit.

use std::path::Path;

use glam::UVec3;
use thiserror::Error;

use crate::dag::{ColorPtr, ColorStore, DagConfig, DagStore, NodeCoord, NodePtr, VbrColor};
use crate::edit::editor::{EditAction, VbrVoxelEditor};

/// Load a model and stamp it into the world at `offset` in one edit.
pub fn stamp_file<S: DagStore, C: ColorStore>(
    path: impl AsRef<Path>,
    offset: UVec3,
    dag: &S,
    colors: &C,
    root: NodePtr,
    color_root: ColorPtr,
) -> crate::core::Result<(NodePtr, ColorPtr)> {
    let model = VoxModel::load(path)?.with_offset(offset);
    Ok(dag.edit_vbr(root, &model, colors, color_root))
}

#[derive(Debug, Error)]
pub enum VoxError {
    #[error("not a vox file (bad magic)")]
    BadMagic,
    #[error("truncated {0} chunk")]
    Truncated(&'static str),
    #[error("file contains no voxels")]
    NoVoxels,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One model voxel; coordinates are model-local.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoxVoxel {
    pub x: u8,
    pub y: u8,
    pub z: u8,
    pub color_index: u8,
}

/// A loaded model: a point set plus its palette.
pub struct VoxModel {
    pub size: UVec3,
    pub voxels: Vec<VoxVoxel>,
    /// Palette words as stored in the file (little-endian RGBA, so the
    /// red channel is the low byte).
    pub palette: [u32; 256],
    /// World-space translation applied when the model is stamped.
    pub offset: UVec3,
}

impl VoxModel {
    /// Parse a model from raw file contents.
    pub fn from_bytes(data: &[u8]) -> Result<VoxModel, VoxError> {
        let mut r = Reader { buf: data, pos: 0 };
        if r.bytes(4, "header")? != b"VOX " {
            return Err(VoxError::BadMagic);
        }
        let _version = r.u32("header")?;

        let mut model = VoxModel {
            size: UVec3::ZERO,
            voxels: Vec::new(),
            palette: DEFAULT_PALETTE,
            offset: UVec3::ZERO,
        };

        // Chunks nest (MAIN declares the rest as children) but children
        // follow inline, so a flat walk visits everything.
        while !r.is_empty() {
            let tag: [u8; 4] = r.bytes(4, "chunk")?.try_into().unwrap();
            let content_len = r.u32("chunk")? as usize;
            let _child_len = r.u32("chunk")?;
            match &tag {
                b"SIZE" => {
                    let mut body = r.body(content_len, "SIZE")?;
                    model.size = UVec3::new(
                        body.u32("SIZE")?,
                        body.u32("SIZE")?,
                        body.u32("SIZE")?,
                    );
                }
                b"XYZI" => {
                    let mut body = r.body(content_len, "XYZI")?;
                    let count = body.u32("XYZI")? as usize;
                    model.voxels.reserve(count);
                    for _ in 0..count {
                        let v = body.bytes(4, "XYZI")?;
                        model.voxels.push(VoxVoxel {
                            x: v[0],
                            y: v[1],
                            z: v[2],
                            color_index: v[3],
                        });
                    }
                }
                b"RGBA" => {
                    let mut body = r.body(content_len, "RGBA")?;
                    for slot in model.palette.iter_mut() {
                        *slot = body.u32("RGBA")?;
                    }
                }
                _ => {
                    r.bytes(content_len, "chunk")?;
                }
            }
        }

        if model.voxels.is_empty() {
            return Err(VoxError::NoVoxels);
        }
        log::info!(
            "loaded vox model: {} voxels, size {}x{}x{}",
            model.voxels.len(),
            model.size.x,
            model.size.y,
            model.size.z
        );
        Ok(model)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<VoxModel, VoxError> {
        Self::from_bytes(&std::fs::read(path)?)
    }

    pub fn with_offset(mut self, offset: UVec3) -> Self {
        self.offset = offset;
        self
    }

    /// World color for a palette index.
    fn color(&self, index: u8) -> VbrColor {
        let word = self.palette[index as usize];
        // File order is R,G,B,A; repack as 0xAARRGGBB.
        let (r, g, b, a) = (word & 0xff, (word >> 8) & 0xff, (word >> 16) & 0xff, word >> 24);
        VbrColor::rgba8((a << 24) | (r << 16) | (g << 8) | b)
    }
}

/// Stamps the point set into the world.
///
/// Node decisions scan the whole point set, so a stamp costs O(points)
/// per visited node. Fine for typical models; spatially indexing the
/// points would be the fix if huge imports ever matter.
impl VbrVoxelEditor for VoxModel {
    fn edit_node(
        &self,
        config: &DagConfig,
        coord: &NodeCoord,
        _ptr: NodePtr,
        _color: &mut VbrColor,
    ) -> EditAction {
        let vl = config.voxel_level();
        let lb = coord.lower_bound_at(vl);
        let ub = coord.upper_bound_at(vl);
        for v in &self.voxels {
            let pos = UVec3::new(v.x as u32, v.y as u32, v.z as u32) + self.offset;
            if pos.cmpge(lb).all() && pos.cmplt(ub).all() {
                return EditAction::Proceed;
            }
        }
        EditAction::NotAffected
    }

    fn edit_voxel(
        &self,
        _config: &DagConfig,
        coord: &NodeCoord,
        voxel: bool,
        color: &mut VbrColor,
    ) -> bool {
        for v in &self.voxels {
            let pos = UVec3::new(v.x as u32, v.y as u32, v.z as u32) + self.offset;
            if coord.pos == pos {
                *color = self.color(v.color_index);
                return true;
            }
        }
        voxel
    }
}

/// Little-endian cursor over the file contents. `body` carves a chunk's
/// declared content out so reads past it are truncation errors for that
/// chunk, not silent reads into the next one.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn bytes(&mut self, n: usize, chunk: &'static str) -> Result<&'a [u8], VoxError> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.buf.len());
        let end = end.ok_or(VoxError::Truncated(chunk))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self, chunk: &'static str) -> Result<u32, VoxError> {
        let b = self.bytes(4, chunk)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn body(&mut self, len: usize, chunk: &'static str) -> Result<Reader<'a>, VoxError> {
        Ok(Reader {
            buf: self.bytes(len, chunk)?,
            pos: 0,
        })
    }
}

/// Palette used when the file carries no RGBA chunk, in file word order.
const DEFAULT_PALETTE: [u32; 256] = [
    0x00000000, 0xffffffff, 0xffccffff, 0xff99ffff, 0xff66ffff, 0xff33ffff, 0xff00ffff, 0xffffccff,
    0xffccccff, 0xff99ccff, 0xff66ccff, 0xff33ccff, 0xff00ccff, 0xffff99ff, 0xffcc99ff, 0xff9999ff,
    0xff6699ff, 0xff3399ff, 0xff0099ff, 0xffff66ff, 0xffcc66ff, 0xff9966ff, 0xff6666ff, 0xff3366ff,
    0xff0066ff, 0xffff33ff, 0xffcc33ff, 0xff9933ff, 0xff6633ff, 0xff3333ff, 0xff0033ff, 0xffff00ff,
    0xffcc00ff, 0xff9900ff, 0xff6600ff, 0xff3300ff, 0xff0000ff, 0xffffffcc, 0xffccffcc, 0xff99ffcc,
    0xff66ffcc, 0xff33ffcc, 0xff00ffcc, 0xffffcccc, 0xffcccccc, 0xff99cccc, 0xff66cccc, 0xff33cccc,
    0xff00cccc, 0xffff99cc, 0xffcc99cc, 0xff9999cc, 0xff6699cc, 0xff3399cc, 0xff0099cc, 0xffff66cc,
    0xffcc66cc, 0xff9966cc, 0xff6666cc, 0xff3366cc, 0xff0066cc, 0xffff33cc, 0xffcc33cc, 0xff9933cc,
    0xff6633cc, 0xff3333cc, 0xff0033cc, 0xffff00cc, 0xffcc00cc, 0xff9900cc, 0xff6600cc, 0xff3300cc,
    0xff0000cc, 0xffffff99, 0xffccff99, 0xff99ff99, 0xff66ff99, 0xff33ff99, 0xff00ff99, 0xffffcc99,
    0xffcccc99, 0xff99cc99, 0xff66cc99, 0xff33cc99, 0xff00cc99, 0xffff9999, 0xffcc9999, 0xff999999,
    0xff669999, 0xff339999, 0xff009999, 0xffff6699, 0xffcc6699, 0xff996699, 0xff666699, 0xff336699,
    0xff006699, 0xffff3399, 0xffcc3399, 0xff993399, 0xff663399, 0xff333399, 0xff003399, 0xffff0099,
    0xffcc0099, 0xff990099, 0xff660099, 0xff330099, 0xff000099, 0xffffff66, 0xffccff66, 0xff99ff66,
    0xff66ff66, 0xff33ff66, 0xff00ff66, 0xffffcc66, 0xffcccc66, 0xff99cc66, 0xff66cc66, 0xff33cc66,
    0xff00cc66, 0xffff9966, 0xffcc9966, 0xff999966, 0xff669966, 0xff339966, 0xff009966, 0xffff6666,
    0xffcc6666, 0xff996666, 0xff666666, 0xff336666, 0xff006666, 0xffff3366, 0xffcc3366, 0xff993366,
    0xff663366, 0xff333366, 0xff003366, 0xffff0066, 0xffcc0066, 0xff990066, 0xff660066, 0xff330066,
    0xff000066, 0xffffff33, 0xffccff33, 0xff99ff33, 0xff66ff33, 0xff33ff33, 0xff00ff33, 0xffffcc33,
    0xffcccc33, 0xff99cc33, 0xff66cc33, 0xff33cc33, 0xff00cc33, 0xffff9933, 0xffcc9933, 0xff999933,
    0xff669933, 0xff339933, 0xff009933, 0xffff6633, 0xffcc6633, 0xff996633, 0xff666633, 0xff336633,
    0xff006633, 0xffff3333, 0xffcc3333, 0xff993333, 0xff663333, 0xff333333, 0xff003333, 0xffff0033,
    0xffcc0033, 0xff990033, 0xff660033, 0xff330033, 0xff000033, 0xffffff00, 0xffccff00, 0xff99ff00,
    0xff66ff00, 0xff33ff00, 0xff00ff00, 0xffffcc00, 0xffcccc00, 0xff99cc00, 0xff66cc00, 0xff33cc00,
    0xff00cc00, 0xffff9900, 0xffcc9900, 0xff999900, 0xff669900, 0xff339900, 0xff009900, 0xffff6600,
    0xffcc6600, 0xff996600, 0xff666600, 0xff336600, 0xff006600, 0xffff3300, 0xffcc3300, 0xff993300,
    0xff663300, 0xff333300, 0xff003300, 0xffff0000, 0xffcc0000, 0xff990000, 0xff660000, 0xff330000,
    0xff0000ee, 0xff0000dd, 0xff0000bb, 0xff0000aa, 0xff000088, 0xff000077, 0xff000055, 0xff000044,
    0xff000022, 0xff000011, 0xff00ee00, 0xff00dd00, 0xff00bb00, 0xff00aa00, 0xff008800, 0xff007700,
    0xff005500, 0xff004400, 0xff002200, 0xff001100, 0xffee0000, 0xffdd0000, 0xffbb0000, 0xffaa0000,
    0xff880000, 0xff770000, 0xff550000, 0xff440000, 0xff220000, 0xff110000, 0xffeeeeee, 0xffdddddd,
    0xffbbbbbb, 0xffaaaaaa, 0xff888888, 0xff777777, 0xff555555, 0xff444444, 0xff222222, 0xff111111,
];
