use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::PixelError;

// ============================================================================
// Pixel Layout
// ============================================================================

/// Byte offsets of each channel inside a pixel (B, G, R, A order)
const BLUE_BYTE: usize = 0;
const GREEN_BYTE: usize = 1;
const RED_BYTE: usize = 2;
const ALPHA_BYTE: usize = 3;

/// Rows are padded so every row starts on a 4-byte boundary
const ROW_ALIGNMENT: usize = 4;

/// Storage layout of a [`PixelBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One byte per pixel; a binary on/off mask
    Mono8,
    /// B, G, R
    Rgb24,
    /// B, G, R, A
    Argb32,
}

impl PixelFormat {
    /// Map a bit-depth tag to a format
    pub fn from_bits_per_pixel(bits_per_pixel: u32) -> Result<Self, PixelError> {
        match bits_per_pixel {
            8 => Ok(Self::Mono8),
            24 => Ok(Self::Rgb24),
            32 => Ok(Self::Argb32),
            _ => Err(PixelError::UnsupportedFormat { bits_per_pixel }),
        }
    }

    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Mono8 => 1,
            Self::Rgb24 => 3,
            Self::Argb32 => 4,
        }
    }
}

/// Color channel selector for the bulk channel operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Blue,
    Green,
    Red,
    Alpha,
}

impl Channel {
    #[inline]
    const fn byte(self) -> usize {
        match self {
            Self::Blue => BLUE_BYTE,
            Self::Green => GREEN_BYTE,
            Self::Red => RED_BYTE,
            Self::Alpha => ALPHA_BYTE,
        }
    }
}

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);

    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Gray level with full alpha
    #[inline]
    pub const fn gray(v: u8) -> Self {
        Self::rgb(v, v, v)
    }

    /// True when every color channel is zero (alpha ignored)
    #[inline]
    pub const fn is_black(&self) -> bool {
        self.r == 0 && self.g == 0 && self.b == 0
    }

    /// Same color with a different alpha
    #[inline]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Byte the 1-byte format stores for this color
    #[inline]
    const fn mask_byte(&self) -> u8 {
        if self.is_black() {
            0
        } else {
            u8::MAX
        }
    }

    #[inline]
    const fn to_bgra(self) -> [u8; 4] {
        [self.b, self.g, self.r, self.a]
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Source-over compositing of one BGRA pixel onto another.
///
/// `out_a = sa + da * (1 - sa)` and every color channel is
/// `(dst * da * (1 - sa) + src * sa) / out_a`, all in the 0..255 domain with
/// the result clamped. Transparent sources leave `dst` alone and opaque
/// sources replace it outright.
#[inline]
fn composite_over(dst: &mut [u8], src: [u8; 4]) {
    let sa = u32::from(src[ALPHA_BYTE]);
    if sa == 0 {
        return;
    }
    if sa == 255 {
        dst[..4].copy_from_slice(&src);
        return;
    }

    let da = u32::from(dst[ALPHA_BYTE]);
    let dst_weight = da * (255 - sa) / 255;
    let out_a = sa + dst_weight;

    for channel in [BLUE_BYTE, GREEN_BYTE, RED_BYTE] {
        let blended =
            (u32::from(dst[channel]) * dst_weight + u32::from(src[channel]) * sa) / out_a;
        dst[channel] = blended.min(255) as u8;
    }
    dst[ALPHA_BYTE] = out_a.min(255) as u8;
}

/// Overlap of a source rectangle placed at (x, y) with a destination
struct Clip {
    src_x: usize,
    src_y: usize,
    dst_x: usize,
    dst_y: usize,
    width: usize,
    height: usize,
}

impl Clip {
    fn new(dst: (u32, u32), src: (u32, u32), x: i32, y: i32) -> Option<Self> {
        let (dst_w, dst_h) = (i64::from(dst.0), i64::from(dst.1));
        let (src_w, src_h) = (i64::from(src.0), i64::from(src.1));
        let (x, y) = (i64::from(x), i64::from(y));

        let left = x.max(0);
        let top = y.max(0);
        let right = (x + src_w).min(dst_w);
        let bottom = (y + src_h).min(dst_h);
        if right <= left || bottom <= top {
            return None;
        }

        Some(Self {
            src_x: (left - x) as usize,
            src_y: (top - y) as usize,
            dst_x: left as usize,
            dst_y: top as usize,
            width: (right - left) as usize,
            height: (bottom - top) as usize,
        })
    }
}

// ============================================================================
// PixelBuffer
// ============================================================================

/// Software pixel surface in 1, 3 or 4 bytes per pixel.
///
/// Storage is `stride * height` bytes where `stride` is `width *
/// bytes_per_pixel` rounded up to a 4-byte boundary. The pixel at (x, y)
/// starts at `bytes_per_pixel * x + y * stride`.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    stride: usize,
}

impl PixelBuffer {
    /// Create a zeroed buffer in the given format
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let row_bytes = format.bytes_per_pixel() * width as usize;
        let padding = (ROW_ALIGNMENT - row_bytes % ROW_ALIGNMENT) % ROW_ALIGNMENT;
        let stride = row_bytes + padding;
        Self {
            pixels: vec![0; stride * height as usize],
            width,
            height,
            format,
            stride,
        }
    }

    /// Create a buffer from a bit-depth tag (8, 24 or 32)
    pub fn with_bits_per_pixel(
        width: u32,
        height: u32,
        bits_per_pixel: u32,
    ) -> Result<Self, PixelError> {
        let format = PixelFormat::from_bits_per_pixel(bits_per_pixel)?;
        Ok(Self::new(width, height, format))
    }

    /// Create a 32-bit BGRA buffer
    pub fn with_size(width: u32, height: u32) -> Self {
        Self::new(width, height, PixelFormat::Argb32)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    /// Bytes per row including padding
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Check if coordinates are within bounds
    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32
    }

    /// Calculate byte offset for pixel at (x, y)
    #[inline]
    fn pixel_index(&self, x: usize, y: usize) -> usize {
        self.bytes_per_pixel() * x + y * self.stride
    }

    fn checked_index(&self, x: i32, y: i32) -> Result<usize, PixelError> {
        if self.in_bounds(x, y) {
            Ok(self.pixel_index(x as usize, y as usize))
        } else {
            Err(PixelError::OutOfRange {
                x,
                y,
                width: self.width,
                height: self.height,
            })
        }
    }

    /// Visit every pixel's bytes, skipping row padding
    fn for_each_pixel_mut(&mut self, mut f: impl FnMut(&mut [u8])) {
        let bpp = self.bytes_per_pixel();
        let row_bytes = bpp * self.width as usize;
        if row_bytes == 0 {
            return;
        }
        for row in self.pixels.chunks_exact_mut(self.stride) {
            for pixel in row[..row_bytes].chunks_exact_mut(bpp) {
                f(pixel);
            }
        }
    }

    // ========================================================================
    // Per-pixel Access
    // ========================================================================

    /// Write a pixel (bounds checked).
    ///
    /// The 1-byte format stores a mask: any non-black color becomes 255,
    /// black becomes 0.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) -> Result<(), PixelError> {
        let idx = self.checked_index(x, y)?;
        match self.format {
            PixelFormat::Mono8 => self.pixels[idx] = color.mask_byte(),
            PixelFormat::Rgb24 => {
                self.pixels[idx..idx + 3].copy_from_slice(&color.to_bgra()[..3]);
            },
            PixelFormat::Argb32 => self.pixels[idx..idx + 4].copy_from_slice(&color.to_bgra()),
        }
        Ok(())
    }

    /// Read a pixel (bounds checked).
    ///
    /// Formats without alpha report full opacity; the 1-byte format reports
    /// its mask byte as a gray level.
    pub fn get_pixel(&self, x: i32, y: i32) -> Result<Color, PixelError> {
        let idx = self.checked_index(x, y)?;
        let p = &self.pixels;
        Ok(match self.format {
            PixelFormat::Mono8 => Color::gray(p[idx]),
            PixelFormat::Rgb24 => Color::rgb(p[idx + RED_BYTE], p[idx + GREEN_BYTE], p[idx]),
            PixelFormat::Argb32 => Color::rgba(
                p[idx + RED_BYTE],
                p[idx + GREEN_BYTE],
                p[idx + BLUE_BYTE],
                p[idx + ALPHA_BYTE],
            ),
        })
    }

    /// Fast unchecked single-byte write for the hot draw path.
    ///
    /// Writes the first byte of the pixel, which is the whole pixel in the
    /// 1-byte format.
    ///
    /// # Safety
    /// `(x, y)` must lie inside the buffer.
    #[inline]
    pub unsafe fn set_pixel_fast(&mut self, x: u32, y: u32, value: u8) {
        debug_assert!(x < self.width && y < self.height, "set_pixel_fast outside buffer");
        let idx = self.pixel_index(x as usize, y as usize);
        *self.pixels.get_unchecked_mut(idx) = value;
    }

    // ========================================================================
    // Fills
    // ========================================================================

    /// Fill every pixel with `color`, honoring the format's channel layout
    pub fn clear(&mut self, color: Color) {
        match self.format {
            PixelFormat::Mono8 => {
                let value = color.mask_byte();
                self.for_each_pixel_mut(|p| p[0] = value);
            },
            PixelFormat::Rgb24 => {
                let bgr = color.to_bgra();
                self.for_each_pixel_mut(|p| p.copy_from_slice(&bgr[..3]));
            },
            PixelFormat::Argb32 => {
                let bgra = color.to_bgra();
                self.for_each_pixel_mut(|p| p.copy_from_slice(&bgra));
            },
        }
    }

    /// Set alpha on every pixel. No-op without an alpha channel.
    pub fn set_alpha(&mut self, alpha: u8) {
        if self.format == PixelFormat::Argb32 {
            self.for_each_pixel_mut(|p| p[ALPHA_BYTE] = alpha);
        }
    }

    // ========================================================================
    // Buffer Operations
    // ========================================================================

    /// Opaque copy of `src` onto this buffer at (x, y), clipped to bounds.
    /// Both buffers must be 4 bytes per pixel; otherwise nothing happens.
    pub fn blit(&mut self, src: &PixelBuffer, x: i32, y: i32) {
        if self.format != PixelFormat::Argb32 || src.format != PixelFormat::Argb32 {
            return;
        }
        let Some(clip) = Clip::new((self.width, self.height), (src.width, src.height), x, y)
        else {
            return;
        };

        let bytes = clip.width * 4;
        for row in 0..clip.height {
            let si = src.pixel_index(clip.src_x, clip.src_y + row);
            let di = self.pixel_index(clip.dst_x, clip.dst_y + row);
            self.pixels[di..di + bytes].copy_from_slice(&src.pixels[si..si + bytes]);
        }
    }

    /// Alpha-composite `src` over this buffer at (x, y), clipped to bounds.
    /// Both buffers must be 4 bytes per pixel; otherwise nothing happens.
    pub fn alpha_composite(&mut self, src: &PixelBuffer, x: i32, y: i32) {
        if self.format != PixelFormat::Argb32 || src.format != PixelFormat::Argb32 {
            return;
        }
        let Some(clip) = Clip::new((self.width, self.height), (src.width, src.height), x, y)
        else {
            return;
        };

        for row in 0..clip.height {
            let si = src.pixel_index(clip.src_x, clip.src_y + row);
            let di = self.pixel_index(clip.dst_x, clip.dst_y + row);
            let src_row = &src.pixels[si..si + clip.width * 4];
            let dst_row = &mut self.pixels[di..di + clip.width * 4];

            for (d, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                composite_over(d, [s[0], s[1], s[2], s[3]]);
            }
        }
    }

    /// Composite a solid `color` wherever `mask` has a non-zero pixel.
    ///
    /// The mask's first byte per pixel decides coverage, so any format
    /// works as a mask. The color's alpha acts as opacity. This buffer must
    /// be 4 bytes per pixel.
    pub fn stamp_mask(&mut self, mask: &PixelBuffer, x: i32, y: i32, color: Color) {
        if self.format != PixelFormat::Argb32 {
            return;
        }
        let Some(clip) = Clip::new((self.width, self.height), (mask.width, mask.height), x, y)
        else {
            return;
        };

        let bgra = color.to_bgra();
        let mask_bpp = mask.bytes_per_pixel();
        for row in 0..clip.height {
            let mi = mask.pixel_index(clip.src_x, clip.src_y + row);
            let di = self.pixel_index(clip.dst_x, clip.dst_y + row);
            let mask_row = &mask.pixels[mi..mi + clip.width * mask_bpp];
            let dst_row = &mut self.pixels[di..di + clip.width * 4];

            for (d, m) in dst_row.chunks_exact_mut(4).zip(mask_row.chunks_exact(mask_bpp)) {
                if m[0] != 0 {
                    composite_over(d, bgra);
                }
            }
        }
    }

    // ========================================================================
    // Color Transforms
    // ========================================================================

    /// Zero one channel everywhere.
    /// Alpha needs 4 bytes per pixel, color channels need at least 3.
    pub fn remove_channel(&mut self, channel: Channel) {
        if !self.has_channel(channel) {
            return;
        }
        let byte = channel.byte();
        self.for_each_pixel_mut(|p| p[byte] = 0);
    }

    /// Add `shift` to one channel with saturation. 4 bytes per pixel only.
    pub fn shift_channel(&mut self, channel: Channel, shift: i32) {
        if self.format != PixelFormat::Argb32 {
            return;
        }
        let byte = channel.byte();
        self.for_each_pixel_mut(|p| {
            p[byte] = (i32::from(p[byte]) + shift).clamp(0, 255) as u8;
        });
    }

    /// Make every pixel whose RGB equals `color` fully transparent.
    /// 4 bytes per pixel only.
    pub fn set_transparent_color(&mut self, color: Color) {
        if self.format != PixelFormat::Argb32 {
            return;
        }
        self.for_each_pixel_mut(|p| {
            if p[BLUE_BYTE] == color.b && p[GREEN_BYTE] == color.g && p[RED_BYTE] == color.r {
                p[ALPHA_BYTE] = 0;
            }
        });
    }

    /// Replace every exact occurrence of `from` with `to`.
    /// The 4-byte format matches alpha too; the 1-byte format is untouched.
    pub fn replace_color(&mut self, from: Color, to: Color) {
        match self.format {
            PixelFormat::Mono8 => {},
            PixelFormat::Rgb24 => {
                let (from, to) = (from.to_bgra(), to.to_bgra());
                self.for_each_pixel_mut(|p| {
                    if p[..3] == from[..3] {
                        p.copy_from_slice(&to[..3]);
                    }
                });
            },
            PixelFormat::Argb32 => {
                let (from, to) = (from.to_bgra(), to.to_bgra());
                self.for_each_pixel_mut(|p| {
                    if *p == from {
                        p.copy_from_slice(&to);
                    }
                });
            },
        }
    }

    /// Replace colors pairwise, matching on RGB. The first match wins for
    /// each pixel and alpha is preserved.
    pub fn replace_colors(&mut self, from: &[Color], to: &[Color]) -> Result<(), PixelError> {
        if from.len() != to.len() {
            return Err(PixelError::MismatchedArrayLengths {
                from: from.len(),
                to: to.len(),
            });
        }
        if self.format == PixelFormat::Mono8 {
            return Ok(());
        }

        self.for_each_pixel_mut(|p| {
            let hit = from.iter().position(|c| {
                p[BLUE_BYTE] == c.b && p[GREEN_BYTE] == c.g && p[RED_BYTE] == c.r
            });
            if let Some(i) = hit {
                p[BLUE_BYTE] = to[i].b;
                p[GREEN_BYTE] = to[i].g;
                p[RED_BYTE] = to[i].r;
            }
        });
        Ok(())
    }

    /// Average the color channels. Needs at least 3 bytes per pixel.
    pub fn to_grayscale(&mut self) {
        if self.format == PixelFormat::Mono8 {
            return;
        }
        self.for_each_pixel_mut(|p| {
            let sum = u16::from(p[BLUE_BYTE]) + u16::from(p[GREEN_BYTE]) + u16::from(p[RED_BYTE]);
            let v = (sum / 3) as u8;
            p[..3].fill(v);
        });
    }

    /// Invert the color channels, leaving alpha. 4 bytes per pixel only.
    pub fn invert_colors(&mut self) {
        if self.format != PixelFormat::Argb32 {
            return;
        }
        self.for_each_pixel_mut(|p| {
            for c in &mut p[..3] {
                *c = u8::MAX - *c;
            }
        });
    }

    /// Rotate the image 180 degrees in place
    pub fn rotate_180(&mut self) {
        let w = self.width as usize;
        let h = self.height as usize;
        let bpp = self.bytes_per_pixel();
        let total = w * h;

        for i in 0..total / 2 {
            let j = total - 1 - i;
            let a = self.pixel_index(i % w, i / w);
            let b = self.pixel_index(j % w, j / w);
            for k in 0..bpp {
                self.pixels.swap(a + k, b + k);
            }
        }
    }

    /// Every distinct color in the image, in first-seen row-major order
    pub fn distinct_colors(&self) -> Vec<Color> {
        let mut seen = HashSet::new();
        let mut colors = Vec::new();
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                if let Ok(c) = self.get_pixel(x, y) {
                    if seen.insert(c) {
                        colors.push(c);
                    }
                }
            }
        }
        colors
    }

    fn has_channel(&self, channel: Channel) -> bool {
        match channel {
            Channel::Alpha => self.format == PixelFormat::Argb32,
            _ => self.format != PixelFormat::Mono8,
        }
    }

    // ========================================================================
    // Raw Access
    // ========================================================================

    /// Raw bytes (including row padding) for texture upload
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Shared writer for plotting from many threads at once
    pub fn mask_writer(&mut self) -> MaskWriter<'_> {
        let bytes: *mut [u8] = self.pixels.as_mut_slice();
        // Safety: AtomicU8 has the same size, alignment and bit validity as
        // u8, and the exclusive borrow keeps every non-atomic access out for
        // the writer's lifetime.
        let cells = unsafe { &*(bytes as *const [AtomicU8]) };
        MaskWriter {
            cells,
            width: self.width,
            height: self.height,
            stride: self.stride,
            bpp: self.bytes_per_pixel(),
        }
    }
}

// ============================================================================
// Plotting
// ============================================================================

/// Surface that snowflakes plot "on" pixels into
pub trait Plot {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Turn a pixel on, ignoring coordinates outside the surface
    fn plot(&mut self, x: i32, y: i32);

    /// Turn a pixel on without a bounds check
    ///
    /// # Safety
    /// `(x, y)` must lie inside the surface.
    unsafe fn plot_unchecked(&mut self, x: u32, y: u32);
}

impl Plot for PixelBuffer {
    #[inline]
    fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn plot(&mut self, x: i32, y: i32) {
        if self.in_bounds(x, y) {
            let idx = self.pixel_index(x as usize, y as usize);
            let bpp = self.bytes_per_pixel();
            self.pixels[idx..idx + bpp].fill(u8::MAX);
        }
    }

    #[inline]
    unsafe fn plot_unchecked(&mut self, x: u32, y: u32) {
        if self.format == PixelFormat::Mono8 {
            self.set_pixel_fast(x, y, u8::MAX);
        } else {
            let idx = self.pixel_index(x as usize, y as usize);
            let bpp = self.bytes_per_pixel();
            self.pixels.get_unchecked_mut(idx..idx + bpp).fill(u8::MAX);
        }
    }
}

/// `Copy + Send + Sync` view of a buffer's bytes as atomics.
///
/// Lets rayon workers plot into one back buffer concurrently. Every write
/// stores 255, so overlapping writes from different flakes are idempotent.
#[derive(Clone, Copy)]
pub struct MaskWriter<'a> {
    cells: &'a [AtomicU8],
    width: u32,
    height: u32,
    stride: usize,
    bpp: usize,
}

impl MaskWriter<'_> {
    #[inline]
    fn store(&self, idx: usize) {
        for cell in &self.cells[idx..idx + self.bpp] {
            cell.store(u8::MAX, Ordering::Relaxed);
        }
    }
}

impl Plot for MaskWriter<'_> {
    #[inline]
    fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn plot(&mut self, x: i32, y: i32) {
        if x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height {
            self.store(self.bpp * x as usize + y as usize * self.stride);
        }
    }

    #[inline]
    unsafe fn plot_unchecked(&mut self, x: u32, y: u32) {
        debug_assert!(x < self.width && y < self.height, "plot_unchecked outside buffer");
        let idx = self.bpp * x as usize + y as usize * self.stride;
        self.cells.get_unchecked(idx).store(u8::MAX, Ordering::Relaxed);
        for k in 1..self.bpp {
            self.cells.get_unchecked(idx + k).store(u8::MAX, Ordering::Relaxed);
        }
    }
}
