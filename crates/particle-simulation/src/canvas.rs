//! Double-buffered RGBA8 canvases
//!
//! Every pixel is one `AtomicU32` holding the bytes `[r, g, b, a]` in
//! little-endian order. Workers paint with a compare-exchange loop, so two
//! particles from different partitions landing on the same pixel never lose
//! an update and no lock is taken on the paint path.

use std::sync::atomic::{AtomicU32, Ordering};

/// Which of the two canvases a frame paints into
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CanvasSlot {
    A,
    B,
}

impl CanvasSlot {
    /// Even frames paint into `A`, odd frames into `B`
    pub fn for_frame(frame: u64) -> Self {
        if frame % 2 == 0 {
            CanvasSlot::A
        } else {
            CanvasSlot::B
        }
    }

    pub fn index(self) -> usize {
        match self {
            CanvasSlot::A => 0,
            CanvasSlot::B => 1,
        }
    }
}

pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Box<[AtomicU32]>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: (0..len).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    /// Saturating-add `rgb` to the pixel at `(x, y)` and make it opaque.
    ///
    /// Returns `false` when the pixel is outside the canvas.
    pub fn write(&self, x: u32, y: u32, rgb: [u8; 3]) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }

        let index = y as usize * self.width as usize + x as usize;
        // The closure always returns `Some`, so this cannot fail.
        let _ = self.pixels[index].fetch_update(Ordering::Relaxed, Ordering::Relaxed, |pixel| {
            Some(add_saturating(pixel, rgb))
        });
        true
    }

    /// Paint for a frame that expects a `frame_width × frame_height` canvas.
    ///
    /// A canvas left over from before a resize no longer matches the frame
    /// parameters; the write is skipped rather than landing on the wrong pixel.
    pub fn paint(&self, frame_width: u32, frame_height: u32, x: u32, y: u32, rgb: [u8; 3]) -> bool {
        if !self.matches(frame_width, frame_height) {
            log::trace!(
                "canvas is {}x{}, frame expects {}x{}; skipping paint",
                self.width,
                self.height,
                frame_width,
                frame_height
            );
            return false;
        }
        self.write(x, y, rgb)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = y as usize * self.width as usize + x as usize;
        Some(self.pixels[index].load(Ordering::Relaxed).to_le_bytes())
    }

    /// Copy the canvas out and zero it.
    ///
    /// Only called once every worker has finished the frame, so no write
    /// races with the swap.
    pub fn snapshot_and_clear(&self, frame: u64) -> CanvasSnapshot {
        let mut pixels = Vec::with_capacity(self.pixels.len() * 4);
        for pixel in self.pixels.iter() {
            pixels.extend_from_slice(&pixel.swap(0, Ordering::Relaxed).to_le_bytes());
        }

        CanvasSnapshot {
            width: self.width,
            height: self.height,
            frame,
            pixels,
        }
    }
}

fn add_saturating(pixel: u32, rgb: [u8; 3]) -> u32 {
    let [r, g, b, _] = pixel.to_le_bytes();
    u32::from_le_bytes([
        r.saturating_add(rgb[0]),
        g.saturating_add(rgb[1]),
        b.saturating_add(rgb[2]),
        255,
    ])
}

/// Immutable copy of a finished canvas, row-major RGBA8
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanvasSnapshot {
    pub width: u32,
    pub height: u32,
    /// Frame the canvas was painted for
    pub frame: u64,
    pixels: Vec<u8>,
}

impl CanvasSnapshot {
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut rgba = [0; 4];
        rgba.copy_from_slice(&self.pixels[offset..offset + 4]);
        Some(rgba)
    }

    /// Number of pixels at least one particle landed on
    pub fn painted_pixels(&self) -> usize {
        self.pixels.chunks_exact(4).filter(|px| px[3] != 0).count()
    }
}
