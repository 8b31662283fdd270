use crate::api::SenderFrame;
use crate::streams::StreamDescription;
use crate::sys::{PixelFormat, StreamHandle};
use log::{debug, error};
use std::collections::HashMap;

/// 8-bit pixel in the byte order host-memory frames use
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Bgra {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub a: u8,
}

unsafe impl bytemuck::Zeroable for Bgra {}
unsafe impl bytemuck::Pod for Bgra {}

impl Bgra {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { b, g, r, a }
    }

    pub fn grey(v: u8) -> Self {
        Self::new(v, v, v, 255)
    }

    /// From `0..1` components, clamped
    pub fn from_rgba_f32([r, g, b, a]: [f32; 4]) -> Self {
        let q = |c: f32| (c.clamp(0., 1.) * 255.).round() as u8;
        Self::new(q(r), q(g), q(b), q(a))
    }
}

/// A host-memory render target matching one stream
pub struct HostTarget {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<Bgra>,
}

impl HostTarget {
    /// Whether a stream in `format` can be rendered into a `HostTarget`
    pub fn supports(format: PixelFormat) -> bool {
        matches!(format, PixelFormat::BGRA8 | PixelFormat::BGRX8)
    }

    fn new(stream: &StreamDescription) -> Self {
        Self {
            width: stream.width,
            height: stream.height,
            format: stream.format,
            pixels: vec![Bgra::default(); stream.width as usize * stream.height as usize],
        }
    }

    fn matches(&self, stream: &StreamDescription) -> bool {
        self.width == stream.width && self.height == stream.height && self.format == stream.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.width * std::mem::size_of::<Bgra>() as u32
    }

    pub fn fill(&mut self, color: Bgra) {
        self.pixels.iter_mut().for_each(|p| *p = color);
    }

    /// Rows, top first
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [Bgra]> {
        self.pixels.chunks_mut(self.width.max(1) as usize)
    }

    pub fn pixels(&self) -> &[Bgra] {
        &self.pixels
    }

    /// The frame to send for this target's stream
    pub fn frame(&self) -> SenderFrame<'_> {
        SenderFrame::HostMemory {
            data: bytemuck::cast_slice(&self.pixels),
            stride: self.stride(),
            format: self.format,
        }
    }
}

/// One [`HostTarget`] per stream, kept in step with the stream set
#[derive(Default)]
pub struct HostTargets {
    targets: HashMap<StreamHandle, HostTarget>,
}

impl HostTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recreate targets whose stream changed size or format, and release those of removed streams.
    /// Streams in a format [`HostTarget`] cannot hold get no target.
    pub fn update(&mut self, streams: &[StreamDescription]) {
        self.targets.retain(|handle, _| {
            streams
                .iter()
                .any(|s| s.handle == *handle && HostTarget::supports(s.format))
        });

        for stream in streams {
            if !HostTarget::supports(stream.format) {
                error!(
                    "Unsupported pixel format {:?} for stream '{}'; it will not be rendered",
                    stream.format, stream.name
                );
                continue;
            }
            let stale = self
                .targets
                .get(&stream.handle)
                .map_or(true, |target| !target.matches(stream));
            if stale {
                debug!(
                    "Creating {}x{} target for stream '{}'",
                    stream.width, stream.height, stream.name
                );
                self.targets.insert(stream.handle, HostTarget::new(stream));
            }
        }
    }

    pub fn get(&self, stream: StreamHandle) -> Option<&HostTarget> {
        self.targets.get(&stream)
    }

    pub fn get_mut(&mut self, stream: StreamHandle) -> Option<&mut HostTarget> {
        self.targets.get_mut(&stream)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
