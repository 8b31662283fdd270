use crate::buffer::BufferView;
use crate::error::Error;
use crate::sys::{self, StreamHandle};

pub use crate::sys::{PixelFormat, ProjectionClipping};

/// One output the host requests frames for
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescription {
    pub handle: StreamHandle,
    pub channel: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Portion of the camera's full frame this stream covers
    pub clipping: ProjectionClipping,
}

impl StreamDescription {
    /// Smallest row pitch, in bytes, of a host-memory frame for this stream
    pub fn min_stride(&self) -> Option<u32> {
        self.format
            .bytes_per_pixel()
            .and_then(|bpp| bpp.checked_mul(self.width))
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Read the stream list the library wrote into `bytes`
pub fn parse_streams(bytes: &[u8]) -> Result<Vec<StreamDescription>, Error> {
    let view = BufferView::new("rs_getStreams", bytes);
    let header: sys::StreamDescriptions = view.read(0)?;
    view.read_array::<sys::StreamDescription>(header.streams as usize, header.n_streams)?
        .into_iter()
        .map(|stream| {
            Ok(StreamDescription {
                handle: stream.handle,
                channel: view.read_str(stream.channel as usize)?,
                name: view.read_str(stream.name as usize)?,
                width: stream.width,
                height: stream.height,
                format: stream.format,
                clipping: stream.clipping,
            })
        })
        .collect()
}
