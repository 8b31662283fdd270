use crate::api::{GpuInterop, RenderStreamApi, SenderFrame};
use crate::buffer::{fetch_growable, AlignedBuffer};
use crate::config::Config;
use crate::error::{check, Error, Status};
use crate::loader::{self, DynamicApi};
use crate::logging;
use crate::parameters::ParameterValues;
use crate::schema::{raw, RawSchema, Scene, Schema};
use crate::streams::{parse_streams, StreamDescription};
use crate::sys::{self, CameraData, CameraResponseData, ImageFrameData, StreamHandle};
use log::{debug, info, warn};
use std::ffi::CString;
use std::mem::size_of;
use std::path::Path;
use std::time::Duration;

/// Timing and scene selection for one frame request
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameData {
    /// Tracking timestamp the frame must be rendered for; echo it back when sending
    pub t_tracked: f64,
    pub local_time: f64,
    pub local_time_delta: f64,
    pub frame_rate_numerator: u32,
    pub frame_rate_denominator: u32,
    pub flags: u32,
    /// Index into the schema's scenes
    pub scene: u32,
}

impl FrameData {
    /// Time-dependent state should start over (the host jumped on its timeline)
    pub fn is_reset(&self) -> bool {
        self.flags & sys::FRAMEDATA_RESET != 0
    }
}

impl From<sys::FrameData> for FrameData {
    fn from(raw: sys::FrameData) -> Self {
        Self {
            t_tracked: raw.t_tracked,
            local_time: raw.local_time,
            local_time_delta: raw.local_time_delta,
            frame_rate_numerator: raw.frame_rate_numerator,
            frame_rate_denominator: raw.frame_rate_denominator,
            flags: raw.flags,
            scene: raw.scene,
        }
    }
}

/// What waiting for a frame request produced
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FrameEvent {
    Frame(FrameData),
    /// The set of streams changed. [`RenderStream::streams`] already holds the new set.
    StreamsChanged,
    Timeout,
    /// The host asked the engine to exit
    Quit,
}

/// A session with the RenderStream library.
///
/// Creating one initialises the library; dropping it (or calling [`RenderStream::shutdown`])
/// shuts the library down.
pub struct RenderStream<A: RenderStreamApi = DynamicApi> {
    api: A,
    forward_logs: bool,
    live: bool,
    streams: Vec<StreamDescription>,
    stream_buffer: AlignedBuffer,
    schema_buffer: AlignedBuffer,
    /// The schema last handed to the library, kept alive until the next one replaces it
    schema: RawSchema,
}

impl RenderStream<DynamicApi> {
    /// Locate, load and initialise the library
    pub fn load(config: &Config) -> Result<Self, Error> {
        let path = loader::locate_library(config.library_path.as_deref())?;
        Self::new(DynamicApi::load(&path)?, config)
    }
}

fn c_string(s: &str) -> Result<CString, Error> {
    CString::new(s).map_err(|_| Error::InvalidString(s.into()))
}

/// `timeout` in whole milliseconds, saturating at what the library accepts
fn timeout_ms(timeout: Duration) -> i32 {
    timeout.as_millis().min(i32::MAX as u128) as i32
}

fn c_path(path: &Path) -> Result<CString, Error> {
    let s = path
        .to_str()
        .ok_or_else(|| Error::InvalidString(path.display().to_string()))?;
    c_string(s)
}

impl<A: RenderStreamApi> RenderStream<A> {
    /// Initialise the library behind `api`
    pub fn new(api: A, config: &Config) -> Result<Self, Error> {
        let mut rs = Self {
            api,
            forward_logs: config.forward_logs,
            live: false,
            streams: Vec::new(),
            stream_buffer: AlignedBuffer::new(),
            schema_buffer: AlignedBuffer::new(),
            schema: RawSchema::default(),
        };

        if rs.forward_logs {
            logging::install(&rs.api);
        }

        check(
            "rs_initialise",
            rs.api.initialise(crate::VERSION_MAJOR, crate::VERSION_MINOR),
        )?;
        rs.live = true;
        info!(
            "Initialised RenderStream {}.{}",
            crate::VERSION_MAJOR,
            crate::VERSION_MINOR
        );

        Ok(rs)
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn initialise_gpgpu(&self, interop: &GpuInterop) -> Result<(), Error> {
        check("rs_initialiseGpGpu", self.api.initialise_gpgpu(interop))
    }

    /// The schema saved for the asset at `path`, if there is one
    pub fn load_schema(&mut self, path: &Path) -> Result<Option<Schema>, Error> {
        let path = c_path(path)?;
        let api = &self.api;
        let found = fetch_growable(
            "rs_loadSchema",
            &mut self.schema_buffer,
            size_of::<sys::Schema>(),
            |buffer, n_bytes| api.load_schema(&path, buffer, n_bytes),
        )?;
        if !found {
            return Ok(None);
        }
        raw::parse_schema(self.schema_buffer.as_bytes()).map(Some)
    }

    /// Save `schema` for the asset at `path`, so the host knows its parameters before launch
    pub fn save_schema(&self, path: &Path, schema: &Schema) -> Result<(), Error> {
        let path = c_path(path)?;
        let mut raw = RawSchema::from_schema(schema)?;
        check("rs_saveSchema", self.api.save_schema(&path, raw.raw_mut()))
    }

    /// Publish `schema`, and record the hash the library assigned to each scene
    pub fn set_schema(&mut self, schema: &mut Schema) -> Result<(), Error> {
        let mut raw = RawSchema::from_schema(schema)?;
        check("rs_setSchema", self.api.set_schema(raw.raw_mut()))?;

        for (scene, hash) in schema.scenes.iter_mut().zip(raw.scene_hashes()) {
            debug!("Scene '{}' has hash {:#x}", scene.name, hash);
            scene.hash = hash;
        }
        self.schema = raw;
        Ok(())
    }

    /// Fetch the current set of streams
    pub fn refresh_streams(&mut self) -> Result<&[StreamDescription], Error> {
        let api = &self.api;
        let found = fetch_growable(
            "rs_getStreams",
            &mut self.stream_buffer,
            size_of::<sys::StreamDescriptions>(),
            |buffer, n_bytes| api.get_streams(buffer, n_bytes),
        )?;
        self.streams = if found {
            parse_streams(self.stream_buffer.as_bytes())?
        } else {
            Vec::new()
        };
        info!("Found {} streams", self.streams.len());
        Ok(&self.streams)
    }

    /// Streams as of the last refresh
    pub fn streams(&self) -> &[StreamDescription] {
        &self.streams
    }

    pub fn stream(&self, handle: StreamHandle) -> Option<&StreamDescription> {
        self.streams.iter().find(|s| s.handle == handle)
    }

    /// Wait up to `timeout` for the next frame request
    pub fn await_frame(&mut self, timeout: Duration) -> Result<FrameEvent, Error> {
        let mut data = sys::FrameData::default();
        match Status::check(self.api.await_frame_data(timeout_ms(timeout), &mut data)) {
            Ok(()) => Ok(FrameEvent::Frame(data.into())),
            Err(Status::StreamsChanged) => {
                self.refresh_streams()?;
                Ok(FrameEvent::StreamsChanged)
            }
            Err(Status::Timeout) => Ok(FrameEvent::Timeout),
            Err(Status::Quit) => Ok(FrameEvent::Quit),
            Err(status) => Err(Error::status("rs_awaitFrameData", status)),
        }
    }

    /// Camera for `stream` this frame. `None` if the stream is not part of this frame.
    pub fn frame_camera(&self, stream: StreamHandle) -> Result<Option<CameraData>, Error> {
        let mut camera = CameraData::default();
        match check("rs_getFrameCamera", self.api.get_frame_camera(stream, &mut camera)) {
            Ok(()) => Ok(Some(camera)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Hand a rendered frame for `stream` back to the host
    pub fn send_frame(
        &self,
        stream: &StreamDescription,
        frame: &SenderFrame,
        response: &CameraResponseData,
    ) -> Result<(), Error> {
        if let SenderFrame::HostMemory {
            data,
            stride,
            format,
        } = *frame
        {
            if format != stream.format {
                return Err(Error::invalid_buffer(
                    "rs_sendFrame",
                    format!(
                        "{:?} frame given for '{}', which is {:?}",
                        format, stream.name, stream.format
                    ),
                ));
            }
            let min_stride = stream.min_stride().ok_or_else(|| {
                let reason = format!("{:?} has no host-memory layout", stream.format);
                Error::invalid_buffer("rs_sendFrame", reason)
            })?;
            if stride < min_stride {
                return Err(Error::invalid_buffer(
                    "rs_sendFrame",
                    format!(
                        "stride {} is below the {} byte row of '{}'",
                        stride, min_stride, stream.name
                    ),
                ));
            }
            let needed = stride as usize * stream.height as usize;
            if data.len() < needed {
                return Err(Error::invalid_buffer(
                    "rs_sendFrame",
                    format!(
                        "{} bytes given for a {} byte frame of '{}'",
                        data.len(),
                        needed,
                        stream.name
                    ),
                ));
            }
        }

        let (frame_type, data) = frame.lower();
        check(
            "rs_sendFrame",
            self.api.send_frame(stream.handle, frame_type, data, response),
        )
    }

    /// This frame's values for the parameters of `scene`
    pub fn frame_parameters<'a>(&'a self, scene: &'a Scene) -> Result<ParameterValues<'a>, Error> {
        ParameterValues::fetch(&self.api, scene)
    }

    /// Copy an image parameter into a GPU resource
    pub fn get_frame_image(&self, image_id: i64, target: &SenderFrame) -> Result<(), Error> {
        if let SenderFrame::HostMemory { .. } = target {
            return Err(Error::invalid_buffer(
                "rs_getFrameImage",
                "host memory targets must be written through get_frame_image_host",
            ));
        }
        let (frame_type, data) = target.lower();
        check("rs_getFrameImage", self.api.get_frame_image(image_id, frame_type, data))
    }

    /// Copy an image parameter into `pixels`, tightly packed rows in the image's own format
    pub fn get_frame_image_host(
        &self,
        image: &ImageFrameData,
        pixels: &mut [u8],
    ) -> Result<(), Error> {
        let (width, height, format) = (image.width, image.height, image.format);
        let stride = format
            .bytes_per_pixel()
            .and_then(|bpp| bpp.checked_mul(width))
            .ok_or_else(|| {
                let reason = format!("{:?} has no host-memory layout", format);
                Error::invalid_buffer("rs_getFrameImage", reason)
            })?;
        let needed = stride as usize * height as usize;
        if pixels.len() < needed {
            return Err(Error::invalid_buffer(
                "rs_getFrameImage",
                format!("{} bytes given for a {} byte image", pixels.len(), needed),
            ));
        }

        let data = sys::SenderFrameTypeData {
            cpu: sys::HostMemoryData {
                data: pixels.as_mut_ptr(),
                stride,
                format,
            },
        };
        check(
            "rs_getFrameImage",
            self.api
                .get_frame_image(image.image_id, sys::SenderFrameType::HOST_MEMORY, data),
        )
    }

    /// Take frame timing from elsewhere instead of `await_frame`
    pub fn set_follower(&self, is_follower: bool) -> Result<(), Error> {
        check("rs_setFollower", self.api.set_follower(is_follower))
    }

    /// Start a frame in follower mode, in place of `await_frame`
    pub fn begin_follower_frame(&self, t_tracked: f64) -> Result<(), Error> {
        check("rs_beginFollowerFrame", self.api.begin_follower_frame(t_tracked))
    }

    /// Status line shown for this engine in the host's UI
    pub fn set_new_status_message(&self, message: &str) -> Result<(), Error> {
        let message = c_string(message)?;
        check("rs_setNewStatusMessage", self.api.set_new_status_message(&message))
    }

    pub fn send_profiling_data(&self, entries: &[(&str, f32)]) -> Result<(), Error> {
        let names = entries
            .iter()
            .map(|(name, _)| c_string(name))
            .collect::<Result<Vec<_>, _>>()?;
        let mut raw: Vec<sys::ProfilingEntry> = names
            .iter()
            .zip(entries)
            .map(|(name, (_, value))| sys::ProfilingEntry {
                name: name.as_ptr(),
                value: *value,
            })
            .collect();
        check("rs_sendProfilingData", self.api.send_profiling_data(&mut raw))
    }

    /// Write a line to the host's console
    pub fn log_to_host(&self, message: &str) -> Result<(), Error> {
        let message = c_string(message)?;
        check("rs_logToD3", self.api.log_to_d3(&message))
    }

    /// Shut the library down, reporting failure
    pub fn shutdown(mut self) -> Result<(), Error> {
        self.live = false;
        check("rs_shutdown", self.api.shutdown())
    }
}

impl<A: RenderStreamApi> Drop for RenderStream<A> {
    fn drop(&mut self) {
        if self.live {
            if let Err(e) = check("rs_shutdown", self.api.shutdown()) {
                warn!("{}", e);
            }
        }
        if self.forward_logs {
            logging::uninstall(&self.api);
        }
    }
}
