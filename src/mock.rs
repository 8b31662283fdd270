//! In-process stand-in for the library, for tests.
use crate::api::{GpuInterop, LogChannel, RenderStreamApi};
use crate::buffer::AlignedBuffer;
use crate::schema::{
    DmxType, ParameterFlags, ParameterKind, ParameterType, RemoteParameter, Scene, Schema,
};
use crate::streams::StreamDescription;
use crate::sys::{
    self, CameraData, CameraResponseData, FrameData, ImageFrameData, Logger, PixelFormat,
    ProfilingEntry, ProjectionClipping, RsError, SenderFrameType, SenderFrameTypeData, StreamHandle,
};
use bytemuck::Zeroable;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::ffi::{CStr, CString};
use std::mem::size_of;
use std::os::raw::c_char;
use std::ptr;
use std::rc::Rc;

pub fn stream(handle: StreamHandle, name: &str, width: u32, height: u32) -> StreamDescription {
    StreamDescription {
        handle,
        channel: "default".into(),
        name: name.into(),
        width,
        height,
        format: PixelFormat::BGRA8,
        clipping: ProjectionClipping::default(),
    }
}

pub fn camera(stream: StreamHandle) -> CameraData {
    CameraData {
        id: stream,
        focal_length: 30.,
        sensor_x: 30.,
        sensor_y: 30.,
        near_z: 0.1,
        far_z: 100.,
        ..Zeroable::zeroed()
    }
}

pub fn frame(t_tracked: f64, scene: u32) -> FrameData {
    FrameData {
        t_tracked,
        local_time: t_tracked,
        local_time_delta: 1. / 60.,
        frame_rate_numerator: 60,
        frame_rate_denominator: 1,
        flags: sys::FRAMEDATA_NO_FLAGS,
        scene,
    }
}

/// Lays records out the way the library does: pointer-bearing records first, strings after,
/// every pointer absolute relative to `base`.
pub struct Writer {
    base: usize,
    bytes: Vec<u8>,
}

impl Writer {
    fn new(base: usize) -> Self {
        Self {
            base,
            bytes: Vec::new(),
        }
    }

    fn reserve<T>(&mut self, count: usize) -> usize {
        let offset = (self.bytes.len() + 7) & !7;
        self.bytes.resize(offset + size_of::<T>() * count, 0);
        offset
    }

    fn put<T: Copy>(&mut self, offset: usize, value: T) {
        assert!(offset + size_of::<T>() <= self.bytes.len());
        unsafe { ptr::write_unaligned(self.bytes.as_mut_ptr().add(offset) as *mut T, value) }
    }

    fn string(&mut self, s: &str) -> *const c_char {
        let offset = self.bytes.len();
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        (self.base + offset) as *const c_char
    }

    fn array<T>(&self, offset: usize, count: usize) -> *mut T {
        if count == 0 {
            ptr::null_mut()
        } else {
            (self.base + offset) as *mut T
        }
    }

    pub fn streams_image(streams: &[StreamDescription], base: usize) -> Vec<u8> {
        let mut w = Self::new(base);
        let header = w.reserve::<sys::StreamDescriptions>(1);
        let array = w.reserve::<sys::StreamDescription>(streams.len());
        let records = w.array(array, streams.len());
        w.put(
            header,
            sys::StreamDescriptions {
                n_streams: streams.len() as u32,
                streams: records,
            },
        );
        for (i, s) in streams.iter().enumerate() {
            let record = sys::StreamDescription {
                handle: s.handle,
                channel: w.string(&s.channel),
                name: w.string(&s.name),
                width: s.width,
                height: s.height,
                format: s.format,
                clipping: s.clipping,
            };
            w.put(array + i * size_of::<sys::StreamDescription>(), record);
        }
        w.bytes
    }

    pub fn schema_image(schema: &Schema, base: usize) -> Vec<u8> {
        let mut w = Self::new(base);
        let header = w.reserve::<sys::Schema>(1);
        let channels = w.reserve::<usize>(schema.channels.len());
        let scenes = w.reserve::<sys::RemoteParameters>(schema.scenes.len());
        let mut layout = Vec::new();
        for scene in &schema.scenes {
            let parameters = w.reserve::<sys::RemoteParameter>(scene.parameters.len());
            let mut options = Vec::new();
            for parameter in &scene.parameters {
                options.push(w.reserve::<usize>(parameter.options.len()));
            }
            layout.push((parameters, options));
        }

        for (i, channel) in schema.channels.iter().enumerate() {
            let ptr = w.string(channel) as usize;
            w.put(channels + i * size_of::<usize>(), ptr);
        }

        for (i, (scene, (parameters, options))) in schema.scenes.iter().zip(&layout).enumerate() {
            for (j, (parameter, &options)) in scene.parameters.iter().zip(options).enumerate() {
                for (k, option) in parameter.options.iter().enumerate() {
                    let ptr = w.string(option) as usize;
                    w.put(options + k * size_of::<usize>(), ptr);
                }
                let mut defaults = sys::RemoteParameterTypeDefaults::zeroed();
                match &parameter.kind {
                    &ParameterKind::Number {
                        min,
                        max,
                        step,
                        default,
                    } => {
                        defaults.number = sys::NumericalDefaults {
                            min,
                            max,
                            step,
                            default_value: default,
                        }
                    }
                    ParameterKind::Text { default } => {
                        defaults.text = sys::TextDefaults {
                            default_value: w.string(default),
                        }
                    }
                    _ => (),
                }
                let record = sys::RemoteParameter {
                    group: w.string(&parameter.group),
                    display_name: w.string(&parameter.display_name),
                    key: w.string(&parameter.key),
                    type_: parameter.parameter_type().raw(),
                    defaults,
                    n_options: parameter.options.len() as u32,
                    options: w.array(options, parameter.options.len()),
                    dmx_offset: parameter.dmx_offset,
                    dmx_type: parameter.dmx_type.raw(),
                    flags: parameter.flags.bits(),
                };
                w.put(parameters + j * size_of::<sys::RemoteParameter>(), record);
            }
            let record = sys::RemoteParameters {
                name: w.string(&scene.name),
                n_parameters: scene.parameters.len() as u32,
                parameters: w.array(*parameters, scene.parameters.len()),
                hash: scene.hash,
            };
            w.put(scenes + i * size_of::<sys::RemoteParameters>(), record);
        }

        let record = sys::Schema {
            engine_name: w.string(&schema.engine_name),
            engine_version: w.string(&schema.engine_version),
            info: w.string(&schema.info),
            channels: sys::Channels {
                n_channels: schema.channels.len() as u32,
                channels: w.array(channels, schema.channels.len()),
            },
            scenes: sys::Scenes {
                n_scenes: schema.scenes.len() as u32,
                scenes: w.array(scenes, schema.scenes.len()),
            },
        };
        w.put(header, record);
        w.bytes
    }

    fn materialise(image: impl Fn(usize) -> Vec<u8>) -> AlignedBuffer {
        let mut buffer = AlignedBuffer::new();
        buffer.resize(image(0).len());
        let bytes = image(buffer.as_bytes().as_ptr() as usize);
        buffer.as_bytes_mut().copy_from_slice(&bytes);
        buffer
    }

    pub fn streams(streams: &[StreamDescription]) -> AlignedBuffer {
        Self::materialise(|base| Self::streams_image(streams, base))
    }

    pub fn schema(schema: &Schema) -> AlignedBuffer {
        Self::materialise(|base| Self::schema_image(schema, base))
    }
}

/// Answer a two-call fetch with `image`, as the library does
fn fill(image: impl Fn(usize) -> Vec<u8>, buffer: Option<&mut [u8]>, n_bytes: &mut u32) -> RsError {
    match buffer {
        None => {
            *n_bytes = image(0).len() as u32;
            RsError::SUCCESS
        }
        Some(buffer) => {
            let bytes = image(buffer.as_ptr() as usize);
            *n_bytes = bytes.len() as u32;
            if bytes.len() > buffer.len() {
                return RsError::BUFFER_OVERFLOW;
            }
            buffer[..bytes.len()].copy_from_slice(&bytes);
            RsError::SUCCESS
        }
    }
}

unsafe fn owned_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

unsafe fn slice<'a, T>(ptr: *const T, count: u32) -> &'a [T] {
    if count == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, count as usize)
    }
}

/// Copy a schema out of the caller's C layout
unsafe fn owned_schema(raw: &sys::Schema) -> Schema {
    let (channels, scenes) = (raw.channels, raw.scenes);
    Schema {
        engine_name: owned_str(raw.engine_name),
        engine_version: owned_str(raw.engine_version),
        info: owned_str(raw.info),
        channels: slice(channels.channels, channels.n_channels)
            .iter()
            .map(|c| owned_str(*c))
            .collect(),
        scenes: slice(scenes.scenes, scenes.n_scenes)
            .iter()
            .map(|scene| Scene {
                name: owned_str(scene.name),
                hash: scene.hash,
                parameters: slice(scene.parameters, scene.n_parameters)
                    .iter()
                    .map(|p| owned_parameter(p))
                    .collect(),
            })
            .collect(),
    }
}

unsafe fn owned_parameter(p: &sys::RemoteParameter) -> RemoteParameter {
    let defaults = p.defaults;
    let kind = match ParameterType::from_raw(p.type_) {
        Some(ParameterType::Number) => {
            let n = defaults.number;
            ParameterKind::Number {
                min: n.min,
                max: n.max,
                step: n.step,
                default: n.default_value,
            }
        }
        Some(ParameterType::Text) => ParameterKind::Text {
            default: owned_str(defaults.text.default_value),
        },
        Some(ParameterType::Image) => ParameterKind::Image,
        Some(ParameterType::Pose) => ParameterKind::Pose,
        Some(ParameterType::Transform) => ParameterKind::Transform,
        None => panic!("unknown parameter type"),
    };
    RemoteParameter {
        key: owned_str(p.key),
        display_name: owned_str(p.display_name),
        group: owned_str(p.group),
        kind,
        options: slice(p.options as *const *const c_char, p.n_options)
            .iter()
            .map(|o| owned_str(*o))
            .collect(),
        dmx_offset: p.dmx_offset,
        dmx_type: DmxType::from_raw(p.dmx_type),
        flags: ParameterFlags::from_bits(p.flags),
    }
}

/// A frame the client handed back
#[derive(Debug, Clone)]
pub struct SentFrame {
    pub stream: StreamHandle,
    pub frame_type: SenderFrameType,
    pub t_tracked: f64,
    /// Copy of a host-memory payload, `stride * height` bytes of the stream
    pub pixels: Option<Vec<u8>>,
}

#[derive(Default)]
pub struct MockState {
    pub calls: Vec<&'static str>,
    pub version: Option<(i32, i32)>,
    pub initialise_result: RsError,
    pub gpgpu: Option<&'static str>,
    pub streams: Vec<StreamDescription>,
    /// Fill calls of `get_streams` answered with a buffer overflow before succeeding
    pub stream_overflows: usize,
    pub schema_on_disk: Option<(String, Schema)>,
    pub set_schema: Option<Schema>,
    /// Frame requests in order; once empty, every await reports quit
    pub frames: VecDeque<Result<FrameData, RsError>>,
    pub cameras: HashMap<StreamHandle, CameraData>,
    pub sent: Vec<SentFrame>,
    pub send_result: RsError,
    pub parameters: Vec<f32>,
    pub images: Vec<ImageFrameData>,
    pub texts: Vec<CString>,
    pub hashes_queried: Vec<u64>,
    pub images_copied: Vec<(i64, SenderFrameType)>,
    pub follower: Option<bool>,
    pub follower_frames: Vec<f64>,
    pub host_log: Vec<String>,
    pub status_messages: Vec<String>,
    pub profiling: Vec<(String, f32)>,
    pub loggers: HashMap<LogChannel, Option<Logger>>,
}

/// Scripted library. Tests keep a clone of `state` to inspect it after the client is gone.
#[derive(Default, Clone)]
pub struct MockApi {
    pub state: Rc<RefCell<MockState>>,
}

impl MockApi {
    fn record(&self, call: &'static str) -> std::cell::RefMut<'_, MockState> {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        state
    }
}

unsafe impl RenderStreamApi for MockApi {
    fn initialise(&self, major: i32, minor: i32) -> RsError {
        let mut state = self.record("rs_initialise");
        state.version = Some((major, minor));
        state.initialise_result
    }

    fn initialise_gpgpu(&self, interop: &GpuInterop) -> RsError {
        let mut state = self.record("rs_initialiseGpGpu");
        state.gpgpu = Some(match interop {
            GpuInterop::None => "none",
            GpuInterop::Dx11Device(_) => "dx11 device",
            GpuInterop::Dx11Resource(_) => "dx11 resource",
            GpuInterop::Dx12 { .. } => "dx12",
            GpuInterop::OpenGl { .. } => "opengl",
            GpuInterop::Vulkan { .. } => "vulkan",
        });
        RsError::SUCCESS
    }

    fn shutdown(&self) -> RsError {
        self.record("rs_shutdown");
        RsError::SUCCESS
    }

    fn load_schema(
        &self,
        asset_path: &CStr,
        buffer: Option<&mut [u8]>,
        n_bytes: &mut u32,
    ) -> RsError {
        let state = self.record("rs_loadSchema");
        match &state.schema_on_disk {
            Some((path, schema)) if path.as_bytes() == asset_path.to_bytes() => {
                fill(|base| Writer::schema_image(schema, base), buffer, n_bytes)
            }
            _ => {
                *n_bytes = 0;
                RsError::SUCCESS
            }
        }
    }

    fn save_schema(&self, asset_path: &CStr, schema: &mut sys::Schema) -> RsError {
        let mut state = self.record("rs_saveSchema");
        let schema = unsafe { owned_schema(schema) };
        state.schema_on_disk = Some((asset_path.to_string_lossy().into_owned(), schema));
        RsError::SUCCESS
    }

    fn set_schema(&self, schema: &mut sys::Schema) -> RsError {
        let mut state = self.record("rs_setSchema");
        let scenes = schema.scenes;
        for i in 0..scenes.n_scenes as usize {
            unsafe { (*scenes.scenes.add(i)).hash = 0x100 + i as u64 };
        }
        state.set_schema = Some(unsafe { owned_schema(schema) });
        RsError::SUCCESS
    }

    fn get_streams(&self, buffer: Option<&mut [u8]>, n_bytes: &mut u32) -> RsError {
        let mut state = self.record("rs_getStreams");
        if buffer.is_some() && state.stream_overflows > 0 {
            state.stream_overflows -= 1;
            return RsError::BUFFER_OVERFLOW;
        }
        fill(|base| Writer::streams_image(&state.streams, base), buffer, n_bytes)
    }

    fn await_frame_data(&self, _timeout_ms: i32, data: &mut FrameData) -> RsError {
        let mut state = self.record("rs_awaitFrameData");
        match state.frames.pop_front() {
            Some(Ok(frame)) => {
                *data = frame;
                RsError::SUCCESS
            }
            Some(Err(status)) => status,
            None => RsError::QUIT,
        }
    }

    fn set_follower(&self, is_follower: bool) -> RsError {
        self.record("rs_setFollower").follower = Some(is_follower);
        RsError::SUCCESS
    }

    fn begin_follower_frame(&self, t_tracked: f64) -> RsError {
        self.record("rs_beginFollowerFrame").follower_frames.push(t_tracked);
        RsError::SUCCESS
    }

    fn get_frame_camera(&self, stream: StreamHandle, camera: &mut CameraData) -> RsError {
        let state = self.record("rs_getFrameCamera");
        match state.cameras.get(&stream) {
            Some(c) => {
                *camera = *c;
                RsError::SUCCESS
            }
            None => RsError::NOT_FOUND,
        }
    }

    fn send_frame(
        &self,
        stream: StreamHandle,
        frame_type: SenderFrameType,
        data: SenderFrameTypeData,
        response: &CameraResponseData,
    ) -> RsError {
        let mut state = self.record("rs_sendFrame");
        let pixels = if frame_type == SenderFrameType::HOST_MEMORY {
            let cpu = unsafe { data.cpu };
            let height = state
                .streams
                .iter()
                .find(|s| s.handle == stream)
                .map_or(0, |s| s.height);
            let len = (cpu.stride * height) as usize;
            Some(unsafe { std::slice::from_raw_parts(cpu.data as *const u8, len) }.to_vec())
        } else {
            None
        };
        state.sent.push(SentFrame {
            stream,
            frame_type,
            t_tracked: response.t_tracked,
            pixels,
        });
        state.send_result
    }

    fn get_frame_parameters(&self, schema_hash: u64, values: &mut [f32]) -> RsError {
        let mut state = self.record("rs_getFrameParameters");
        state.hashes_queried.push(schema_hash);
        if values.len() != state.parameters.len() {
            return RsError::INVALID_PARAMETERS;
        }
        values.copy_from_slice(&state.parameters);
        RsError::SUCCESS
    }

    fn get_frame_image_data(&self, schema_hash: u64, images: &mut [ImageFrameData]) -> RsError {
        let mut state = self.record("rs_getFrameImageData");
        state.hashes_queried.push(schema_hash);
        if images.len() != state.images.len() {
            return RsError::INVALID_PARAMETERS;
        }
        images.copy_from_slice(&state.images);
        RsError::SUCCESS
    }

    fn get_frame_image(
        &self,
        image_id: i64,
        frame_type: SenderFrameType,
        data: SenderFrameTypeData,
    ) -> RsError {
        let mut state = self.record("rs_getFrameImage");
        if frame_type == SenderFrameType::HOST_MEMORY {
            let cpu = unsafe { data.cpu };
            let image = match state.images.iter().find(|i| i.image_id == image_id) {
                Some(image) => *image,
                None => return RsError::NOT_FOUND,
            };
            let len = (cpu.stride * image.height) as usize;
            let dest = unsafe { std::slice::from_raw_parts_mut(cpu.data, len) };
            dest.iter_mut().for_each(|b| *b = image_id as u8);
        }
        state.images_copied.push((image_id, frame_type));
        RsError::SUCCESS
    }

    fn get_frame_text(&self, schema_hash: u64, index: u32, text: &mut *const c_char) -> RsError {
        let mut state = self.record("rs_getFrameText");
        state.hashes_queried.push(schema_hash);
        match state.texts.get(index as usize) {
            Some(t) => {
                *text = t.as_ptr();
                RsError::SUCCESS
            }
            None => RsError::INVALID_PARAMETERS,
        }
    }

    fn log_to_d3(&self, message: &CStr) -> RsError {
        self.record("rs_logToD3")
            .host_log
            .push(message.to_string_lossy().into_owned());
        RsError::SUCCESS
    }

    fn set_new_status_message(&self, message: &CStr) -> RsError {
        self.record("rs_setNewStatusMessage")
            .status_messages
            .push(message.to_string_lossy().into_owned());
        RsError::SUCCESS
    }

    fn send_profiling_data(&self, entries: &mut [ProfilingEntry]) -> RsError {
        let mut state = self.record("rs_sendProfilingData");
        for entry in entries.iter() {
            let (name, value) = (entry.name, entry.value);
            let name = unsafe { owned_str(name) };
            state.profiling.push((name, value));
        }
        RsError::SUCCESS
    }

    fn register_logger(&self, channel: LogChannel, logger: Option<Logger>) {
        self.record("rs_registerLoggingFunc").loggers.insert(channel, logger);
    }
}
