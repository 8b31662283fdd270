//! Raw C ABI of `d3renderstream`.
//!
//! Every record mirrors the vendor header, which is compiled under `#pragma pack(push, 4)`, hence
//! `packed(4)` throughout. Fields of these records must be copied out before they are borrowed
//! (`let t = frame.t_tracked;`), since 8-byte fields may sit on 4-byte boundaries.
#![allow(missing_docs)]

use bytemuck::{AnyBitPattern, Zeroable};
use std::os::raw::{c_char, c_int, c_void};

pub type StreamHandle = u64;
pub type CameraHandle = u64;
pub type Logger = unsafe extern "C" fn(message: *const c_char);

/// Status code returned by every call into the library (`RS_ERROR`)
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct RsError(pub u32);

impl RsError {
    pub const SUCCESS: Self = Self(0);
    pub const NOT_INITIALISED: Self = Self(1);
    pub const ALREADY_INITIALISED: Self = Self(2);
    pub const INVALID_HANDLE: Self = Self(3);
    pub const MAX_SENDERS_REACHED: Self = Self(4);
    pub const BAD_STREAM_TYPE: Self = Self(5);
    pub const NOT_FOUND: Self = Self(6);
    pub const INCORRECT_SCHEMA: Self = Self(7);
    pub const INVALID_PARAMETERS: Self = Self(8);
    pub const BUFFER_OVERFLOW: Self = Self(9);
    pub const TIMEOUT: Self = Self(10);
    pub const STREAMS_CHANGED: Self = Self(11);
    pub const INCOMPATIBLE_VERSION: Self = Self(12);
    pub const FAILED_TO_GET_DXDEVICE_FROM_RESOURCE: Self = Self(13);
    pub const FAILED_TO_INITIALISE_GPGPU: Self = Self(14);
    pub const QUIT: Self = Self(15);
    pub const UNSPECIFIED: Self = Self(16);
}

/// Pixel layout of a stream or image (`RSPixelFormat`)
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct PixelFormat(pub u32);

impl PixelFormat {
    pub const INVALID: Self = Self(0);
    pub const BGRA8: Self = Self(1);
    pub const BGRX8: Self = Self(2);
    pub const RGBA32F: Self = Self(3);

    /// Size of one pixel in bytes, if the format is known
    pub fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            Self::BGRA8 | Self::BGRX8 => Some(4),
            Self::RGBA32F => Some(16),
            _ => None,
        }
    }
}

/// Discriminant of [`SenderFrameTypeData`]
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct SenderFrameType(pub u32);

impl SenderFrameType {
    pub const HOST_MEMORY: Self = Self(0);
    pub const DX11_TEXTURE: Self = Self(1);
    pub const DX12_TEXTURE: Self = Self(2);
    pub const OPENGL_TEXTURE: Self = Self(3);
    pub const VULKAN_TEXTURE: Self = Self(4);
    pub const UNKNOWN: Self = Self(5);
}

#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct RemoteParameterType(pub u32);

impl RemoteParameterType {
    pub const NUMBER: Self = Self(0);
    pub const IMAGE: Self = Self(1);
    pub const POSE: Self = Self(2);
    pub const TRANSFORM: Self = Self(3);
    pub const TEXT: Self = Self(4);
}

#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct RemoteParameterDmxType(pub u32);

impl RemoteParameterDmxType {
    pub const DEFAULT: Self = Self(0);
    pub const DMX_8: Self = Self(1);
    pub const DMX_16_BE: Self = Self(2);
}

pub const REMOTEPARAMETER_NO_FLAGS: u32 = 0;
pub const REMOTEPARAMETER_NO_SEQUENCE: u32 = 1;
pub const REMOTEPARAMETER_READ_ONLY: u32 = 2;

pub const FRAMEDATA_NO_FLAGS: u32 = 0;
pub const FRAMEDATA_RESET: u32 = 1;

/// Tracking data required by the host but not used to render content
#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct D3TrackingData {
    pub virtual_zoom_scale: f32,
    pub virtual_reprojection_required: u8,
    pub x_real_camera: f32,
    pub y_real_camera: f32,
    pub z_real_camera: f32,
    pub rx_real_camera: f32,
    pub ry_real_camera: f32,
    pub rz_real_camera: f32,
}

/// Camera pose and lens for one stream on one frame. Rotations are in degrees.
#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct CameraData {
    pub id: StreamHandle,
    pub camera_handle: CameraHandle,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub rx: f32,
    pub ry: f32,
    pub rz: f32,
    pub focal_length: f32,
    pub sensor_x: f32,
    pub sensor_y: f32,
    pub cx: f32,
    pub cy: f32,
    pub near_z: f32,
    pub far_z: f32,
    /// Orthographic when greater than zero
    pub ortho_width: f32,
    pub d3_tracking: D3TrackingData,
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct FrameData {
    pub t_tracked: f64,
    pub local_time: f64,
    pub local_time_delta: f64,
    pub frame_rate_numerator: u32,
    pub frame_rate_denominator: u32,
    pub flags: u32,
    pub scene: u32,
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct CameraResponseData {
    pub t_tracked: f64,
    pub camera: CameraData,
}

impl CameraResponseData {
    pub fn new(t_tracked: f64, camera: CameraData) -> Self {
        Self { t_tracked, camera }
    }
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone)]
pub struct HostMemoryData {
    pub data: *mut u8,
    pub stride: u32,
    pub format: PixelFormat,
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone)]
pub struct Dx11Data {
    pub resource: *mut c_void,
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone)]
pub struct Dx12Data {
    pub resource: *mut c_void,
    pub fence: *mut c_void,
    pub fence_value: i32,
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone)]
pub struct OpenGlData {
    pub texture: u32,
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone)]
pub struct VulkanData {
    pub memory: u64,
    pub size: u64,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub wait_semaphore: u64,
    pub wait_semaphore_value: u64,
    pub signal_semaphore: u64,
    pub signal_semaphore_value: u64,
}

#[repr(C, packed(4))]
#[derive(Copy, Clone)]
pub union SenderFrameTypeData {
    pub cpu: HostMemoryData,
    pub dx11: Dx11Data,
    pub dx12: Dx12Data,
    pub gl: OpenGlData,
    pub vk: VulkanData,
}

/// Normalised (0-1) clipping planes for the edges of the camera frustum, used to perform off-axis
/// perspective projection, or to offset and scale 2D orthographic matrices.
#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ProjectionClipping {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Default for ProjectionClipping {
    fn default() -> Self {
        Self {
            left: 0.0,
            right: 1.0,
            top: 0.0,
            bottom: 1.0,
        }
    }
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone)]
pub struct StreamDescription {
    pub handle: StreamHandle,
    pub channel: *const c_char,
    pub name: *const c_char,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub clipping: ProjectionClipping,
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone)]
pub struct StreamDescriptions {
    pub n_streams: u32,
    pub streams: *mut StreamDescription,
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct NumericalDefaults {
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub default_value: f32,
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone)]
pub struct TextDefaults {
    pub default_value: *const c_char,
}

#[repr(C, packed(4))]
#[derive(Copy, Clone)]
pub union RemoteParameterTypeDefaults {
    pub number: NumericalDefaults,
    pub text: TextDefaults,
}

#[repr(C, packed(4))]
#[derive(Copy, Clone)]
pub struct RemoteParameter {
    pub group: *const c_char,
    pub display_name: *const c_char,
    pub key: *const c_char,
    pub type_: RemoteParameterType,
    pub defaults: RemoteParameterTypeDefaults,
    pub n_options: u32,
    pub options: *mut *const c_char,
    pub dmx_offset: i32,
    pub dmx_type: RemoteParameterDmxType,
    pub flags: u32,
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone)]
pub struct RemoteParameters {
    pub name: *const c_char,
    pub n_parameters: u32,
    pub parameters: *mut RemoteParameter,
    pub hash: u64,
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone)]
pub struct Scenes {
    pub n_scenes: u32,
    pub scenes: *mut RemoteParameters,
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone)]
pub struct Channels {
    pub n_channels: u32,
    pub channels: *mut *const c_char,
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone)]
pub struct Schema {
    pub engine_name: *const c_char,
    pub engine_version: *const c_char,
    pub info: *const c_char,
    pub channels: Channels,
    pub scenes: Scenes,
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone)]
pub struct ProfilingEntry {
    pub name: *const c_char,
    pub value: f32,
}

#[repr(C, packed(4))]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ImageFrameData {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub image_id: i64,
}

// Records the library writes into caller buffers. Every bit pattern is a valid value for these:
// integers, floats and pointers which are only ever treated as addresses.
macro_rules! any_bit_pattern {
    ($($ty:ty),* $(,)?) => {
        $(
            unsafe impl Zeroable for $ty {}
            unsafe impl AnyBitPattern for $ty {}
        )*
    };
}

any_bit_pattern!(
    RsError,
    PixelFormat,
    RemoteParameterType,
    RemoteParameterDmxType,
    ProjectionClipping,
    StreamDescription,
    StreamDescriptions,
    NumericalDefaults,
    TextDefaults,
    RemoteParameterTypeDefaults,
    RemoteParameter,
    RemoteParameters,
    Scenes,
    Channels,
    Schema,
    ImageFrameData,
);

unsafe impl Zeroable for D3TrackingData {}
unsafe impl Zeroable for CameraData {}
unsafe impl Zeroable for FrameData {}
unsafe impl Zeroable for CameraResponseData {}

impl Default for Schema {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

impl Default for RemoteParameters {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

pub type PfnInitialise = unsafe extern "C" fn(major: c_int, minor: c_int) -> RsError;
pub type PfnInitialiseGpGpuWithoutInterop = unsafe extern "C" fn(unused: *mut c_void) -> RsError;
pub type PfnInitialiseGpGpuWithDx11Device = unsafe extern "C" fn(device: *mut c_void) -> RsError;
pub type PfnInitialiseGpGpuWithDx11Resource =
    unsafe extern "C" fn(resource: *mut c_void) -> RsError;
pub type PfnInitialiseGpGpuWithDx12DeviceAndQueue =
    unsafe extern "C" fn(device: *mut c_void, queue: *mut c_void) -> RsError;
pub type PfnInitialiseGpGpuWithOpenGlContexts =
    unsafe extern "C" fn(gl_context: *mut c_void, device_context: *mut c_void) -> RsError;
pub type PfnInitialiseGpGpuWithVulkanDevice = unsafe extern "C" fn(device: *mut c_void) -> RsError;
pub type PfnShutdown = unsafe extern "C" fn() -> RsError;
pub type PfnLoadSchema = unsafe extern "C" fn(
    asset_path: *const c_char,
    schema: *mut Schema,
    n_bytes: *mut u32,
) -> RsError;
pub type PfnSaveSchema =
    unsafe extern "C" fn(asset_path: *const c_char, schema: *mut Schema) -> RsError;
pub type PfnSetSchema = unsafe extern "C" fn(schema: *mut Schema) -> RsError;
pub type PfnGetStreams =
    unsafe extern "C" fn(streams: *mut StreamDescriptions, n_bytes: *mut u32) -> RsError;
pub type PfnAwaitFrameData =
    unsafe extern "C" fn(timeout_ms: c_int, data: *mut FrameData) -> RsError;
pub type PfnSetFollower = unsafe extern "C" fn(is_follower: c_int) -> RsError;
pub type PfnBeginFollowerFrame = unsafe extern "C" fn(t_tracked: f64) -> RsError;
pub type PfnSendFrame = unsafe extern "C" fn(
    stream: StreamHandle,
    frame_type: SenderFrameType,
    data: SenderFrameTypeData,
    response: *const CameraResponseData,
) -> RsError;
pub type PfnGetFrameParameters =
    unsafe extern "C" fn(schema_hash: u64, out: *mut c_void, out_size: usize) -> RsError;
pub type PfnGetFrameImageData =
    unsafe extern "C" fn(schema_hash: u64, out: *mut ImageFrameData, count: usize) -> RsError;
pub type PfnGetFrameImage = unsafe extern "C" fn(
    image_id: i64,
    frame_type: SenderFrameType,
    data: SenderFrameTypeData,
) -> RsError;
pub type PfnGetFrameText =
    unsafe extern "C" fn(schema_hash: u64, index: u32, out: *mut *const c_char) -> RsError;
pub type PfnGetFrameCamera =
    unsafe extern "C" fn(stream: StreamHandle, out: *mut CameraData) -> RsError;
pub type PfnLogToD3 = unsafe extern "C" fn(message: *const c_char) -> RsError;
pub type PfnSendProfilingData =
    unsafe extern "C" fn(entries: *mut ProfilingEntry, count: c_int) -> RsError;
pub type PfnSetNewStatusMessage = unsafe extern "C" fn(message: *const c_char) -> RsError;
pub type PfnRegisterLoggingFunc = unsafe extern "C" fn(logger: Logger);
pub type PfnUnregisterLoggingFunc = unsafe extern "C" fn();

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn records_match_packed_header_layout() {
        assert_eq!(size_of::<StreamDescriptions>(), 12);
        assert_eq!(size_of::<StreamDescription>(), 52);
        assert_eq!(size_of::<FrameData>(), 40);
        assert_eq!(size_of::<RemoteParameters>(), 28);
        assert_eq!(size_of::<RemoteParameterTypeDefaults>(), 16);
        assert_eq!(size_of::<RemoteParameter>(), 68);
        assert_eq!(size_of::<Schema>(), 48);
        assert_eq!(size_of::<ImageFrameData>(), 20);
        // The u8 flag is followed by 3 bytes of padding before the next f32
        assert_eq!(size_of::<D3TrackingData>(), 32);
        assert_eq!(size_of::<CameraData>(), 16 + 14 * 4 + 32);
    }

    #[test]
    fn bytes_per_pixel() {
        assert_eq!(PixelFormat::BGRA8.bytes_per_pixel(), Some(4));
        assert_eq!(PixelFormat::RGBA32F.bytes_per_pixel(), Some(16));
        assert_eq!(PixelFormat::INVALID.bytes_per_pixel(), None);
    }
}
