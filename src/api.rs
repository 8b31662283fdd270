//! The capability interface over the library's entry points.
//!
//! [`RenderStreamApi`] has one method per exported function. The production implementation is
//! [`DynamicApi`](crate::loader::DynamicApi); anything else implementing it (an in-process fake,
//! a recording proxy) can drive [`RenderStream`](crate::RenderStream) the same way.

use crate::sys::{
    self, CameraData, CameraResponseData, FrameData, ImageFrameData, Logger, PixelFormat,
    ProfilingEntry, RsError, SenderFrameType, SenderFrameTypeData, StreamHandle,
};
use std::ffi::CStr;
use std::os::raw::{c_char, c_void};

/// Which of the library's logger callbacks to (un)register
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LogChannel {
    Info,
    Error,
    Verbose,
}

/// Entry points of the RenderStream library.
///
/// Variable-length results (`load_schema`, `get_streams`) follow the two-call convention: called
/// with `None` they report the required size through `n_bytes`; called with a buffer they fill it
/// and report the bytes written, or `BUFFER_OVERFLOW` if it is too small.
///
/// # Safety
/// Implementors must guarantee that a text pointer written by `get_frame_text` on success is
/// either null or points to a NUL-terminated string which stays valid until the next call to
/// `await_frame_data`. Buffers filled by `load_schema` and `get_streams` are never trusted: their
/// contents are bounds-checked before use.
pub unsafe trait RenderStreamApi {
    fn initialise(&self, major: i32, minor: i32) -> RsError;
    fn initialise_gpgpu(&self, interop: &GpuInterop) -> RsError;
    fn shutdown(&self) -> RsError;

    fn load_schema(
        &self,
        asset_path: &CStr,
        buffer: Option<&mut [u8]>,
        n_bytes: &mut u32,
    ) -> RsError;
    fn save_schema(&self, asset_path: &CStr, schema: &mut sys::Schema) -> RsError;
    /// Also fills in the per-scene hash of every scene in `schema`
    fn set_schema(&self, schema: &mut sys::Schema) -> RsError;

    fn get_streams(&self, buffer: Option<&mut [u8]>, n_bytes: &mut u32) -> RsError;

    fn await_frame_data(&self, timeout_ms: i32, data: &mut FrameData) -> RsError;
    fn set_follower(&self, is_follower: bool) -> RsError;
    fn begin_follower_frame(&self, t_tracked: f64) -> RsError;

    fn get_frame_camera(&self, stream: StreamHandle, camera: &mut CameraData) -> RsError;
    fn send_frame(
        &self,
        stream: StreamHandle,
        frame_type: SenderFrameType,
        data: SenderFrameTypeData,
        response: &CameraResponseData,
    ) -> RsError;

    fn get_frame_parameters(&self, schema_hash: u64, values: &mut [f32]) -> RsError;
    fn get_frame_image_data(&self, schema_hash: u64, images: &mut [ImageFrameData]) -> RsError;
    fn get_frame_image(
        &self,
        image_id: i64,
        frame_type: SenderFrameType,
        data: SenderFrameTypeData,
    ) -> RsError;
    fn get_frame_text(&self, schema_hash: u64, index: u32, text: &mut *const c_char) -> RsError;

    fn log_to_d3(&self, message: &CStr) -> RsError;
    fn set_new_status_message(&self, message: &CStr) -> RsError;
    fn send_profiling_data(&self, entries: &mut [ProfilingEntry]) -> RsError;

    /// `None` unregisters the callback for `channel`
    fn register_logger(&self, channel: LogChannel, logger: Option<Logger>);
}

/// Graphics API the library should share resources with
#[derive(Debug, Copy, Clone)]
pub enum GpuInterop {
    /// Host-memory frames only
    None,
    Dx11Device(*mut c_void),
    Dx11Resource(*mut c_void),
    Dx12 {
        device: *mut c_void,
        queue: *mut c_void,
    },
    OpenGl {
        context: *mut c_void,
        device_context: *mut c_void,
    },
    Vulkan {
        device: *mut c_void,
    },
}

/// Frame content handed to the library, one variant per payload kind
#[derive(Debug, Copy, Clone)]
pub enum SenderFrame<'a> {
    HostMemory {
        data: &'a [u8],
        stride: u32,
        format: PixelFormat,
    },
    Dx11 {
        resource: *mut c_void,
    },
    Dx12 {
        resource: *mut c_void,
        fence: *mut c_void,
        fence_value: i32,
    },
    OpenGl {
        texture: u32,
    },
    Vulkan {
        memory: u64,
        size: u64,
        format: PixelFormat,
        width: u32,
        height: u32,
        wait_semaphore: u64,
        wait_value: u64,
        signal_semaphore: u64,
        signal_value: u64,
    },
}

impl SenderFrame<'_> {
    /// Tag and union as the C ABI expects them
    pub fn lower(&self) -> (SenderFrameType, SenderFrameTypeData) {
        match *self {
            SenderFrame::HostMemory {
                data,
                stride,
                format,
            } => (
                SenderFrameType::HOST_MEMORY,
                SenderFrameTypeData {
                    cpu: sys::HostMemoryData {
                        // The library only reads host frames
                        data: data.as_ptr() as *mut u8,
                        stride,
                        format,
                    },
                },
            ),
            SenderFrame::Dx11 { resource } => (
                SenderFrameType::DX11_TEXTURE,
                SenderFrameTypeData {
                    dx11: sys::Dx11Data { resource },
                },
            ),
            SenderFrame::Dx12 {
                resource,
                fence,
                fence_value,
            } => (
                SenderFrameType::DX12_TEXTURE,
                SenderFrameTypeData {
                    dx12: sys::Dx12Data {
                        resource,
                        fence,
                        fence_value,
                    },
                },
            ),
            SenderFrame::OpenGl { texture } => (
                SenderFrameType::OPENGL_TEXTURE,
                SenderFrameTypeData {
                    gl: sys::OpenGlData { texture },
                },
            ),
            SenderFrame::Vulkan {
                memory,
                size,
                format,
                width,
                height,
                wait_semaphore,
                wait_value,
                signal_semaphore,
                signal_value,
            } => (
                SenderFrameType::VULKAN_TEXTURE,
                SenderFrameTypeData {
                    vk: sys::VulkanData {
                        memory,
                        size,
                        format,
                        width,
                        height,
                        wait_semaphore,
                        wait_semaphore_value: wait_value,
                        signal_semaphore,
                        signal_semaphore_value: signal_value,
                    },
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_memory_lowers_to_cpu_payload() {
        let pixels = [0u8; 16];
        let frame = SenderFrame::HostMemory {
            data: &pixels,
            stride: 8,
            format: PixelFormat::BGRA8,
        };
        let (frame_type, data) = frame.lower();
        assert_eq!(frame_type, SenderFrameType::HOST_MEMORY);
        let cpu = unsafe { data.cpu };
        let (ptr, stride, format) = (cpu.data, cpu.stride, cpu.format);
        assert_eq!(ptr as *const u8, pixels.as_ptr());
        assert_eq!(stride, 8);
        assert_eq!(format, PixelFormat::BGRA8);
    }

    #[test]
    fn vulkan_lowers_semaphores() {
        let frame = SenderFrame::Vulkan {
            memory: 7,
            size: 1024,
            format: PixelFormat::RGBA32F,
            width: 4,
            height: 4,
            wait_semaphore: 9,
            wait_value: 1,
            signal_semaphore: 9,
            signal_value: 2,
        };
        let (frame_type, data) = frame.lower();
        assert_eq!(frame_type, SenderFrameType::VULKAN_TEXTURE);
        let vk = unsafe { data.vk };
        let (wait, signal) = (vk.wait_semaphore_value, vk.signal_semaphore_value);
        assert_eq!((wait, signal), (1, 2));
    }
}
