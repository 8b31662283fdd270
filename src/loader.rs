//! Finding and binding the host's `d3renderstream` library at runtime.
use crate::api::{GpuInterop, LogChannel, RenderStreamApi};
use crate::error::Error;
use crate::sys::{self, *};
use libloading::Library;
use log::info;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::ptr;

pub const LIBRARY_NAME: &str = "d3renderstream.dll";
/// Registry key, under the current user, of the installed host
pub const REGISTRY_KEY: &str = r"Software\d3 Technologies\d3 Production Suite";
/// Value under [`REGISTRY_KEY`] holding the host executable's path
pub const REGISTRY_VALUE: &str = "exe path";

/// The library shipped next to the host executable at `exe`
pub fn library_path_from_exe(exe: &Path) -> PathBuf {
    exe.parent().unwrap_or_else(|| Path::new("")).join(LIBRARY_NAME)
}

/// `explicit` if given, otherwise the library of the installed host
pub fn locate_library(explicit: Option<&Path>) -> Result<PathBuf, Error> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => install_exe_path().map(|exe| library_path_from_exe(&exe)),
    }
}

#[cfg(windows)]
fn install_exe_path() -> Result<PathBuf, Error> {
    use std::ffi::OsString;
    use std::os::windows::ffi::{OsStrExt, OsStringExt};
    use windows_sys::Win32::Foundation::ERROR_SUCCESS;
    use windows_sys::Win32::System::Registry::{RegGetValueW, HKEY_CURRENT_USER, RRF_RT_REG_SZ};

    fn wide(s: &str) -> Vec<u16> {
        std::ffi::OsStr::new(s).encode_wide().chain(Some(0)).collect()
    }

    let (key, value) = (wide(REGISTRY_KEY), wide(REGISTRY_VALUE));
    let mut buffer = vec![0u16; 512];
    let mut n_bytes = (buffer.len() * 2) as u32;
    let code = unsafe {
        RegGetValueW(
            HKEY_CURRENT_USER,
            key.as_ptr(),
            value.as_ptr(),
            RRF_RT_REG_SZ,
            ptr::null_mut(),
            buffer.as_mut_ptr().cast(),
            &mut n_bytes,
        )
    };
    if code != ERROR_SUCCESS {
        return Err(Error::Registry {
            value: REGISTRY_VALUE,
            code,
        });
    }

    let len = buffer.iter().position(|c| *c == 0).unwrap_or(buffer.len());
    Ok(OsString::from_wide(&buffer[..len]).into())
}

#[cfg(not(windows))]
fn install_exe_path() -> Result<PathBuf, Error> {
    Err(Error::LibraryNotFound(format!(
        "the host is only installed on Windows; set an explicit path to {}",
        LIBRARY_NAME
    )))
}

#[cfg(windows)]
fn open(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::windows::{
        Library, LOAD_LIBRARY_SEARCH_APPLICATION_DIR, LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR,
        LOAD_LIBRARY_SEARCH_SYSTEM32, LOAD_LIBRARY_SEARCH_USER_DIRS,
    };
    // Resolve the library's own dependencies from its directory
    let flags = LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR
        | LOAD_LIBRARY_SEARCH_APPLICATION_DIR
        | LOAD_LIBRARY_SEARCH_SYSTEM32
        | LOAD_LIBRARY_SEARCH_USER_DIRS;
    unsafe { Library::load_with_flags(path, flags) }.map(Into::into)
}

#[cfg(not(windows))]
fn open(path: &Path) -> Result<Library, libloading::Error> {
    unsafe { Library::new(path) }
}

/// Every entry point of a loaded library
pub struct DynamicApi {
    initialise: PfnInitialise,
    initialise_gpgpu_without_interop: PfnInitialiseGpGpuWithoutInterop,
    initialise_gpgpu_with_dx11_device: PfnInitialiseGpGpuWithDx11Device,
    initialise_gpgpu_with_dx11_resource: PfnInitialiseGpGpuWithDx11Resource,
    initialise_gpgpu_with_dx12_device_and_queue: PfnInitialiseGpGpuWithDx12DeviceAndQueue,
    initialise_gpgpu_with_opengl_contexts: PfnInitialiseGpGpuWithOpenGlContexts,
    initialise_gpgpu_with_vulkan_device: PfnInitialiseGpGpuWithVulkanDevice,
    shutdown: PfnShutdown,
    load_schema: PfnLoadSchema,
    save_schema: PfnSaveSchema,
    set_schema: PfnSetSchema,
    get_streams: PfnGetStreams,
    await_frame_data: PfnAwaitFrameData,
    set_follower: PfnSetFollower,
    begin_follower_frame: PfnBeginFollowerFrame,
    get_frame_camera: PfnGetFrameCamera,
    send_frame: PfnSendFrame,
    get_frame_parameters: PfnGetFrameParameters,
    get_frame_image_data: PfnGetFrameImageData,
    get_frame_image: PfnGetFrameImage,
    get_frame_text: PfnGetFrameText,
    log_to_d3: PfnLogToD3,
    set_new_status_message: PfnSetNewStatusMessage,
    send_profiling_data: PfnSendProfilingData,
    register_logging: PfnRegisterLoggingFunc,
    register_error_logging: PfnRegisterLoggingFunc,
    register_verbose_logging: PfnRegisterLoggingFunc,
    unregister_logging: PfnUnregisterLoggingFunc,
    unregister_error_logging: PfnUnregisterLoggingFunc,
    unregister_verbose_logging: PfnUnregisterLoggingFunc,
    // Last, so the entry points above never outlive it
    _library: Library,
}

/// Look up `name` as a `T`, which must match the entry point's real signature
unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T, Error> {
    library
        .get::<T>(name.as_bytes())
        .map(|symbol| *symbol)
        .map_err(|source| Error::MissingSymbol { name, source })
}

impl DynamicApi {
    /// Load the library at `path` and bind every entry point
    pub fn load(path: &Path) -> Result<Self, Error> {
        info!("Loading {}", path.display());
        let library = open(path).map_err(|source| Error::Load {
            path: path.to_path_buf(),
            source,
        })?;

        // Each field's type is its entry point's signature
        unsafe {
            Ok(Self {
                initialise: symbol(&library, "rs_initialise")?,
                initialise_gpgpu_without_interop: symbol(
                    &library,
                    "rs_initialiseGpGpuWithoutInterop",
                )?,
                initialise_gpgpu_with_dx11_device: symbol(
                    &library,
                    "rs_initialiseGpGpuWithDX11Device",
                )?,
                initialise_gpgpu_with_dx11_resource: symbol(
                    &library,
                    "rs_initialiseGpGpuWithDX11Resource",
                )?,
                initialise_gpgpu_with_dx12_device_and_queue: symbol(
                    &library,
                    "rs_initialiseGpGpuWithDX12DeviceAndQueue",
                )?,
                initialise_gpgpu_with_opengl_contexts: symbol(
                    &library,
                    "rs_initialiseGpGpuWithOpenGlContexts",
                )?,
                initialise_gpgpu_with_vulkan_device: symbol(
                    &library,
                    "rs_initialiseGpGpuWithVulkanDevice",
                )?,
                shutdown: symbol(&library, "rs_shutdown")?,
                load_schema: symbol(&library, "rs_loadSchema")?,
                save_schema: symbol(&library, "rs_saveSchema")?,
                set_schema: symbol(&library, "rs_setSchema")?,
                get_streams: symbol(&library, "rs_getStreams")?,
                await_frame_data: symbol(&library, "rs_awaitFrameData")?,
                set_follower: symbol(&library, "rs_setFollower")?,
                begin_follower_frame: symbol(&library, "rs_beginFollowerFrame")?,
                get_frame_camera: symbol(&library, "rs_getFrameCamera")?,
                send_frame: symbol(&library, "rs_sendFrame")?,
                get_frame_parameters: symbol(&library, "rs_getFrameParameters")?,
                get_frame_image_data: symbol(&library, "rs_getFrameImageData")?,
                get_frame_image: symbol(&library, "rs_getFrameImage")?,
                get_frame_text: symbol(&library, "rs_getFrameText")?,
                log_to_d3: symbol(&library, "rs_logToD3")?,
                set_new_status_message: symbol(&library, "rs_setNewStatusMessage")?,
                send_profiling_data: symbol(&library, "rs_sendProfilingData")?,
                register_logging: symbol(&library, "rs_registerLoggingFunc")?,
                register_error_logging: symbol(&library, "rs_registerErrorLoggingFunc")?,
                register_verbose_logging: symbol(&library, "rs_registerVerboseLoggingFunc")?,
                unregister_logging: symbol(&library, "rs_unregisterLoggingFunc")?,
                unregister_error_logging: symbol(&library, "rs_unregisterErrorLoggingFunc")?,
                unregister_verbose_logging: symbol(&library, "rs_unregisterVerboseLoggingFunc")?,
                _library: library,
            })
        }
    }
}

fn buffer_ptr<T>(buffer: Option<&mut [u8]>) -> *mut T {
    buffer.map_or(ptr::null_mut(), |b| b.as_mut_ptr().cast())
}

unsafe impl RenderStreamApi for DynamicApi {
    fn initialise(&self, major: i32, minor: i32) -> RsError {
        unsafe { (self.initialise)(major, minor) }
    }

    fn initialise_gpgpu(&self, interop: &GpuInterop) -> RsError {
        unsafe {
            match *interop {
                GpuInterop::None => (self.initialise_gpgpu_without_interop)(ptr::null_mut()),
                GpuInterop::Dx11Device(device) => (self.initialise_gpgpu_with_dx11_device)(device),
                GpuInterop::Dx11Resource(resource) => {
                    (self.initialise_gpgpu_with_dx11_resource)(resource)
                }
                GpuInterop::Dx12 { device, queue } => {
                    (self.initialise_gpgpu_with_dx12_device_and_queue)(device, queue)
                }
                GpuInterop::OpenGl {
                    context,
                    device_context,
                } => (self.initialise_gpgpu_with_opengl_contexts)(context, device_context),
                GpuInterop::Vulkan { device } => (self.initialise_gpgpu_with_vulkan_device)(device),
            }
        }
    }

    fn shutdown(&self) -> RsError {
        unsafe { (self.shutdown)() }
    }

    fn load_schema(
        &self,
        asset_path: &CStr,
        buffer: Option<&mut [u8]>,
        n_bytes: &mut u32,
    ) -> RsError {
        unsafe { (self.load_schema)(asset_path.as_ptr(), buffer_ptr(buffer), n_bytes) }
    }

    fn save_schema(&self, asset_path: &CStr, schema: &mut sys::Schema) -> RsError {
        unsafe { (self.save_schema)(asset_path.as_ptr(), schema) }
    }

    fn set_schema(&self, schema: &mut sys::Schema) -> RsError {
        unsafe { (self.set_schema)(schema) }
    }

    fn get_streams(&self, buffer: Option<&mut [u8]>, n_bytes: &mut u32) -> RsError {
        unsafe { (self.get_streams)(buffer_ptr(buffer), n_bytes) }
    }

    fn await_frame_data(&self, timeout_ms: i32, data: &mut FrameData) -> RsError {
        unsafe { (self.await_frame_data)(timeout_ms, data) }
    }

    fn set_follower(&self, is_follower: bool) -> RsError {
        unsafe { (self.set_follower)(is_follower as _) }
    }

    fn begin_follower_frame(&self, t_tracked: f64) -> RsError {
        unsafe { (self.begin_follower_frame)(t_tracked) }
    }

    fn get_frame_camera(&self, stream: StreamHandle, camera: &mut CameraData) -> RsError {
        unsafe { (self.get_frame_camera)(stream, camera) }
    }

    fn send_frame(
        &self,
        stream: StreamHandle,
        frame_type: SenderFrameType,
        data: SenderFrameTypeData,
        response: &CameraResponseData,
    ) -> RsError {
        unsafe { (self.send_frame)(stream, frame_type, data, response) }
    }

    fn get_frame_parameters(&self, schema_hash: u64, values: &mut [f32]) -> RsError {
        unsafe {
            (self.get_frame_parameters)(
                schema_hash,
                values.as_mut_ptr().cast(),
                std::mem::size_of_val(values),
            )
        }
    }

    fn get_frame_image_data(&self, schema_hash: u64, images: &mut [ImageFrameData]) -> RsError {
        unsafe { (self.get_frame_image_data)(schema_hash, images.as_mut_ptr(), images.len()) }
    }

    fn get_frame_image(
        &self,
        image_id: i64,
        frame_type: SenderFrameType,
        data: SenderFrameTypeData,
    ) -> RsError {
        unsafe { (self.get_frame_image)(image_id, frame_type, data) }
    }

    fn get_frame_text(&self, schema_hash: u64, index: u32, text: &mut *const c_char) -> RsError {
        unsafe { (self.get_frame_text)(schema_hash, index, text) }
    }

    fn log_to_d3(&self, message: &CStr) -> RsError {
        unsafe { (self.log_to_d3)(message.as_ptr()) }
    }

    fn set_new_status_message(&self, message: &CStr) -> RsError {
        unsafe { (self.set_new_status_message)(message.as_ptr()) }
    }

    fn send_profiling_data(&self, entries: &mut [ProfilingEntry]) -> RsError {
        unsafe { (self.send_profiling_data)(entries.as_mut_ptr(), entries.len() as _) }
    }

    fn register_logger(&self, channel: LogChannel, logger: Option<Logger>) {
        unsafe {
            match (channel, logger) {
                (LogChannel::Info, Some(logger)) => (self.register_logging)(logger),
                (LogChannel::Error, Some(logger)) => (self.register_error_logging)(logger),
                (LogChannel::Verbose, Some(logger)) => (self.register_verbose_logging)(logger),
                (LogChannel::Info, None) => (self.unregister_logging)(),
                (LogChannel::Error, None) => (self.unregister_error_logging)(),
                (LogChannel::Verbose, None) => (self.unregister_verbose_logging)(),
            }
        }
    }
}
