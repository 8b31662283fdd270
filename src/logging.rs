//! Routes the library's own log output into the `log` facade.
use crate::api::{LogChannel, RenderStreamApi};
use crate::sys::Logger;
use log::Level;
use std::ffi::CStr;
use std::os::raw::c_char;

/// Target of every record forwarded from the library
pub const TARGET: &str = "renderstream";

const CHANNELS: [LogChannel; 3] = [LogChannel::Info, LogChannel::Error, LogChannel::Verbose];

unsafe fn forward(level: Level, message: *const c_char) {
    if message.is_null() {
        return;
    }
    let message = CStr::from_ptr(message).to_string_lossy();
    log::log!(target: TARGET, level, "{}", message.trim_end());
}

unsafe extern "C" fn forward_info(message: *const c_char) {
    forward(Level::Info, message)
}

unsafe extern "C" fn forward_error(message: *const c_char) {
    forward(Level::Error, message)
}

unsafe extern "C" fn forward_verbose(message: *const c_char) {
    forward(Level::Trace, message)
}

pub fn install(api: &dyn RenderStreamApi) {
    for channel in CHANNELS {
        let logger: Logger = match channel {
            LogChannel::Info => forward_info,
            LogChannel::Error => forward_error,
            LogChannel::Verbose => forward_verbose,
        };
        api.register_logger(channel, Some(logger));
    }
}

pub fn uninstall(api: &dyn RenderStreamApi) {
    for channel in CHANNELS {
        api.register_logger(channel, None);
    }
}
