//! Client side of disguise RenderStream. Load the library the host ships, describe the engine's
//! remote parameters, then answer the host's frame requests with one rendered frame per stream.
//!
//! [`RenderStream`] is the session; [`runtime::launch`] wraps it in a ready-made frame loop.
pub mod api;
pub mod buffer;
pub mod camera;
pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod parameters;
mod renderstream;
pub mod runtime;
pub mod schema;
pub mod streams;
pub mod sys;
#[cfg(test)]
mod mock;

pub use api::{GpuInterop, RenderStreamApi, SenderFrame};
pub use config::Config;
pub use error::{Error, Status};
pub use nalgebra::Matrix4;
pub use parameters::ParameterValues;
pub use renderstream::{FrameData, FrameEvent, RenderStream};
pub use schema::{RemoteParameter, Scene, Schema};
pub use streams::StreamDescription;
pub use sys::{CameraData, CameraResponseData, ImageFrameData, StreamHandle};

/// Interface version this crate was written against, checked by the library at initialisation
pub const VERSION_MAJOR: i32 = 1;
pub const VERSION_MINOR: i32 = 30;
