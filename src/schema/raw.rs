//! C layout of a [`Schema`], and parsing of schemas the library writes into our buffers.
use super::{DmxType, ParameterFlags, ParameterKind, ParameterType, RemoteParameter, Scene, Schema};
use crate::buffer::BufferView;
use crate::error::Error;
use crate::sys;
use bytemuck::Zeroable;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

/// Sole owner of a schema in the library's C layout.
///
/// Every string and array the `sys::Schema` points into is held here, and released together when
/// this is dropped. The default value is the empty schema (zero counts, null pointers). Move out
/// with `std::mem::take`, which leaves the empty schema behind.
#[derive(Default)]
pub struct RawSchema {
    schema: sys::Schema,
    strings: Vec<CString>,
    channels: Vec<*const c_char>,
    scenes: Vec<sys::RemoteParameters>,
    parameters: Vec<Vec<sys::RemoteParameter>>,
    options: Vec<Vec<*const c_char>>,
}

fn ptr_or_null<T>(items: &mut [T]) -> *mut T {
    if items.is_empty() {
        ptr::null_mut()
    } else {
        items.as_mut_ptr()
    }
}

impl RawSchema {
    pub fn from_schema(schema: &Schema) -> Result<Self, Error> {
        let mut raw = Self::default();

        raw.schema.engine_name = raw.intern(&schema.engine_name)?;
        raw.schema.engine_version = raw.intern(&schema.engine_version)?;
        raw.schema.info = raw.intern(&schema.info)?;

        let mut channels = schema
            .channels
            .iter()
            .map(|c| raw.intern(c))
            .collect::<Result<Vec<_>, _>>()?;
        raw.schema.channels = sys::Channels {
            n_channels: channels.len() as u32,
            channels: ptr_or_null(&mut channels),
        };
        raw.channels = channels;

        let mut scenes = Vec::with_capacity(schema.scenes.len());
        for scene in &schema.scenes {
            let mut parameters = scene
                .parameters
                .iter()
                .map(|p| raw.parameter(p))
                .collect::<Result<Vec<_>, _>>()?;
            scenes.push(sys::RemoteParameters {
                name: raw.intern(&scene.name)?,
                n_parameters: parameters.len() as u32,
                parameters: ptr_or_null(&mut parameters),
                hash: scene.hash,
            });
            raw.parameters.push(parameters);
        }
        raw.schema.scenes = sys::Scenes {
            n_scenes: scenes.len() as u32,
            scenes: ptr_or_null(&mut scenes),
        };
        raw.scenes = scenes;

        Ok(raw)
    }

    fn intern(&mut self, s: &str) -> Result<*const c_char, Error> {
        let s = CString::new(s).map_err(|_| Error::InvalidString(s.into()))?;
        let ptr = s.as_ptr();
        self.strings.push(s);
        Ok(ptr)
    }

    fn parameter(&mut self, parameter: &RemoteParameter) -> Result<sys::RemoteParameter, Error> {
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
                    default_value: self.intern(default)?,
                }
            }
            ParameterKind::Image | ParameterKind::Pose | ParameterKind::Transform => (),
        }

        let mut options = parameter
            .options
            .iter()
            .map(|o| self.intern(o))
            .collect::<Result<Vec<_>, _>>()?;
        let n_options = options.len() as u32;
        let options_ptr = ptr_or_null(&mut options);
        self.options.push(options);

        Ok(sys::RemoteParameter {
            group: self.intern(&parameter.group)?,
            display_name: self.intern(&parameter.display_name)?,
            key: self.intern(&parameter.key)?,
            type_: parameter.parameter_type().raw(),
            defaults,
            n_options,
            options: options_ptr,
            dmx_offset: parameter.dmx_offset,
            dmx_type: parameter.dmx_type.raw(),
            flags: parameter.flags.bits(),
        })
    }

    pub fn raw(&self) -> &sys::Schema {
        &self.schema
    }

    /// The C record to pass to the library. Only the per-scene hashes may be written through it.
    pub fn raw_mut(&mut self) -> &mut sys::Schema {
        &mut self.schema
    }

    /// Per-scene hashes, as last written by the library
    pub fn scene_hashes(&self) -> Vec<u64> {
        self.scenes.iter().map(|s| s.hash).collect()
    }

    /// Every non-zero count is backed by a non-null array of that length
    pub fn is_consistent(&self) -> bool {
        fn backed<T, U>(count: u32, ptr: *const T, owned: &[U]) -> bool {
            count as usize == owned.len() && (count == 0 || !ptr.is_null())
        }

        let channels = self.schema.channels;
        let scenes = self.schema.scenes;
        backed(channels.n_channels, channels.channels, &self.channels)
            && backed(scenes.n_scenes, scenes.scenes, &self.scenes)
            && self.scenes.iter().zip(&self.parameters).all(|(scene, parameters)| {
                backed(scene.n_parameters, scene.parameters, parameters)
                    && parameters.iter().all(|p| {
                        let (n_options, options) = (p.n_options, p.options);
                        n_options == 0 || !options.is_null()
                    })
            })
    }
}

impl Drop for RawSchema {
    fn drop(&mut self) {
        assert!(
            std::thread::panicking() || self.is_consistent(),
            "schema dropped with a count that has no array behind it"
        );
    }
}

/// Read a schema the library wrote into `bytes`
pub fn parse_schema(bytes: &[u8]) -> Result<Schema, Error> {
    let view = BufferView::new("rs_loadSchema", bytes);
    let header: sys::Schema = view.read(0)?;

    let channels = header.channels;
    let channels = view
        .read_array::<usize>(channels.channels as usize, channels.n_channels)?
        .into_iter()
        .map(|c| view.read_str(c))
        .collect::<Result<Vec<_>, _>>()?;

    let scenes = header.scenes;
    let scenes = view
        .read_array::<sys::RemoteParameters>(scenes.scenes as usize, scenes.n_scenes)?
        .into_iter()
        .map(|scene| parse_scene(&view, scene))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Schema {
        engine_name: view.read_str(header.engine_name as usize)?,
        engine_version: view.read_str(header.engine_version as usize)?,
        info: view.read_str(header.info as usize)?,
        channels,
        scenes,
    })
}

fn parse_scene(view: &BufferView, scene: sys::RemoteParameters) -> Result<Scene, Error> {
    let parameters = view
        .read_array::<sys::RemoteParameter>(scene.parameters as usize, scene.n_parameters)?
        .into_iter()
        .map(|p| parse_parameter(view, p))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Scene {
        name: view.read_str(scene.name as usize)?,
        parameters,
        hash: scene.hash,
    })
}

fn parse_parameter(
    view: &BufferView,
    parameter: sys::RemoteParameter,
) -> Result<RemoteParameter, Error> {
    let raw_type = parameter.type_;
    let defaults = parameter.defaults;
    let kind = match ParameterType::from_raw(raw_type) {
        Some(ParameterType::Number) => {
            // Both union members are plain data
            let number = unsafe { defaults.number };
            ParameterKind::Number {
                min: number.min,
                max: number.max,
                step: number.step,
                default: number.default_value,
            }
        }
        Some(ParameterType::Text) => {
            let text = unsafe { defaults.text };
            ParameterKind::Text {
                default: view.read_str(text.default_value as usize)?,
            }
        }
        Some(ParameterType::Image) => ParameterKind::Image,
        Some(ParameterType::Pose) => ParameterKind::Pose,
        Some(ParameterType::Transform) => ParameterKind::Transform,
        None => {
            return Err(Error::invalid_buffer(
                "rs_loadSchema",
                format!("unknown parameter type {}", raw_type.0),
            ))
        }
    };

    let options = view
        .read_array::<usize>(parameter.options as usize, parameter.n_options)?
        .into_iter()
        .map(|o| view.read_str(o))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RemoteParameter {
        key: view.read_str(parameter.key as usize)?,
        display_name: view.read_str(parameter.display_name as usize)?,
        group: view.read_str(parameter.group as usize)?,
        kind,
        options,
        dmx_offset: parameter.dmx_offset,
        dmx_type: DmxType::from_raw(parameter.dmx_type),
        flags: ParameterFlags::from_bits(parameter.flags),
    })
}
