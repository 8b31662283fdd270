//! Per-frame access to remote parameter values by key.
use crate::api::RenderStreamApi;
use crate::error::{check, Error};
use crate::schema::{ParameterType, Scene};
use crate::sys::ImageFrameData;
use nalgebra::Matrix4;
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::c_char;

/// Where a parameter's value sits in the frame's value arrays
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Slot {
    pub parameter_type: ParameterType,
    /// Index into the numeric, image or text array, depending on the type
    pub index: usize,
}

/// Positions of a scene's parameters in the flat per-frame value arrays.
///
/// Read-only parameters take no space and cannot be looked up. Poses and transforms take 16
/// numeric slots. If a key is declared twice, the first declaration wins.
#[derive(Debug, Clone)]
pub struct ParameterLayout<'s> {
    slots: HashMap<&'s str, Slot>,
    numeric_len: usize,
    image_len: usize,
    text_len: usize,
}

impl<'s> ParameterLayout<'s> {
    pub fn new(scene: &'s Scene) -> Self {
        let mut layout = Self {
            slots: HashMap::new(),
            numeric_len: 0,
            image_len: 0,
            text_len: 0,
        };

        for parameter in scene.parameters.iter().filter(|p| !p.flags.read_only) {
            let parameter_type = parameter.parameter_type();
            let counter = match parameter_type {
                ParameterType::Number | ParameterType::Pose | ParameterType::Transform => {
                    &mut layout.numeric_len
                }
                ParameterType::Image => &mut layout.image_len,
                ParameterType::Text => &mut layout.text_len,
            };
            let index = *counter;
            *counter += parameter_type.numeric_slots().max(1);

            layout
                .slots
                .entry(parameter.key.as_str())
                .or_insert(Slot {
                    parameter_type,
                    index,
                });
        }

        layout
    }

    pub fn numeric_len(&self) -> usize {
        self.numeric_len
    }

    pub fn image_len(&self) -> usize {
        self.image_len
    }

    pub fn text_len(&self) -> usize {
        self.text_len
    }

    pub fn lookup(&self, key: &str) -> Result<Slot, Error> {
        self.slots
            .get(key)
            .copied()
            .ok_or_else(|| Error::KeyNotFound(key.into()))
    }

    fn index_of(
        &self,
        key: &str,
        accepted: &[ParameterType],
        expected: &'static str,
    ) -> Result<usize, Error> {
        let slot = self.lookup(key)?;
        if accepted.contains(&slot.parameter_type) {
            Ok(slot.index)
        } else {
            Err(Error::TypeMismatch {
                key: key.into(),
                expected,
                actual: slot.parameter_type,
            })
        }
    }
}

/// One frame's values for a scene.
///
/// Numbers, matrices and image descriptors are fetched up front; text is fetched from the
/// library on each lookup. Build a new one every frame.
pub struct ParameterValues<'a> {
    api: &'a dyn RenderStreamApi,
    hash: u64,
    layout: ParameterLayout<'a>,
    numbers: Vec<f32>,
    images: Vec<ImageFrameData>,
}

impl<'a> ParameterValues<'a> {
    pub fn fetch(api: &'a dyn RenderStreamApi, scene: &'a Scene) -> Result<Self, Error> {
        let layout = ParameterLayout::new(scene);

        let mut numbers = vec![0.; layout.numeric_len()];
        check(
            "rs_getFrameParameters",
            api.get_frame_parameters(scene.hash, &mut numbers),
        )?;

        let mut images = vec![ImageFrameData::default(); layout.image_len()];
        check(
            "rs_getFrameImageData",
            api.get_frame_image_data(scene.hash, &mut images),
        )?;

        Ok(Self {
            api,
            hash: scene.hash,
            layout,
            numbers,
            images,
        })
    }

    pub fn layout(&self) -> &ParameterLayout<'a> {
        &self.layout
    }

    pub fn get_number(&self, key: &str) -> Result<f32, Error> {
        let index = self.layout.index_of(key, &[ParameterType::Number], "a number")?;
        Ok(self.numbers[index])
    }

    /// The 16 values of a pose or transform, column-major
    pub fn get_transform(&self, key: &str) -> Result<[f32; 16], Error> {
        let index = self.layout.index_of(
            key,
            &[ParameterType::Pose, ParameterType::Transform],
            "a pose or transform",
        )?;
        let mut out = [0.; 16];
        out.copy_from_slice(&self.numbers[index..index + 16]);
        Ok(out)
    }

    pub fn get_matrix(&self, key: &str) -> Result<Matrix4<f32>, Error> {
        self.get_transform(key)
            .map(|values| Matrix4::from_column_slice(&values))
    }

    pub fn get_image(&self, key: &str) -> Result<ImageFrameData, Error> {
        let index = self.layout.index_of(key, &[ParameterType::Image], "an image")?;
        Ok(self.images[index])
    }

    pub fn get_text(&self, key: &str) -> Result<String, Error> {
        let index = self.layout.index_of(key, &[ParameterType::Text], "text")?;
        let mut text: *const c_char = std::ptr::null();
        check(
            "rs_getFrameText",
            self.api.get_frame_text(self.hash, index as u32, &mut text),
        )?;
        if text.is_null() {
            return Ok(String::new());
        }
        // Valid until the next frame, per the `RenderStreamApi` contract
        let text = unsafe { CStr::from_ptr(text) };
        Ok(text.to_string_lossy().into_owned())
    }
}
