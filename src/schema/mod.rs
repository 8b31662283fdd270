//! The remote-parameter schema an engine exposes to the controlling host.
//!
//! Build one with [`Schema::new`] and the `with_*` methods, then hand it to
//! [`RenderStream::set_schema`](crate::RenderStream::set_schema), which fills in each scene's hash.
use crate::error::Error;
use crate::sys::{self, RemoteParameterDmxType, RemoteParameterType};

pub mod raw;

pub use raw::RawSchema;

/// Kind of a remote parameter, without its defaults
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ParameterType {
    Number,
    Image,
    Pose,
    Transform,
    Text,
}

impl ParameterType {
    /// Slots taken in the per-frame numeric value array
    pub fn numeric_slots(self) -> usize {
        match self {
            Self::Number => 1,
            Self::Pose | Self::Transform => 16,
            Self::Image | Self::Text => 0,
        }
    }

    pub fn from_raw(raw: RemoteParameterType) -> Option<Self> {
        Some(match raw {
            RemoteParameterType::NUMBER => Self::Number,
            RemoteParameterType::IMAGE => Self::Image,
            RemoteParameterType::POSE => Self::Pose,
            RemoteParameterType::TRANSFORM => Self::Transform,
            RemoteParameterType::TEXT => Self::Text,
            _ => return None,
        })
    }

    pub fn raw(self) -> RemoteParameterType {
        match self {
            Self::Number => RemoteParameterType::NUMBER,
            Self::Image => RemoteParameterType::IMAGE,
            Self::Pose => RemoteParameterType::POSE,
            Self::Transform => RemoteParameterType::TRANSFORM,
            Self::Text => RemoteParameterType::TEXT,
        }
    }
}

/// A parameter's kind together with its defaults
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterKind {
    Number {
        min: f32,
        max: f32,
        step: f32,
        default: f32,
    },
    Image,
    Pose,
    Transform,
    Text {
        default: String,
    },
}

impl ParameterKind {
    pub fn parameter_type(&self) -> ParameterType {
        match self {
            Self::Number { .. } => ParameterType::Number,
            Self::Image => ParameterType::Image,
            Self::Pose => ParameterType::Pose,
            Self::Transform => ParameterType::Transform,
            Self::Text { .. } => ParameterType::Text,
        }
    }
}

/// How a parameter is patched over DMX
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DmxType {
    Default,
    Dmx8,
    Dmx16BigEndian,
}

impl DmxType {
    pub fn from_raw(raw: RemoteParameterDmxType) -> Self {
        match raw {
            RemoteParameterDmxType::DMX_8 => Self::Dmx8,
            RemoteParameterDmxType::DMX_16_BE => Self::Dmx16BigEndian,
            _ => Self::Default,
        }
    }

    pub fn raw(self) -> RemoteParameterDmxType {
        match self {
            Self::Default => RemoteParameterDmxType::DEFAULT,
            Self::Dmx8 => RemoteParameterDmxType::DMX_8,
            Self::Dmx16BigEndian => RemoteParameterDmxType::DMX_16_BE,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct ParameterFlags {
    /// The host may not sequence this parameter on its timeline
    pub no_sequence: bool,
    /// Declared for display only; never delivered with frame values
    pub read_only: bool,
}

impl ParameterFlags {
    pub fn from_bits(bits: u32) -> Self {
        Self {
            no_sequence: bits & sys::REMOTEPARAMETER_NO_SEQUENCE != 0,
            read_only: bits & sys::REMOTEPARAMETER_READ_ONLY != 0,
        }
    }

    pub fn bits(self) -> u32 {
        let mut bits = sys::REMOTEPARAMETER_NO_FLAGS;
        if self.no_sequence {
            bits |= sys::REMOTEPARAMETER_NO_SEQUENCE;
        }
        if self.read_only {
            bits |= sys::REMOTEPARAMETER_READ_ONLY;
        }
        bits
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteParameter {
    /// Stable identifier, also used to look the value up each frame
    pub key: String,
    pub display_name: String,
    pub group: String,
    pub kind: ParameterKind,
    /// Names for the values of an enumerated number parameter
    pub options: Vec<String>,
    /// -1 lets the host assign an offset
    pub dmx_offset: i32,
    pub dmx_type: DmxType,
    pub flags: ParameterFlags,
}

impl RemoteParameter {
    fn with_kind(key: &str, display_name: &str, group: &str, kind: ParameterKind) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            group: group.into(),
            kind,
            options: Vec::new(),
            dmx_offset: -1,
            dmx_type: DmxType::Dmx16BigEndian,
            flags: ParameterFlags::default(),
        }
    }

    /// A number in `0..=255` with a step of 1
    pub fn number(key: &str, display_name: &str, group: &str, default: f32) -> Self {
        Self::with_kind(
            key,
            display_name,
            group,
            ParameterKind::Number {
                min: 0.,
                max: 255.,
                step: 1.,
                default,
            },
        )
    }

    pub fn image(key: &str, display_name: &str, group: &str) -> Self {
        Self::with_kind(key, display_name, group, ParameterKind::Image)
    }

    pub fn pose(key: &str, display_name: &str, group: &str) -> Self {
        Self::with_kind(key, display_name, group, ParameterKind::Pose)
    }

    pub fn transform(key: &str, display_name: &str, group: &str) -> Self {
        Self::with_kind(key, display_name, group, ParameterKind::Transform)
    }

    pub fn text(key: &str, display_name: &str, group: &str, default: &str) -> Self {
        Self::with_kind(
            key,
            display_name,
            group,
            ParameterKind::Text {
                default: default.into(),
            },
        )
    }

    /// Set the range of a number parameter. No effect on other kinds.
    pub fn range(mut self, min: f32, max: f32, step: f32) -> Self {
        if let ParameterKind::Number {
            min: old_min,
            max: old_max,
            step: old_step,
            ..
        } = &mut self.kind
        {
            *old_min = min;
            *old_max = max;
            *old_step = step;
        }
        self
    }

    /// Turn a number parameter into a choice between named values, `0..options.len()`
    pub fn options<S: Into<String>>(mut self, options: impl IntoIterator<Item = S>) -> Self {
        self.options = options.into_iter().map(Into::into).collect();
        if !self.options.is_empty() {
            let max = (self.options.len() - 1) as f32;
            self = self.range(0., max, 1.);
        }
        self
    }

    pub fn no_sequence(mut self) -> Self {
        self.flags.no_sequence = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.flags.read_only = true;
        self
    }

    pub fn dmx(mut self, offset: i32, dmx_type: DmxType) -> Self {
        self.dmx_offset = offset;
        self.dmx_type = dmx_type;
        self
    }

    pub fn parameter_type(&self) -> ParameterType {
        self.kind.parameter_type()
    }
}

/// A named group of parameters, selected per frame by index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub name: String,
    pub parameters: Vec<RemoteParameter>,
    /// Assigned by the library on `set_schema`; 0 until then
    pub hash: u64,
}

impl Scene {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_parameter(mut self, parameter: RemoteParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// The first parameter declared with `key`
    pub fn parameter(&self, key: &str) -> Option<&RemoteParameter> {
        self.parameters.iter().find(|p| p.key == key)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub engine_name: String,
    pub engine_version: String,
    pub info: String,
    pub channels: Vec<String>,
    pub scenes: Vec<Scene>,
}

impl Schema {
    /// An empty schema reporting this crate's protocol version as the engine version
    pub fn new(engine_name: &str) -> Self {
        Self {
            engine_name: engine_name.into(),
            engine_version: format!("RS{}.{}", crate::VERSION_MAJOR, crate::VERSION_MINOR),
            ..Default::default()
        }
    }

    pub fn with_info(mut self, info: &str) -> Self {
        self.info = info.into();
        self
    }

    pub fn with_channel(mut self, channel: &str) -> Self {
        self.channels.push(channel.into());
        self
    }

    pub fn with_scene(mut self, scene: Scene) -> Self {
        self.scenes.push(scene);
        self
    }

    /// The scene a frame request selected
    pub fn scene(&self, index: u32) -> Result<&Scene, Error> {
        self.scenes.get(index as usize).ok_or(Error::SceneOutOfRange {
            index,
            count: self.scenes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_defaults() {
        let p = RemoteParameter::number("speed", "Speed", "Shared", 1.);
        assert_eq!(
            p.kind,
            ParameterKind::Number {
                min: 0.,
                max: 255.,
                step: 1.,
                default: 1.
            }
        );
        assert_eq!(p.dmx_offset, -1);
        assert_eq!(p.dmx_type, DmxType::Dmx16BigEndian);
        assert_eq!(p.flags, ParameterFlags::default());
    }

    #[test]
    fn options_override_range() {
        let p = RemoteParameter::number("dir", "Direction", "Radar", 1.)
            .range(5., 10., 0.5)
            .options(["Left", "Right"]);
        assert_eq!(
            p.kind,
            ParameterKind::Number {
                min: 0.,
                max: 1.,
                step: 1.,
                default: 1.
            }
        );
        assert_eq!(p.options, vec!["Left", "Right"]);
    }

    #[test]
    fn flags_round_trip_through_bits() {
        let p = RemoteParameter::number("a", "A", "G", 0.).no_sequence().read_only();
        assert_eq!(p.flags.bits(), 3);
        assert_eq!(ParameterFlags::from_bits(3), p.flags);
        assert_eq!(ParameterFlags::from_bits(0).bits(), sys::REMOTEPARAMETER_NO_FLAGS);
    }

    #[test]
    fn scene_lookup_prefers_first_declaration() {
        let scene = Scene::new("s")
            .with_parameter(RemoteParameter::number("k", "first", "", 0.))
            .with_parameter(RemoteParameter::text("k", "second", "", ""));
        assert_eq!(scene.parameter("k").unwrap().display_name, "first");
        assert!(scene.parameter("missing").is_none());
    }

    #[test]
    fn engine_version_names_protocol() {
        let schema = Schema::new("Engine").with_scene(Scene::new("Default"));
        assert_eq!(
            schema.engine_version,
            format!("RS{}.{}", crate::VERSION_MAJOR, crate::VERSION_MINOR)
        );
        assert!(schema.scene(0).is_ok());
        assert!(matches!(
            schema.scene(1),
            Err(Error::SceneOutOfRange { index: 1, count: 1 })
        ));
    }

    #[test]
    fn numeric_slot_counts() {
        assert_eq!(ParameterType::Number.numeric_slots(), 1);
        assert_eq!(ParameterType::Pose.numeric_slots(), 16);
        assert_eq!(ParameterType::Transform.numeric_slots(), 16);
        assert_eq!(ParameterType::Text.numeric_slots(), 0);
        assert_eq!(ParameterType::from_raw(RemoteParameterType(99)), None);
    }
}
