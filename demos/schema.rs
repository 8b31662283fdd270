use anyhow::{bail, Context, Result};
use renderstream::{
    runtime::{launch, App, Bgra, FrameContext, HostTargets},
    CameraData, Config, GpuInterop, RemoteParameter, RenderStream, RenderStreamApi, Scene, Schema,
    SenderFrame, StreamDescription,
};

/// Two scenes driven by remote parameters: a coloured strobe, and a bar sweeping across the
/// whole canvas so that neighbouring streams line up
struct Scenes {
    targets: HostTargets,
}

fn strobe() -> Scene {
    Scene::new("Strobe")
        .with_parameter(
            RemoteParameter::number("speed", "Strobe speed", "Strobe", 1.)
                .range(0., 4., 0.01)
                .no_sequence(),
        )
        .with_parameter(RemoteParameter::number("r", "Red", "Colour", 1.).range(0., 1., 0.001))
        .with_parameter(RemoteParameter::number("g", "Green", "Colour", 1.).range(0., 1., 0.001))
        .with_parameter(RemoteParameter::number("b", "Blue", "Colour", 1.).range(0., 1., 0.001))
        .with_parameter(RemoteParameter::number("a", "Alpha", "Colour", 1.).range(0., 1., 0.001))
        // Only displayed by the host. Frames carry no parameter values back.
        .with_parameter(
            RemoteParameter::number("strobe", "Strobe", "Strobe", 0.)
                .range(0., 1., 0.001)
                .read_only(),
        )
}

fn radar() -> Scene {
    Scene::new("Radar")
        .with_parameter(
            RemoteParameter::number("speed", "Sweep speed", "Radar", 0.5).range(0., 4., 0.01),
        )
        .with_parameter(
            RemoteParameter::number("length", "Trail length", "Radar", 0.25).range(0., 1., 0.01),
        )
        .with_parameter(
            RemoteParameter::number("direction", "Direction", "Radar", 0.)
                .options(["Left", "Right"]),
        )
}

impl App for Scenes {
    const NAME: &'static str = "Schema demo";

    fn new<Api: RenderStreamApi>(rs: &RenderStream<Api>) -> Result<Self> {
        rs.initialise_gpgpu(&GpuInterop::None)?;
        Ok(Self {
            targets: HostTargets::new(),
        })
    }

    fn schema(&self) -> Option<Schema> {
        Some(
            Schema::new(Self::NAME)
                .with_info("Host-memory strobe and radar sweep")
                .with_scene(strobe())
                .with_scene(radar()),
        )
    }

    fn streams_changed(&mut self, streams: &[StreamDescription]) -> Result<()> {
        self.targets.update(streams);
        Ok(())
    }

    fn render(
        &mut self,
        ctx: &FrameContext,
        stream: &StreamDescription,
        _camera: &CameraData,
    ) -> Result<Option<SenderFrame<'_>>> {
        let scene = ctx.scene.context("Frame has no scene")?;
        let values = ctx.parameters.as_ref().context("Frame has no parameters")?;
        let time = ctx.frame.local_time as f32;
        let target = match self.targets.get_mut(stream.handle) {
            Some(target) => target,
            None => return Ok(None),
        };

        match scene.name.as_str() {
            "Strobe" => {
                let speed = values.get_number("speed")?;
                let level = (1. - (time * speed).rem_euclid(2.)).abs();
                let rgba = ["r", "g", "b", "a"]
                    .iter()
                    .map(|key| values.get_number(key))
                    .collect::<Result<Vec<_>, _>>()?;
                target.fill(Bgra::from_rgba_f32([
                    rgba[0] * level,
                    rgba[1] * level,
                    rgba[2] * level,
                    rgba[3],
                ]));
            }
            "Radar" => {
                let speed = values.get_number("speed")?;
                let length = values.get_number("length")?.max(1e-3);
                let leftward = values.get_number("direction")? < 0.5;
                let progress = (time * speed).rem_euclid(1.);
                let sweep = if leftward { 1. - progress } else { progress };

                // Columns are placed on the canvas this stream is a part of
                let clipping = stream.clipping;
                let (left, right) = (clipping.left, clipping.right);
                let width = target.width().max(1) as f32;
                for row in target.rows_mut() {
                    for (x, px) in row.iter_mut().enumerate() {
                        let u = left + (x as f32 + 0.5) / width * (right - left);
                        let behind = (if leftward { u - sweep } else { sweep - u }).rem_euclid(1.);
                        let level = (1. - behind / length).max(0.);
                        *px = Bgra::from_rgba_f32([0., level, 0., 1.]);
                    }
                }
            }
            other => bail!("Unknown scene '{}'", other),
        }
        Ok(Some(target.frame()))
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let exe = std::env::current_exe().context("Locating this executable")?;
    launch::<Scenes>(Config::from_env()?.with_schema_path(exe))
}
