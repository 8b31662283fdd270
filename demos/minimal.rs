use anyhow::Result;
use renderstream::{
    runtime::{launch, App, Bgra, FrameContext, HostTargets},
    CameraData, Config, GpuInterop, RenderStream, RenderStreamApi, SenderFrame, StreamDescription,
};

/// Flashes every stream between black and white, once every two seconds
struct Strobe {
    targets: HostTargets,
}

impl App for Strobe {
    const NAME: &'static str = "Minimal strobe";

    fn new<Api: RenderStreamApi>(rs: &RenderStream<Api>) -> Result<Self> {
        rs.initialise_gpgpu(&GpuInterop::None)?;
        Ok(Self {
            targets: HostTargets::new(),
        })
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
        // Tracked time is shared by every render node, so their strobes stay in phase
        let level = (1. - ctx.frame.t_tracked.rem_euclid(2.)).abs() * 255.;
        let target = match self.targets.get_mut(stream.handle) {
            Some(target) => target,
            None => return Ok(None),
        };
        target.fill(Bgra::grey(level as u8));
        Ok(Some(target.frame()))
    }
}

fn main() -> Result<()> {
    env_logger::init();
    launch::<Strobe>(Config::from_env()?)
}
