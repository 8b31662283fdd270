//! A ready-made frame loop: wait for a request, render every stream, send the frames back.
mod targets;

pub use targets::{Bgra, HostTarget, HostTargets};

use crate::api::{RenderStreamApi, SenderFrame};
use crate::parameters::ParameterValues;
use crate::renderstream::{FrameData, FrameEvent, RenderStream};
use crate::schema::{Scene, Schema};
use crate::streams::StreamDescription;
use crate::sys::{CameraData, CameraResponseData};
use crate::Config;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

/// Everything known about the frame being rendered
pub struct FrameContext<'a> {
    pub frame: FrameData,
    /// The requested scene, if the app published a schema
    pub scene: Option<&'a Scene>,
    pub parameters: Option<ParameterValues<'a>>,
}

pub trait App: Sized {
    const NAME: &'static str;
    fn new<Api: RenderStreamApi>(rs: &RenderStream<Api>) -> Result<Self>;
    /// Remote parameters to publish before the first frame
    fn schema(&self) -> Option<Schema> {
        None
    }
    /// Called with the new set of streams whenever it changes
    fn streams_changed(&mut self, _streams: &[StreamDescription]) -> Result<()> {
        Ok(())
    }
    /// Render `stream` as seen by `camera`. `None` sends nothing for this stream.
    fn render(
        &mut self,
        ctx: &FrameContext,
        stream: &StreamDescription,
        camera: &CameraData,
    ) -> Result<Option<SenderFrame<'_>>>;
}

/// Load the library, run `A` until the host quits or Ctrl-C, then shut down
pub fn launch<A: App>(config: Config) -> Result<()> {
    // Handle interrupts gracefully
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::Relaxed);
    })
    .context("setting Ctrl-C handler")?;

    let mut rs = RenderStream::load(&config)?;
    let mut app = A::new(&rs)?;
    let schema = publish_schema(&mut rs, &app, &config)?;
    info!("{} running", A::NAME);

    run(&mut rs, &mut app, schema.as_ref(), config.timeout, &running)?;

    rs.shutdown()?;
    Ok(())
}

/// Set the app's schema, if it has one, and save it where the host can find it
pub fn publish_schema<Api: RenderStreamApi, A: App>(
    rs: &mut RenderStream<Api>,
    app: &A,
    config: &Config,
) -> Result<Option<Schema>> {
    let mut schema = match app.schema() {
        Some(schema) => schema,
        None => return Ok(None),
    };
    rs.set_schema(&mut schema)?;
    if let Some(path) = &config.schema_path {
        rs.save_schema(path, &schema)
            .with_context(|| format!("saving schema to {}", path.display()))?;
    }
    Ok(Some(schema))
}

/// The frame loop. Returns when the host quits or `running` is cleared; stops at the first
/// hard error.
pub fn run<Api: RenderStreamApi, A: App>(
    rs: &mut RenderStream<Api>,
    app: &mut A,
    schema: Option<&Schema>,
    timeout: Duration,
    running: &AtomicBool,
) -> Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("Interrupted, exiting");
            return Ok(());
        }

        let frame = match rs.await_frame(timeout)? {
            FrameEvent::Frame(frame) => frame,
            FrameEvent::StreamsChanged => {
                app.streams_changed(rs.streams())?;
                continue;
            }
            FrameEvent::Timeout => {
                debug!("No frame request within {:?}", timeout);
                continue;
            }
            FrameEvent::Quit => {
                info!("Host requested exit");
                return Ok(());
            }
        };

        let scene = match schema {
            Some(schema) => match schema.scene(frame.scene) {
                Ok(scene) => Some(scene),
                Err(e) => {
                    warn!("Skipping frame: {}", e);
                    continue;
                }
            },
            None => None,
        };
        let parameters = scene.map(|scene| rs.frame_parameters(scene)).transpose()?;
        let ctx = FrameContext {
            frame,
            scene,
            parameters,
        };

        for stream in rs.streams() {
            let camera = match rs.frame_camera(stream.handle)? {
                Some(camera) => camera,
                None => {
                    debug!("No camera for stream '{}' this frame", stream.name);
                    continue;
                }
            };
            let response = CameraResponseData::new(frame.t_tracked, camera);
            let sender = app
                .render(&ctx, stream, &camera)
                .with_context(|| format!("rendering stream '{}'", stream.name))?;
            match sender {
                Some(sender) => rs.send_frame(stream, &sender, &response)?,
                None => debug!("Nothing rendered for stream '{}'", stream.name),
            }
        }
    }
}
