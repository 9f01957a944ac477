use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use tracing::debug;

use crate::env::errors::EnvError;
use crate::env::traits::{Env, ObservationSink};
use crate::snapshot::Snapshot;

pub const RESET_STAGE: &str = "reset";
pub const STEP_STAGE: &str = "step";

/// Passes every observation of the wrapped environment to a sink before
/// returning it.
pub struct ObservationSaver<E, S> {
    env: E,
    sink: S,
    counter: u64,
}

impl<E, S> ObservationSaver<E, S>
where
    E: Env<Obs = Snapshot>,
    S: ObservationSink,
{
    pub fn new(env: E, sink: S) -> Self {
        Self { env, sink, counter: 0 }
    }

    /// Number of observations saved so far.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn inner(&self) -> &E {
        &self.env
    }

    pub fn inner_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn into_parts(self) -> (E, S) {
        (self.env, self.sink)
    }

    fn save(&mut self, frame: &Snapshot, stage: &str) -> Result<(), EnvError> {
        self.counter += 1;
        self.sink.save(frame, stage, self.counter)
    }
}

impl<E, S> Env for ObservationSaver<E, S>
where
    E: Env<Obs = Snapshot>,
    S: ObservationSink,
{
    type Obs = Snapshot;
    type Act = E::Act;
    type Info = E::Info;

    fn reset(&mut self) -> Result<Self::Obs, EnvError> {
        let observation = self.env.reset()?;
        self.save(&observation, RESET_STAGE)?;
        Ok(observation)
    }

    fn step(&mut self, act: Self::Act) -> Result<(Self::Obs, f32, bool, Self::Info), EnvError> {
        let (observation, reward, done, info) = self.env.step(act)?;
        self.save(&observation, STEP_STAGE)?;
        Ok((observation, reward, done, info))
    }

    fn close(&mut self) -> Result<(), EnvError> {
        self.env.close()
    }
}

/// Writes each frame to `<dir>/<stage>_<counter>.jpg`.
pub struct ImageDirSink {
    dir: PathBuf,
}

impl ImageDirSink {
    /// Creates `dir` if it does not exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, EnvError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, stage: &str, counter: u64) -> PathBuf {
        self.dir.join(format!("{stage}_{counter}.jpg"))
    }
}

impl ObservationSink for ImageDirSink {
    fn save(&mut self, frame: &Snapshot, stage: &str, counter: u64) -> Result<(), EnvError> {
        let path = self.path_for(stage, counter);
        let image = RgbImage::from(frame.to_pixels()?);
        image
            .save_with_format(&path, ImageFormat::Jpeg)
            .map_err(io::Error::other)?;
        debug!(path = %path.display(), "observation saved");
        Ok(())
    }
}
