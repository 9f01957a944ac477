use crate::env::errors::EnvError;
use crate::snapshot::Snapshot;

/// A turn-based environment with the classic gym contract.
pub trait Env: Send {
    type Obs: Send + Clone + 'static;
    type Act: Send + Clone + 'static;
    type Info: Send + Clone + 'static;

    fn reset(&mut self) -> Result<Self::Obs, EnvError>;
    fn step(&mut self, act: Self::Act) -> Result<(Self::Obs, f32, bool, Self::Info), EnvError>;
    fn close(&mut self) -> Result<(), EnvError>;
}

/// Displays frames for a human. Terminal and window front-ends live outside
/// this crate and plug in here.
pub trait Renderer: Send {
    fn show(&mut self, frame: &Snapshot) -> Result<(), EnvError>;

    fn close(&mut self) {}
}

/// Receives every observation an [`ObservationSaver`](crate::env::ObservationSaver)
/// sees, labelled with a stage name and a per-wrapper counter starting at 1.
pub trait ObservationSink: Send {
    fn save(&mut self, frame: &Snapshot, stage: &str, counter: u64) -> Result<(), EnvError>;
}
