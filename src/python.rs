//! Python bindings, built with the `python` feature.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict};

use crate::env::{ACTION_NAMES, Action, Env, EnvConfig, EnvError, FlappyBirdEnv, RenderMode, StepInfo};
use crate::snapshot::Snapshot;

type Observation = (Py<PyBytes>, Option<(usize, usize, usize)>);

fn to_py_err(err: EnvError) -> PyErr {
    match err {
        EnvError::InvalidAction(_) => PyValueError::new_err(err.to_string()),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

/// Raw pixel (or encoded image) bytes plus the `(h, w, 3)` shape, ready for
/// `numpy.frombuffer(...).reshape(shape)`.
fn observation(py: Python<'_>, frame: Snapshot) -> PyResult<Observation> {
    let shape = frame.shape();
    let data = match frame {
        Snapshot::Bytes(bytes) => bytes,
        other => other
            .to_pixels()
            .map_err(|e| to_py_err(e.into()))?
            .into_raw(),
    };
    Ok((PyBytes::new(py, &data).unbind(), shape))
}

fn info_dict<'py>(py: Python<'py>, info: &StepInfo) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("score", info.score)?;
    dict.set_item("hi_score", info.hi_score)?;
    dict.set_item("vertical_position", info.vertical_position)?;
    dict.set_item("status", info.status.code())?;
    dict.set_item("sequence_id", info.sequence_id)?;
    Ok(dict)
}

#[pyclass(name = "FlappyBirdEnv", unsendable)]
struct PyFlappyBirdEnv {
    env: FlappyBirdEnv,
}

#[pymethods]
impl PyFlappyBirdEnv {
    /// Settings default to the `GYM_FB_*` environment variables; keyword
    /// arguments override them.
    #[new]
    #[pyo3(signature = (headless=None, obs_as_bytes=None, game_url=None, sleep_mode=None))]
    fn new(
        py: Python<'_>,
        headless: Option<bool>,
        obs_as_bytes: Option<bool>,
        game_url: Option<String>,
        sleep_mode: Option<bool>,
    ) -> PyResult<Self> {
        let mut config = EnvConfig::from_env();
        if let Some(headless) = headless {
            config.session.headless = headless;
        }
        if let Some(obs_as_bytes) = obs_as_bytes {
            config.obs_as_bytes = obs_as_bytes;
        }
        if let Some(url) = game_url {
            config.session.game_url = url;
        }
        if let Some(sleep_mode) = sleep_mode {
            config.sleep_mode = sleep_mode;
        }
        let env = py.allow_threads(|| FlappyBirdEnv::new(config)).map_err(to_py_err)?;
        Ok(Self { env })
    }

    #[pyo3(signature = (seed=None))]
    fn reset(&mut self, py: Python<'_>, seed: Option<String>) -> PyResult<Observation> {
        let env = &mut self.env;
        let (frame, _) = py.allow_threads(|| env.reset_with(seed)).map_err(to_py_err)?;
        observation(py, frame)
    }

    fn step<'py>(
        &mut self,
        py: Python<'py>,
        action: i64,
    ) -> PyResult<(Observation, f32, bool, Bound<'py, PyDict>)> {
        let action = Action::try_from(action).map_err(to_py_err)?;
        let env = &mut self.env;
        let (frame, reward, done, info) = py
            .allow_threads(|| env.step_action(action))
            .map_err(to_py_err)?;
        Ok((observation(py, frame)?, reward, done, info_dict(py, &info)?))
    }

    fn seed(&mut self, seed: String) -> PyResult<()> {
        self.env.seed(seed).map_err(to_py_err)
    }

    #[pyo3(signature = (mode="rgb_array"))]
    fn render(&mut self, py: Python<'_>, mode: &str) -> PyResult<Option<Observation>> {
        let mode: RenderMode = mode.parse().map_err(to_py_err)?;
        match self.env.render(mode).map_err(to_py_err)? {
            Some(frame) => Ok(Some(observation(py, frame)?)),
            None => Ok(None),
        }
    }

    fn close(&mut self, py: Python<'_>) -> PyResult<()> {
        let env = &mut self.env;
        py.allow_threads(|| env.close()).map_err(to_py_err)
    }

    fn get_action_meanings(&self) -> Vec<&'static str> {
        self.env.action_meanings().to_vec()
    }

    #[getter]
    fn observation_shape(&self) -> Option<(usize, usize, usize)> {
        self.env.observation_shape()
    }
}

#[pymodule]
fn flappy_gym(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyFlappyBirdEnv>()?;
    m.add("ACTION_NAMES", ACTION_NAMES.to_vec())?;
    Ok(())
}
