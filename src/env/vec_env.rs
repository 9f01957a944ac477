use tracing::warn;

use super::{Env, EnvError};

/// A fixed batch of independent environments stepped in lockstep.
///
/// Each member owns its own session thread, so stepping them one after the
/// other never shares browser state between them.
pub struct VecEnv<E> {
    envs: Vec<E>,
}

impl<E: Env> VecEnv<E> {
    pub fn new<F>(make_env: F, num_envs: usize) -> Self
    where
        F: Fn() -> E,
    {
        let envs = (0..num_envs).map(|_| make_env()).collect();
        Self { envs }
    }

    /// Like [`VecEnv::new`] for constructors that can fail. Members built
    /// before the failure are closed again.
    pub fn try_new<F>(make_env: F, num_envs: usize) -> Result<Self, EnvError>
    where
        F: Fn(usize) -> Result<E, EnvError>,
    {
        let mut envs = Vec::with_capacity(num_envs);
        for index in 0..num_envs {
            match make_env(index) {
                Ok(env) => envs.push(env),
                Err(e) => {
                    for mut env in envs {
                        if let Err(close_err) = env.close() {
                            warn!(error = %close_err, "failed to close partially built env");
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self { envs })
    }

    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    pub fn envs(&self) -> &[E] {
        &self.envs
    }

    pub fn reset(&mut self) -> Result<Vec<E::Obs>, EnvError> {
        self.envs.iter_mut().map(|env| env.reset()).collect()
    }

    pub fn step(
        &mut self,
        actions: Vec<E::Act>,
    ) -> Result<Vec<(E::Obs, f32, bool, E::Info)>, EnvError> {
        if actions.len() != self.envs.len() {
            return Err(EnvError::ActionCount {
                expected: self.envs.len(),
                got: actions.len(),
            });
        }

        self.envs
            .iter_mut()
            .zip(actions)
            .map(|(env, action)| env.step(action))
            .collect()
    }

    /// Closes every member, reporting the first failure after trying all.
    pub fn close(&mut self) -> Result<(), EnvError> {
        let mut first_err = None;
        for env in &mut self.envs {
            if let Err(e) = env.close() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Countdown {
        left: u32,
        closed: bool,
    }

    impl Env for Countdown {
        type Obs = u32;
        type Act = u32;
        type Info = ();

        fn reset(&mut self) -> Result<Self::Obs, EnvError> {
            self.left = 3;
            Ok(self.left)
        }

        fn step(&mut self, act: Self::Act) -> Result<(Self::Obs, f32, bool, Self::Info), EnvError> {
            self.left = self.left.saturating_sub(act);
            Ok((self.left, 1.0, self.left == 0, ()))
        }

        fn close(&mut self) -> Result<(), EnvError> {
            self.closed = true;
            Ok(())
        }
    }

    fn countdown() -> Countdown {
        Countdown { left: 0, closed: false }
    }

    #[test]
    fn steps_every_member() {
        let mut envs = VecEnv::new(countdown, 2);
        assert_eq!(envs.reset().unwrap(), vec![3, 3]);

        let results = envs.step(vec![1, 3]).unwrap();
        assert_eq!(results[0].0, 2);
        assert!(!results[0].2);
        assert_eq!(results[1].0, 0);
        assert!(results[1].2);
    }

    #[test]
    fn rejects_mismatched_action_count() {
        let mut envs = VecEnv::new(countdown, 2);
        let err = envs.step(vec![1]).unwrap_err();
        assert!(matches!(err, EnvError::ActionCount { expected: 2, got: 1 }));
    }

    #[test]
    fn try_new_propagates_the_failure() {
        let result = VecEnv::try_new(
            |index| {
                if index == 1 {
                    Err(EnvError::Render("boom".into()))
                } else {
                    Ok(countdown())
                }
            },
            3,
        );
        assert!(matches!(result, Err(EnvError::Render(_))));
    }

    #[test]
    fn close_reaches_every_member() {
        let mut envs = VecEnv::new(countdown, 3);
        envs.close().unwrap();
        assert!(envs.envs().iter().all(|env| env.closed));
    }
}
