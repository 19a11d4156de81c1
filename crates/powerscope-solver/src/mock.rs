//! Deterministic in-process solver for tests and offline runs

use crate::SolverError;
use powerscope_domain::{ModelAttribs, ModelKind, PlotData, Solver, SolverResponse};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type Responder =
    dyn Fn(ModelKind, &ModelAttribs) -> Result<SolverResponse, SolverError> + Send + Sync;

/// Which trait method was called
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMethod {
    /// `Solver::calculate`
    Calculate,
    /// `Solver::update`
    Update,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    /// Method called
    pub method: MockMethod,
    /// Model kind
    pub kind: ModelKind,
    /// Request snapshot
    pub model: ModelAttribs,
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    delays: VecDeque<Duration>,
    failures: VecDeque<Option<SolverError>>,
}

/// Mock solver returning responses without any network traffic
///
/// By default every request is echoed back unchanged with empty plot data.
/// Per-call delays and failures are consumed in call order, which lets tests
/// make responses arrive out of order.
///
/// # Examples
///
/// ```
/// use powerscope_domain::{attribs, ModelAttribs, ModelKind, Output, Solver};
/// use powerscope_solver::{MockSolver, SolverError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let solver = MockSolver::echo();
/// solver.fail_next(SolverError::Other("down".into()));
/// let request = ModelAttribs::new(Output::Power, attribs([("n", 33.0)]));
/// assert!(solver.update(ModelKind::TTest, &request).await.is_err());
/// assert!(solver.update(ModelKind::TTest, &request).await.is_ok());
/// # }
/// ```
#[derive(Clone)]
pub struct MockSolver {
    responder: Arc<Responder>,
    state: Arc<Mutex<MockState>>,
}

impl MockSolver {
    /// Echo every request back
    pub fn echo() -> Self {
        Self::with_responder(|_, model| {
            Ok(SolverResponse {
                model: model.clone(),
                data: PlotData::default(),
            })
        })
    }

    /// Answer every request with `responder`
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(ModelKind, &ModelAttribs) -> Result<SolverResponse, SolverError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            responder: Arc::new(responder),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Delay the next unanswered call by `delay`
    pub fn push_delay(&self, delay: Duration) {
        let mut state = self.lock();
        state.delays.push_back(delay);
        // keep failures aligned with delays
        if state.failures.len() < state.delays.len() {
            state.failures.push_back(None);
        }
    }

    /// Make the next unanswered call fail with `error`
    pub fn fail_next(&self, error: SolverError) {
        let mut state = self.lock();
        if let Some(slot) = state.failures.iter_mut().find(|f| f.is_none()) {
            *slot = Some(error);
        } else {
            state.failures.push_back(Some(error));
        }
    }

    /// Number of calls so far
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Every call so far, oldest first
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Most recent call
    pub fn last_call(&self) -> Option<MockCall> {
        self.lock().calls.last().cloned()
    }

    /// Forget recorded calls
    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn respond(
        &self,
        method: MockMethod,
        kind: ModelKind,
        model: &ModelAttribs,
    ) -> Result<SolverResponse, SolverError> {
        let (delay, failure) = {
            let mut state = self.lock();
            state.calls.push(MockCall {
                method,
                kind,
                model: model.clone(),
            });
            (
                state.delays.pop_front(),
                state.failures.pop_front().flatten(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = failure {
            return Err(error);
        }
        (self.responder)(kind, model)
    }
}

impl Default for MockSolver {
    fn default() -> Self {
        Self::echo()
    }
}

impl std::fmt::Debug for MockSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSolver")
            .field("call_count", &self.call_count())
            .finish()
    }
}

impl Solver for MockSolver {
    type Error = SolverError;

    fn calculate(
        &self,
        kind: ModelKind,
        model: &ModelAttribs,
    ) -> impl Future<Output = Result<SolverResponse, Self::Error>> + Send {
        self.respond(MockMethod::Calculate, kind, model)
    }

    fn update(
        &self,
        kind: ModelKind,
        model: &ModelAttribs,
    ) -> impl Future<Output = Result<SolverResponse, Self::Error>> + Send {
        self.respond(MockMethod::Update, kind, model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powerscope_domain::{attribs, FieldValue, Output};

    fn request(n: f64) -> ModelAttribs {
        ModelAttribs::new(Output::Power, attribs([("n", n)]))
    }

    #[tokio::test]
    async fn test_echo() {
        let solver = MockSolver::default();
        let response = solver.update(ModelKind::ZTest, &request(40.0)).await.unwrap();
        assert_eq!(response.model, request(40.0));
        assert!(response.data.is_empty());
    }

    #[tokio::test]
    async fn test_records_calls() {
        let solver = MockSolver::echo();
        solver.calculate(ModelKind::TTest, &request(1.0)).await.unwrap();
        solver.update(ModelKind::TTest, &request(2.0)).await.unwrap();

        assert_eq!(solver.call_count(), 2);
        let last = solver.last_call().unwrap();
        assert_eq!(last.method, MockMethod::Update);
        assert_eq!(last.model.number("n"), Some(2.0));

        solver.reset_calls();
        assert_eq!(solver.call_count(), 0);
    }

    #[tokio::test]
    async fn test_custom_responder() {
        let solver = MockSolver::with_responder(|_, model| {
            let mut model = model.clone();
            model.values.insert("power".to_string(), FieldValue::Number(0.9));
            Ok(SolverResponse {
                model,
                data: PlotData::default(),
            })
        });
        let response = solver.update(ModelKind::TTest, &request(5.0)).await.unwrap();
        assert_eq!(response.model.number("power"), Some(0.9));
    }

    #[tokio::test]
    async fn test_failure_consumed_once() {
        let solver = MockSolver::echo();
        solver.fail_next(SolverError::Communication("offline".to_string()));
        assert!(solver.update(ModelKind::TTest, &request(1.0)).await.is_err());
        assert!(solver.update(ModelKind::TTest, &request(1.0)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_reorder_responses() {
        let solver = MockSolver::echo();
        solver.push_delay(Duration::from_millis(500));
        solver.push_delay(Duration::from_millis(10));

        // join! polls in argument order, so the slow request is issued first
        let (slow_done, fast_done) = tokio::join!(
            async {
                solver.update(ModelKind::TTest, &request(1.0)).await.unwrap();
                tokio::time::Instant::now()
            },
            async {
                solver.update(ModelKind::TTest, &request(2.0)).await.unwrap();
                tokio::time::Instant::now()
            },
        );
        assert!(fast_done < slow_done);
    }
}
