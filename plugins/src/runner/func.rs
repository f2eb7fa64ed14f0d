use std::future::Future;

use async_trait::async_trait;
use planrun_core::error::StepError;
use planrun_core::executor::{StepInput, StepRunner};

/// Adapts an async closure into a [`StepRunner`].
///
/// ```ignore
/// let runner = FnStepRunner::new(|input: StepInput| async move {
///     Ok(format!("handled {}", input.task_id))
/// });
/// ```
pub struct FnStepRunner<F> {
    f: F,
}

impl<F, Fut> FnStepRunner<F>
where
    F: Fn(StepInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, StepError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> StepRunner for FnStepRunner<F>
where
    F: Fn(StepInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, StepError>> + Send + 'static,
{
    async fn run(&self, input: StepInput) -> Result<String, StepError> {
        (self.f)(input).await
    }
}
