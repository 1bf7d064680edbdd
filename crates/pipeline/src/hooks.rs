//! Lifecycle hooks.
//!
//! Hooks observe stage execution; they cannot abort it. Each event keeps
//! its hooks in registration order. A hook returning an error is logged
//! and the pipeline moves on.

use std::sync::Arc;

use crate::context::PipelineContext;
use crate::PipelineError;

type StageHook = Arc<dyn Fn(&str, &PipelineContext) -> Result<(), String> + Send + Sync>;
type ErrorHook =
    Arc<dyn Fn(&str, &PipelineError, &PipelineContext) -> Result<(), String> + Send + Sync>;

#[derive(Default)]
pub struct HookRegistry {
    before: Vec<StageHook>,
    after: Vec<StageHook>,
    on_error: Vec<ErrorHook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_before_stage<F>(&mut self, hook: F)
    where
        F: Fn(&str, &PipelineContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.before.push(Arc::new(hook));
    }

    pub fn on_after_stage<F>(&mut self, hook: F)
    where
        F: Fn(&str, &PipelineContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.after.push(Arc::new(hook));
    }

    pub fn on_error<F>(&mut self, hook: F)
    where
        F: Fn(&str, &PipelineError, &PipelineContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.on_error.push(Arc::new(hook));
    }

    pub(crate) fn fire_before(&self, stage: &str, ctx: &PipelineContext) {
        for hook in &self.before {
            if let Err(e) = hook(stage, ctx) {
                tracing::warn!(stage, error = %e, "before_stage hook failed");
            }
        }
    }

    pub(crate) fn fire_after(&self, stage: &str, ctx: &PipelineContext) {
        for hook in &self.after {
            if let Err(e) = hook(stage, ctx) {
                tracing::warn!(stage, error = %e, "after_stage hook failed");
            }
        }
    }

    pub(crate) fn fire_error(&self, stage: &str, error: &PipelineError, ctx: &PipelineContext) {
        for hook in &self.on_error {
            if let Err(e) = hook(stage, error, ctx) {
                tracing::warn!(stage, error = %e, "on_error hook failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_agent_core::Query;
    use std::sync::Mutex;

    #[test]
    fn test_hooks_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = HookRegistry::new();

        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            hooks.on_before_stage(move |_, _| {
                seen.lock().unwrap().push(tag);
                Ok(())
            });
        }

        let ctx = PipelineContext::new(Query::new("q"));
        hooks.fire_before("retrieval", &ctx);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_failing_hook_does_not_stop_later_hooks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = HookRegistry::new();

        hooks.on_after_stage(|_, _| Err("boom".to_string()));
        {
            let seen = Arc::clone(&seen);
            hooks.on_after_stage(move |stage, _| {
                seen.lock().unwrap().push(stage.to_string());
                Ok(())
            });
        }

        let ctx = PipelineContext::new(Query::new("q"));
        hooks.fire_after("generation", &ctx);
        assert_eq!(*seen.lock().unwrap(), vec!["generation"]);
    }
}
