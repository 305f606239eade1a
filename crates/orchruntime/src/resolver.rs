use crate::plan::CompiledStep;
use crate::state::{ExecutionState, StepStatus};
use orchcore::{lookup, Binding, Reference, ReferenceRoot, StepError, Value};
use serde_json::Map;

/// Resolves parsed reference expressions against the state of one run.
pub struct ReferenceResolver<'a> {
    state: &'a ExecutionState,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(state: &'a ExecutionState) -> Self {
        Self { state }
    }

    /// Look up `reference`; `None` when a segment is missing or the source
    /// step has not completed.
    pub fn resolve(&self, reference: &Reference) -> Option<&'a Value> {
        let base = match reference.root() {
            ReferenceRoot::Context => self.state.context(),
            ReferenceRoot::Step(step_id) => {
                let result = self.state.result(step_id)?;
                if result.status != StepStatus::Completed {
                    return None;
                }
                result.output.as_ref()?
            }
        };
        lookup(base, reference.path())
    }

    /// Resolve every input of `step` into one object, or fail on the first
    /// reference that does not resolve.
    pub(crate) fn resolve_inputs(&self, step: &CompiledStep) -> Result<Value, StepError> {
        let mut input = Map::with_capacity(step.inputs.len());
        for (name, binding) in &step.inputs {
            let value = match binding {
                Binding::Literal(value) => value.clone(),
                Binding::Reference(reference) => self
                    .resolve(reference)
                    .cloned()
                    .ok_or_else(|| StepError::UnresolvedReference {
                        expression: reference.to_string(),
                        step_id: step.id.clone(),
                        run_id: self.state.run_id(),
                    })?,
            };
            tracing::debug!("Resolved input {}.{}", step.id, name);
            input.insert(name.clone(), value);
        }
        Ok(Value::Object(input))
    }

    /// Resolve the workflow output mapping, returning the entries that
    /// resolved and the keys that did not.
    pub(crate) fn resolve_outputs(
        &self,
        outputs: &[(String, Reference)],
    ) -> (Map<String, Value>, Vec<String>) {
        let mut resolved = Map::with_capacity(outputs.len());
        let mut missing = Vec::new();
        for (key, reference) in outputs {
            match self.resolve(reference) {
                Some(value) => {
                    resolved.insert(key.clone(), value.clone());
                }
                None => missing.push(key.clone()),
            }
        }
        (resolved, missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ExecutionPlan;
    use chrono::Utc;
    use orchcore::{RunId, StepDefinition, WorkflowDefinition};
    use serde_json::json;

    fn plan(estimate_inputs: &[(&str, Value)]) -> ExecutionPlan {
        let mut estimate = StepDefinition::new("estimate", "cost.estimate").depends_on("analyze");
        for (name, value) in estimate_inputs {
            estimate = estimate.with_input(*name, value.clone());
        }
        ExecutionPlan::compile(
            WorkflowDefinition::new("wf", "resolver test")
                .with_step(StepDefinition::new("analyze", "resource.analyze"))
                .with_step(estimate),
        )
        .unwrap()
    }

    fn state_with_analyze_output(plan: &ExecutionPlan, output: Value) -> ExecutionState {
        let mut state = ExecutionState::new(
            RunId::new_v4(),
            json!({"constraints": {"region": "westeurope", "budget": 500}}),
            plan,
        );
        state.mark_running(0);
        state.complete(0, output, Utc::now());
        state
    }

    #[test]
    fn step_reference_yields_exact_output_value() {
        let plan = plan(&[]);
        let resources = json!([{"name": "func", "sku": "Y1"}, {"name": "st", "sku": "Standard_LRS"}]);
        let state = state_with_analyze_output(&plan, json!({"resources": resources.clone()}));
        let resolver = ReferenceResolver::new(&state);

        let reference = Reference::parse("$steps.analyze.output.resources").unwrap();
        assert_eq!(resolver.resolve(&reference), Some(&resources));

        let reference = Reference::parse("$steps.analyze.output.resources.1.sku").unwrap();
        assert_eq!(resolver.resolve(&reference), Some(&json!("Standard_LRS")));

        let reference = Reference::parse("$steps.analyze.output.missing").unwrap();
        assert_eq!(resolver.resolve(&reference), None);
    }

    #[test]
    fn context_reference_reads_initial_context() {
        let plan = plan(&[]);
        let state = state_with_analyze_output(&plan, json!({}));
        let resolver = ReferenceResolver::new(&state);

        let reference = Reference::parse("$context.constraints.budget").unwrap();
        assert_eq!(resolver.resolve(&reference), Some(&json!(500)));
    }

    #[test]
    fn zero_padded_keys_resolve_on_objects() {
        let plan = plan(&[]);
        let mut state = ExecutionState::new(
            RunId::new_v4(),
            json!({"codes": {"01": "x"}}),
            &plan,
        );
        state.mark_running(0);
        state.complete(0, json!({"zones": {"007": "westeurope-3"}}), Utc::now());
        let resolver = ReferenceResolver::new(&state);

        let reference = Reference::parse("$context.codes.01").unwrap();
        assert_eq!(resolver.resolve(&reference), Some(&json!("x")));

        let reference = Reference::parse("$steps.analyze.output.zones.007").unwrap();
        assert_eq!(resolver.resolve(&reference), Some(&json!("westeurope-3")));
    }

    #[test]
    fn incomplete_step_does_not_resolve() {
        let plan = plan(&[]);
        let state = ExecutionState::new(RunId::new_v4(), json!({}), &plan);
        let reference = Reference::parse("$steps.analyze.output").unwrap();
        assert_eq!(ReferenceResolver::new(&state).resolve(&reference), None);
    }

    #[test]
    fn input_resolution_is_all_or_nothing() {
        let plan = plan(&[
            ("resources", json!("$steps.analyze.output.resources")),
            ("extra", json!("$steps.analyze.output.missing")),
            ("budget", json!(500)),
        ]);
        let state = state_with_analyze_output(&plan, json!({"resources": []}));

        let error = ReferenceResolver::new(&state)
            .resolve_inputs(&plan.steps()[1])
            .unwrap_err();
        match error {
            StepError::UnresolvedReference {
                expression,
                step_id,
                run_id,
            } => {
                assert_eq!(expression, "$steps.analyze.output.missing");
                assert_eq!(step_id, "estimate");
                assert_eq!(run_id, state.run_id());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn literal_inputs_pass_through() {
        let plan = plan(&[
            ("resources", json!("$steps.analyze.output.resources")),
            ("currency", json!("USD")),
            ("limits", json!({"max": 3})),
        ]);
        let state = state_with_analyze_output(&plan, json!({"resources": ["a"]}));

        let input = ReferenceResolver::new(&state)
            .resolve_inputs(&plan.steps()[1])
            .unwrap();
        assert_eq!(
            input,
            json!({"resources": ["a"], "currency": "USD", "limits": {"max": 3}})
        );
    }
}
