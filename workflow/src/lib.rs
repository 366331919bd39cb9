//!
//! A small engine that pushes a stream of items through a fixed list of
//! steps.
//!
//! Steps are plain functions with a name, a priority and a list of
//! requirements. The list is sorted once, highest priority first and
//! registration order among equals, and the same plan is replayed for every
//! item. A requirement is either a predicate on the shared context (usually
//! the run options) or a predicate on the item itself; a step whose
//! requirements are not all met is skipped for that item. A step may mark an
//! item as failed, and with short-circuiting enabled (the default) no later
//! step sees a failed item.
//!
//! Counters for a run live in a single [`Stats`] table keyed by an enum.
//!
use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, info, trace};
use std::ops::{Deref, DerefMut};

mod stats;
pub use stats::{Metric, StatKey, Stats};

/// Signature of a step body.
pub type StepFn<C, T, K> = fn(&C, &mut Pass<'_, T, K>) -> Result<()>;

enum Predicate<C, T> {
    Option(fn(&C) -> bool),
    State(fn(&T) -> bool),
}

/// A precondition that must hold for a step to run on an item.
pub struct Requirement<C, T> {
    label: &'static str,
    predicate: Predicate<C, T>,
}

impl<C, T> Requirement<C, T> {
    /// A requirement on the shared context, typically an option being set.
    pub fn option(label: &'static str, predicate: fn(&C) -> bool) -> Self {
        Requirement {
            label,
            predicate: Predicate::Option(predicate),
        }
    }

    /// A requirement on the item being processed.
    pub fn state(label: &'static str, predicate: fn(&T) -> bool) -> Self {
        Requirement {
            label,
            predicate: Predicate::State(predicate),
        }
    }

    /// Human readable description, used when logging the plan.
    pub fn label(&self) -> &'static str {
        self.label
    }

    fn is_met(&self, context: &C, item: &T) -> bool {
        match self.predicate {
            Predicate::Option(f) => f(context),
            Predicate::State(f) => f(item),
        }
    }
}

/// A named unit of work.
pub struct Step<C, T, K> {
    name: &'static str,
    priority: i32,
    requires: Vec<Requirement<C, T>>,
    body: StepFn<C, T, K>,
}

impl<C, T, K> Step<C, T, K> {
    /// A step with no requirements.
    pub fn new(name: &'static str, priority: i32, body: StepFn<C, T, K>) -> Self {
        Step {
            name,
            priority,
            requires: Vec::new(),
            body,
        }
    }

    /// Add a requirement.
    pub fn requires(mut self, requirement: Requirement<C, T>) -> Self {
        self.requires.push(requirement);
        self
    }

    /// Name of the step.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Higher runs first.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether every requirement holds for this item.
    pub fn is_applicable(&self, context: &C, item: &T) -> bool {
        self.requires.iter().all(|r| r.is_met(context, item))
    }
}

/// The view of one item that a step body works through. Dereferences to the
/// item.
pub struct Pass<'a, T, K> {
    item: &'a mut T,
    failed: bool,
    stats: &'a mut Stats<K>,
}

impl<'a, T, K: StatKey> Pass<'a, T, K> {
    /// Whether an earlier step (or this one) failed the item.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Mark the item as failed and count the reason.
    pub fn fail(&mut self, reason: K) {
        self.failed = true;
        self.stats.increment(reason);
    }

    /// Count an event that does not fail the item.
    pub fn increment(&mut self, key: K) {
        self.stats.increment(key);
    }
}

impl<'a, T, K> Deref for Pass<'a, T, K> {
    type Target = T;
    fn deref(&self) -> &T {
        self.item
    }
}

impl<'a, T, K> DerefMut for Pass<'a, T, K> {
    fn deref_mut(&mut self) -> &mut T {
        self.item
    }
}

/// An item together with its pass/fail outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Processed<T> {
    /// The item, as left by the last step that ran.
    pub item: T,
    /// Whether any step failed the item.
    pub failed: bool,
}

/// Collects steps and options before the plan is fixed.
pub struct WorkflowBuilder<C, T, K> {
    context: C,
    steps: Vec<Step<C, T, K>>,
    short_circuit: bool,
}

impl<C, T, K: StatKey> WorkflowBuilder<C, T, K> {
    /// Register a step.
    pub fn step(mut self, step: Step<C, T, K>) -> Self {
        self.steps.push(step);
        self
    }

    /// Register several steps in order.
    pub fn steps(mut self, steps: impl IntoIterator<Item = Step<C, T, K>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// When disabled, every applicable step runs even on failed items.
    pub fn short_circuit(mut self, short_circuit: bool) -> Self {
        self.short_circuit = short_circuit;
        self
    }

    /// Fix the execution plan.
    pub fn build(mut self) -> Workflow<C, T, K> {
        // sort_by_key is stable, so equal priorities keep registration order
        self.steps.sort_by_key(|s| std::cmp::Reverse(s.priority));
        for step in &self.steps {
            let reqs = step.requires.iter().map(Requirement::label).join(", ");
            info!(
                "workflow step {} (priority {}) requires [{}]",
                step.name, step.priority, reqs
            );
        }
        Workflow {
            context: self.context,
            steps: self.steps,
            short_circuit: self.short_circuit,
            stats: Stats::default(),
        }
    }
}

/// A fixed plan of steps plus the counters it has accumulated.
pub struct Workflow<C, T, K> {
    context: C,
    steps: Vec<Step<C, T, K>>,
    short_circuit: bool,
    stats: Stats<K>,
}

fn keep<T>(processed: Processed<T>) -> Processed<T> {
    processed
}

impl<C, T, K: StatKey> Workflow<C, T, K> {
    /// Start building a workflow around a shared context.
    pub fn builder(context: C) -> WorkflowBuilder<C, T, K> {
        WorkflowBuilder {
            context,
            steps: Vec::new(),
            short_circuit: true,
        }
    }

    /// The shared, read-only context.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Step names in execution order.
    pub fn plan(&self) -> Vec<&'static str> {
        self.steps.iter().map(Step::name).collect()
    }

    /// Whether failed items skip the remaining steps.
    pub fn is_short_circuit(&self) -> bool {
        self.short_circuit
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> &Stats<K> {
        &self.stats
    }

    /// Consume the workflow, keeping its counters.
    pub fn into_stats(self) -> Stats<K> {
        self.stats
    }

    /// Run the plan over a single item. An error from a step body is fatal
    /// and is returned with the step name attached.
    pub fn process(&mut self, mut item: T) -> Result<Processed<T>> {
        let mut pass = Pass {
            item: &mut item,
            failed: false,
            stats: &mut self.stats,
        };
        for step in &self.steps {
            if pass.failed && self.short_circuit {
                break;
            }
            if !step.is_applicable(&self.context, pass.item) {
                trace!("skipping step {}", step.name);
                continue;
            }
            let was_failed = pass.failed;
            (step.body)(&self.context, &mut pass)
                .with_context(|| format!("workflow step {} failed", step.name))?;
            if pass.failed && !was_failed {
                debug!("item failed at step {}", step.name);
            }
        }
        let failed = pass.failed;
        Ok(Processed { item, failed })
    }

    /// Lazily process `items`, yielding every item with its outcome.
    pub fn run<I>(&mut self, items: I) -> Run<'_, C, T, K, I::IntoIter, ProcessedFn<T>, ProcessedFn<T>>
    where
        I: IntoIterator<Item = Result<T>>,
    {
        self.run_with(items, keep as ProcessedFn<T>)
    }

    /// Lazily process `items`, passing every outcome to `on_success`.
    pub fn run_with<I, S, R>(
        &mut self,
        items: I,
        on_success: S,
    ) -> Run<'_, C, T, K, I::IntoIter, S, S>
    where
        I: IntoIterator<Item = Result<T>>,
        S: FnMut(Processed<T>) -> R,
    {
        Run {
            workflow: self,
            items: items.into_iter(),
            on_success,
            on_failure: None,
            done: false,
        }
    }

    /// Lazily process `items`, passing passed items to `on_success` and
    /// failed items to `on_failure`.
    pub fn run_with_failure<I, S, F, R>(
        &mut self,
        items: I,
        on_success: S,
        on_failure: F,
    ) -> Run<'_, C, T, K, I::IntoIter, S, F>
    where
        I: IntoIterator<Item = Result<T>>,
        S: FnMut(Processed<T>) -> R,
        F: FnMut(Processed<T>) -> R,
    {
        Run {
            workflow: self,
            items: items.into_iter(),
            on_success,
            on_failure: Some(on_failure),
            done: false,
        }
    }
}

/// The default output callback.
pub type ProcessedFn<T> = fn(Processed<T>) -> Processed<T>;

/// Iterator returned by [`Workflow::run`] and friends. Yields one result per
/// input item; after the first error (from the input or a step) it yields
/// nothing more.
pub struct Run<'w, C, T, K, I, S, F> {
    workflow: &'w mut Workflow<C, T, K>,
    items: I,
    on_success: S,
    on_failure: Option<F>,
    done: bool,
}

impl<'w, C, T, K, I, S, F, R> Iterator for Run<'w, C, T, K, I, S, F>
where
    K: StatKey,
    I: Iterator<Item = Result<T>>,
    S: FnMut(Processed<T>) -> R,
    F: FnMut(Processed<T>) -> R,
{
    type Item = Result<R>;

    fn next(&mut self) -> Option<Result<R>> {
        if self.done {
            return None;
        }
        let processed = match self.items.next()?.and_then(|item| self.workflow.process(item)) {
            Ok(p) => p,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        Some(Ok(match (&mut self.on_failure, processed.failed) {
            (Some(on_failure), true) => on_failure(processed),
            _ => (self.on_success)(processed),
        }))
    }
}
