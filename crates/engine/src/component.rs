//! Component model (spec §4.2-4.3): producers with Output pins carrying
//! State Possibilities, consumers with named Power States, and the
//! event-graph fragments each possibility carries.
//!
//! Per §9 design notes, late-binding updaters are modelled as tagged
//! variants rather than first-class closures capturing mutable component
//! state: a component carries a small named-flag register
//! ([`Component::flags`]), and a possibility's [`StateSource`] /
//! [`DependencySource`] either is fixed at catalogue-authoring time or
//! selects one of N precomputed alternatives by reading a flag.

use crate::state::{StateDict, StateSpace};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConductorKind {
    Power,
    Logical,
    Bus,
    Clock,
    Monitor,
}

#[derive(Debug, Clone)]
pub struct InputPin {
    pub name: String,
    pub declared_range: StateSpace,
    pub kind: ConductorKind,
    pub has_monitor: bool,
}

impl InputPin {
    pub fn new(name: impl Into<String>, declared_range: StateSpace, kind: ConductorKind) -> Self {
        InputPin { name: name.into(), declared_range, kind, has_monitor: false }
    }

    pub fn monitor(name: impl Into<String>, declared_range: StateSpace, kind: ConductorKind) -> Self {
        InputPin { name: name.into(), declared_range, kind, has_monitor: true }
    }
}

/// Ordering edges a possibility's dependency fragment contributes,
/// referencing *conductor names* (translated to concrete event names by
/// the event-graph builder in `event_graph`).
#[derive(Debug, Clone, Default)]
pub struct ExplicitEdges {
    pub before_set: BTreeSet<String>,
    pub before_complete: BTreeSet<String>,
    pub after_set: BTreeSet<String>,
    pub after_complete: BTreeSet<String>,
}

/// One possibility's ordering fragment (spec §4.3).
#[derive(Debug, Clone)]
pub enum EventFragment {
    /// Explicit Initiate: the engine emits `set_w` itself.
    Explicit(ExplicitEdges),
    /// Implicit Initiate: `w` is driven by upstream change on `causes`;
    /// resolved to explicit events by the event-graph builder.
    Implicit { causes: BTreeSet<String>, edges: ExplicitEdges },
}

impl EventFragment {
    pub fn edges(&self) -> &ExplicitEdges {
        match self {
            EventFragment::Explicit(e) => e,
            EventFragment::Implicit { edges, .. } => edges,
        }
    }
}

/// Selects between a fixed dependency fragment and one of several
/// alternatives chosen by a named component flag (the `is_default` /
/// `is_configured` hooks of spec §4.3).
#[derive(Debug, Clone)]
pub enum DependencySource {
    Fixed(EventFragment),
    SwitchOnFlag { flag: String, alternatives: Vec<EventFragment> },
}

impl DependencySource {
    pub fn resolve(&self, flags: &BTreeMap<String, i64>) -> EventFragment {
        match self {
            DependencySource::Fixed(f) => f.clone(),
            DependencySource::SwitchOnFlag { flag, alternatives } => {
                let idx = flags.get(flag).copied().unwrap_or(0) as usize;
                alternatives
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| alternatives[0].clone())
            }
        }
    }
}

/// Selects between the possibility's declared `state` and a value read
/// live from a component flag pair (used for "is the regulator currently
/// sitting at its user-set voltage" branching).
#[derive(Debug, Clone)]
pub enum StateSource {
    Fixed(StateSpace),
    FromRangeFlag { lo_flag: String, hi_flag: String, fallback: StateSpace },
}

impl StateSource {
    pub fn resolve(&self, flags: &BTreeMap<String, i64>) -> StateSpace {
        match self {
            StateSource::Fixed(s) => s.clone(),
            StateSource::FromRangeFlag { lo_flag, hi_flag, fallback } => {
                match (flags.get(lo_flag), flags.get(hi_flag)) {
                    (Some(&lo), Some(&hi)) => vec![vec![crate::state::Dimension::range(lo, hi)]],
                    _ => fallback.clone(),
                }
            }
        }
    }
}

/// One `(predicate, arg-specs)` complex constraint (spec §3): an arbitrary
/// Boolean relation over dimensions of other conductors, e.g. the
/// integer-ratio relation between a reference voltage and its divider.
#[derive(Clone)]
pub struct ComplexConstraint {
    pub label: String,
    pub args: Vec<(String, usize)>,
    pub predicate: std::sync::Arc<dyn Fn(&[i64]) -> bool + Send + Sync>,
}

impl std::fmt::Debug for ComplexConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplexConstraint")
            .field("label", &self.label)
            .field("args", &self.args)
            .finish()
    }
}

/// One disjunct of a producer Output (spec §3, "State Possibility").
#[derive(Debug, Clone)]
pub struct StatePossibility {
    pub state: StateSource,
    pub requirements: StateDict,
    pub complex_constraints: Vec<ComplexConstraint>,
    pub dependency: DependencySource,
}

impl StatePossibility {
    pub fn simple(state: StateSpace, requirements: StateDict, fragment: EventFragment) -> Self {
        StatePossibility {
            state: StateSource::Fixed(state),
            requirements,
            complex_constraints: Vec::new(),
            dependency: DependencySource::Fixed(fragment),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputPin {
    pub name: String,
    pub declared_range: StateSpace,
    pub kind: ConductorKind,
    pub possibilities: Vec<StatePossibility>,
}

/// One step of a consumer's incremental transition sequence: a delta
/// requirement dict (folded onto the origin AMR at topology construction
/// time) plus a human-readable annotation.
#[derive(Debug, Clone)]
pub struct TransitionStep {
    pub delta: StateDict,
    pub annotation: String,
}

#[derive(Debug, Clone)]
pub struct PowerState {
    pub name: String,
    pub amr: StateDict,
    /// Destination power-state name -> ordered incremental steps taken
    /// from this (owning) power state to reach that destination.
    pub transitions: BTreeMap<String, Vec<TransitionStep>>,
}

/// A consumer's full set of named power states, plus which one the
/// platform currently occupies.
#[derive(Debug, Clone)]
pub struct ConsumerStates {
    pub states: BTreeMap<String, PowerState>,
    pub initial: String,
}

impl ConsumerStates {
    /// Rewrites every transition step from a delta requirement dict into
    /// an absolute one by folding deltas onto the origin AMR in order,
    /// and appends the destination AMR as the sequence's final step
    /// (spec §3, "Consumer Power State").
    pub fn resolve_absolute_steps(&self, from: &str, to: &str) -> crate::error::EngineResult<Vec<StateDict>> {
        let origin = self
            .states
            .get(from)
            .ok_or_else(|| crate::error::EngineError::Wire(format!("unknown power state '{from}'")))?;
        let dest = self
            .states
            .get(to)
            .ok_or_else(|| crate::error::EngineError::Wire(format!("unknown power state '{to}'")))?;
        let mut absolute = Vec::new();
        let mut running = origin.amr.clone();
        if let Some(steps) = origin.transitions.get(to) {
            for step in steps {
                crate::state::unite_dict(&mut running, &step.delta)?;
                absolute.push(running.clone());
            }
        }
        absolute.push(dest.amr.clone());
        Ok(absolute)
    }
}

/// One component in the platform: a handful of input/output pin
/// declarations, its mutable named-flag register, and (for consumers)
/// its power-state machine.
#[derive(Debug, Clone)]
pub struct Component {
    pub name: String,
    pub bus_addr: Option<String>,
    pub class: String,
    pub inputs: Vec<InputPin>,
    pub outputs: Vec<OutputPin>,
    pub flags: BTreeMap<String, i64>,
    pub consumer: Option<ConsumerStates>,
}

impl Component {
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Component {
            name: name.into(),
            bus_addr: None,
            class: class.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            flags: BTreeMap::new(),
            consumer: None,
        }
    }

    pub fn with_input(mut self, pin: InputPin) -> Self {
        self.inputs.push(pin);
        self
    }

    pub fn with_output(mut self, pin: OutputPin) -> Self {
        self.outputs.push(pin);
        self
    }

    pub fn with_consumer(mut self, consumer: ConsumerStates) -> Self {
        self.consumer = Some(consumer);
        self
    }
}
