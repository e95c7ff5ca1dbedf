//! Topology (spec §3, §4.2): binds a component catalogue plus a wire list
//! into a concrete graph of conductors, computes each conductor's AMR,
//! rewrites possibility requirement keys from local pin names to
//! conductor names, and tracks current platform state.

use crate::component::{Component, ConductorKind, ConsumerStates, EventFragment, ExplicitEdges, StatePossibility};
use crate::error::{EngineError, EngineResult};
use crate::state::{intersect, Option_, StateDict, StateSpace};
use std::collections::BTreeMap;
use std::sync::Arc;

pub type SetRenderer = Arc<dyn Fn(&Option_) -> String + Send + Sync>;
pub type MonitorRenderer = Arc<dyn Fn(&Option_, &StateDict) -> (bool, String) + Send + Sync>;

/// One entry of the platform's wire list (spec §6): a named conductor
/// linking one producer output pin to one or more consumer input pins.
#[derive(Debug, Clone)]
pub struct WireSpec {
    pub name: String,
    pub producer: String,
    pub producer_pin: String,
    pub consumers: Vec<(String, String)>,
}

/// Renderers supplied by the catalogue (spec §4.2 step 3): the
/// command-emission back-end is an injected pretty-printer, keyed by the
/// declaring component and local pin name.
#[derive(Default)]
pub struct RendererTable {
    pub set_renderers: BTreeMap<(String, String), SetRenderer>,
    pub monitor_renderers: BTreeMap<(String, String), Vec<MonitorRenderer>>,
}

impl RendererTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, component: impl Into<String>, pin: impl Into<String>, renderer: SetRenderer) {
        self.set_renderers.insert((component.into(), pin.into()), renderer);
    }

    pub fn monitor(&mut self, component: impl Into<String>, pin: impl Into<String>, renderer: MonitorRenderer) {
        self.monitor_renderers
            .entry((component.into(), pin.into()))
            .or_default()
            .push(renderer);
    }
}

#[derive(Clone)]
pub struct Conductor {
    pub name: String,
    pub kind: ConductorKind,
    pub amr: StateSpace,
    pub possibilities: Vec<StatePossibility>,
    pub set_renderer: Option<SetRenderer>,
    pub monitors: Vec<MonitorRenderer>,
    pub current_state: Option<Option_>,
    pub current_range: StateSpace,
    /// Owning component, for flag lookups when resolving updaters.
    pub owner: String,
}

impl std::fmt::Debug for Conductor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conductor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("amr", &self.amr)
            .field("possibilities", &self.possibilities.len())
            .field("current_state", &self.current_state)
            .finish()
    }
}

pub struct Topology {
    pub components: BTreeMap<String, Component>,
    pub conductors: BTreeMap<String, Conductor>,
    /// Fixed iteration order over conductor names; the backtracker walks
    /// this order and permuting it is how scenario 6 (permutation
    /// invariance) is exercised.
    pub sorted_wires: Vec<String>,
    pub current_node_state: BTreeMap<String, String>,
    pub commands: String,
}

fn rewrite_dict(owner: &str, pins: &BTreeMap<(String, String), String>, dict: &StateDict) -> EngineResult<StateDict> {
    let mut out = StateDict::new();
    for (local, space) in dict {
        let wire = pins
            .get(&(owner.to_string(), local.clone()))
            .ok_or_else(|| EngineError::Wire(format!("'{owner}.{local}' is not wired")))?;
        out.insert(wire.clone(), space.clone());
    }
    Ok(out)
}

fn rewrite_edges(owner: &str, pins: &BTreeMap<(String, String), String>, edges: &ExplicitEdges) -> ExplicitEdges {
    let tr = |names: &std::collections::BTreeSet<String>| {
        names
            .iter()
            .filter_map(|n| pins.get(&(owner.to_string(), n.clone())).cloned())
            .collect()
    };
    ExplicitEdges {
        before_set: tr(&edges.before_set),
        before_complete: tr(&edges.before_complete),
        after_set: tr(&edges.after_set),
        after_complete: tr(&edges.after_complete),
    }
}

fn rewrite_fragment(owner: &str, pins: &BTreeMap<(String, String), String>, fragment: &EventFragment) -> EventFragment {
    match fragment {
        EventFragment::Explicit(e) => EventFragment::Explicit(rewrite_edges(owner, pins, e)),
        EventFragment::Implicit { causes, edges } => EventFragment::Implicit {
            causes: causes
                .iter()
                .filter_map(|n| pins.get(&(owner.to_string(), n.clone())).cloned())
                .collect(),
            edges: rewrite_edges(owner, pins, edges),
        },
    }
}

fn rewrite_possibility(
    owner: &str,
    pins: &BTreeMap<(String, String), String>,
    possibility: &StatePossibility,
) -> EngineResult<StatePossibility> {
    use crate::component::DependencySource;

    let requirements = rewrite_dict(owner, pins, &possibility.requirements)?;
    let complex_constraints = possibility
        .complex_constraints
        .iter()
        .map(|c| {
            let mut c2 = c.clone();
            c2.args = c
                .args
                .iter()
                .map(|(local, dim)| {
                    let wire = pins
                        .get(&(owner.to_string(), local.clone()))
                        .cloned()
                        .unwrap_or_else(|| local.clone());
                    (wire, *dim)
                })
                .collect();
            c2
        })
        .collect();
    let dependency = match &possibility.dependency {
        DependencySource::Fixed(f) => DependencySource::Fixed(rewrite_fragment(owner, pins, f)),
        DependencySource::SwitchOnFlag { flag, alternatives } => DependencySource::SwitchOnFlag {
            flag: flag.clone(),
            alternatives: alternatives.iter().map(|f| rewrite_fragment(owner, pins, f)).collect(),
        },
    };
    Ok(StatePossibility {
        state: possibility.state.clone(),
        requirements,
        complex_constraints,
        dependency,
    })
}

impl Topology {
    pub fn new(
        components: Vec<Component>,
        wires: Vec<WireSpec>,
        renderers: RendererTable,
    ) -> EngineResult<Topology> {
        let components: BTreeMap<String, Component> = components.into_iter().map(|c| (c.name.clone(), c)).collect();

        // (component, local pin name) -> conductor name, covering both the
        // producer's output pin and every consumer's input pin.
        let mut pins: BTreeMap<(String, String), String> = BTreeMap::new();
        for w in &wires {
            pins.insert((w.producer.clone(), w.producer_pin.clone()), w.name.clone());
            for (consumer, pin) in &w.consumers {
                pins.insert((consumer.clone(), pin.clone()), w.name.clone());
            }
        }

        let mut conductors = BTreeMap::new();
        let mut sorted_wires = Vec::with_capacity(wires.len());

        for w in &wires {
            let producer = components
                .get(&w.producer)
                .ok_or_else(|| EngineError::Wire(format!("unknown producer '{}'", w.producer)))?;
            let output = producer
                .outputs
                .iter()
                .find(|o| o.name == w.producer_pin)
                .ok_or_else(|| EngineError::Wire(format!("'{}' has no output '{}'", w.producer, w.producer_pin)))?;

            let mut amr = output.declared_range.clone();
            for (consumer_name, pin_name) in &w.consumers {
                let consumer = components
                    .get(consumer_name)
                    .ok_or_else(|| EngineError::Wire(format!("unknown consumer '{consumer_name}'")))?;
                let input = consumer
                    .inputs
                    .iter()
                    .find(|i| i.name == *pin_name)
                    .ok_or_else(|| EngineError::Wire(format!("'{consumer_name}' has no input '{pin_name}'")))?;
                // A monitor-style input reading a foreign-typed conductor is
                // a read-only tap and does not narrow the AMR (spec §3).
                if input.kind != output.kind && !input.has_monitor {
                    return Err(EngineError::Wire(format!(
                        "'{consumer_name}.{pin_name}' type mismatch on wire '{}'",
                        w.name
                    )));
                }
                if !input.has_monitor {
                    amr = intersect(&amr, &input.declared_range)
                        .map_err(|_| EngineError::state_space(&w.name, "AMR intersection is empty"))?;
                }
            }
            if amr.is_empty() {
                return Err(EngineError::state_space(&w.name, "AMR is empty"));
            }

            let possibilities = output
                .possibilities
                .iter()
                .map(|p| rewrite_possibility(&w.producer, &pins, p))
                .collect::<EngineResult<Vec<_>>>()?;

            let set_renderer = renderers
                .set_renderers
                .get(&(w.producer.clone(), w.producer_pin.clone()))
                .cloned();
            let mut monitors = Vec::new();
            for (consumer_name, pin_name) in &w.consumers {
                if let Some(ms) = renderers.monitor_renderers.get(&(consumer_name.clone(), pin_name.clone())) {
                    monitors.extend(ms.iter().cloned());
                }
            }

            conductors.insert(
                w.name.clone(),
                Conductor {
                    name: w.name.clone(),
                    kind: output.kind,
                    amr: amr.clone(),
                    possibilities,
                    set_renderer,
                    monitors,
                    current_state: None,
                    current_range: amr,
                    owner: w.producer.clone(),
                },
            );
            sorted_wires.push(w.name.clone());
        }

        let current_node_state = components
            .values()
            .filter_map(|c| c.consumer.as_ref().map(|cs| (c.name.clone(), cs.initial.clone())))
            .collect();

        Ok(Topology {
            components,
            conductors,
            sorted_wires,
            current_node_state,
            commands: String::new(),
        })
    }

    pub fn consumer_states(&self, name: &str) -> Option<&ConsumerStates> {
        self.components.get(name).and_then(|c| c.consumer.as_ref())
    }

    /// Current power-state AMR union across every consumer not in
    /// `ignore`, used to extend synthesis requirements (spec §6 `extend`
    /// / `ignore_nodes` flags).
    pub fn platform_amr(&self, ignore: &std::collections::BTreeSet<String>) -> EngineResult<StateDict> {
        let mut acc = StateDict::new();
        for (name, state_name) in &self.current_node_state {
            if ignore.contains(name) {
                continue;
            }
            if let Some(cs) = self.consumer_states(name) {
                if let Some(ps) = cs.states.get(state_name) {
                    crate::state::unite_dict(&mut acc, &ps.amr)?;
                }
            }
        }
        Ok(acc)
    }

    /// Commits a synthesis result into current wire state (spec §3:
    /// "updated atomically after each successful sequence application").
    pub fn commit(&mut self, assignment: &BTreeMap<String, Option_>) {
        for (name, value) in assignment {
            if let Some(c) = self.conductors.get_mut(name) {
                c.current_state = Some(value.clone());
                c.current_range = vec![value.clone()];
            }
        }
    }

    pub fn append_commands(&mut self, text: &str) {
        if !self.commands.is_empty() {
            self.commands.push('\n');
        }
        self.commands.push_str(text);
    }
}
