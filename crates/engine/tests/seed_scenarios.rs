//! Seed scenarios ported from the original tool's own test suite
//! (`tests.py`), grounded directly in its concrete fixture data rather
//! than re-derived from the prose spec. Expected assignments below are
//! computed by hand-tracing this engine's actual search/SMT pipeline
//! against those fixtures, not copied verbatim from the Python
//! assertions: a dimension left unconstrained by any complex constraint
//! is still concretised to a representative value here (the default
//! backend always resolves every domain), where the original left a
//! `{0,1}` set untouched.

use powerseq_engine::component::{
    Component, ConductorKind, ConsumerStates, EventFragment, ExplicitEdges, InputPin, OutputPin,
    PowerState, StatePossibility, TransitionStep,
};
use powerseq_engine::event_graph::build_event_graph;
use powerseq_engine::search::SearchFlags;
use powerseq_engine::smt::NativeSolver;
use powerseq_engine::state::{Dimension, StateDict};
use powerseq_engine::topology::{RendererTable, Topology, WireSpec};
use powerseq_engine::{apply_consumer_transitions, consumer_transition, search_solutions};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// `Node1`/`Node2` plus the three-wire topology of `Z3_Test`.
fn three_conductor_topology() -> Topology {
    let i1_range = vec![vec![Dimension::range(4, 9), Dimension::range(25, 60)]];
    let i2_range = vec![vec![Dimension::set([0, 1])]];
    let i3_range = vec![vec![Dimension::set([6, 3, 4]), Dimension::set([8, 1, 4])]];

    let n1 = Component::new("n1", "Node1")
        .with_input(InputPin::new("I1", i1_range, ConductorKind::Power))
        .with_input(InputPin::new("I2", i2_range, ConductorKind::Logical))
        .with_input(InputPin::new("I3", i3_range, ConductorKind::Power));

    let no_edges = || EventFragment::Explicit(ExplicitEdges::default());

    let o1_range = vec![vec![Dimension::range(0, 25), Dimension::range(0, 250)]];
    let o1_state = vec![vec![Dimension::range(5, 5), Dimension::range(44, 44)]];
    let o2_range = vec![vec![Dimension::set([0, 1])]];
    let o2_state = vec![vec![Dimension::set([0, 1])]];
    let o3_range = vec![vec![Dimension::set([3, 4, 7]), Dimension::set([29, 1, 99])]];
    let o3_state = vec![vec![Dimension::set([3]), Dimension::set([1])]];

    let n2 = Component::new("n2", "Node2")
        .with_output(OutputPin {
            name: "O1".into(),
            declared_range: o1_range,
            kind: ConductorKind::Power,
            possibilities: vec![StatePossibility::simple(o1_state, StateDict::new(), no_edges())],
        })
        .with_output(OutputPin {
            name: "O2".into(),
            declared_range: o2_range,
            kind: ConductorKind::Logical,
            possibilities: vec![StatePossibility::simple(o2_state, StateDict::new(), no_edges())],
        })
        .with_output(OutputPin {
            name: "O3".into(),
            declared_range: o3_range,
            kind: ConductorKind::Power,
            possibilities: vec![StatePossibility::simple(o3_state, StateDict::new(), no_edges())],
        });

    let wires = vec![
        WireSpec { name: "w1".into(), producer: "n2".into(), producer_pin: "O1".into(), consumers: vec![("n1".into(), "I1".into())] },
        WireSpec { name: "w2".into(), producer: "n2".into(), producer_pin: "O2".into(), consumers: vec![("n1".into(), "I2".into())] },
        WireSpec { name: "w3".into(), producer: "n2".into(), producer_pin: "O3".into(), consumers: vec![("n1".into(), "I3".into())] },
    ];

    Topology::new(vec![n1, n2], wires, RendererTable::new()).unwrap()
}

#[test]
fn three_conductor_topology_recovers_the_unique_assignment() {
    let topology = three_conductor_topology();
    let flags = SearchFlags::default();
    let mut smt = NativeSolver::new();

    let solutions = search_solutions(&topology, &StateDict::new(), &flags, &mut smt).unwrap();
    assert_eq!(solutions.len(), 1);
    let solution = &solutions[0];

    assert_eq!(solution.chosen["w1"], vec![Dimension::range(5, 5), Dimension::range(44, 44)]);
    // Both producer possibility and AMR leave {0,1} unconstrained; the
    // default backend's representative-value policy picks the smallest
    // element (0), so the Python suite's untouched "[{0,1}]" collapses here.
    assert_eq!(solution.chosen["w2"], vec![Dimension::set([0])]);
    assert_eq!(solution.chosen["w3"], vec![Dimension::set([3]), Dimension::set([1])]);

    // Every conductor changed from its (absent) prior state, so the whole
    // topology's wires all participate in the event graph.
    let changed: BTreeSet<String> = topology.conductors.keys().cloned().collect();
    let graph = build_event_graph(&topology, &solution.possibility, &changed, flags.record_unchanged, flags.strict_none_edges).unwrap();
    let ranks = graph.toposort_ranks().unwrap();
    assert_eq!(ranks.len(), 2);
    assert_eq!(ranks[0], vec!["set:w1".to_string(), "set:w2".to_string(), "set:w3".to_string()]);
    assert_eq!(ranks[1], vec!["w1".to_string(), "w2".to_string(), "w3".to_string()]);
}

#[test]
fn infeasible_requirement_yields_zero_solutions() {
    let topology = three_conductor_topology();
    let flags = SearchFlags::default();
    let mut smt = NativeSolver::new();

    let mut requirements = StateDict::new();
    requirements.insert("w3".to_string(), vec![vec![Dimension::set([4]), Dimension::set([1])]]);

    let solutions = search_solutions(&topology, &requirements, &flags, &mut smt).unwrap();
    assert!(solutions.is_empty());
}

/// `Node3`/`Node4`/`Node5`/`Node6` and the nine-node chain of
/// `test_independence_of_sequence_1`: one free binary choice at `n0`
/// propagates deterministically through `n1..n6`, and an unrelated free
/// binary choice at `n7` feeds the isolated sink `n8`, so the
/// `all_solutions` count is exactly four regardless of conductor order.
fn permutation_invariance_topology() -> Topology {
    let bit = || vec![vec![Dimension::set([0, 1])]];
    let no_edges = || EventFragment::Explicit(ExplicitEdges::default());
    let gated_on_input = |input_wire_name: &str| ExplicitEdges {
        before_set: BTreeSet::from([input_wire_name.to_string()]),
        ..Default::default()
    };

    // Node6: free choice between {0} and {1}, no upstream dependency.
    let free_choice_output = |name: &str| OutputPin {
        name: name.into(),
        declared_range: bit(),
        kind: ConductorKind::Logical,
        possibilities: vec![
            StatePossibility::simple(vec![vec![Dimension::set([0])]], StateDict::new(), no_edges()),
            StatePossibility::simple(vec![vec![Dimension::set([1])]], StateDict::new(), no_edges()),
        ],
    };

    let n0 = Component::new("n0", "Node6").with_output(free_choice_output("O1"));
    let n7 = Component::new("n7", "Node6").with_output(free_choice_output("O1"));

    // Node3: O1/O2/O3 each track I1 (same polarity), gated on I1 completing.
    // `requirements` and the ordering edge both name the *local* input pin
    // ("I1"); topology construction rewrites that to whichever conductor
    // ends up wired there.
    let node3_output = |name: &str| OutputPin {
        name: name.into(),
        declared_range: bit(),
        kind: ConductorKind::Logical,
        possibilities: vec![
            StatePossibility {
                requirements: StateDict::from([("I1".to_string(), vec![vec![Dimension::set([1])]])]),
                ..StatePossibility::simple(vec![vec![Dimension::set([1])]], StateDict::new(), EventFragment::Explicit(gated_on_input("I1")))
            },
            StatePossibility {
                requirements: StateDict::from([("I1".to_string(), vec![vec![Dimension::set([0])]])]),
                ..StatePossibility::simple(vec![vec![Dimension::set([0])]], StateDict::new(), EventFragment::Explicit(gated_on_input("I1")))
            },
        ],
    };
    let n1 = Component::new("n1", "Node3")
        .with_input(InputPin::new("I1", bit(), ConductorKind::Logical))
        .with_output(node3_output("O1"))
        .with_output(node3_output("O2"))
        .with_output(node3_output("O3"));

    // Node4: O1 inverts I1, gated on I1 completing.
    let node4_output = || OutputPin {
        name: "O1".into(),
        declared_range: bit(),
        kind: ConductorKind::Logical,
        possibilities: vec![
            StatePossibility {
                requirements: StateDict::from([("I1".to_string(), vec![vec![Dimension::set([1])]])]),
                ..StatePossibility::simple(vec![vec![Dimension::set([0])]], StateDict::new(), EventFragment::Explicit(gated_on_input("I1")))
            },
            StatePossibility {
                requirements: StateDict::from([("I1".to_string(), vec![vec![Dimension::set([0])]])]),
                ..StatePossibility::simple(vec![vec![Dimension::set([1])]], StateDict::new(), EventFragment::Explicit(gated_on_input("I1")))
            },
        ],
    };
    let n2 = Component::new("n2", "Node4").with_input(InputPin::new("I1", bit(), ConductorKind::Logical)).with_output(node4_output());
    let n6 = Component::new("n6", "Node4").with_input(InputPin::new("I1", bit(), ConductorKind::Logical)).with_output(node4_output());

    // Node5: pure sink, no outputs.
    let sink = |name: &str| Component::new(name, "Node5").with_input(InputPin::new("I1", bit(), ConductorKind::Logical));
    let n3 = sink("n3");
    let n4 = sink("n4");
    let n5 = sink("n5");
    let n8 = sink("n8");

    let wires = vec![
        WireSpec { name: "w0".into(), producer: "n0".into(), producer_pin: "O1".into(), consumers: vec![("n1".into(), "I1".into())] },
        WireSpec { name: "w1".into(), producer: "n1".into(), producer_pin: "O1".into(), consumers: vec![("n2".into(), "I1".into())] },
        WireSpec { name: "w2".into(), producer: "n1".into(), producer_pin: "O2".into(), consumers: vec![("n3".into(), "I1".into())] },
        WireSpec { name: "w3".into(), producer: "n1".into(), producer_pin: "O3".into(), consumers: vec![("n4".into(), "I1".into())] },
        WireSpec { name: "w4".into(), producer: "n2".into(), producer_pin: "O1".into(), consumers: vec![("n6".into(), "I1".into())] },
        WireSpec { name: "w5".into(), producer: "n6".into(), producer_pin: "O1".into(), consumers: vec![("n5".into(), "I1".into())] },
        WireSpec { name: "w6".into(), producer: "n7".into(), producer_pin: "O1".into(), consumers: vec![("n8".into(), "I1".into())] },
    ];

    Topology::new(vec![n0, n1, n2, n3, n4, n5, n6, n7, n8], wires, RendererTable::new()).unwrap()
}

#[test]
fn solution_count_is_independent_of_conductor_order() {
    let mut flags = SearchFlags::default();
    flags.all_solutions = true;

    let orders: Vec<Vec<&str>> = vec![
        vec!["w0", "w1", "w2", "w3", "w4", "w5", "w6"],
        vec!["w6", "w5", "w4", "w3", "w2", "w1", "w0"],
        vec!["w3", "w0", "w5", "w1", "w6", "w2", "w4"],
        vec!["w1", "w2", "w3", "w4", "w5", "w6", "w0"],
        vec!["w4", "w2", "w0", "w6", "w1", "w3", "w5"],
    ];

    for order in orders {
        let mut topology = permutation_invariance_topology();
        topology.sorted_wires = order.iter().map(|s| s.to_string()).collect();
        let mut smt = NativeSolver::new();
        let solutions = search_solutions(&topology, &StateDict::new(), &flags, &mut smt).unwrap();
        assert_eq!(solutions.len(), 4, "order {order:?} produced {} solutions", solutions.len());
    }
}

/// `CPU2`'s two power states and its `POWERED_DOWN -> POWERED_ON`
/// incremental transition, driven through a trio of identity-possibility
/// producers standing in for a simple supply + enable sequencer.
fn cpu2_topology() -> Topology {
    let vdd_range = vec![vec![Dimension::range(0, 2600)]];
    let bit_range = vec![vec![Dimension::set([0, 1])]];
    let no_edges = || EventFragment::Explicit(ExplicitEdges::default());

    let psu = Component::new("psu", "PowerSupply")
        .with_output(OutputPin {
            name: "VDD_OUT".into(),
            declared_range: vdd_range.clone(),
            kind: ConductorKind::Power,
            possibilities: vec![StatePossibility::simple(vdd_range.clone(), StateDict::new(), no_edges())],
        })
        .with_output(OutputPin {
            name: "EN1_OUT".into(),
            declared_range: bit_range.clone(),
            kind: ConductorKind::Logical,
            possibilities: vec![StatePossibility::simple(bit_range.clone(), StateDict::new(), no_edges())],
        })
        .with_output(OutputPin {
            name: "EN2_OUT".into(),
            declared_range: bit_range.clone(),
            kind: ConductorKind::Logical,
            possibilities: vec![StatePossibility::simple(bit_range.clone(), StateDict::new(), no_edges())],
        });

    let powered_down = PowerState {
        name: "POWERED_DOWN".into(),
        amr: StateDict::from([
            ("vdd".to_string(), vec![vec![Dimension::range(0, 0)]]),
            ("en1".to_string(), vec![vec![Dimension::set([0])]]),
            ("en2".to_string(), vec![vec![Dimension::set([0])]]),
        ]),
        transitions: BTreeMap::from([
            ("POWERED_ON".to_string(), vec![TransitionStep {
                delta: StateDict::from([("en1".to_string(), vec![vec![Dimension::set([0])]])]),
                annotation: String::new(),
            }]),
            ("POWERED_DOWN".to_string(), vec![]),
        ]),
    };
    let powered_on = PowerState {
        name: "POWERED_ON".into(),
        amr: StateDict::from([
            ("vdd".to_string(), vec![vec![Dimension::range(2300, 2600)]]),
            ("en1".to_string(), vec![vec![Dimension::set([1])]]),
            ("en2".to_string(), vec![vec![Dimension::set([0])]]),
        ]),
        transitions: BTreeMap::from([
            ("POWERED_DOWN".to_string(), vec![
                TransitionStep { delta: StateDict::from([("vdd".to_string(), vec![vec![Dimension::range(2300, 2400)]])]), annotation: "wait until vdd stabilized".into() },
                TransitionStep { delta: StateDict::from([("en1".to_string(), vec![vec![Dimension::set([1])]])]), annotation: String::new() },
                TransitionStep { delta: StateDict::from([("en2".to_string(), vec![vec![Dimension::set([1])]]), ("vdd".to_string(), vec![vec![Dimension::range(2000, 2600)]])]), annotation: String::new() },
            ]),
            ("POWERED_ON".to_string(), vec![]),
        ]),
    };

    let cpu = Component::new("cpu", "CPU2")
        .with_input(InputPin::new("VDD", vdd_range, ConductorKind::Power))
        .with_input(InputPin::new("EN1", bit_range.clone(), ConductorKind::Logical))
        .with_input(InputPin::new("EN2", bit_range, ConductorKind::Logical))
        .with_consumer(ConsumerStates {
            states: BTreeMap::from([("POWERED_DOWN".to_string(), powered_down), ("POWERED_ON".to_string(), powered_on)]),
            initial: "POWERED_DOWN".to_string(),
        });

    let wires = vec![
        WireSpec { name: "vdd".into(), producer: "psu".into(), producer_pin: "VDD_OUT".into(), consumers: vec![("cpu".into(), "VDD".into())] },
        WireSpec { name: "en1".into(), producer: "psu".into(), producer_pin: "EN1_OUT".into(), consumers: vec![("cpu".into(), "EN1".into())] },
        WireSpec { name: "en2".into(), producer: "psu".into(), producer_pin: "EN2_OUT".into(), consumers: vec![("cpu".into(), "EN2".into())] },
    ];

    let mut renderers = RendererTable::new();
    renderers.set("psu", "VDD_OUT", Arc::new(|v| format!("device_write('vdd', 'VOUT_COMMAND', {:?})", v)));
    renderers.set("psu", "EN1_OUT", Arc::new(|v| format!("gpio.set_value('en1', {:?})", v)));
    renderers.set("psu", "EN2_OUT", Arc::new(|v| format!("gpio.set_value('en2', {:?})", v)));

    Topology::new(vec![psu, cpu], wires, renderers).unwrap()
}

#[test]
fn cpu2_power_up_resolves_absolute_steps() {
    let topology = cpu2_topology();
    let steps = consumer_transition(&topology, "cpu", "POWERED_ON").unwrap();
    assert_eq!(steps.steps.len(), 2);
    // Intermediate step: en1 raised, vdd/en2 still at POWERED_DOWN's amr.
    assert_eq!(steps.steps[0]["en1"], vec![vec![Dimension::set([0])]]);
    // Final step is POWERED_ON's own amr.
    assert_eq!(steps.steps[1]["vdd"], vec![vec![Dimension::range(2300, 2600)]]);
    assert_eq!(steps.steps[1]["en1"], vec![vec![Dimension::set([1])]]);
}

#[test]
fn cpu2_power_up_interleaves_and_commits_target_state() {
    let mut topology = cpu2_topology();
    let flags = SearchFlags::default();
    let mut smt = NativeSolver::new();

    let transition = consumer_transition(&topology, "cpu", "POWERED_ON").unwrap();
    let targets = BTreeMap::from([("cpu".to_string(), "POWERED_ON".to_string())]);
    let outcome = apply_consumer_transitions(&mut topology, &[transition], &targets, &flags, &mut smt).unwrap();

    assert!(!outcome.commands.is_empty());
    assert_eq!(topology.current_node_state["cpu"], "POWERED_ON");
    // The final lattice point's requirement is the (2300,2600) range; with
    // no complex constraint pinning it, the default backend's
    // representative-value policy commits the midpoint, same as
    // `select_state` would for an unconstrained range.
    assert_eq!(topology.conductors["vdd"].current_state, Some(vec![Dimension::range(2450, 2450)]));
}
