//! Demonstration component catalogue (spec §6: "illustrative, not
//! normative — real platform catalogues are supplied by the operator").
//! Each class here is a simplified analogue of a regulator/monitor/CPU
//! shape drawn from the original tool's own example platform description,
//! scaled down where the original's shape (a 177-step VID bus regulator,
//! a sixteen-rail FPGA) would dwarf everything else in this crate.

use anyhow::{bail, Result};
use powerseq_engine::component::{
    Component, ConductorKind, ConsumerStates, EventFragment, ExplicitEdges, InputPin, OutputPin,
    PowerState, StatePossibility, TransitionStep,
};
use powerseq_engine::state::{Dimension, StateDict};
use powerseq_engine::topology::RendererTable;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::platform::NodeSpec;

fn arg_i64(args: &Value, key: &str, default: i64) -> i64 {
    args.get(key).and_then(Value::as_i64).unwrap_or(default)
}

fn arg_str<'a>(args: &'a Value, key: &str, default: &'a str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn no_edges() -> EventFragment {
    EventFragment::Explicit(ExplicitEdges::default())
}

fn gated_on(inputs: impl IntoIterator<Item = String>) -> EventFragment {
    EventFragment::Implicit { causes: inputs.into_iter().collect(), edges: ExplicitEdges::default() }
}

/// Resolves one node's `class` into a [`Component`], registering any
/// `set`/`monitor` renderers it needs against `renderers`.
pub fn instantiate(node: &NodeSpec, renderers: &mut RendererTable) -> Result<Component> {
    match node.class.as_str() {
        "INA226" => Ok(monitor(node, renderers)),
        "MAX8869" | "MAX15053" => Ok(simple_regulator(node, renderers)),
        "MAX15301" => Ok(bus_regulator(node, renderers)),
        "ISPPAC" => Ok(sequencer(node, renderers)),
        "CPU" => Ok(cpu(node)),
        "FPGA" => Ok(fpga(node)),
        other => bail!("unknown catalogue class '{other}' on node '{}'", node.name),
    }
}

/// `INA226`: a read-only voltage monitor tapping a foreign power rail,
/// usable once the tapped voltage sits within its configured safe band
/// (grounded in the original's `configure()`-once-then-`wait_for_voltage`
/// pattern).
fn monitor(node: &NodeSpec, renderers: &mut RendererTable) -> Component {
    let lo = arg_i64(&node.args, "vmin_mv", 0);
    let hi = arg_i64(&node.args, "vmax_mv", 5000);
    let bus_name = node.name.clone();

    renderers.monitor(
        node.name.clone(),
        "VS",
        std::sync::Arc::new(move |value, _full_state| {
            let in_band = value.iter().all(|dim| match dim {
                Dimension::Range(a, b) => *a >= lo && *b <= hi,
                Dimension::Set(s) => s.iter().all(|v| *v >= lo && *v <= hi),
            });
            if in_band {
                (true, format!("wait_for_voltage('{bus_name}', {lo}, {hi})"))
            } else {
                (false, String::new())
            }
        }),
    );

    Component::new(node.name.clone(), "INA226")
        .with_input(InputPin::monitor("VS", vec![vec![Dimension::range(lo, hi)]], ConductorKind::Power))
}

/// `MAX8869`/`MAX15053`-style LDO: a passive regulator driven implicitly
/// by its enable bit and input rail, collapsing to `(0,0)` when disabled.
fn simple_regulator(node: &NodeSpec, renderers: &mut RendererTable) -> Component {
    let vin_min = arg_i64(&node.args, "vin_min_mv", 2700);
    let vin_max = arg_i64(&node.args, "vin_max_mv", 5500);
    let vout_lo = arg_i64(&node.args, "vout_min_mv", 3300);
    let vout_hi = arg_i64(&node.args, "vout_max_mv", 3300);

    renderers.set(
        node.name.clone(),
        "VOUT",
        std::sync::Arc::new(|v| format!("set_value({v:?})")),
    );

    let on = StatePossibility {
        requirements: StateDict::from([
            ("EN".to_string(), vec![vec![Dimension::set([1])]]),
            ("VIN".to_string(), vec![vec![Dimension::range(vin_min, vin_max)]]),
        ]),
        ..StatePossibility::simple(
            vec![vec![Dimension::range(vout_lo, vout_hi)]],
            StateDict::new(),
            gated_on(["EN".to_string(), "VIN".to_string()]),
        )
    };
    let off = StatePossibility {
        requirements: StateDict::from([("EN".to_string(), vec![vec![Dimension::set([0])]])]),
        ..StatePossibility::simple(
            vec![vec![Dimension::range(0, 0)]],
            StateDict::new(),
            gated_on(["EN".to_string()]),
        )
    };

    Component::new(node.name.clone(), "Regulator")
        .with_input(InputPin::new("VIN", vec![vec![Dimension::range(vin_min, vin_max)]], ConductorKind::Power))
        .with_input(InputPin::new("EN", vec![vec![Dimension::set([0, 1])]], ConductorKind::Logical))
        .with_output(OutputPin {
            name: "VOUT".into(),
            declared_range: vec![vec![Dimension::range(0, vout_hi)]],
            kind: ConductorKind::Power,
            possibilities: vec![on, off],
        })
}

/// `MAX15301`-style bus-addressable regulator: same EN/V_PWR-gated
/// implicit shape as [`simple_regulator`], but with a bus address and a
/// `device_write`-flavoured renderer for its supply-voltage command.
fn bus_regulator(node: &NodeSpec, renderers: &mut RendererTable) -> Component {
    let vpwr_min = arg_i64(&node.args, "vpwr_min_mv", 4500);
    let vpwr_max = arg_i64(&node.args, "vpwr_max_mv", 5500);
    let vout_lo = arg_i64(&node.args, "vout_min_mv", 900);
    let vout_hi = arg_i64(&node.args, "vout_max_mv", 1800);
    let bus_addr = node.bus_addr.clone().unwrap_or_else(|| node.name.clone());

    renderers.set(
        node.name.clone(),
        "VOUT",
        std::sync::Arc::new(move |v| format!("device_write('{bus_addr}', 'VOUT_COMMAND', {v:?})")),
    );

    let on = StatePossibility {
        requirements: StateDict::from([
            ("EN".to_string(), vec![vec![Dimension::set([1])]]),
            ("V_PWR".to_string(), vec![vec![Dimension::range(vpwr_min, vpwr_max)]]),
        ]),
        ..StatePossibility::simple(
            vec![vec![Dimension::range(vout_lo, vout_hi)]],
            StateDict::new(),
            gated_on(["EN".to_string(), "V_PWR".to_string()]),
        )
    };
    let off = StatePossibility {
        requirements: StateDict::from([("EN".to_string(), vec![vec![Dimension::set([0])]])]),
        ..StatePossibility::simple(
            vec![vec![Dimension::range(0, 0)]],
            StateDict::new(),
            gated_on(["EN".to_string()]),
        )
    };

    Component {
        bus_addr: Some(node.bus_addr.clone().unwrap_or_else(|| node.name.clone())),
        ..Component::new(node.name.clone(), "BusRegulator")
            .with_input(InputPin::new("V_PWR", vec![vec![Dimension::range(vpwr_min, vpwr_max)]], ConductorKind::Power))
            .with_input(InputPin::new("EN", vec![vec![Dimension::set([0, 1])]], ConductorKind::Logical))
            .with_output(OutputPin {
                name: "VOUT".into(),
                declared_range: vec![vec![Dimension::range(0, vout_hi)]],
                kind: ConductorKind::Power,
                possibilities: vec![on, off],
            })
    }
}

/// `ISPPAC`-style multi-output sequencer: a handful of independently
/// explicit-Initiate outputs each holding an identity possibility over
/// its declared range, simplified from the original's 177-step VID-bus
/// regulator into a set of always-nominal supply rails plus enable
/// lines (the shape `crates/engine/tests/seed_scenarios.rs`'s `psu`
/// fixture already exercises).
fn sequencer(node: &NodeSpec, renderers: &mut RendererTable) -> Component {
    let vdd_lo = arg_i64(&node.args, "vdd_min_mv", 0);
    let vdd_hi = arg_i64(&node.args, "vdd_max_mv", 2600);

    renderers.set(node.name.clone(), "VDD_OUT", std::sync::Arc::new(|v| format!("device_write('vdd', 'VOUT_COMMAND', {v:?})")));
    renderers.set(node.name.clone(), "EN1_OUT", std::sync::Arc::new(|v| format!("gpio.set_value('en1', {v:?})")));
    renderers.set(node.name.clone(), "EN2_OUT", std::sync::Arc::new(|v| format!("gpio.set_value('en2', {v:?})")));

    let vdd_range = vec![vec![Dimension::range(vdd_lo, vdd_hi)]];
    let bit_range = vec![vec![Dimension::set([0, 1])]];

    Component::new(node.name.clone(), "ISPPAC")
        .with_output(OutputPin {
            name: "VDD_OUT".into(),
            declared_range: vdd_range.clone(),
            kind: ConductorKind::Power,
            possibilities: vec![StatePossibility::simple(vdd_range, StateDict::new(), no_edges())],
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
            possibilities: vec![StatePossibility::simple(bit_range, StateDict::new(), no_edges())],
        })
}

/// `CPU`: a two-state consumer (`POWERED_DOWN`/`POWERED_ON`) with the
/// same incremental enable-then-raise-rail transition shape as
/// `crates/engine/tests/seed_scenarios.rs`'s `CPU2` fixture, generalized
/// to read its thresholds from the platform description.
fn cpu(node: &NodeSpec) -> Component {
    let vdd_max = arg_i64(&node.args, "vdd_max_mv", 2600);
    let vdd_on_lo = arg_i64(&node.args, "vdd_on_min_mv", 2300);

    let vdd_range = vec![vec![Dimension::range(0, vdd_max)]];
    let bit_range = vec![vec![Dimension::set([0, 1])]];

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
            ("vdd".to_string(), vec![vec![Dimension::range(vdd_on_lo, vdd_max)]]),
            ("en1".to_string(), vec![vec![Dimension::set([1])]]),
            ("en2".to_string(), vec![vec![Dimension::set([0])]]),
        ]),
        transitions: BTreeMap::from([
            ("POWERED_DOWN".to_string(), vec![
                TransitionStep {
                    delta: StateDict::from([("vdd".to_string(), vec![vec![Dimension::range(vdd_on_lo, vdd_on_lo + 100)]])]),
                    annotation: "wait until vdd stabilized".into(),
                },
                TransitionStep { delta: StateDict::from([("en1".to_string(), vec![vec![Dimension::set([1])]])]), annotation: String::new() },
                TransitionStep {
                    delta: StateDict::from([
                        ("en2".to_string(), vec![vec![Dimension::set([1])]]),
                        ("vdd".to_string(), vec![vec![Dimension::range(vdd_on_lo - 300, vdd_max)]]),
                    ]),
                    annotation: String::new(),
                },
            ]),
            ("POWERED_ON".to_string(), vec![]),
        ]),
    };

    Component::new(node.name.clone(), "CPU")
        .with_input(InputPin::new("VDD", vdd_range, ConductorKind::Power))
        .with_input(InputPin::new("EN1", bit_range.clone(), ConductorKind::Logical))
        .with_input(InputPin::new("EN2", bit_range, ConductorKind::Logical))
        .with_consumer(ConsumerStates {
            states: BTreeMap::from([("POWERED_DOWN".to_string(), powered_down), ("POWERED_ON".to_string(), powered_on)]),
            initial: "POWERED_DOWN".to_string(),
        })
}

/// `FPGA`: a representative three-rail subset of the original's
/// sixteen-rail `Stateful_Node` (core, aux, transceiver), each one
/// incremental step deep, rather than replicating the full rail count.
fn fpga(node: &NodeSpec) -> Component {
    let _ = arg_str(&node.args, "family", "generic");
    let bit_range = vec![vec![Dimension::set([0, 1])]];
    let core_range = vec![vec![Dimension::range(0, 1000)]];
    let aux_range = vec![vec![Dimension::range(0, 2500)]];
    let xcvr_range = vec![vec![Dimension::range(0, 1200)]];

    let powered_down = PowerState {
        name: "POWERED_DOWN".into(),
        amr: StateDict::from([
            ("core".to_string(), vec![vec![Dimension::range(0, 0)]]),
            ("aux".to_string(), vec![vec![Dimension::range(0, 0)]]),
            ("xcvr".to_string(), vec![vec![Dimension::range(0, 0)]]),
            ("en".to_string(), vec![vec![Dimension::set([0])]]),
        ]),
        transitions: BTreeMap::from([("POWERED_ON".to_string(), vec![
            TransitionStep { delta: StateDict::from([("aux".to_string(), vec![vec![Dimension::range(2300, 2500)]])]), annotation: "raise aux first".into() },
            TransitionStep { delta: StateDict::from([("core".to_string(), vec![vec![Dimension::range(900, 1000)]])]), annotation: "raise core".into() },
        ]), ("POWERED_DOWN".to_string(), vec![])]),
    };
    let powered_on = PowerState {
        name: "POWERED_ON".into(),
        amr: StateDict::from([
            ("core".to_string(), vec![vec![Dimension::range(900, 1000)]]),
            ("aux".to_string(), vec![vec![Dimension::range(2300, 2500)]]),
            ("xcvr".to_string(), vec![vec![Dimension::range(1100, 1200)]]),
            ("en".to_string(), vec![vec![Dimension::set([1])]]),
        ]),
        transitions: BTreeMap::from([("POWERED_DOWN".to_string(), vec![
            TransitionStep { delta: StateDict::from([("xcvr".to_string(), vec![vec![Dimension::range(0, 0)]])]), annotation: "drop transceiver rail first".into() },
            TransitionStep { delta: StateDict::from([("core".to_string(), vec![vec![Dimension::range(0, 0)]])]), annotation: String::new() },
        ]), ("POWERED_ON".to_string(), vec![])]),
    };

    Component::new(node.name.clone(), "FPGA")
        .with_input(InputPin::new("CORE", core_range, ConductorKind::Power))
        .with_input(InputPin::new("AUX", aux_range, ConductorKind::Power))
        .with_input(InputPin::new("XCVR", xcvr_range, ConductorKind::Power))
        .with_input(InputPin::new("EN", bit_range, ConductorKind::Logical))
        .with_consumer(ConsumerStates {
            states: BTreeMap::from([("POWERED_DOWN".to_string(), powered_down), ("POWERED_ON".to_string(), powered_on)]),
            initial: "POWERED_DOWN".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, class: &str) -> NodeSpec {
        NodeSpec { name: name.into(), bus_addr: None, class: class.into(), args: Value::Null }
    }

    #[test]
    fn simple_regulator_has_on_and_off_possibilities() {
        let mut renderers = RendererTable::new();
        let c = simple_regulator(&node("ldo1", "MAX8869"), &mut renderers);
        assert_eq!(c.outputs[0].possibilities.len(), 2);
    }

    #[test]
    fn bus_regulator_carries_its_bus_address() {
        let mut renderers = RendererTable::new();
        let mut spec = node("reg1", "MAX15301");
        spec.bus_addr = Some("0x42".into());
        let c = bus_regulator(&spec, &mut renderers);
        assert_eq!(c.bus_addr.as_deref(), Some("0x42"));
    }

    #[test]
    fn cpu_resolves_power_up_in_two_steps() {
        let c = cpu(&node("cpu0", "CPU"));
        let states = c.consumer.unwrap();
        let steps = states.resolve_absolute_steps("POWERED_DOWN", "POWERED_ON").unwrap();
        assert_eq!(steps.len(), 2);
    }
}
