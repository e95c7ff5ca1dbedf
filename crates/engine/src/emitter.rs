//! Command emission (spec §4.6, §6): walks the event graph's ranks in
//! order and renders each rank's events into the platform's command
//! string, using the renderers the catalogue attached to each conductor.
//!
//! A rank's `set:w` event renders through `w`'s producer-supplied
//! [`SetRenderer`](crate::topology::SetRenderer); a rank's bare `w` event
//! (Complete) instead calls every monitor attached to `w`'s consumers and
//! keeps only the commands from monitors that report `usable`. Per the
//! §9 Open Question resolution, a Complete event with no usable monitor
//! emits nothing -- it is not an error, since most conductors carry no
//! monitor at all.

use crate::error::{EngineError, EngineResult};
use crate::state::{Option_, StateDict};
use crate::topology::Topology;
use std::collections::BTreeMap;

const SET_PREFIX: &str = "set:";

/// Renders every rank of `ranks` against `chosen` (the synthesized
/// assignment) into one command string, with ranks separated by a bare
/// `#` marker line so downstream tooling can see the phase boundaries.
pub fn emit_commands(
    topology: &Topology,
    chosen: &BTreeMap<String, Option_>,
    ranks: &[Vec<String>],
) -> EngineResult<String> {
    let full_state: StateDict = chosen.iter().map(|(k, v)| (k.clone(), vec![v.clone()])).collect();

    let mut blocks = Vec::new();
    for rank in ranks {
        let mut lines = Vec::new();
        for node in rank {
            if let Some(name) = node.strip_prefix(SET_PREFIX) {
                lines.push(emit_set(topology, chosen, name)?);
            } else if let Some(line) = emit_complete(topology, chosen, &full_state, node)? {
                lines.push(line);
            }
        }
        if !lines.is_empty() {
            blocks.push(lines.join("\n"));
        }
    }
    Ok(blocks.join("\n#\n"))
}

fn emit_set(topology: &Topology, chosen: &BTreeMap<String, Option_>, name: &str) -> EngineResult<String> {
    let conductor = topology
        .conductors
        .get(name)
        .ok_or_else(|| EngineError::Wire(format!("unknown conductor '{name}'")))?;
    let value = chosen
        .get(name)
        .ok_or_else(|| EngineError::Set(format!("'{name}' has no synthesized value to set")))?;
    let renderer = conductor
        .set_renderer
        .as_ref()
        .ok_or_else(|| EngineError::Set(format!("'{name}' has no set renderer attached")))?;
    Ok(renderer(value))
}

fn emit_complete(
    topology: &Topology,
    chosen: &BTreeMap<String, Option_>,
    full_state: &StateDict,
    name: &str,
) -> EngineResult<Option<String>> {
    let conductor = topology
        .conductors
        .get(name)
        .ok_or_else(|| EngineError::Wire(format!("unknown conductor '{name}'")))?;
    if conductor.monitors.is_empty() {
        return Ok(None);
    }
    let value = chosen
        .get(name)
        .ok_or_else(|| EngineError::Set(format!("'{name}' has no synthesized value to report")))?;

    let usable: Vec<String> = conductor
        .monitors
        .iter()
        .filter_map(|m| {
            let (is_usable, cmd) = m(value, full_state);
            is_usable.then_some(cmd)
        })
        .collect();

    if usable.is_empty() {
        Ok(None)
    } else {
        Ok(Some(usable.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ConductorKind, OutputPin, StatePossibility};
    use crate::state::Dimension;
    use crate::topology::{RendererTable, WireSpec};
    use std::sync::Arc;

    fn build_single_wire_topology(with_monitor: bool) -> Topology {
        let range = vec![vec![Dimension::range(0, 1)]];
        let producer = Component::new("reg", "regulator").with_output(OutputPin {
            name: "vout".into(),
            declared_range: range.clone(),
            kind: ConductorKind::Power,
            possibilities: vec![StatePossibility::simple(
                range.clone(),
                StateDict::new(),
                crate::component::EventFragment::Explicit(Default::default()),
            )],
        });
        let mut consumer = Component::new("load", "load");
        consumer.inputs.push(crate::component::InputPin::new("vin", range.clone(), ConductorKind::Power));

        let mut renderers = RendererTable::new();
        renderers.set("reg", "vout", Arc::new(|v| format!("set vout {:?}", v)));
        if with_monitor {
            renderers.monitor(
                "load",
                "vin",
                Arc::new(|v, _| (true, format!("monitor vout {:?}", v))),
            );
        }

        let wires = vec![WireSpec {
            name: "vout".into(),
            producer: "reg".into(),
            producer_pin: "vout".into(),
            consumers: vec![("load".into(), "vin".into())],
        }];

        Topology::new(vec![producer, consumer], wires, renderers).unwrap()
    }

    #[test]
    fn set_event_renders_through_catalogue_renderer() {
        let topology = build_single_wire_topology(false);
        let mut chosen = BTreeMap::new();
        chosen.insert("vout".to_string(), vec![Dimension::range(1, 1)]);
        let ranks = vec![vec!["set:vout".to_string()]];
        let out = emit_commands(&topology, &chosen, &ranks).unwrap();
        assert!(out.contains("set vout"));
    }

    #[test]
    fn complete_event_without_monitor_emits_nothing() {
        let topology = build_single_wire_topology(false);
        let mut chosen = BTreeMap::new();
        chosen.insert("vout".to_string(), vec![Dimension::range(1, 1)]);
        let ranks = vec![vec!["vout".to_string()]];
        let out = emit_commands(&topology, &chosen, &ranks).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn complete_event_with_monitor_emits_its_command() {
        let topology = build_single_wire_topology(true);
        let mut chosen = BTreeMap::new();
        chosen.insert("vout".to_string(), vec![Dimension::range(1, 1)]);
        let ranks = vec![vec!["vout".to_string()]];
        let out = emit_commands(&topology, &chosen, &ranks).unwrap();
        assert!(out.contains("monitor vout"));
    }
}
