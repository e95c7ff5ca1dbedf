//! Platform-description loader (spec §6, §10.2): a JSON document with
//! `nodes` and `wires` arrays mirroring the node/wire tuple shapes of the
//! distilled spec, resolved into a [`Topology`] via the demonstration
//! catalogue in [`crate::catalogue`].

use anyhow::{Context, Result};
use powerseq_engine::topology::{RendererTable, Topology, WireSpec};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct PlatformDescription {
    pub nodes: Vec<NodeSpec>,
    pub wires: Vec<WireDescription>,
}

/// One node tuple: `(name, bus_addr, class, class-args)`. `args` is a
/// loosely-typed JSON object; each catalogue class picks out the keys it
/// understands and falls back to sensible defaults for the rest, matching
/// the original tool's keyword-argument class constructors.
#[derive(Debug, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default)]
    pub bus_addr: Option<String>,
    pub class: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// One wire tuple: `(name, producer-name, producer-pin, {(consumer-name,
/// consumer-pin)})`.
#[derive(Debug, Deserialize)]
pub struct WireDescription {
    pub name: String,
    pub producer: String,
    pub producer_pin: String,
    pub consumers: Vec<ConsumerPin>,
}

#[derive(Debug, Deserialize)]
pub struct ConsumerPin {
    pub node: String,
    pub pin: String,
}

pub fn load(path: &Path) -> Result<PlatformDescription> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading platform description '{}'", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("parsing platform description '{}'", path.display()))
}

/// Resolves every node's `class` against the demonstration catalogue and
/// assembles the wire list into a concrete [`Topology`] (spec §4.2 step
/// 1-4).
pub fn build_topology(description: &PlatformDescription) -> Result<Topology> {
    let mut renderers = RendererTable::new();
    let components = description
        .nodes
        .iter()
        .map(|node| crate::catalogue::instantiate(node, &mut renderers))
        .collect::<Result<Vec<_>>>()?;

    let wires = description
        .wires
        .iter()
        .map(|w| WireSpec {
            name: w.name.clone(),
            producer: w.producer.clone(),
            producer_pin: w.producer_pin.clone(),
            consumers: w.consumers.iter().map(|c| (c.node.clone(), c.pin.clone())).collect(),
        })
        .collect();

    Ok(Topology::new(components, wires, renderers)?)
}
