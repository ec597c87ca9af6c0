// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subcommand implementations.

use anyhow::Context;
use clap::Args;
use nodeflow_graph::models::{create_math_registry, NumberDisplayModel, NumberSourceModel, VariadicSumModel};
use nodeflow_graph::{Anchor, Connection, Graph, GraphSettings, NodeId, Point, PortDirection};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Arguments naming a graph document
#[derive(Args)]
pub struct FileArgs {
    /// Graph document
    pub file: PathBuf,
}

/// Arguments of the demo command
#[derive(Args)]
pub struct DemoArgs {
    /// Output path; the configured extension is appended when missing
    pub file: PathBuf,
}

/// Arguments of the set command
#[derive(Args)]
pub struct SetArgs {
    /// Graph document
    pub file: PathBuf,
    /// ID of a number source node
    pub node: uuid::Uuid,
    /// New number
    #[arg(allow_negative_numbers = true)]
    pub value: f64,
}

/// Arguments of the remove command
#[derive(Args)]
pub struct RemoveArgs {
    /// Graph document
    pub file: PathBuf,
    /// ID of the node to remove
    pub node: uuid::Uuid,
}

fn new_graph(settings: GraphSettings) -> Graph {
    Graph::with_settings(Rc::new(create_math_registry()), settings)
}

fn open(path: &Path, settings: GraphSettings) -> anyhow::Result<Graph> {
    let mut graph = new_graph(settings);
    graph
        .load_from_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    Ok(graph)
}

fn write_back(graph: &Graph, path: &Path) -> anyhow::Result<()> {
    std::fs::write(path, graph.save_to_memory()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Saved graph to {}", path.display());
    Ok(())
}

/// Sample graph: `6 / 3` shown on one display, `6 + 3 + 6 / 3` on another
pub fn build_demo(graph: &mut Graph) -> anyhow::Result<()> {
    let six = graph.create_node(Box::new(NumberSourceModel::with_value(6.0)));
    let three = graph.create_node(Box::new(NumberSourceModel::with_value(3.0)));
    let divide = graph.create_node_by_name("Division")?;
    let quotient = graph.create_node(Box::new(NumberDisplayModel::default()));
    let sum = graph.create_node(Box::new(VariadicSumModel::default()));
    let total = graph.create_node(Box::new(NumberDisplayModel::default()));

    graph.update_model::<VariadicSumModel, _>(sum, |model, signals| model.set_input_count(3, signals))?;

    let layout = [
        (six, 0.0, 0.0),
        (three, 0.0, 120.0),
        (divide, 200.0, 60.0),
        (quotient, 400.0, 0.0),
        (sum, 400.0, 160.0),
        (total, 600.0, 160.0),
    ];
    for (id, x, y) in layout {
        graph.set_node_position(id, Point::new(x, y))?;
    }

    graph.create_connection(divide, 0, six, 0)?;
    graph.create_connection(divide, 1, three, 0)?;
    graph.create_connection(quotient, 0, divide, 0)?;
    graph.create_connection(sum, 0, six, 0)?;
    graph.create_connection(sum, 1, three, 0)?;
    graph.create_connection(sum, 2, divide, 0)?;
    graph.create_connection(total, 0, sum, 0)?;

    graph.anchors[0] = Anchor {
        position: Point::new(300.0, 80.0),
        scale: 1.0,
    };
    graph.update_history()?;
    Ok(())
}

fn value_summary(graph: &Graph, id: NodeId) -> String {
    if let Some(display) = graph.model::<NumberDisplayModel>(id) {
        return display.value().map_or_else(|| "-".to_string(), |v| v.to_string());
    }
    let Some(node) = graph.node(id) else {
        return String::new();
    };
    (0..node.port_count(PortDirection::Output))
        .map(|port| node.out_data(port).map_or_else(|| "-".to_string(), |v| v.to_string()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One line per node, in dependency order: caption, ID and current values
pub fn evaluate(graph: &Graph) -> anyhow::Result<Vec<String>> {
    let order = graph.dependency_order()?;
    Ok(order
        .into_iter()
        .filter_map(|id| {
            let node = graph.node(id)?;
            Some(format!("{} [{id}] = {}", node.model().caption(), value_summary(graph, id)))
        })
        .collect())
}

/// Human-readable listing of nodes, connections, groups and anchors
pub fn describe(graph: &Graph) -> Vec<String> {
    let order = match graph.dependency_order() {
        Ok(order) => order,
        Err(err) => {
            tracing::warn!("{err}; listing nodes in registry order");
            graph.node_ids().collect()
        }
    };

    let mut lines = vec![format!("Nodes ({}):", graph.node_count())];
    for id in order {
        if let Some(node) = graph.node(id) {
            lines.push(format!(
                "  {id}  {:<14} in={} out={} at ({}, {})",
                node.model().name(),
                node.port_count(PortDirection::Input),
                node.port_count(PortDirection::Output),
                node.position.x,
                node.position.y,
            ));
        }
    }

    lines.push(format!("Connections ({}):", graph.connection_count()));
    for record in graph.connections().filter_map(Connection::save) {
        lines.push(format!(
            "  {}:{} -> {}:{}",
            record.out_id, record.out_index, record.in_id, record.in_index
        ));
    }

    if graph.group_count() > 0 {
        lines.push(format!("Groups ({}):", graph.group_count()));
        for group in graph.groups() {
            let members: Vec<String> = group.nodes().map(|id| id.to_string()).collect();
            lines.push(format!("  {}: {}", group.id().0, members.join(", ")));
        }
    }

    let anchors: Vec<_> = graph
        .anchors
        .iter()
        .enumerate()
        .filter(|(_, anchor)| **anchor != Anchor::default())
        .collect();
    if !anchors.is_empty() {
        lines.push("Anchors:".to_string());
        for (slot, anchor) in anchors {
            lines.push(format!(
                "  {slot}: ({}, {}) x{}",
                anchor.position.x, anchor.position.y, anchor.scale
            ));
        }
    }
    lines
}

/// Run the demo command
pub fn demo(args: DemoArgs, settings: GraphSettings) -> anyhow::Result<()> {
    let mut graph = new_graph(settings);
    build_demo(&mut graph)?;
    let path = graph.save_to_file(&args.file)?;
    println!("Wrote {} ({} nodes)", path.display(), graph.node_count());
    Ok(())
}

/// Run the inspect command
pub fn inspect(args: FileArgs, settings: GraphSettings) -> anyhow::Result<()> {
    let graph = open(&args.file, settings)?;
    for line in describe(&graph) {
        println!("{line}");
    }
    Ok(())
}

/// Run the eval command
pub fn eval(args: FileArgs, settings: GraphSettings) -> anyhow::Result<()> {
    let graph = open(&args.file, settings)?;
    for line in evaluate(&graph)? {
        println!("{line}");
    }
    Ok(())
}

/// Run the set command
pub fn set(args: SetArgs, settings: GraphSettings) -> anyhow::Result<()> {
    let mut graph = open(&args.file, settings)?;
    let node = NodeId(args.node);
    graph
        .update_model::<NumberSourceModel, _>(node, |model, signals| model.set_number(args.value, signals))
        .with_context(|| format!("Cannot set a number on node {node}"))?;
    write_back(&graph, &args.file)?;

    for line in evaluate(&graph)? {
        println!("{line}");
    }
    Ok(())
}

/// Run the remove command
pub fn remove(args: RemoveArgs, settings: GraphSettings) -> anyhow::Result<()> {
    let mut graph = open(&args.file, settings)?;
    let node = NodeId(args.node);
    let severed = graph.connections_for_node(node).count();
    graph.remove_node(node)?;
    write_back(&graph, &args.file)?;
    println!("Removed node {node} and {severed} connection(s)");
    Ok(())
}
