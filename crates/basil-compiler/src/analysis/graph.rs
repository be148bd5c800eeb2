//! CFG graph description for diagnostics
//!
//! A serializable snapshot of a function's CFG with dominator, frontier and
//! loop annotations per block, renderable as Graphviz DOT.

use super::FunctionAnalysis;
use crate::ir::IrFunction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfgNode {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub reachable: bool,
    pub instructions: usize,
    pub terminator: String,
    pub dominators: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idom: Option<String>,
    pub frontier: Vec<String>,
    pub loop_depth: usize,
    pub loop_header: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Forward,
    Back,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfgEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfgDescription {
    pub function: String,
    pub nodes: Vec<CfgNode>,
    pub edges: Vec<CfgEdge>,
}

impl CfgDescription {
    pub fn new(func: &IrFunction, facts: &FunctionAnalysis) -> Self {
        let cfg = &facts.cfg;
        let dom = &facts.dominators;
        let loops = &facts.loops;

        let nodes = func
            .blocks
            .iter()
            .enumerate()
            .map(|(idx, block)| CfgNode {
                id: block.id.to_string(),
                label: block.label.clone(),
                reachable: cfg.is_reachable(idx),
                instructions: block.len(),
                terminator: block.terminator.mnemonic().to_string(),
                dominators: dom.dominator_ids(idx).iter().map(|b| b.to_string()).collect(),
                idom: dom.idom_block(idx).map(|b| b.to_string()),
                frontier: dom.frontier_ids(idx).iter().map(|b| b.to_string()).collect(),
                loop_depth: loops.loop_depth(idx),
                loop_header: loops.is_header(idx),
            })
            .collect();

        let edges = cfg
            .edges()
            .map(|(from, to)| CfgEdge {
                from: cfg.block_id(from).to_string(),
                to: cfg.block_id(to).to_string(),
                kind: if loops.is_back_edge(from, to) {
                    EdgeKind::Back
                } else {
                    EdgeKind::Forward
                },
            })
            .collect();

        Self {
            function: func.name.clone(),
            nodes,
            edges,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Render as a Graphviz digraph
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("digraph \"{}\" {{\n", escape(&self.function)));
        out.push_str("  node [shape=box, fontname=\"monospace\"];\n");
        for node in &self.nodes {
            let mut label = node.id.clone();
            if let Some(l) = &node.label {
                label.push_str(&format!(" ({})", l));
            }
            label.push_str(&format!("\\nidom: {}", node.idom.as_deref().unwrap_or("-")));
            label.push_str(&format!("\\ndom: {{{}}}", node.dominators.join(", ")));
            label.push_str(&format!("\\ndf: {{{}}}", node.frontier.join(", ")));
            if node.loop_depth > 0 {
                label.push_str(&format!("\\nloop depth: {}", node.loop_depth));
            }
            let style = if !node.reachable {
                ", style=dashed"
            } else if node.loop_header {
                ", style=bold"
            } else {
                ""
            };
            out.push_str(&format!(
                "  {} [label=\"{}\"{}];\n",
                node.id,
                escape(&label),
                style
            ));
        }
        for edge in &self.edges {
            let line = match edge.kind {
                EdgeKind::Forward => format!("  {} -> {};\n", edge.from, edge.to),
                EdgeKind::Back => {
                    format!("  {} -> {} [style=dashed, color=red];\n", edge.from, edge.to)
                }
            };
            out.push_str(&line);
        }
        out.push_str("}\n");
        out
    }
}

fn escape(s: &str) -> String {
    s.replace('"', "\\\"")
}
