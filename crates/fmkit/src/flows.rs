//! Flow graphs as data.
//!
//! A [`Flow`] describes nodes and edges for an external orchestration engine. It is
//! built with [`FlowBuilder`], checked for structural problems and exported as JSON
//! or YAML; nothing here executes a flow.

pub mod catalog;
pub mod decisions;
pub mod document;
pub mod user;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use decisions::DecisionTable;
use document::{DocClass, DocProcTask, ExtractionField, ReadingOrder};
use user::UserFlow;

/// Pseudo-node every flow starts from
pub const START: &str = "__start__";
/// Pseudo-node every flow ends at
pub const END: &str = "__end__";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    #[error("Duplicate node name: {0}")]
    DuplicateNode(String),

    #[error("Node name {0} is reserved")]
    ReservedName(String),

    #[error("Edge {from} -> {to} references an unknown node")]
    UnknownNode { from: String, to: String },

    #[error("Branch {branch} targets unknown node {target}")]
    UnknownBranchTarget { branch: String, target: String },

    #[error("Branch {0} has no conditions")]
    EmptyBranch(String),

    #[error("No path leads from __start__ to __end__ in flow {0}")]
    NoPathToEnd(String),

    #[error("Failed to export flow: {0}")]
    Export(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Yaml,
}

/// One outgoing choice of a branch node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    pub to_node: String,
    #[serde(default)]
    pub default: bool,
}

impl BranchCondition {
    pub fn when(expression: impl Into<String>, to_node: impl Into<String>) -> Self {
        Self {
            expression: Some(expression.into()),
            to_node: to_node.into(),
            default: false,
        }
    }

    pub fn otherwise(to_node: impl Into<String>) -> Self {
        Self {
            expression: None,
            to_node: to_node.into(),
            default: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Decisions(DecisionTable),
    DocClassifier {
        llm: String,
        classes: Vec<DocClass>,
    },
    DocExtractor {
        llm: String,
        fields: Vec<ExtractionField>,
        enable_hw: bool,
    },
    DocProc {
        task: DocProcTask,
        document_structure: bool,
        plain_text_reading_order: ReadingOrder,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_map: Option<String>,
        enable_hw: bool,
    },
    Tool {
        tool_name: String,
    },
    Branch {
        conditions: Vec<BranchCondition>,
    },
    UserFlow(UserFlow),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            kind,
            input_schema: None,
            output_schema: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn tool(tool_name: impl Into<String>) -> Self {
        let tool_name = tool_name.into();
        Self::new(tool_name.clone(), NodeKind::Tool { tool_name })
    }

    pub fn branch(name: impl Into<String>, conditions: Vec<BranchCondition>) -> Self {
        Self::new(name, NodeKind::Branch { conditions })
    }

    pub fn doc_classifier(name: impl Into<String>, llm: impl Into<String>, classes: Vec<DocClass>) -> Self {
        Self::new(
            name,
            NodeKind::DocClassifier {
                llm: llm.into(),
                classes,
            },
        )
    }

    pub fn doc_extractor(
        name: impl Into<String>,
        llm: impl Into<String>,
        fields: Vec<ExtractionField>,
        enable_hw: bool,
    ) -> Self {
        Self::new(
            name,
            NodeKind::DocExtractor {
                llm: llm.into(),
                fields,
                enable_hw,
            },
        )
    }

    /// Text extraction with document structure and the default reading order
    pub fn text_extraction(name: impl Into<String>, input_map: Option<String>) -> Self {
        Self::new(
            name,
            NodeKind::DocProc {
                task: DocProcTask::TextExtraction,
                document_structure: true,
                plain_text_reading_order: ReadingOrder::default(),
                input_map,
                enable_hw: true,
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Flow {
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn to_json(&self) -> Result<String, FlowError> {
        serde_json::to_string_pretty(self).map_err(|e| FlowError::Export(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String, FlowError> {
        serde_yaml::to_string(self).map_err(|e| FlowError::Export(e.to_string()))
    }

    pub fn export(&self, format: ExportFormat) -> Result<String, FlowError> {
        match format {
            ExportFormat::Json => self.to_json(),
            ExportFormat::Yaml => self.to_yaml(),
        }
    }

    /// Check node names, edge endpoints, branch targets and that the end is reachable
    pub fn validate(&self) -> Result<(), FlowError> {
        let mut names = HashSet::new();
        for node in &self.nodes {
            if node.name == START || node.name == END {
                return Err(FlowError::ReservedName(node.name.clone()));
            }
            if !names.insert(node.name.as_str()) {
                return Err(FlowError::DuplicateNode(node.name.clone()));
            }
        }

        let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            let from_known = edge.from == START || names.contains(edge.from.as_str());
            let to_known = edge.to == END || names.contains(edge.to.as_str());
            if !from_known || !to_known {
                return Err(FlowError::UnknownNode {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                });
            }
            successors.entry(&edge.from).or_default().push(&edge.to);
        }

        for node in &self.nodes {
            match &node.kind {
                NodeKind::Branch { conditions } => {
                    if conditions.is_empty() {
                        return Err(FlowError::EmptyBranch(node.name.clone()));
                    }
                    for condition in conditions {
                        let target = condition.to_node.as_str();
                        if target != END && !names.contains(target) {
                            return Err(FlowError::UnknownBranchTarget {
                                branch: node.name.clone(),
                                target: target.to_string(),
                            });
                        }
                        successors.entry(&node.name).or_default().push(target);
                    }
                }
                NodeKind::UserFlow(user_flow) => user_flow.validate(&node.name)?,
                _ => {}
            }
        }

        if !reaches(&successors, START, END) {
            return Err(FlowError::NoPathToEnd(self.name.clone()));
        }
        Ok(())
    }
}

/// Breadth-first reachability over a successor map
pub(crate) fn reaches(successors: &HashMap<&str, Vec<&str>>, from: &str, to: &str) -> bool {
    let mut seen = HashSet::from([from]);
    let mut queue = VecDeque::from([from]);
    while let Some(current) = queue.pop_front() {
        if current == to {
            return true;
        }
        for &next in successors.get(current).into_iter().flatten() {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    false
}

/// Assembles a [`Flow`] node by node; `build` validates the result
pub struct FlowBuilder {
    flow: Flow,
}

impl FlowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            flow: Flow {
                name: name.into(),
                display_name: None,
                description: None,
                input_schema: None,
                output_schema: None,
                nodes: Vec::new(),
                edges: Vec::new(),
            },
        }
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.flow.display_name = Some(display_name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.flow.description = Some(description.into());
        self
    }

    pub fn input_schema(mut self, schema: Value) -> Self {
        self.flow.input_schema = Some(schema);
        self
    }

    pub fn output_schema(mut self, schema: Value) -> Self {
        self.flow.output_schema = Some(schema);
        self
    }

    pub fn node(mut self, node: Node) -> Self {
        self.flow.nodes.push(node);
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.flow.edges.push(Edge::new(from, to));
        self
    }

    /// Chain the named nodes with edges, in order
    pub fn sequence(mut self, names: &[&str]) -> Self {
        for pair in names.windows(2) {
            self.flow.edges.push(Edge::new(pair[0], pair[1]));
        }
        self
    }

    pub fn build(self) -> Result<Flow, FlowError> {
        self.flow.validate()?;
        Ok(self.flow)
    }
}
