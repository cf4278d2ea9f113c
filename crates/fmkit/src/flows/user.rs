use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::{reaches, Edge, FlowError, END, START};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Shown to the user
    Output,
    /// Collected from the user
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    File,
    Number,
    List,
}

/// Binds a field input to an expression evaluated by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub target_variable: String,
    pub value_expression: String,
}

impl Assignment {
    pub fn new(target_variable: impl Into<String>, value_expression: impl Into<String>) -> Self {
        Self {
            target_variable: target_variable.into(),
            value_expression: value_expression.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserField {
    pub name: String,
    pub display_name: String,
    pub direction: Direction,
    pub kind: FieldKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_map: Vec<Assignment>,
}

impl UserField {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        direction: Direction,
        kind: FieldKind,
        text: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            direction,
            kind,
            text: text.into(),
            input_map: Vec::new(),
        }
    }

    pub fn output(
        name: impl Into<String>,
        display_name: impl Into<String>,
        kind: FieldKind,
        text: impl Into<String>,
    ) -> Self {
        Self::new(name, display_name, Direction::Output, kind, text)
    }

    pub fn input(
        name: impl Into<String>,
        display_name: impl Into<String>,
        kind: FieldKind,
        text: impl Into<String>,
    ) -> Self {
        Self::new(name, display_name, Direction::Input, kind, text)
    }

    pub fn with_assignment(mut self, assignment: Assignment) -> Self {
        self.input_map.push(assignment);
        self
    }
}

/// An interactive sub-flow: fields shown to or collected from the user, in
/// the order given by its own edges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserFlow {
    pub fields: Vec<UserField>,
    pub edges: Vec<Edge>,
}

impl UserFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: UserField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge::new(from, to));
        self
    }

    /// Chain every field from start to end in declaration order
    pub fn sequential(mut self) -> Self {
        let mut names = vec![START.to_string()];
        names.extend(self.fields.iter().map(|field| field.name.clone()));
        names.push(END.to_string());
        for pair in names.windows(2) {
            self.edges.push(Edge::new(pair[0].clone(), pair[1].clone()));
        }
        self
    }

    /// Same structural rules as a flow, with field names qualified by the
    /// owning node in errors
    pub fn validate(&self, node_name: &str) -> Result<(), FlowError> {
        let qualify = |name: &str| format!("{}.{}", node_name, name);

        let mut names = HashSet::new();
        for field in &self.fields {
            if field.name == START || field.name == END {
                return Err(FlowError::ReservedName(qualify(&field.name)));
            }
            if !names.insert(field.name.as_str()) {
                return Err(FlowError::DuplicateNode(qualify(&field.name)));
            }
        }

        let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            let from_known = edge.from == START || names.contains(edge.from.as_str());
            let to_known = edge.to == END || names.contains(edge.to.as_str());
            if !from_known || !to_known {
                return Err(FlowError::UnknownNode {
                    from: qualify(&edge.from),
                    to: qualify(&edge.to),
                });
            }
            successors.entry(&edge.from).or_default().push(&edge.to);
        }

        if !reaches(&successors, START, END) {
            return Err(FlowError::NoPathToEnd(node_name.to_string()));
        }
        Ok(())
    }
}
