//! Graph export for resolved wiring graphs.
//!
//! Converts a [`ResolutionGraph`] into a flat node/edge structure that
//! tooling can render: Graphviz DOT, Mermaid, or JSON. The JSON form is
//! produced by `serde_json` when the `graph-export` feature is enabled and
//! by a small hand-written encoder otherwise.

use std::collections::{BTreeMap, HashSet};

#[cfg(feature = "graph-export")]
use serde::{Deserialize, Serialize};

use crate::error::InjectResult;
use crate::result::{DependencyTarget, NodeKind, ResolutionGraph, ResolutionNode};

/// Id of the synthetic node standing for "use the parameter's default".
pub const DEFAULT_NODE_ID: &str = "default";

/// Id of the synthetic node the top-level requests hang off.
pub const ROOT_NODE_ID: &str = "root";

/// A resolved node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct GraphNode {
    pub id: String,
    /// Rendered type the node satisfies
    pub type_name: String,
    pub kind: NodeCategory,
    /// Chosen callable for callable nodes
    pub candidate: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub enum NodeCategory {
    Root,
    Callable,
    SetAggregate,
    MapAggregate,
    FunctionProvider,
    Default,
}

impl NodeCategory {
    fn of(node: &ResolutionNode) -> Self {
        match node.kind {
            NodeKind::Callable { .. } => NodeCategory::Callable,
            NodeKind::SetAggregate { .. } => NodeCategory::SetAggregate,
            NodeKind::MapAggregate { .. } => NodeCategory::MapAggregate,
            NodeKind::FunctionProvider { .. } => NodeCategory::FunctionProvider,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NodeCategory::Root => "root",
            NodeCategory::Callable => "callable",
            NodeCategory::SetAggregate => "set",
            NodeCategory::MapAggregate => "map",
            NodeCategory::FunctionProvider => "function",
            NodeCategory::Default => "default",
        }
    }
}

/// Edge from a dependent node to what it depends on.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    /// Parameter name for parameter edges
    pub parameter: Option<String>,
    pub dependency_type: DependencyType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub enum DependencyType {
    /// Injected parameter satisfied by a node
    Required,
    /// Injected parameter left to its default value
    Defaulted,
    /// Member of a set or map aggregate
    Element,
    /// Result of a function provider
    ProviderResult,
}

/// Exportable view of a resolution graph.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub metadata: GraphMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct GraphMetadata {
    pub root_count: usize,
    pub callable_count: usize,
    pub aggregate_count: usize,
    pub function_provider_count: usize,
    pub default_count: usize,
    pub version: String,
}

/// Graph export configuration options.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Include the synthetic root node and its edges
    pub include_roots: bool,
    /// Include the synthetic default node and edges to it
    pub include_defaults: bool,
    /// Include per-node metadata (scope, parameters)
    pub include_metadata: bool,
    /// Only render nodes whose type is listed (empty = all)
    pub type_filter: HashSet<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_roots: true,
            include_defaults: true,
            include_metadata: true,
            type_filter: HashSet::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    /// Graphviz
    Dot,
    Mermaid,
}

/// Renders a [`DependencyGraph`] in a given format.
pub trait GraphExporter {
    fn export(&self, graph: &DependencyGraph, format: ExportFormat, options: &ExportOptions) -> InjectResult<String>;
}

/// Exporter for the built-in formats.
#[derive(Debug, Default)]
pub struct DefaultGraphExporter;

impl GraphExporter for DefaultGraphExporter {
    fn export(&self, graph: &DependencyGraph, format: ExportFormat, options: &ExportOptions) -> InjectResult<String> {
        match format {
            ExportFormat::Json => self.export_json(graph),
            ExportFormat::Dot => Ok(self.export_dot(graph, options)),
            ExportFormat::Mermaid => Ok(self.export_mermaid(graph, options)),
        }
    }
}

impl DefaultGraphExporter {
    fn export_json(&self, graph: &DependencyGraph) -> InjectResult<String> {
        #[cfg(feature = "graph-export")]
        {
            serde_json::to_string_pretty(graph).map_err(|e| crate::error::InjectError::Export(e.to_string()))
        }
        #[cfg(not(feature = "graph-export"))]
        {
            Ok(manual_json(graph))
        }
    }

    fn export_dot(&self, graph: &DependencyGraph, options: &ExportOptions) -> String {
        let mut output = String::new();
        output.push_str("digraph ResolutionGraph {\n");
        output.push_str("  rankdir=TB;\n");
        output.push_str("  node [shape=box];\n\n");

        let shown = visible_ids(graph, options);
        for node in graph.nodes.iter().filter(|n| shown.contains(n.id.as_str())) {
            let (shape, color) = match node.kind {
                NodeCategory::Root => ("circle", "white"),
                NodeCategory::Callable => ("box", "lightblue"),
                NodeCategory::SetAggregate | NodeCategory::MapAggregate => ("folder", "lightgreen"),
                NodeCategory::FunctionProvider => ("component", "lightyellow"),
                NodeCategory::Default => ("plaintext", "white"),
            };
            let label = match &node.candidate {
                Some(candidate) => format!("{}\\n{}", escape(&node.type_name), escape(candidate)),
                None => escape(&node.type_name),
            };
            output.push_str(&format!(
                "  \"{}\" [label=\"{}\", shape={}, fillcolor={}, style=filled];\n",
                node.id, label, shape, color
            ));
        }
        output.push('\n');

        for edge in graph
            .edges
            .iter()
            .filter(|e| shown.contains(e.from.as_str()) && shown.contains(e.to.as_str()))
        {
            let style = match edge.dependency_type {
                DependencyType::Required => "solid",
                DependencyType::Defaulted => "dashed",
                DependencyType::Element => "bold",
                DependencyType::ProviderResult => "dotted",
            };
            match &edge.parameter {
                Some(parameter) => output.push_str(&format!(
                    "  \"{}\" -> \"{}\" [style={}, label=\"{}\"];\n",
                    edge.from,
                    edge.to,
                    style,
                    escape(parameter)
                )),
                None => output.push_str(&format!("  \"{}\" -> \"{}\" [style={}];\n", edge.from, edge.to, style)),
            }
        }

        output.push_str("}\n");
        output
    }

    fn export_mermaid(&self, graph: &DependencyGraph, options: &ExportOptions) -> String {
        let mut output = String::new();
        output.push_str("graph TD\n");

        let shown = visible_ids(graph, options);
        for node in graph.nodes.iter().filter(|n| shown.contains(n.id.as_str())) {
            let text = mermaid_text(&node.type_name);
            let shape = match node.kind {
                NodeCategory::Root => format!("{}(({}))", node.id, text),
                NodeCategory::SetAggregate | NodeCategory::MapAggregate => format!("{}[[\"{}\"]]", node.id, text),
                NodeCategory::FunctionProvider => format!("{}>\"{}\"]", node.id, text),
                NodeCategory::Default => format!("{}(\"{}\")", node.id, text),
                NodeCategory::Callable => format!("{}[\"{}\"]", node.id, text),
            };
            output.push_str(&format!("  {}\n", shape));
        }

        for edge in graph
            .edges
            .iter()
            .filter(|e| shown.contains(e.from.as_str()) && shown.contains(e.to.as_str()))
        {
            let arrow = match edge.dependency_type {
                DependencyType::Defaulted => "-.->",
                DependencyType::Element => "==>",
                _ => "-->",
            };
            match &edge.parameter {
                Some(parameter) => output.push_str(&format!(
                    "  {} {}|{}| {}\n",
                    edge.from,
                    arrow,
                    mermaid_text(parameter),
                    edge.to
                )),
                None => output.push_str(&format!("  {} {} {}\n", edge.from, arrow, edge.to)),
            }
        }
        output
    }
}

fn visible_ids<'g>(graph: &'g DependencyGraph, options: &ExportOptions) -> HashSet<&'g str> {
    graph
        .nodes
        .iter()
        .filter(|n| match n.kind {
            NodeCategory::Root => options.include_roots,
            NodeCategory::Default => options.include_defaults,
            _ => options.type_filter.is_empty() || options.type_filter.contains(&n.type_name),
        })
        .map(|n| n.id.as_str())
        .collect()
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn mermaid_text(text: &str) -> String {
    text.replace('"', "#quot;").replace('<', "#lt;").replace('>', "#gt;")
}

#[cfg(not(feature = "graph-export"))]
fn manual_json(graph: &DependencyGraph) -> String {
    fn string(value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('"');
        for c in value.chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
        }
        out.push('"');
        out
    }
    fn optional(value: &Option<String>) -> String {
        value.as_deref().map(string).unwrap_or_else(|| "null".to_string())
    }

    let mut json = String::from("{\n  \"nodes\": [");
    for (i, node) in graph.nodes.iter().enumerate() {
        json.push_str(if i > 0 { ",\n" } else { "\n" });
        let metadata: Vec<String> = node
            .metadata
            .iter()
            .map(|(k, v)| format!("{}: {}", string(k), string(v)))
            .collect();
        json.push_str(&format!(
            "    {{\"id\": {}, \"type_name\": {}, \"kind\": {}, \"candidate\": {}, \"metadata\": {{{}}}}}",
            string(&node.id),
            string(&node.type_name),
            string(&format!("{:?}", node.kind)),
            optional(&node.candidate),
            metadata.join(", ")
        ));
    }
    json.push_str("\n  ],\n  \"edges\": [");
    for (i, edge) in graph.edges.iter().enumerate() {
        json.push_str(if i > 0 { ",\n" } else { "\n" });
        json.push_str(&format!(
            "    {{\"from\": {}, \"to\": {}, \"parameter\": {}, \"dependency_type\": {}}}",
            string(&edge.from),
            string(&edge.to),
            optional(&edge.parameter),
            string(&format!("{:?}", edge.dependency_type))
        ));
    }
    let m = &graph.metadata;
    json.push_str(&format!(
        "\n  ],\n  \"metadata\": {{\"root_count\": {}, \"callable_count\": {}, \"aggregate_count\": {}, \
         \"function_provider_count\": {}, \"default_count\": {}, \"version\": {}}}\n}}",
        m.root_count,
        m.callable_count,
        m.aggregate_count,
        m.function_provider_count,
        m.default_count,
        string(&m.version)
    ));
    json
}

/// Builds [`DependencyGraph`]s from resolution graphs and exports them.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{
///     AnalysisSession, CallableDescriptor, ExportFormat, GraphBuilder, InMemoryCatalog,
///     ResolutionScope, Resolver, ScopeRef, TypeDescriptor,
/// };
///
/// let catalog = InMemoryCatalog::builder()
///     .provide(ScopeRef::Global, CallableDescriptor::class("app.Repo"))
///     .provide(ScopeRef::File("main.kt".into()), CallableDescriptor::class("app.Api").needs("repo", TypeDescriptor::named("app.Repo")))
///     .build();
/// let session = AnalysisSession::from_catalog(catalog);
/// let api = session.injectables(&ScopeRef::File("main.kt".into())).unwrap()[0].clone();
/// let scope = ResolutionScope::global(&session).unwrap();
/// let result = Resolver::new(session).resolve(&api.requests(), &scope, &api).unwrap();
///
/// let dot = GraphBuilder::new()
///     .build_and_export(result.graph().unwrap(), ExportFormat::Dot)
///     .unwrap();
/// assert!(dot.starts_with("digraph ResolutionGraph {"));
/// assert!(dot.contains("\"root\" -> \"n0\""));
/// ```
pub struct GraphBuilder {
    options: ExportOptions,
    exporter: Box<dyn GraphExporter>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            options: ExportOptions::default(),
            exporter: Box::new(DefaultGraphExporter),
        }
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_exporter(mut self, exporter: Box<dyn GraphExporter>) -> Self {
        self.exporter = exporter;
        self
    }

    /// Flattens `resolution` into nodes `n0..` in completion order plus the
    /// synthetic root and default nodes
    pub fn build_graph(&self, resolution: &ResolutionGraph) -> DependencyGraph {
        let mut nodes = Vec::with_capacity(resolution.len() + 2);
        let mut edges = Vec::new();
        let mut metadata = GraphMetadata {
            root_count: resolution.roots().len(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..GraphMetadata::default()
        };

        nodes.push(GraphNode {
            id: ROOT_NODE_ID.to_string(),
            type_name: ROOT_NODE_ID.to_string(),
            kind: NodeCategory::Root,
            candidate: None,
            metadata: BTreeMap::new(),
        });
        for root in resolution.roots() {
            edges.push(edge(ROOT_NODE_ID.to_string(), root.target, Some(root.request.parameter_name.as_ref())));
        }

        for node in resolution.nodes() {
            let kind = NodeCategory::of(node);
            let mut node_metadata = BTreeMap::new();
            if self.options.include_metadata {
                node_metadata.insert("scope".to_string(), node.scope.to_string());
            }
            let from = node_id(node);
            match &node.kind {
                NodeKind::Callable { dependencies, .. } => {
                    metadata.callable_count += 1;
                    for dependency in dependencies {
                        edges.push(edge(from.clone(), dependency.target, Some(dependency.request.parameter_name.as_ref())));
                    }
                }
                NodeKind::SetAggregate { elements: members } | NodeKind::MapAggregate { entries: members } => {
                    metadata.aggregate_count += 1;
                    for member in members {
                        edges.push(GraphEdge {
                            from: from.clone(),
                            to: format!("n{}", member.index()),
                            parameter: None,
                            dependency_type: DependencyType::Element,
                        });
                    }
                }
                NodeKind::FunctionProvider { parameters, result } => {
                    metadata.function_provider_count += 1;
                    if self.options.include_metadata {
                        let rendered: Vec<String> = parameters.iter().map(|p| p.render()).collect();
                        node_metadata.insert("parameters".to_string(), rendered.join(", "));
                    }
                    let mut result_edge = edge(from.clone(), result.target, None);
                    if result_edge.dependency_type == DependencyType::Required {
                        result_edge.dependency_type = DependencyType::ProviderResult;
                    }
                    edges.push(result_edge);
                }
            }
            nodes.push(GraphNode {
                id: from,
                type_name: node.ty.render(),
                kind,
                candidate: node.candidate().map(|c| c.id.to_string()),
                metadata: node_metadata,
            });
        }

        metadata.default_count = edges
            .iter()
            .filter(|e| e.dependency_type == DependencyType::Defaulted)
            .count();
        if metadata.default_count > 0 {
            nodes.push(GraphNode {
                id: DEFAULT_NODE_ID.to_string(),
                type_name: DEFAULT_NODE_ID.to_string(),
                kind: NodeCategory::Default,
                candidate: None,
                metadata: BTreeMap::new(),
            });
        }

        DependencyGraph { nodes, edges, metadata }
    }

    pub fn export(&self, graph: &DependencyGraph, format: ExportFormat) -> InjectResult<String> {
        self.exporter.export(graph, format, &self.options)
    }

    pub fn build_and_export(&self, resolution: &ResolutionGraph, format: ExportFormat) -> InjectResult<String> {
        let graph = self.build_graph(resolution);
        self.export(&graph, format)
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn node_id(node: &ResolutionNode) -> String {
    format!("n{}", node.id.index())
}

fn edge(from: String, target: DependencyTarget, parameter: Option<&str>) -> GraphEdge {
    let (to, dependency_type) = match target {
        DependencyTarget::Node(id) => (format!("n{}", id.index()), DependencyType::Required),
        DependencyTarget::Default => (DEFAULT_NODE_ID.to_string(), DependencyType::Defaulted),
    };
    GraphEdge {
        from,
        to,
        parameter: parameter.map(str::to_string),
        dependency_type,
    }
}

/// One-call helpers with default options.
pub mod exports {
    use super::*;

    pub fn to_json(graph: &ResolutionGraph) -> InjectResult<String> {
        GraphBuilder::new().build_and_export(graph, ExportFormat::Json)
    }

    pub fn to_dot(graph: &ResolutionGraph) -> InjectResult<String> {
        GraphBuilder::new().build_and_export(graph, ExportFormat::Dot)
    }

    pub fn to_mermaid(graph: &ResolutionGraph) -> InjectResult<String> {
        GraphBuilder::new().build_and_export(graph, ExportFormat::Mermaid)
    }
}
