//! # CLI Command Implementations
//!
//! Each command loads the graph document into a fresh session, works through
//! the session's indexers or query resolver, and writes the document back
//! when it changed something.

use super::{EntityArg, ReduceArg};
use crate::config::Settings;
use crate::document::GraphDocument;
use crate::error::CliError;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info};
use trellis_core::query::{Comparison, Filter, Projection, Reduction};
use trellis_core::{
    Attribute, AttributeSelector, Edge, Entity, EntityKey, EntityKind, Node, Plugin, Query,
    QueryDescriptor, QueryResult, Selector, Session, TracingPlugin, Value,
};

// =============================================================================
// SESSION LOADING
// =============================================================================

/// Load the configured graph document into a session.
///
/// A missing document is an empty graph. With `audit` set the session carries
/// a [`TracingPlugin`].
pub fn load_session(settings: &Settings) -> Result<Session, CliError> {
    let document = if settings.graph.exists() {
        GraphDocument::load(&settings.graph)?
    } else {
        debug!(graph = %settings.graph.display(), "graph document absent, starting empty");
        GraphDocument::default()
    };
    let mut plugins: Vec<Box<dyn Plugin>> = Vec::new();
    if settings.audit {
        plugins.push(Box::new(TracingPlugin));
    }
    document.into_session(plugins)
}

/// Write the session back, or print it on a dry run.
pub fn persist(session: &Session, settings: &Settings, dry_run: bool) -> Result<(), CliError> {
    let document = GraphDocument::from_session(session)?;
    if dry_run {
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }
    document.save(&settings.graph)?;
    info!(graph = %settings.graph.display(), "graph document saved");
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create an empty graph document.
pub fn cmd_init(settings: &Settings, force: bool) -> Result<(), CliError> {
    if settings.graph.exists() && !force {
        return Err(CliError::Argument(format!(
            "{} already exists, use --force to overwrite",
            settings.graph.display()
        )));
    }
    GraphDocument::default().save(&settings.graph)?;
    info!(graph = %settings.graph.display(), "initialized empty graph document");
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show entity and group counts.
pub fn cmd_status(settings: &Settings) -> Result<(), CliError> {
    let session = load_session(settings)?;

    let mut groups = serde_json::Map::new();
    for group in session.groups() {
        groups.insert(
            group.to_string(),
            serde_json::json!({
                "nodes": session.nodes_in_group(&group)?.len(),
                "edges": session.edges_in_group(&group)?.len(),
            }),
        );
    }

    if settings.json_mode {
        let output = serde_json::json!({
            "graph": settings.graph.to_string_lossy(),
            "node_count": session.node_count(),
            "edge_count": session.edge_count(),
            "groups": groups,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Trellis Graph Status");
    println!("====================");
    println!("Graph:  {}", settings.graph.display());
    println!();
    println!("Nodes:  {}", session.node_count());
    println!("Edges:  {}", session.edge_count());
    println!("Groups: {}", groups.len());
    for (name, counts) in &groups {
        println!(
            "  {}: {} nodes, {} edges",
            name, counts["nodes"], counts["edges"]
        );
    }

    Ok(())
}

// =============================================================================
// INDEXER COMMANDS
// =============================================================================

/// Read attributes through the node or edge indexer.
pub fn cmd_get(
    settings: &Settings,
    entity: EntityArg,
    selector: &str,
    attributes: &str,
) -> Result<(), CliError> {
    let mut session = load_session(settings)?;
    let found = match entity {
        EntityArg::Node => lookup::<Node>(&mut session, selector, attributes)?,
        EntityArg::Edge => lookup::<Edge>(&mut session, selector, attributes)?,
    };
    emit(settings, &found)
}

/// Create or overwrite attributes, then persist.
pub fn cmd_set(
    settings: &Settings,
    entity: EntityArg,
    selector: &str,
    attributes: &str,
    value: &str,
    dry_run: bool,
) -> Result<(), CliError> {
    let mut session = load_session(settings)?;
    let value = parse_value(value);
    debug!(?entity, selector, attributes, %value, "set");
    match entity {
        EntityArg::Node => assign::<Node>(&mut session, selector, attributes, value)?,
        EntityArg::Edge => assign::<Edge>(&mut session, selector, attributes, value)?,
    }
    persist(&session, settings, dry_run)
}

/// Remove attributes, then persist.
pub fn cmd_delete(
    settings: &Settings,
    entity: EntityArg,
    selector: &str,
    attributes: &str,
    dry_run: bool,
) -> Result<(), CliError> {
    let mut session = load_session(settings)?;
    debug!(?entity, selector, attributes, "delete");
    match entity {
        EntityArg::Node => remove::<Node>(&mut session, selector, attributes)?,
        EntityArg::Edge => remove::<Edge>(&mut session, selector, attributes)?,
    }
    persist(&session, settings, dry_run)
}

fn lookup<E: Entity>(
    session: &mut Session,
    selector: &str,
    attributes: &str,
) -> Result<JsonValue, CliError>
where
    E::Index: Serialize,
{
    let selector: Selector<E> = selector.parse()?;
    let attributes: AttributeSelector = attributes.parse()?;
    let found = session.indexer::<E>().get(selector, attributes)?;
    Ok(serde_json::to_value(found)?)
}

fn assign<E: Entity>(
    session: &mut Session,
    selector: &str,
    attributes: &str,
    value: Value,
) -> Result<(), CliError> {
    let selector: Selector<E> = selector.parse()?;
    let attributes: AttributeSelector = attributes.parse()?;
    Ok(session.indexer::<E>().set(selector, attributes, value)?)
}

fn remove<E: Entity>(
    session: &mut Session,
    selector: &str,
    attributes: &str,
) -> Result<(), CliError> {
    let selector: Selector<E> = selector.parse()?;
    let attributes: AttributeSelector = attributes.parse()?;
    Ok(session.indexer::<E>().delete(selector, attributes)?)
}

/// Parse a command-line value as JSON, falling back to a plain string.
pub fn parse_value(text: &str) -> Value {
    serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::from(text))
}

// =============================================================================
// QUERY COMMAND
// =============================================================================

/// Arguments of the `query` command.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub entity: EntityArg,
    pub group: Option<String>,
    pub has: Vec<String>,
    pub conditions: Vec<String>,
    pub values: Option<String>,
    pub attributes: bool,
    pub reduce: Option<ReduceArg>,
    pub count: bool,
    pub grouped: bool,
}

impl QueryRequest {
    /// Build the query descriptor this request describes.
    pub fn descriptor(&self) -> Result<QueryDescriptor, CliError> {
        let entity = match self.entity {
            EntityArg::Node => EntityKind::Node,
            EntityArg::Edge => EntityKind::Edge,
        };
        let projection = match (&self.values, self.reduce) {
            (Some(name), _) if self.count => Projection::ValueCount {
                attribute: Attribute::parse(name),
            },
            (Some(name), None) => Projection::MultipleValues {
                attribute: Attribute::parse(name),
                with_index: true,
            },
            (Some(name), Some(reduce)) => Projection::SingleValue {
                attribute: Attribute::parse(name),
                reduction: reduction(reduce),
                with_index: true,
            },
            (None, _) if self.attributes => Projection::AttributesTree,
            (None, None) => Projection::Indices,
            (None, Some(reduce)) => Projection::Index {
                reduction: reduction(reduce),
            },
        };

        let mut descriptor = QueryDescriptor::new(entity, projection);
        descriptor.grouped = self.grouped;
        if let Some(group) = &self.group {
            descriptor.filters.push(Filter::InGroup(Attribute::parse(group)));
        }
        for name in &self.has {
            descriptor
                .filters
                .push(Filter::HasAttribute(Attribute::parse(name)));
        }
        for condition in &self.conditions {
            descriptor.filters.push(parse_condition(condition)?);
        }
        Ok(descriptor)
    }
}

/// Run a predicate query and print the reconstructed result.
pub fn cmd_query(settings: &Settings, request: &QueryRequest) -> Result<(), CliError> {
    let session = load_session(settings)?;
    let descriptor = request.descriptor()?;
    debug!(?descriptor, "query");
    let result = session.run_query(&Query::Single(descriptor))?;
    emit(settings, &render(&result))
}

const fn reduction(reduce: ReduceArg) -> Reduction {
    match reduce {
        ReduceArg::Max => Reduction::Max,
        ReduceArg::Min => Reduction::Min,
        ReduceArg::First => Reduction::First,
        ReduceArg::Last => Reduction::Last,
    }
}

/// Two-character operators come first so `>=` never reads as `>`.
const OPERATORS: [(&str, Comparison); 6] = [
    (">=", Comparison::GreaterOrEqual),
    ("<=", Comparison::LessOrEqual),
    ("!=", Comparison::NotEqual),
    ("=", Comparison::Equal),
    (">", Comparison::Greater),
    ("<", Comparison::Less),
];

/// Parse `name<op>value` into an attribute comparison filter.
pub fn parse_condition(text: &str) -> Result<Filter, CliError> {
    for (operator, comparison) in OPERATORS {
        if let Some((name, value)) = text.split_once(operator) {
            let name = name.trim();
            if name.is_empty() {
                break;
            }
            return Ok(Filter::Compare {
                attribute: Attribute::parse(name),
                comparison,
                value: parse_value(value.trim()),
            });
        }
    }
    Err(CliError::Argument(format!(
        "condition {text:?} must look like name>=value"
    )))
}

// =============================================================================
// OUTPUT
// =============================================================================

/// Turn a query result into JSON, keying entries by their bare index.
pub fn render(result: &QueryResult) -> JsonValue {
    match result {
        QueryResult::AttributesTree(entries) => keyed(entries.iter().map(|(key, attributes)| {
            (key, serde_json::to_value(attributes).unwrap_or(JsonValue::Null))
        })),
        QueryResult::Attributes(entries) => {
            keyed(entries.iter().map(|(key, name)| (key, attribute(name))))
        }
        QueryResult::Values(entries) => {
            keyed(entries.iter().map(|(key, value)| (key, json_value(value))))
        }
        QueryResult::AttributeList(names) => names.iter().map(attribute).collect(),
        QueryResult::ValueList(values) => values.iter().map(json_value).collect(),
        QueryResult::Indices(keys) => keys.iter().map(index).collect(),
        QueryResult::Index(key) => key.as_ref().map_or(JsonValue::Null, index),
        QueryResult::Attribute(name) => name.as_ref().map_or(JsonValue::Null, attribute),
        QueryResult::Value(value) => value.as_ref().map_or(JsonValue::Null, json_value),
        QueryResult::KeyedAttribute(entry) => {
            entry.as_ref().map_or(JsonValue::Null, |(key, name)| {
                serde_json::json!({ "index": index(key), "attribute": attribute(name) })
            })
        }
        QueryResult::KeyedValue(entry) => entry.as_ref().map_or(JsonValue::Null, |(key, value)| {
            serde_json::json!({ "index": index(key), "value": json_value(value) })
        }),
        QueryResult::Grouped(groups) => JsonValue::Object(
            groups
                .iter()
                .map(|(group, inner)| (group.to_string(), render(inner)))
                .collect(),
        ),
        QueryResult::Composite(parts) => parts.iter().map(render).collect(),
    }
}

fn keyed<'a>(entries: impl Iterator<Item = (&'a EntityKey, JsonValue)>) -> JsonValue {
    JsonValue::Object(
        entries
            .map(|(key, value)| (key_text(key), value))
            .collect(),
    )
}

fn key_text(key: &EntityKey) -> String {
    match key {
        EntityKey::Node(index) => index.to_string(),
        EntityKey::Edge(index) => index.to_string(),
    }
}

fn index(key: &EntityKey) -> JsonValue {
    match key {
        EntityKey::Node(index) => serde_json::to_value(index).unwrap_or(JsonValue::Null),
        EntityKey::Edge(index) => JsonValue::from(index.value()),
    }
}

fn attribute(name: &Attribute) -> JsonValue {
    match name {
        Attribute::Int(i) => JsonValue::from(*i),
        Attribute::String(s) => JsonValue::from(s.as_str()),
    }
}

fn json_value(value: &Value) -> JsonValue {
    serde_json::to_value(value).unwrap_or(JsonValue::Null)
}

fn emit(settings: &Settings, value: &JsonValue) -> Result<(), CliError> {
    if settings.json_mode {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", format_text(value));
    }
    Ok(())
}

/// Indented plain-text rendering of a JSON value.
pub fn format_text(value: &JsonValue) -> String {
    let mut out = String::new();
    write_text(value, 0, &mut out);
    out
}

fn write_text(value: &JsonValue, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    match value {
        JsonValue::Object(entries) if !entries.is_empty() => {
            for (key, item) in entries {
                if is_nested(item) {
                    out.push_str(&format!("{pad}{key}:\n"));
                    write_text(item, depth + 1, out);
                } else {
                    out.push_str(&format!("{pad}{key} = {}\n", scalar(item)));
                }
            }
        }
        JsonValue::Array(items) if !items.is_empty() => {
            for item in items {
                if is_nested(item) {
                    out.push_str(&format!("{pad}-\n"));
                    write_text(item, depth + 1, out);
                } else {
                    out.push_str(&format!("{pad}- {}\n", scalar(item)));
                }
            }
        }
        other => out.push_str(&format!("{pad}{}\n", scalar(other))),
    }
}

fn is_nested(value: &JsonValue) -> bool {
    match value {
        JsonValue::Object(entries) => !entries.is_empty(),
        JsonValue::Array(items) => !items.is_empty(),
        _ => false,
    }
}

fn scalar(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
