//! # CLI Command Implementations
//!
//! Each command builds its output as a string (see the `*_report`
//! functions) and prints it; the report builders are what the tests use.

use super::Settings;
use crate::config::OutputFormat;
use crate::render::{render_json, render_text};
use crate::workspace::{Workspace, load_schema};
use metagraph_core::{
    AggregationKind, BindingTable, MetaAssociation, MetagraphError, Multiplicity,
    OwnershipResolver, SchemaDocument, SchemaRegistry,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;

/// Maximum size of a query file (64 KiB, the query length limit).
const MAX_QUERY_FILE_SIZE: u64 = metagraph_core::primitives::MAX_QUERY_LENGTH as u64;

fn io_error(e: std::io::Error) -> MetagraphError {
    MetagraphError::Document(format!("I/O error: {}", e))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, MetagraphError> {
    serde_json::to_string_pretty(value)
        .map(|mut s| {
            s.push('\n');
            s
        })
        .map_err(|e| MetagraphError::Document(format!("cannot serialize output: {}", e)))
}

/// Render a query result in the selected format.
pub fn output_table(
    format: OutputFormat,
    table: &BindingTable,
    workspace: &Workspace,
) -> Result<String, MetagraphError> {
    match format {
        OutputFormat::Table => Ok(render_text(table, workspace)),
        OutputFormat::Json => render_json(table).map(|mut s| {
            s.push('\n');
            s
        }),
    }
}

// =============================================================================
// QUERY COMMAND
// =============================================================================

/// Run one query.
pub fn cmd_query(
    settings: &Settings,
    text: Option<String>,
    file: Option<&Path>,
) -> Result<(), MetagraphError> {
    let text = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => read_query_file(path)?,
        (None, None) => {
            return Err(MetagraphError::Document(
                "no query given; pass the query text or --file".to_string(),
            ));
        }
    };

    let workspace = Workspace::load(&settings.sources)?;
    let table = workspace.store.query(&text)?;
    print!("{}", output_table(settings.output, &table, &workspace)?);
    Ok(())
}

fn read_query_file(path: &Path) -> Result<String, MetagraphError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        MetagraphError::Document(format!("cannot read '{}': {}", path.display(), e))
    })?;
    if metadata.len() > MAX_QUERY_FILE_SIZE {
        return Err(MetagraphError::Document(format!(
            "query file '{}' exceeds {} bytes",
            path.display(),
            MAX_QUERY_FILE_SIZE
        )));
    }
    std::fs::read_to_string(path)
        .map_err(|e| MetagraphError::Document(format!("cannot read '{}': {}", path.display(), e)))
}

// =============================================================================
// SHELL COMMAND
// =============================================================================

const SHELL_HELP: &str = "\
Statements end with ';' and may span lines.
  :help     show this help
  :schema   list classes and associations
  :mounts   list mounted models
  :quit     leave the shell
";

/// Start the interactive shell on stdin/stdout.
pub fn cmd_shell(settings: &Settings) -> Result<(), MetagraphError> {
    let workspace = Workspace::load(&settings.sources)?;
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let executed = run_shell(
        &workspace,
        stdin.lock(),
        &mut out,
        settings.output,
        settings.quiet,
    )?;
    tracing::debug!(statements = executed, "shell closed");
    Ok(())
}

/// Read statements from `input` until EOF or `:quit`.
///
/// Query errors are written to `output` and the shell continues.
/// Returns the number of statements executed.
pub fn run_shell<R: BufRead, W: Write>(
    workspace: &Workspace,
    mut input: R,
    output: &mut W,
    format: OutputFormat,
    quiet: bool,
) -> Result<usize, MetagraphError> {
    if !quiet {
        writeln!(
            output,
            "Metagraph GQL shell v{} ({} elements). Type :help for help.",
            env!("CARGO_PKG_VERSION"),
            workspace.store.get_all_elements().len()
        )
        .map_err(io_error)?;
    }

    let mut buffer = String::new();
    let mut executed = 0usize;
    loop {
        if !quiet {
            let prompt = if buffer.is_empty() { "metagraph> " } else { "      ...> " };
            write!(output, "{}", prompt).map_err(io_error)?;
            output.flush().map_err(io_error)?;
        }

        let mut line = String::new();
        let read = input.read_line(&mut line).map_err(io_error)?;
        if read == 0 {
            break;
        }
        let trimmed = line.trim();

        if buffer.is_empty() && trimmed.starts_with(':') {
            let written = match trimmed {
                ":quit" | ":q" | ":exit" => return Ok(executed),
                ":help" => write!(output, "{}", SHELL_HELP),
                ":schema" => write!(output, "{}", schema_listing(workspace.store.schema())),
                ":mounts" => write!(output, "{}", mount_listing(workspace)),
                other => writeln!(output, "unknown command {}; try :help", other),
            };
            written.map_err(io_error)?;
            continue;
        }
        if buffer.is_empty() && trimmed.is_empty() {
            continue;
        }

        buffer.push_str(&line);
        if trimmed.ends_with(';') {
            run_statement(workspace, &buffer, output, format)?;
            executed += 1;
            buffer.clear();
        }
    }

    if !buffer.trim().is_empty() {
        run_statement(workspace, &buffer, output, format)?;
        executed += 1;
    }
    Ok(executed)
}

fn run_statement<W: Write>(
    workspace: &Workspace,
    text: &str,
    output: &mut W,
    format: OutputFormat,
) -> Result<(), MetagraphError> {
    let rendered = match workspace.store.query(text) {
        Ok(table) => output_table(format, &table, workspace)?,
        Err(e) => format!("error: {}\n", e),
    };
    write!(output, "{}", rendered).map_err(io_error)
}

fn mount_listing(workspace: &Workspace) -> String {
    let mut out = String::new();
    for mount in workspace.store.mounts() {
        out.push_str(&format!(
            "{}: {} elements, {} root namespaces\n",
            mount.id(),
            mount.store().local_count(),
            mount.root_namespaces().len()
        ));
    }
    if out.is_empty() {
        out.push_str("no mounts\n");
    }
    out
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Summary of a loaded workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub classes: usize,
    pub associations: usize,
    pub local_elements: usize,
    pub visible_elements: usize,
    pub links: usize,
    pub mounts: Vec<MountReport>,
    /// Visible instances per concrete class.
    pub instances: BTreeMap<String, usize>,
    /// Local links per association.
    pub links_by_association: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountReport {
    pub id: String,
    pub elements: usize,
    pub links: usize,
    pub root_namespaces: usize,
}

/// Collect statistics about `workspace`.
#[must_use]
pub fn check_report(workspace: &Workspace) -> CheckReport {
    let store = &workspace.store;
    let visible = store.get_all_elements();

    let mut instances: BTreeMap<String, usize> = BTreeMap::new();
    for id in &visible {
        if let Some(instance) = store.get_instance(*id) {
            *instances.entry(instance.class_name.clone()).or_default() += 1;
        }
    }
    let mut links_by_association: BTreeMap<String, usize> = BTreeMap::new();
    for link in store.get_local_links() {
        *links_by_association.entry(link.association).or_default() += 1;
    }

    CheckReport {
        classes: store.schema().class_count(),
        associations: store.schema().association_count(),
        local_elements: store.local_count(),
        visible_elements: visible.len(),
        links: store.link_count(),
        mounts: store
            .mounts()
            .map(|m| MountReport {
                id: m.id().to_string(),
                elements: m.store().local_count(),
                links: m.store().link_count(),
                root_namespaces: m.root_namespaces().len(),
            })
            .collect(),
        instances,
        links_by_association,
    }
}

/// Render a check report as text.
#[must_use]
pub fn render_check(report: &CheckReport) -> String {
    let mut out = String::new();
    out.push_str("Metagraph Model Status\n");
    out.push_str("======================\n");
    out.push_str(&format!("Classes:          {}\n", report.classes));
    out.push_str(&format!("Associations:     {}\n", report.associations));
    out.push_str(&format!("Local Elements:   {}\n", report.local_elements));
    out.push_str(&format!("Visible Elements: {}\n", report.visible_elements));
    out.push_str(&format!("Links:            {}\n", report.links));

    if !report.mounts.is_empty() {
        out.push_str("\nMounts:\n");
        for m in &report.mounts {
            out.push_str(&format!(
                "  {}: {} elements, {} links, {} root namespaces\n",
                m.id, m.elements, m.links, m.root_namespaces
            ));
        }
    }
    if !report.instances.is_empty() {
        out.push_str("\nInstances:\n");
        for (class, count) in &report.instances {
            out.push_str(&format!("  {}: {}\n", class, count));
        }
    }
    if !report.links_by_association.is_empty() {
        out.push_str("\nLinks:\n");
        for (association, count) in &report.links_by_association {
            out.push_str(&format!("  {}: {}\n", association, count));
        }
    }
    out
}

/// Load everything and print statistics.
pub fn cmd_check(settings: &Settings) -> Result<(), MetagraphError> {
    let workspace = Workspace::load(&settings.sources)?;
    let report = check_report(&workspace);
    match settings.output {
        OutputFormat::Json => print!("{}", to_json(&report)?),
        OutputFormat::Table => print!("{}", render_check(&report)),
    }
    Ok(())
}

// =============================================================================
// SCHEMA COMMAND
// =============================================================================

fn bounds(m: &Multiplicity) -> String {
    match m.upper {
        Some(upper) => format!("[{}..{}]", m.lower, upper),
        None => format!("[{}..*]", m.lower),
    }
}

fn aggregation(a: &MetaAssociation) -> &'static str {
    let kinds = [a.source.aggregation, a.target.aggregation];
    if kinds.contains(&AggregationKind::Composite) {
        " composite"
    } else if kinds.contains(&AggregationKind::Shared) {
        " shared"
    } else {
        ""
    }
}

/// One line per class and association.
#[must_use]
pub fn schema_listing(schema: &SchemaRegistry) -> String {
    let mut out = format!("Classes ({})\n", schema.class_count());
    for class in schema.classes() {
        out.push_str(&format!("  {}", class.name));
        if !class.superclasses.is_empty() {
            out.push_str(&format!(" : {}", class.superclasses.join(", ")));
        }
        if class.is_abstract {
            out.push_str(" [abstract]");
        }
        out.push('\n');
    }
    out.push_str(&format!("Associations ({})\n", schema.association_count()));
    for a in schema.get_all_associations() {
        out.push_str(&format!(
            "  {}: {} {} {} -> {} {} {}{}\n",
            a.name,
            a.source.name,
            a.source.type_name,
            bounds(&a.source.multiplicity),
            a.target.name,
            a.target.type_name,
            bounds(&a.target.multiplicity),
            aggregation(a)
        ));
    }
    out
}

/// A member as shown in class detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberReport {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub multiplicity: String,
    /// Declaring class (attributes) or association (ends).
    pub origin: String,
    pub derived: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassReport {
    pub name: String,
    pub is_abstract: bool,
    pub superclasses: Vec<String>,
    pub subclasses: Vec<String>,
    pub attributes: Vec<MemberReport>,
    pub ends: Vec<MemberReport>,
    pub operations: Vec<String>,
}

/// Everything a class has, inherited members included.
pub fn class_report(schema: &SchemaRegistry, name: &str) -> Result<ClassReport, MetagraphError> {
    let class = schema
        .get_class(name)
        .ok_or_else(|| MetagraphError::Schema(format!("unregistered class '{}'", name)))?;

    let mut attributes: Vec<MemberReport> = Vec::new();
    let mut operations: Vec<String> = Vec::new();
    for owner in schema.dispatch_order(name) {
        let Some(owner_class) = schema.get_class(owner) else {
            continue;
        };
        for attribute in &owner_class.attributes {
            if attributes.iter().any(|a| a.name == attribute.name) {
                continue;
            }
            attributes.push(MemberReport {
                name: attribute.name.clone(),
                type_name: attribute.type_name.clone(),
                multiplicity: bounds(&attribute.multiplicity),
                origin: owner.to_string(),
                derived: attribute.is_derived,
            });
        }
        for operation in &owner_class.operations {
            if !operations.contains(&operation.name) {
                operations.push(operation.name.clone());
            }
        }
    }

    let mut ends: Vec<MemberReport> = Vec::new();
    for a in schema.get_all_associations() {
        let candidates = [
            (&a.source.type_name, &a.target),
            (&a.target.type_name, &a.source),
        ];
        for (near_type, far) in candidates {
            if far.navigable && schema.is_subclass_of(name, near_type) {
                ends.push(MemberReport {
                    name: far.name.clone(),
                    type_name: far.type_name.clone(),
                    multiplicity: bounds(&far.multiplicity),
                    origin: a.name.clone(),
                    derived: far.is_derived(),
                });
            }
        }
    }

    Ok(ClassReport {
        name: class.name.clone(),
        is_abstract: class.is_abstract,
        superclasses: schema.get_all_superclasses(name).to_vec(),
        subclasses: schema
            .get_direct_subclasses(name)
            .into_iter()
            .map(str::to_string)
            .collect(),
        attributes,
        ends,
        operations,
    })
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn render_class(report: &ClassReport) -> String {
    let mut out = format!(
        "Class {}{}\n",
        report.name,
        if report.is_abstract { " [abstract]" } else { "" }
    );
    out.push_str(&format!("  superclasses: {}\n", list(&report.superclasses)));
    out.push_str(&format!("  subclasses:   {}\n", list(&report.subclasses)));
    for (title, members) in [("attributes", &report.attributes), ("ends", &report.ends)] {
        out.push_str(&format!("  {}:\n", title));
        if members.is_empty() {
            out.push_str("    (none)\n");
        }
        for m in members {
            out.push_str(&format!(
                "    {}: {} {} ({}){}\n",
                m.name,
                m.type_name,
                m.multiplicity,
                m.origin,
                if m.derived { " derived" } else { "" }
            ));
        }
    }
    out.push_str(&format!("  operations:   {}\n", list(&report.operations)));
    out
}

/// The schema listing, or one class in detail.
pub fn schema_report(
    schema: &SchemaRegistry,
    class: Option<&str>,
    format: OutputFormat,
) -> Result<String, MetagraphError> {
    match (class, format) {
        (None, OutputFormat::Table) => Ok(schema_listing(schema)),
        (None, OutputFormat::Json) => to_json(&SchemaDocument::from_registry(schema)),
        (Some(name), OutputFormat::Table) => class_report(schema, name).map(|r| render_class(&r)),
        (Some(name), OutputFormat::Json) => to_json(&class_report(schema, name)?),
    }
}

/// Print the schema.
pub fn cmd_schema(settings: &Settings, class: Option<&str>) -> Result<(), MetagraphError> {
    let schema = load_schema(&settings.sources)?;
    print!("{}", schema_report(&schema, class, settings.output)?);
    Ok(())
}

// =============================================================================
// OWNERSHIP COMMAND
// =============================================================================

/// The ownership binding for `owner` and `element`, rendered.
pub fn ownership_report(
    schema: &SchemaRegistry,
    owner: &str,
    element: &str,
    format: OutputFormat,
) -> Result<String, MetagraphError> {
    for class in [owner, element] {
        if schema.get_class(class).is_none() {
            return Err(MetagraphError::Schema(format!(
                "unregistered class '{}'",
                class
            )));
        }
    }
    let binding = OwnershipResolver::new(schema).resolve(owner, element);

    if format == OutputFormat::Json {
        return to_json(&binding);
    }
    Ok(match binding {
        Some(b) => match &b.relationship_class {
            Some(relationship_class) => format!(
                "{} owns {} through {}\n  owner association:   {} (end '{}')\n  element association: {} (end '{}')\n",
                owner,
                element,
                relationship_class,
                b.owner_association,
                b.owner_end,
                b.element_association,
                b.element_end
            ),
            None => format!(
                "{} owns {} directly through {} (end '{}')\n",
                owner, element, b.owner_association, b.element_end
            ),
        },
        None => format!(
            "no ownership path from {} to {}; the element is created unparented\n",
            owner, element
        ),
    })
}

/// Print the ownership binding.
pub fn cmd_ownership(settings: &Settings, owner: &str, element: &str) -> Result<(), MetagraphError> {
    let schema = load_schema(&settings.sources)?;
    print!(
        "{}",
        ownership_report(&schema, owner, element, settings.output)?
    );
    Ok(())
}
