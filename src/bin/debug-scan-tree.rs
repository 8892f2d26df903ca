/// Scan tree inspection tool
/// Runs the source scan and volume resolution, then dumps every discovered layer
use layerscan_rs::backend::BackendRegistry;
use layerscan_rs::mediator::ScriptedMediator;
use layerscan_rs::scanner::{NodeId, ScanContext, VolumeScanner};
use std::path::PathBuf;
use std::sync::Arc;

fn print_node(context: &ScanContext, id: NodeId) {
    let node = context.node(id);
    let spec = &node.path_spec;
    let indent = "  ".repeat(node.depth as usize + 1);

    let mut line = format!("{}{}", indent, spec.type_indicator());
    if let Some(location) = spec.location() {
        line.push_str(&format!("  {}", location));
    }
    if let Some(offset) = spec.start_offset() {
        line.push_str(&format!("  @0x{:08x}", offset));
    }
    if context.is_locked(id) {
        line.push_str("  [locked]");
    }
    println!("{}", line);

    for child in context.tree().children(id) {
        print_node(context, child);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("layerscan_rs=debug".parse()?),
        )
        .init();

    let source = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("usage: debug-scan-tree <source>"))?;

    println!("Source: {}", source.display());
    println!();

    let registry = Arc::new(BackendRegistry::with_defaults());
    println!("Backends: {:?}", registry);
    println!();

    let mut scanner =
        VolumeScanner::new(registry).with_mediator(Box::new(ScriptedMediator::new()));
    let start = std::time::Instant::now();
    let result = scanner.get_base_path_specs(&source);
    let duration = start.elapsed();

    println!("┌─ SCAN TREE ────────────────────────────────────────────────┐");
    match scanner.scan_context() {
        Some(context) => {
            println!("  Source type: {}", context.source_type());
            println!("  Nodes:       {}", context.tree().len());
            print_node(context, context.root_id());
        }
        None => println!("  (no scan context)"),
    }
    println!("└────────────────────────────────────────────────────────────┘");
    println!();

    println!("┌─ BASE PATH SPECIFICATIONS ─────────────────────────────────┐");
    match result {
        Ok(specs) => {
            println!("  ✓ Resolved in {:.2}ms", duration.as_secs_f64() * 1000.0);
            for (index, spec) in specs.iter().enumerate() {
                println!("  [{}]", index + 1);
                for line in spec.to_string().lines() {
                    println!("    {}", line);
                }
            }
            if specs.is_empty() {
                println!("  (none)");
            }
        }
        Err(err) => println!("  ✗ FAILED: {}", err),
    }
    println!("└────────────────────────────────────────────────────────────┘");

    Ok(())
}
