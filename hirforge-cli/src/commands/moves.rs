use std::path::Path;

use hirforge::prelude::*;
use serde::Serialize;

use crate::{
    app::{BuildOptions, GlobalOptions},
    commands::common::{build_graph, load_listing, print_events},
    output::print_output,
};

#[derive(Debug, Serialize)]
struct EdgeMoves {
    block: String,
    successor: String,
    moves: Vec<String>,
}

#[derive(Debug, Serialize)]
struct MovesOutput {
    method: String,
    registers: usize,
    edges: Vec<EdgeMoves>,
}

pub fn run(
    path: &Path,
    method: Option<&str>,
    options: &BuildOptions,
    global: &GlobalOptions,
) -> anyhow::Result<()> {
    let listing = load_listing(path)?;
    let code = listing.method(method)?;
    let events = EventLog::new();
    let graph = build_graph(&listing, code, options, &events)?;

    let mut registers = VirtualRegisters::new();
    let resolved = resolve_all(&graph, &mut registers)?;

    let edges = resolved
        .iter()
        .map(|(block, moves)| EdgeMoves {
            block: block.to_string(),
            successor: graph
                .block(*block)
                .and_then(|b| b.succs().first())
                .map(ToString::to_string)
                .unwrap_or_default(),
            moves: moves.iter().map(ToString::to_string).collect(),
        })
        .collect();

    let output = MovesOutput {
        method: graph.method().name.clone(),
        registers: registers.count(),
        edges,
    };

    print_output(&output, global, |out| {
        println!("Phi moves for {}", out.method);
        println!("  Virtual registers: {}", out.registers);
        if out.edges.is_empty() {
            println!("  No joins need copies.");
        }
        for edge in &out.edges {
            println!();
            println!("{} -> {}:", edge.block, edge.successor);
            for mv in &edge.moves {
                println!("  {mv}");
            }
        }
    })?;

    if options.events && !global.json {
        print_events(&events);
    }
    Ok(())
}
