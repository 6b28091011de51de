use std::path::Path;

use hirforge::prelude::*;
use serde::Serialize;

use crate::{
    app::{BuildOptions, GlobalOptions, HirFormat},
    commands::common::{build_graph, load_listing, print_events},
};

#[derive(Debug, Serialize)]
struct PhiOutput {
    value: String,
    slot: String,
    inputs: Vec<String>,
}

#[derive(Debug, Serialize)]
struct BlockOutput {
    id: String,
    start: u32,
    end: u32,
    loop_header: bool,
    synthetic: bool,
    preds: Vec<String>,
    succs: Vec<String>,
    phis: Vec<PhiOutput>,
    instruction_count: usize,
    terminal: Option<String>,
}

#[derive(Debug, Serialize)]
struct HirOutput {
    method: String,
    entry: String,
    block_count: usize,
    value_count: usize,
    flags: Vec<String>,
    blocks: Vec<BlockOutput>,
}

pub fn run(
    path: &Path,
    method: Option<&str>,
    format: HirFormat,
    options: &BuildOptions,
    global: &GlobalOptions,
) -> anyhow::Result<()> {
    let listing = load_listing(path)?;
    let code = listing.method(method)?;
    let events = EventLog::new();
    let graph = build_graph(&listing, code, options, &events)?;

    // --json forces the JSON summary regardless of --format
    let format = if global.json { HirFormat::Json } else { format };
    match format {
        HirFormat::Text => print!("{graph}"),
        HirFormat::Dot => println!("{}", graph.to_dot()),
        HirFormat::Json => {
            let json = serde_json::to_string_pretty(&summarize(&graph))?;
            println!("{json}");
        }
    }

    if options.events && format != HirFormat::Json {
        print_events(&events);
    }
    Ok(())
}

fn summarize(graph: &HirGraph) -> HirOutput {
    let ids = |blocks: &[BlockId]| blocks.iter().map(ToString::to_string).collect::<Vec<_>>();

    let blocks = graph
        .block_order()
        .into_iter()
        .filter_map(|id| graph.block(id))
        .map(|block| BlockOutput {
            id: block.id().to_string(),
            start: block.start(),
            end: block.end(),
            loop_header: block.is_loop_header(),
            synthetic: block.is_synthetic(),
            preds: ids(block.preds()),
            succs: ids(block.succs()),
            phis: graph
                .phis(block.id())
                .map(|(slot, phi)| PhiOutput {
                    value: phi.id.to_string(),
                    slot: slot.to_string(),
                    inputs: phi.op.operands().iter().map(ToString::to_string).collect(),
                })
                .collect(),
            instruction_count: block.instructions().len(),
            terminal: graph.terminal(block.id()).map(ToString::to_string),
        })
        .collect();

    HirOutput {
        method: graph.method().name.clone(),
        entry: graph.entry().to_string(),
        block_count: graph.block_count(),
        value_count: graph.value_count(),
        flags: graph
            .flags()
            .iter_names()
            .map(|(name, _)| name.to_string())
            .collect(),
        blocks,
    }
}
