use std::path::Path;

use anyhow::Context;
use hirforge::prelude::*;
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_listing,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct BlockRow {
    id: String,
    start: u32,
    end: u32,
    succs: Vec<String>,
    preds: Vec<String>,
    loop_header: bool,
    reachable: bool,
}

pub fn run(path: &Path, method: Option<&str>, global: &GlobalOptions) -> anyhow::Result<()> {
    let listing = load_listing(path)?;
    let code = listing.method(method)?;
    let map = BlockMap::discover(code)
        .with_context(|| format!("method {}: block discovery failed", code.info().name))?;

    let ids = |blocks: &[BlockId]| blocks.iter().map(ToString::to_string).collect::<Vec<_>>();
    let rows: Vec<BlockRow> = map
        .blocks()
        .iter()
        .map(|desc| BlockRow {
            id: desc.id.to_string(),
            start: desc.start,
            end: desc.end,
            succs: ids(&desc.succs),
            preds: ids(&desc.preds),
            loop_header: desc.loop_header,
            reachable: desc.reachable,
        })
        .collect();

    print_output(&rows, global, |rows| {
        println!("Blocks of {} (entry {})", code.info().name, map.entry());
        println!();
        let mut table = TabWriter::new(vec![
            ("BLOCK", Align::Left),
            ("RANGE", Align::Left),
            ("SUCCS", Align::Left),
            ("PREDS", Align::Left),
            ("FLAGS", Align::Left),
        ]);
        for row in rows {
            let mut flags = Vec::new();
            if row.loop_header {
                flags.push("loop");
            }
            if !row.reachable {
                flags.push("unreachable");
            }
            table.row(vec![
                row.id.clone(),
                format!("{}..{}", row.start, row.end),
                row.succs.join(" "),
                row.preds.join(" "),
                flags.join(","),
            ]);
        }
        table.print();
    })
}
