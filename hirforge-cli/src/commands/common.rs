use std::path::Path;

use anyhow::Context;
use hirforge::prelude::*;

use crate::{
    app::BuildOptions,
    listing::{self, Listing},
    output::{Align, TabWriter},
};

/// Read and parse a method listing.
pub fn load_listing(path: &Path) -> anyhow::Result<Listing> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read listing: {}", path.display()))?;
    listing::parse(&source).with_context(|| format!("failed to parse {}", path.display()))
}

/// Translate command line switches into a builder configuration.
pub fn build_config(options: &BuildOptions) -> BuildConfig {
    BuildConfig::default()
        .with_idealize(!options.no_idealize)
        .with_value_numbering(!options.no_lvn)
        .with_strict_fallthrough(options.strict)
}

/// Discover blocks and build the graph of `code`, recording into `events`.
pub fn build_graph(
    listing: &Listing,
    code: &MethodCode,
    options: &BuildOptions,
    events: &EventLog,
) -> anyhow::Result<HirGraph> {
    let name = &code.info().name;
    let map = BlockMap::discover(code)
        .with_context(|| format!("method {name}: block discovery failed"))?;
    HirBuilder::new(code, &map, &listing.resolver)
        .with_config(build_config(options))
        .with_events(events)
        .build()
        .with_context(|| format!("method {name}: HIR construction failed"))
}

/// Print the recorded events as a table on stdout.
pub fn print_events(events: &EventLog) {
    println!();
    println!("Events ({}):", events.len());
    let mut table = TabWriter::new(vec![
        ("KIND", Align::Left),
        ("BLOCK", Align::Right),
        ("OFFSET", Align::Right),
        ("MESSAGE", Align::Left),
    ])
    .indent("  ");
    for event in events.iter() {
        table.row(vec![
            event.kind.to_string(),
            event.block.map(|b| b.to_string()).unwrap_or_default(),
            event.offset.map(|o| o.to_string()).unwrap_or_default(),
            event.message.clone(),
        ]);
    }
    table.print();
}
