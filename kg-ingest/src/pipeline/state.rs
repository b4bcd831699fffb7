//! Typestate enforcement for the per-document ingestion flow (§4.7),
//! grounded on the reference crate's own `state_machine!` usage: the states
//! change from content-enrichment stages to the knowledge-graph stages this
//! pipeline actually runs.

use state_machines::state_machine;

state_machine! {
    name: IngestionMachine,
    state: IngestionState,
    initial: Ready,
    states: [Ready, Chunked, ChunksEmbedded, GraphBuilt, Failed],
    events {
        chunk { transition: { from: Ready, to: Chunked } }
        embed_chunks { transition: { from: Chunked, to: ChunksEmbedded } }
        build_graph { transition: { from: ChunksEmbedded, to: GraphBuilt } }
        abort {
            transition: { from: Ready, to: Failed }
            transition: { from: Chunked, to: Failed }
            transition: { from: ChunksEmbedded, to: Failed }
            transition: { from: GraphBuilt, to: Failed }
        }
    }
}

#[must_use]
pub fn ready() -> IngestionMachine<(), Ready> {
    IngestionMachine::new(())
}
