// Row matching: index the destination side by normalized key, probe with
// source rows, then sweep the destination rows nobody claimed.
//
// Duplicate destination keys: the last row wins the index slot. Earlier rows
// with the same key can never be matched and end up destination-only, so
// every destination row lands in exactly one partition.

use crate::model::Row;
use crate::reconcile::key::Key;
use crate::reconcile::normalize::Normalizer;
use ahash::AHashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct MatchResult<'a> {
    pub matched: Vec<(&'a Row, &'a Row)>,
    pub source_only: Vec<&'a Row>,
    pub destination_only: Vec<&'a Row>,
}

// Matches and misses for one slice of source rows.
#[derive(Debug, Default)]
pub struct ChunkMatch<'a> {
    pub matched: Vec<(&'a Row, &'a Row)>,
    pub source_only: Vec<&'a Row>,
}

pub struct DestinationIndex<'a> {
    rows: &'a [Row],
    by_key: AHashMap<String, usize>,
    consumed: Vec<bool>,
    key: Key,
    normalizer: Normalizer,
    shadowed: usize,
}

impl<'a> DestinationIndex<'a> {
    pub fn build(rows: &'a [Row], key: &Key, normalizer: Normalizer) -> Self {
        let mut by_key = AHashMap::with_capacity(rows.len());
        let mut shadowed = 0usize;
        for (i, row) in rows.iter().enumerate() {
            let k = normalizer.key(&row.values, &key.positions(&row.columns));
            if by_key.insert(k, i).is_some() {
                shadowed += 1;
            }
        }
        if shadowed > 0 {
            debug!(
                "DestinationIndex: {} duplicate destination keys on [{}], last row kept",
                shadowed,
                key.label()
            );
        }
        Self {
            rows,
            by_key,
            consumed: vec![false; rows.len()],
            key: key.clone(),
            normalizer,
            shadowed,
        }
    }

    // Destination rows hidden behind a later row with the same key.
    pub fn shadowed(&self) -> usize {
        self.shadowed
    }

    pub fn probe(&mut self, source: &'a [Row]) -> ChunkMatch<'a> {
        let rows: &'a [Row] = self.rows;
        let mut out = ChunkMatch::default();
        for row in source {
            let k = self
                .normalizer
                .key(&row.values, &self.key.positions(&row.columns));
            match self.by_key.get(&k) {
                Some(&i) => {
                    self.consumed[i] = true;
                    out.matched.push((row, &rows[i]));
                }
                None => out.source_only.push(row),
            }
        }
        out
    }

    // Destination rows never claimed by a probe, in input order.
    pub fn finish(self) -> Vec<&'a Row> {
        self.rows
            .iter()
            .zip(self.consumed)
            .filter(|(_, used)| !used)
            .map(|(row, _)| row)
            .collect()
    }
}

// One-pass matching of two row sets on `key`.
pub fn match_rows<'a>(
    source: &'a [Row],
    destination: &'a [Row],
    key: &Key,
    normalizer: Normalizer,
) -> MatchResult<'a> {
    let mut index = DestinationIndex::build(destination, key, normalizer);
    let chunk = index.probe(source);
    MatchResult {
        matched: chunk.matched,
        source_only: chunk.source_only,
        destination_only: index.finish(),
    }
}
